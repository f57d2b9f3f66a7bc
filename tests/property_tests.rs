//! Property-based tests for the codec and the two handlers.
//!
//! Each property is checked against generated payloads rather than a handful
//! of literals: the codec round trip over arbitrary flat maps, the threshold
//! boundary on both sides, and identity defaulting.

use edge_relay::codec::{decode, encode};
use edge_relay::core::DecodedFields;
use edge_relay::handlers::status::StaticStatusProvider;
use edge_relay::handlers::{CommandDispatcher, TelemetryEvaluator, ThresholdOperator, ThresholdRule};

use proptest::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;

const PROPTEST_CASES: u32 = 512;

/// Any scalar leaf the codec keeps: string, number, boolean or null.
fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        ".{0,16}".prop_map(Value::String),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        any::<u64>().prop_map(|n| json!(n)),
        any::<f64>()
            .prop_filter("JSON numbers are finite", |f| f.is_finite())
            .prop_map(|f| json!(f)),
        Just(Value::Null),
    ]
}

fn flat_fields() -> impl Strategy<Value = DecodedFields> {
    prop::collection::vec((".{0,12}", scalar()), 0..12)
        .prop_map(|entries| entries.into_iter().collect())
}

fn evaluator(limit: f64, default_identity: &str) -> TelemetryEvaluator {
    TelemetryEvaluator::new(
        ThresholdRule::new("temperature", ThresholdOperator::GreaterThan, limit, "HIGH_TEMPERATURE"),
        "component/alerts",
        "sensor_id",
        default_identity,
    )
}

fn reading(value: f64) -> DecodedFields {
    let mut fields = DecodedFields::new();
    fields.insert("temperature".into(), json!(value));
    fields
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(PROPTEST_CASES))]

    #[test]
    fn prop_round_trip_scalar_fields(fields in flat_fields()) {
        let decoded = decode(&encode(&fields).unwrap()).unwrap();
        prop_assert_eq!(&decoded, &fields);
        prop_assert!(decoded.keys().eq(fields.keys()));
    }

    #[test]
    fn prop_reading_above_limit_raises_one_alert(
        limit in -1.0e6f64..1.0e6,
        excess in 1.0e-3f64..1.0e3,
    ) {
        let value = limit + excess;
        let alert = evaluator(limit, "device1").evaluate(&reading(value)).unwrap();

        let alert = alert.expect("reading above limit must alert");
        prop_assert_eq!(alert.topic.as_str(), "component/alerts");
        prop_assert_eq!(&alert.fields["alert"], "HIGH_TEMPERATURE");
        prop_assert_eq!(alert.fields["temperature"].as_f64(), Some(value));
    }

    #[test]
    fn prop_reading_at_or_below_limit_is_quiet(
        limit in -1.0e6f64..1.0e6,
        shortfall in 0.0f64..1.0e3,
    ) {
        let alert = evaluator(limit, "device1").evaluate(&reading(limit - shortfall)).unwrap();
        prop_assert!(alert.is_none());
    }

    #[test]
    fn prop_missing_identity_uses_default(default_identity in "[a-z0-9_-]{1,16}") {
        let dispatcher = CommandDispatcher::new(Arc::new(StaticStatusProvider::new("online")), default_identity.clone());

        let mut command = DecodedFields::new();
        command.insert("command".into(), json!("get_status"));

        for _ in 0..2 {
            let reply = dispatcher.dispatch(&command).expect("status reply");
            prop_assert_eq!(reply.topic, format!("telemetry/{default_identity}"));
            prop_assert_eq!(reply.fields["device_id"].as_str(), Some(default_identity.as_str()));
        }

        let alert = evaluator(80.0, &default_identity)
            .evaluate(&reading(85.0))
            .unwrap()
            .expect("alert");
        prop_assert_eq!(alert.fields["sensor_id"].as_str(), Some(default_identity.as_str()));
    }
}
