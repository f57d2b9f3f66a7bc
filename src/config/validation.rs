use super::types::{Config, HandlerKind};
use crate::core::error::RelayError;

/// Checks a loaded configuration before anything connects or subscribes.
pub fn validate_config(config: &Config) -> Result<(), RelayError> {
    if config.subscriptions.is_empty() {
        return Err(RelayError::configuration("No subscriptions defined"));
    }

    for subscription in &config.subscriptions {
        validate_topic_filter(&subscription.topic)?;
    }

    if config.mqtt.broker_url.is_empty() {
        return Err(RelayError::configuration("Broker URL cannot be empty"));
    }
    config
        .mqtt
        .parse_broker_url()
        .map_err(|e| RelayError::configuration(e.to_string()))?;
    if config.mqtt.qos > 2 {
        return Err(RelayError::configuration("QoS must be between 0 and 2"));
    }
    if config.mqtt.request_capacity == 0 {
        return Err(RelayError::configuration("MQTT request capacity must be positive"));
    }

    if config.relay.default_identity.is_empty() {
        return Err(RelayError::configuration("Default identity cannot be empty"));
    }

    if config.has_handler(HandlerKind::Command) && config.status.is_none() {
        return Err(RelayError::configuration(
            "Command subscriptions require a [status] provider",
        ));
    }

    if config.has_handler(HandlerKind::Telemetry) {
        let telemetry = config.telemetry.as_ref().ok_or_else(|| {
            RelayError::configuration("Telemetry subscriptions require a [telemetry] rule")
        })?;

        if telemetry.field_name.is_empty() {
            return Err(RelayError::configuration("Telemetry field_name cannot be empty"));
        }
        if telemetry.identity_field.is_empty() {
            return Err(RelayError::configuration("Telemetry identity_field cannot be empty"));
        }
        if !telemetry.limit.is_finite() {
            return Err(RelayError::configuration("Telemetry limit must be a finite number"));
        }
        validate_publish_topic(&telemetry.alert_topic)?;
    }

    Ok(())
}

/// A subscription filter: non-empty, `#` only as the last level, and
/// wildcards only as whole levels.
pub fn validate_topic_filter(filter: &str) -> Result<(), RelayError> {
    if filter.is_empty() {
        return Err(RelayError::configuration("Subscription topic cannot be empty"));
    }

    let levels: Vec<&str> = filter.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        let is_last = i == levels.len() - 1;

        if level.contains('#') && (*level != "#" || !is_last) {
            return Err(RelayError::configuration(format!(
                "Invalid topic filter '{filter}': '#' must be the last level on its own"
            )));
        }
        if level.contains('+') && *level != "+" {
            return Err(RelayError::configuration(format!(
                "Invalid topic filter '{filter}': '+' must occupy a whole level"
            )));
        }
    }

    Ok(())
}

/// A publish topic: non-empty and free of wildcards.
pub fn validate_publish_topic(topic: &str) -> Result<(), RelayError> {
    if topic.is_empty() || topic.contains(['+', '#']) {
        return Err(RelayError::configuration(format!(
            "Invalid publish topic '{topic}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{StatusConfig, Subscription, TelemetryConfig};

    fn valid_config() -> Config {
        Config {
            subscriptions: vec![
                Subscription::new("commands/device1", HandlerKind::Command),
                Subscription::new("sensors/temperature", HandlerKind::Telemetry),
            ],
            status: Some(StatusConfig {
                r#type: "static".into(),
                parameters: None,
            }),
            telemetry: Some(TelemetryConfig::default()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_collaborators_are_fatal() {
        let mut config = valid_config();
        config.status = None;
        assert!(matches!(validate_config(&config), Err(RelayError::Configuration(_))));

        let mut config = valid_config();
        config.telemetry = None;
        assert!(validate_config(&config).is_err());

        // Only required by the routes that use them
        let mut config = valid_config();
        config.subscriptions.retain(|s| s.handler == HandlerKind::Telemetry);
        config.status = None;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = valid_config();
        config.subscriptions.clear();
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.mqtt.broker_url = "mqtt://localhost:notaport".into();
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.mqtt.qos = 3;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.relay.default_identity.clear();
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.telemetry.as_mut().unwrap().alert_topic = "alerts/#".into();
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.telemetry.as_mut().unwrap().limit = f64::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_topic_filter_rules() {
        assert!(validate_topic_filter("commands/+").is_ok());
        assert!(validate_topic_filter("sensors/#").is_ok());
        assert!(validate_topic_filter("#").is_ok());
        assert!(validate_topic_filter("").is_err());
        assert!(validate_topic_filter("sensors/#/raw").is_err());
        assert!(validate_topic_filter("sensors/temp#").is_err());
        assert!(validate_topic_filter("commands/dev+").is_err());
    }
}
