use super::types::{Config, HandlerKind, Subscription, TelemetryConfig};

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::Path;

/// Load configuration from a TOML file, then apply environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;

    let mut config = load_config_from_string(&content)
        .with_context(|| format!("failed to parse config file '{}'", path.display()))?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Load configuration from a string
pub fn load_config_from_string(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    Ok(config)
}

/// Overrides selected settings from environment variables.
///
/// - `RELAY_BROKER_URL`
/// - `RELAY_DEFAULT_IDENTITY`
/// - `RELAY_ALERT_TOPIC` (creates a default `[telemetry]` section if absent)
/// - `RELAY_SUBSCRIPTIONS`, a comma separated `topic=handler` list that
///   replaces the configured subscriptions
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("RELAY_BROKER_URL") {
        tracing::info!("Broker URL overridden from environment");
        config.mqtt.broker_url = url;
    }

    if let Some(identity) = lookup("RELAY_DEFAULT_IDENTITY") {
        config.relay.default_identity = identity;
    }

    if let Some(topic) = lookup("RELAY_ALERT_TOPIC") {
        config
            .telemetry
            .get_or_insert_with(TelemetryConfig::default)
            .alert_topic = topic;
    }

    if let Some(list) = lookup("RELAY_SUBSCRIPTIONS") {
        config.subscriptions = parse_subscriptions(&list)?;
    }

    Ok(())
}

/// Parses `topic=handler[,topic=handler...]`.
pub fn parse_subscriptions(list: &str) -> Result<Vec<Subscription>> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (topic, handler) = entry
                .rsplit_once('=')
                .ok_or_else(|| anyhow!("subscription '{entry}' is not in topic=handler form"))?;
            let handler = HandlerKind::from_str(handler.trim())
                .ok_or_else(|| anyhow!("subscription '{entry}' names unknown handler '{handler}'"))?;
            Ok(Subscription::new(topic.trim(), handler))
        })
        .collect()
}
