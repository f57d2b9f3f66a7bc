use crate::config::MqttConfig;
use crate::core::message::QualityOfService;

use anyhow::Result;
use rumqttc::{MqttOptions, QoS};
use std::time::Duration;

impl MqttConfig {
    /// Parse broker URL into host and port
    pub fn parse_broker_url(&self) -> Result<(String, u16)> {
        let url = &self.broker_url;
        let clean_url = url.strip_prefix("mqtt://").unwrap_or(url);

        if let Some((host, port)) = clean_url.rsplit_once(':') {
            let port = port
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("Invalid port in broker URL: {}", url))?;
            Ok((host.to_string(), port))
        } else {
            Ok((clean_url.to_string(), 1883))
        }
    }

    /// QoS used when subscribing
    pub fn subscribe_qos(&self) -> QoS {
        match self.qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            _ => QoS::AtMostOnce,
        }
    }

    /// Create MqttOptions from the configuration
    pub fn create_mqtt_options(&self, default_client_prefix: &str) -> Result<MqttOptions> {
        let (host, port) = self.parse_broker_url()?;

        let client_id = self
            .client_id
            .clone()
            .unwrap_or_else(|| format!("{}_{}", default_client_prefix, uuid::Uuid::new_v4()));

        let mut mqttoptions = MqttOptions::new(&client_id, host, port);
        mqttoptions.set_clean_session(self.clean_session);
        mqttoptions.set_keep_alive(Duration::from_secs(self.keep_alive_secs));

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            mqttoptions.set_credentials(username, password);
        }

        Ok(mqttoptions)
    }
}

pub fn to_mqtt_qos(qos: QualityOfService) -> QoS {
    match qos {
        QualityOfService::AtMostOnce => QoS::AtMostOnce,
        QualityOfService::AtLeastOnce => QoS::AtLeastOnce,
    }
}
