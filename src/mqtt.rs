//! MQTT exposure: Home Assistant discovery announcements, retained state
//! publishing and availability marking.

use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, LastWill, MqttOptions, QoS, Transport};
use serde::Serialize;

use crate::config::{Config, MqttConfig};
use crate::error::{AppError, Result};
use crate::identity::DeviceIdentity;
use crate::measurement::{Descriptor, DeviceClass, StateClass};
use crate::projection::MeasurementValue;

pub const AVAILABLE: &str = "online";
pub const UNAVAILABLE: &str = "offline";

pub fn discovery_topic(prefix: &str, instance_id: &str, key: &str) -> String {
    format!("{}/sensor/{}/{}/config", prefix, instance_id, key)
}

pub fn state_topic(base_topic: &str, key: &str) -> String {
    format!("{}/{}/state", base_topic, key)
}

pub fn availability_topic(base_topic: &str) -> String {
    format!("{}/availability", base_topic)
}

pub fn build_options(cfg: &MqttConfig) -> MqttOptions {
    let client_id = cfg
        .client_id
        .clone()
        .unwrap_or_else(|| format!("han-bridge-{}", std::process::id()));

    let mut options = MqttOptions::new(client_id, &cfg.host, cfg.port);
    options.set_keep_alive(Duration::from_secs(cfg.keep_alive_secs.unwrap_or(30)));
    options.set_clean_session(true);
    if let (Some(u), Some(p)) = (&cfg.username, &cfg.password) {
        options.set_credentials(u.clone(), p.clone());
    }
    if cfg.port == 8883 {
        options.set_transport(Transport::tls_with_default_config());
    }
    // The broker marks us unavailable if the process dies mid-poll.
    options.set_last_will(LastWill::new(
        availability_topic(&cfg.base_topic),
        UNAVAILABLE,
        QoS::AtLeastOnce,
        true,
    ));
    options
}

pub fn connect(cfg: &MqttConfig) -> (AsyncClient, EventLoop) {
    AsyncClient::new(build_options(cfg), 10)
}

/// Discovery payload for one sensor, shaped the way Home Assistant's MQTT
/// integration expects it.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryConfig<'a> {
    pub name: String,
    pub unique_id: String,
    pub state_topic: String,
    pub availability_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_category: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'a str>,
    pub device: &'a DeviceIdentity,
}

pub fn discovery_config<'a>(
    descriptor: &'a Descriptor,
    identity: &'a DeviceIdentity,
    cfg: &Config,
) -> DiscoveryConfig<'a> {
    DiscoveryConfig {
        name: descriptor.display_name(),
        unique_id: format!("{}_{}", cfg.device.instance_id, descriptor.key),
        state_topic: state_topic(&cfg.mqtt.base_topic, &descriptor.key),
        availability_topic: availability_topic(&cfg.mqtt.base_topic),
        unit_of_measurement: descriptor.unit,
        device_class: descriptor.device_class.map(DeviceClass::as_str),
        state_class: descriptor.state_class.map(StateClass::as_str),
        entity_category: descriptor.diagnostic.then_some("diagnostic"),
        icon: descriptor.icon,
        device: identity,
    }
}

/// Publish a retained discovery config for every descriptor. Run at startup
/// and again whenever the device identity changes.
pub async fn announce(
    client: &AsyncClient,
    cfg: &Config,
    descriptors: &[Descriptor],
    identity: &DeviceIdentity,
) -> Result<()> {
    for descriptor in descriptors {
        let topic = discovery_topic(
            &cfg.mqtt.discovery_prefix,
            &cfg.device.instance_id,
            &descriptor.key,
        );
        let payload = serde_json::to_vec(&discovery_config(descriptor, identity, cfg))?;
        client
            .publish(topic, QoS::AtLeastOnce, true, payload)
            .await
            .map_err(|e| AppError::Mqtt(e.to_string()))?;
    }
    Ok(())
}

/// Publish one retained state message per descriptor. `values` lines up
/// index-for-index with `descriptors`.
pub async fn publish_states(
    client: &AsyncClient,
    cfg: &Config,
    descriptors: &[Descriptor],
    values: &[MeasurementValue],
) -> Result<()> {
    for (descriptor, value) in descriptors.iter().zip(values) {
        let topic = state_topic(&cfg.mqtt.base_topic, &descriptor.key);
        client
            .publish(topic, QoS::AtLeastOnce, true, state_payload(value))
            .await
            .map_err(|e| AppError::Mqtt(e.to_string()))?;
    }
    Ok(())
}

pub async fn publish_availability(client: &AsyncClient, cfg: &Config, online: bool) -> Result<()> {
    let payload = if online { AVAILABLE } else { UNAVAILABLE };
    client
        .publish(
            availability_topic(&cfg.mqtt.base_topic),
            QoS::AtLeastOnce,
            true,
            payload,
        )
        .await
        .map_err(|e| AppError::Mqtt(e.to_string()))
}

/// Wire rendering of one value. The literal "None" resets the Home Assistant
/// entity to unknown.
pub fn state_payload(value: &MeasurementValue) -> String {
    match value {
        MeasurementValue::F64(v) => format!("{}", v),
        MeasurementValue::Bool(b) => b.to_string(),
        MeasurementValue::Text(s) => s.clone(),
        MeasurementValue::Timestamp(ts) => ts.to_rfc3339(),
        MeasurementValue::Unknown => "None".to_string(),
    }
}
