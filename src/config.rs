use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Accepted polling interval range, in seconds. Values outside the range are
/// rejected at load time rather than clamped.
pub const MIN_POLL_INTERVAL_SECS: u64 = 5;
pub const MAX_POLL_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    pub mqtt: MqttConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Host (or host:port) of the HAN reader, without scheme.
    pub host: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Stable identifier used in MQTT topics and unique ids. Changing it
    /// re-creates every entity on the Home Assistant side.
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
}

fn default_poll_interval() -> u64 {
    10
}

fn default_instance_id() -> String {
    "cozify_han".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Defaults to "han-bridge-<pid>" when unset.
    pub client_id: Option<String>,
    pub keep_alive_secs: Option<u64>,
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
    #[serde(default = "default_base_topic")]
    pub base_topic: String,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_discovery_prefix() -> String {
    "homeassistant".into()
}

fn default_base_topic() -> String {
    "cozify_han".into()
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse
    /// and validate. HAN_HOST and MQTT_HOST env vars override whatever the
    /// YAML had.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let expanded = expand_env_placeholders(&raw)?;
        let mut cfg: Self = serde_yaml::from_str(&expanded)?;

        if let Ok(host) = std::env::var("HAN_HOST") {
            cfg.device.host = host;
        }
        if let Ok(host) = std::env::var("MQTT_HOST") {
            cfg.mqtt.host = host;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.device.host.is_empty() {
            return Err(AppError::Config("Device host cannot be empty".to_string()));
        }

        if !(MIN_POLL_INTERVAL_SECS..=MAX_POLL_INTERVAL_SECS)
            .contains(&self.device.poll_interval_secs)
        {
            return Err(AppError::Config(format!(
                "poll_interval_secs must be between {} and {}, got {}",
                MIN_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS, self.device.poll_interval_secs
            )));
        }

        if self.device.instance_id.is_empty() {
            return Err(AppError::Config("instance_id cannot be empty".to_string()));
        }

        if self.mqtt.host.is_empty() {
            return Err(AppError::Config("MQTT host cannot be empty".to_string()));
        }

        if self.mqtt.port == 0 {
            return Err(AppError::Config("MQTT port cannot be 0".to_string()));
        }

        Ok(())
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
/// "$$" becomes a literal "$" (escape); a bare "$" is kept as-is.
fn expand_env_placeholders(input: &str) -> Result<String> {
    use anyhow::Context;

    let mut out = String::with_capacity(input.len());
    let mut it = input.chars().peekable();

    while let Some(c) = it.next() {
        if c == '$' {
            match it.peek().copied() {
                Some('$') => {
                    it.next();
                    out.push('$');
                }
                Some('(') => {
                    it.next();
                    let var = read_until(&mut it, ')')
                        .context("unterminated env placeholder: missing ')'")?;
                    let val = std::env::var(&var)
                        .with_context(|| format!("missing environment variable: {}", var))?;
                    out.push_str(&val);
                }
                Some('{') => {
                    it.next();
                    let var = read_until(&mut it, '}')
                        .context("unterminated env placeholder: missing '}'")?;
                    let val = std::env::var(&var)
                        .with_context(|| format!("missing environment variable: {}", var))?;
                    out.push_str(&val);
                }
                _ => {
                    out.push('$');
                }
            }
        } else {
            out.push(c);
        }
    }

    Ok(out)
}

/// Read characters until `end`, returning the collected string.
/// Consumes the closing delimiter.
fn read_until<I>(it: &mut std::iter::Peekable<I>, end: char) -> Option<String>
where
    I: Iterator<Item = char>,
{
    let mut buf = String::new();
    for ch in it.by_ref() {
        if ch == end {
            return Some(buf);
        }
        buf.push(ch);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            device: DeviceConfig {
                host: "192.168.1.50".to_string(),
                poll_interval_secs: 10,
                instance_id: "cozify_han".to_string(),
            },
            mqtt: MqttConfig {
                host: "localhost".to_string(),
                port: 1883,
                username: None,
                password: None,
                client_id: None,
                keep_alive_secs: None,
                discovery_prefix: "homeassistant".to_string(),
                base_topic: "cozify_han".to_string(),
            },
        }
    }

    #[test]
    fn test_expand_env_placeholders() {
        std::env::set_var("HAN_TEST_VAR", "test_value");

        let output = expand_env_placeholders("secret: $(HAN_TEST_VAR)").unwrap();
        assert_eq!(output, "secret: test_value");

        let output = expand_env_placeholders("secret: ${HAN_TEST_VAR}").unwrap();
        assert_eq!(output, "secret: test_value");

        std::env::remove_var("HAN_TEST_VAR");
    }

    #[test]
    fn test_expand_escaped_dollar() {
        let output = expand_env_placeholders("price: $$0.25").unwrap();
        assert_eq!(output, "price: $0.25");
    }

    #[test]
    fn test_expand_missing_var_fails() {
        let result = expand_env_placeholders("secret: $(HAN_NONEXISTENT_VAR)");
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_applied() {
        let yaml = r#"
device:
  host: "192.168.1.50"
mqtt:
  host: "localhost"
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.device.poll_interval_secs, 10);
        assert_eq!(cfg.device.instance_id, "cozify_han");
        assert_eq!(cfg.mqtt.port, 1883);
        assert_eq!(cfg.mqtt.discovery_prefix, "homeassistant");
        assert_eq!(cfg.mqtt.base_topic, "cozify_han");
    }

    #[test]
    fn test_poll_interval_below_minimum_rejected() {
        let mut cfg = base_config();
        cfg.device.poll_interval_secs = 3;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_poll_interval_bounds_accepted() {
        let mut cfg = base_config();
        cfg.device.poll_interval_secs = MIN_POLL_INTERVAL_SECS;
        assert!(cfg.validate().is_ok());
        cfg.device.poll_interval_secs = MAX_POLL_INTERVAL_SECS;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_poll_interval_above_maximum_rejected() {
        let mut cfg = base_config();
        cfg.device.poll_interval_secs = 61;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_empty_device_host_rejected() {
        let mut cfg = base_config();
        cfg.device.host = String::new();
        assert!(cfg.validate().is_err());
    }
}
