use serde::Serialize;
use serde_json::Value;

use crate::meter::{ProbeInfo, Snapshot};

pub const MANUFACTURER: &str = "Cozify";
pub const MODEL: &str = "HAN Reader";
pub const DEFAULT_NAME: &str = "Cozify HAN";

/// Device block attached to every discovery payload. Compared between polls
/// so discovery is republished when the device reports new identity data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceIdentity {
    /// Always two entries. When the device reports no serial the MAC appears
    /// twice; registries that key on the pair rely on the fixed shape.
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    pub configuration_url: String,
}

/// Compose identity from the startup probe and the latest snapshot. The live
/// config document wins for the firmware version; the probe value is the
/// fallback for the window before the first successful refresh.
pub fn compose(
    probe: &ProbeInfo,
    snapshot: Option<&Snapshot>,
    instance_id: &str,
    host: &str,
) -> DeviceIdentity {
    let primary = probe.mac.clone().unwrap_or_else(|| instance_id.to_string());
    let secondary = probe.serial.clone().unwrap_or_else(|| primary.clone());

    let live_firmware = snapshot
        .and_then(|s| s.config.get("v"))
        .and_then(Value::as_str)
        .map(str::to_string);

    DeviceIdentity {
        identifiers: vec![primary, secondary],
        name: probe
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_NAME.to_string()),
        manufacturer: MANUFACTURER.to_string(),
        model: MODEL.to_string(),
        sw_version: live_firmware.or_else(|| probe.firmware.clone()),
        serial_number: probe.serial.clone(),
        configuration_url: format!("http://{}/events", host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn probe_full() -> ProbeInfo {
        ProbeInfo {
            mac: Some("AA:BB:CC:DD:EE:FF".to_string()),
            serial: Some("SN-001".to_string()),
            name: Some("Kitchen HAN".to_string()),
            firmware: Some("1.0.3".to_string()),
        }
    }

    #[test]
    fn test_identifiers_mac_then_serial() {
        let identity = compose(&probe_full(), None, "cozify_han", "192.168.1.50");
        assert_eq!(
            identity.identifiers,
            vec!["AA:BB:CC:DD:EE:FF".to_string(), "SN-001".to_string()]
        );
        assert_eq!(identity.serial_number.as_deref(), Some("SN-001"));
    }

    #[test]
    fn test_missing_serial_duplicates_mac() {
        let mut probe = probe_full();
        probe.serial = None;

        let identity = compose(&probe, None, "cozify_han", "192.168.1.50");
        assert_eq!(
            identity.identifiers,
            vec![
                "AA:BB:CC:DD:EE:FF".to_string(),
                "AA:BB:CC:DD:EE:FF".to_string()
            ]
        );
        assert_eq!(identity.serial_number, None);
    }

    #[test]
    fn test_missing_mac_falls_back_to_instance_id() {
        let identity = compose(&ProbeInfo::default(), None, "cozify_han", "192.168.1.50");
        assert_eq!(
            identity.identifiers,
            vec!["cozify_han".to_string(), "cozify_han".to_string()]
        );
        assert_eq!(identity.name, "Cozify HAN");
    }

    #[test]
    fn test_live_firmware_wins_over_probe() {
        let snapshot = Snapshot {
            realtime: json!({}),
            config: json!({"v": "2.0.0"}),
            status: json!({}),
        };
        let identity = compose(&probe_full(), Some(&snapshot), "cozify_han", "192.168.1.50");
        assert_eq!(identity.sw_version.as_deref(), Some("2.0.0"));
    }

    #[test]
    fn test_probe_firmware_used_before_first_refresh() {
        let identity = compose(&probe_full(), None, "cozify_han", "192.168.1.50");
        assert_eq!(identity.sw_version.as_deref(), Some("1.0.3"));
    }

    #[test]
    fn test_configuration_url_points_at_device() {
        let identity = compose(&probe_full(), None, "cozify_han", "192.168.1.50");
        assert_eq!(identity.configuration_url, "http://192.168.1.50/events");
    }
}
