//! Static definitions of every measurement the bridge exposes, and the
//! lookup rule each one uses against the latest snapshot.

use crate::meter::ProbeInfo;

/// Home Assistant device class, where one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Energy,
    Power,
    Voltage,
    Current,
    Timestamp,
}

impl DeviceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Energy => "energy",
            DeviceClass::Power => "power",
            DeviceClass::Voltage => "voltage",
            DeviceClass::Current => "current",
            DeviceClass::Timestamp => "timestamp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    Measurement,
    TotalIncreasing,
}

impl StateClass {
    pub fn as_str(self) -> &'static str {
        match self {
            StateClass::Measurement => "measurement",
            StateClass::TotalIncreasing => "total_increasing",
        }
    }
}

/// Which snapshot document a nested lookup starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Doc {
    Config,
    Status,
}

/// Target type for a nested lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cast {
    Float,
    Bool,
    Text,
}

/// Channel tracked by a daily running maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxChannel {
    PhaseCurrent(usize),
    TotalPower,
}

/// How a measurement derives its value from the snapshot.
///
/// Array lookups degrade to 0.0 when the element is missing; every other
/// lookup degrades to unknown. Keeping that asymmetry is deliberate: phase
/// arrays shrink on single-phase installs, while a missing scalar means the
/// reading genuinely is not there.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Numeric scalar straight out of the realtime document.
    DirectScalar { key: &'static str },
    /// One element of a numeric array in the realtime document.
    ArrayIndexed { key: &'static str, index: usize },
    /// Walk a fixed path into the config or status document.
    NestedPath {
        doc: Doc,
        path: &'static [&'static str],
        cast: Cast,
    },
    /// Status flag rendered as "Online"/"Offline".
    OnlineFlag { key: &'static str },
    /// Unix epoch seconds in the realtime document, rendered as UTC.
    EpochTimestamp { key: &'static str },
    /// Running per-day maximum over one channel.
    DailyMaximum { channel: MaxChannel },
    /// Constant captured at startup (probe fields, configured host).
    Fixed { value: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    /// Short key used in unique ids and MQTT topics.
    pub key: String,
    pub name: &'static str,
    pub unit: Option<&'static str>,
    pub device_class: Option<DeviceClass>,
    pub state_class: Option<StateClass>,
    pub icon: Option<&'static str>,
    pub diagnostic: bool,
    pub rule: Rule,
}

impl Descriptor {
    /// Display name as shown in Home Assistant.
    pub fn display_name(&self) -> String {
        format!("Cozify HAN {}", self.name)
    }
}

fn energy(key: &'static str, name: &'static str) -> Descriptor {
    Descriptor {
        key: key.to_string(),
        name,
        unit: Some("kWh"),
        device_class: Some(DeviceClass::Energy),
        state_class: Some(StateClass::TotalIncreasing),
        icon: None,
        diagnostic: false,
        rule: Rule::DirectScalar { key },
    }
}

fn phase(key: &'static str, index: usize, name: &'static str, unit: &'static str) -> Descriptor {
    let device_class = match unit {
        "W" => Some(DeviceClass::Power),
        "V" => Some(DeviceClass::Voltage),
        "A" => Some(DeviceClass::Current),
        _ => None,
    };
    Descriptor {
        key: format!("{}_{}", key, index),
        name,
        unit: Some(unit),
        device_class,
        state_class: Some(StateClass::Measurement),
        icon: None,
        diagnostic: false,
        rule: Rule::ArrayIndexed { key, index },
    }
}

fn max_current(index: usize, name: &'static str) -> Descriptor {
    Descriptor {
        key: format!("max_i_{}", index),
        name,
        unit: Some("A"),
        device_class: Some(DeviceClass::Current),
        state_class: Some(StateClass::Measurement),
        icon: None,
        diagnostic: false,
        rule: Rule::DailyMaximum {
            channel: MaxChannel::PhaseCurrent(index),
        },
    }
}

fn conf(
    key: &str,
    name: &'static str,
    unit: Option<&'static str>,
    icon: &'static str,
    rule: Rule,
) -> Descriptor {
    Descriptor {
        key: format!("conf_{}", key),
        name,
        unit,
        device_class: None,
        state_class: None,
        icon: Some(icon),
        diagnostic: true,
        rule,
    }
}

fn fixed(key: &'static str, name: &'static str, value: Option<String>) -> Descriptor {
    Descriptor {
        key: key.to_string(),
        name,
        unit: None,
        device_class: None,
        state_class: None,
        icon: None,
        diagnostic: true,
        rule: Rule::Fixed { value },
    }
}

/// Build the full measurement table for one device. Identity-derived rows
/// (MAC, serial, IP) freeze whatever the startup probe returned.
pub fn descriptor_table(probe: &ProbeInfo, host: &str) -> Vec<Descriptor> {
    let config = Doc::Config;
    let status = Doc::Status;

    vec![
        // Cumulative energy registers (kWh)
        energy("ic", "Total Power Imported"),
        energy("ec", "Total Power Exported"),
        // Active power (W)
        phase("p", 0, "Power Total", "W"),
        phase("p", 1, "Power L1", "W"),
        phase("p", 2, "Power L2", "W"),
        phase("p", 3, "Power L3", "W"),
        // Voltage (V)
        phase("u", 0, "Voltage L1", "V"),
        phase("u", 1, "Voltage L2", "V"),
        phase("u", 2, "Voltage L3", "V"),
        // Current (A)
        phase("i", 0, "Current L1", "A"),
        phase("i", 1, "Current L2", "A"),
        phase("i", 2, "Current L3", "A"),
        // Reactive power (var)
        phase("r", 0, "Reactive Power Total", "var"),
        phase("r", 1, "Reactive Power L1", "var"),
        phase("r", 2, "Reactive Power L2", "var"),
        phase("r", 3, "Reactive Power L3", "var"),
        // Configuration and link diagnostics
        conf(
            "v",
            "Firmware Version",
            None,
            "mdi:git",
            Rule::NestedPath {
                doc: config,
                path: &["v"],
                cast: Cast::Text,
            },
        ),
        conf(
            "price",
            "Fixed Electricity Price",
            Some("c/kWh"),
            "mdi:cash",
            Rule::NestedPath {
                doc: config,
                path: &["p"],
                cast: Cast::Float,
            },
        ),
        conf(
            "timezone",
            "Timezone",
            None,
            "mdi:clock-outline",
            Rule::NestedPath {
                doc: config,
                path: &["t"],
                cast: Cast::Text,
            },
        ),
        conf(
            "online",
            "Cloud Connection",
            None,
            "mdi:cloud-check",
            Rule::OnlineFlag { key: "online" },
        ),
        conf(
            "fuse",
            "Main Fuse Size",
            Some("A"),
            "mdi:fuse",
            Rule::NestedPath {
                doc: config,
                path: &["m", "f"],
                cast: Cast::Text,
            },
        ),
        conf(
            "eth_active",
            "Ethernet Active",
            None,
            "mdi:lan",
            Rule::NestedPath {
                doc: config,
                path: &["e", "e"],
                cast: Cast::Bool,
            },
        ),
        conf(
            "eth_mode",
            "Ethernet Mode",
            None,
            "mdi:lan-check",
            Rule::NestedPath {
                doc: config,
                path: &["e", "n", "m"],
                cast: Cast::Text,
            },
        ),
        conf(
            "wifi_active",
            "WiFi Active",
            None,
            "mdi:wifi",
            Rule::NestedPath {
                doc: config,
                path: &["w", "e"],
                cast: Cast::Bool,
            },
        ),
        conf(
            "wifi_ssid",
            "WiFi SSID",
            None,
            "mdi:wifi-settings",
            Rule::NestedPath {
                doc: config,
                path: &["w", "s"],
                cast: Cast::Text,
            },
        ),
        conf(
            "wifi_mode",
            "WiFi Mode",
            None,
            "mdi:wifi-cog",
            Rule::NestedPath {
                doc: config,
                path: &["w", "n", "m"],
                cast: Cast::Text,
            },
        ),
        conf(
            "wifi_channel",
            "WiFi Channel",
            None,
            "mdi:wifi-star",
            Rule::NestedPath {
                doc: config,
                path: &["w", "z"],
                cast: Cast::Text,
            },
        ),
        conf(
            "wifi_beacon",
            "WiFi Beacon Active",
            None,
            "mdi:broadcast",
            Rule::NestedPath {
                doc: config,
                path: &["w", "b"],
                cast: Cast::Bool,
            },
        ),
        conf(
            "channel",
            "Update Channel",
            None,
            "mdi:package-variant",
            Rule::NestedPath {
                doc: status,
                path: &["channel"],
                cast: Cast::Text,
            },
        ),
        conf(
            "wifiIp",
            "WiFi IP Address",
            None,
            "mdi:wifi",
            Rule::NestedPath {
                doc: status,
                path: &["wifiIp"],
                cast: Cast::Text,
            },
        ),
        conf(
            "ethIp",
            "Ethernet IP Address",
            None,
            "mdi:lan",
            Rule::NestedPath {
                doc: status,
                path: &["ethIp"],
                cast: Cast::Text,
            },
        ),
        // Computed daily maxima
        max_current(0, "Current Max L1"),
        max_current(1, "Current Max L2"),
        max_current(2, "Current Max L3"),
        Descriptor {
            key: "peak_p".to_string(),
            name: "Power MAX",
            unit: Some("W"),
            device_class: Some(DeviceClass::Power),
            state_class: Some(StateClass::Measurement),
            icon: None,
            diagnostic: false,
            rule: Rule::DailyMaximum {
                channel: MaxChannel::TotalPower,
            },
        },
        // System info
        Descriptor {
            key: "ts".to_string(),
            name: "Last Update",
            unit: None,
            device_class: Some(DeviceClass::Timestamp),
            state_class: None,
            icon: None,
            diagnostic: true,
            rule: Rule::EpochTimestamp { key: "ts" },
        },
        fixed("mac_address", "MAC Address", probe.mac.clone()),
        fixed("serial_number", "Serial Number", probe.serial.clone()),
        fixed("ip_address", "IP Address", Some(host.to_string())),
    ]
}
