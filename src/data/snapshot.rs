//! Typed device snapshots and the current-value store.
//!
//! Raw [`Reading`]s are mapped into [`DeviceSnapshot`]s at the boundary so
//! nothing downstream has to deal with missing or loosely-typed fields.

use std::collections::BTreeMap;
use std::fmt;

use iotwatch_types::Reading;
use serde::Serialize;

/// State tag reported by a device for an actuator (LED, fan).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SwitchState {
    On,
    #[default]
    Off,
    Auto,
    /// A tag this client does not know, kept verbatim for display.
    Other(String),
}

impl SwitchState {
    /// Map a device tag. Missing tags read as `Off`; the backend appends
    /// `(MANUAL)` to overridden states, which is ignored here.
    pub fn from_tag(tag: Option<&str>) -> Self {
        let Some(tag) = tag else {
            return SwitchState::Off;
        };
        let cleaned = tag.replace("(MANUAL)", "");
        match cleaned.trim().to_ascii_uppercase().as_str() {
            "ON" | "1" => SwitchState::On,
            "OFF" | "0" | "" => SwitchState::Off,
            "AUTO" => SwitchState::Auto,
            _ => SwitchState::Other(tag.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SwitchState::On => "ON",
            SwitchState::Off => "OFF",
            SwitchState::Auto => "AUTO",
            SwitchState::Other(tag) => tag,
        }
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SwitchState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The most recent known reading of one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub temperature: f64,
    pub humidity: f64,
    pub gas_level: f64,
    pub led: SwitchState,
    pub fan: SwitchState,
    pub temp_threshold: f64,
    pub gas_threshold: f64,
    /// Device clock at sampling time, display only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_time: Option<String>,
    /// Unix milliseconds at which this client received the reading.
    pub last_updated_ms: u64,
}

impl DeviceSnapshot {
    /// Build a snapshot from a raw reading received at `received_at_ms`.
    pub fn from_reading(reading: &Reading, received_at_ms: u64) -> Self {
        Self {
            temperature: reading.temperature_or_zero(),
            humidity: reading.humidity_or_zero(),
            gas_level: reading.gas_or_zero(),
            led: SwitchState::from_tag(reading.led.as_deref()),
            fan: SwitchState::from_tag(reading.fan.as_deref()),
            temp_threshold: reading.temp_threshold(),
            gas_threshold: reading.gas_threshold(),
            device_time: reading.time.clone(),
            last_updated_ms: received_at_ms,
        }
    }
}

/// Latest snapshot per device. Devices register implicitly on first sight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotStore {
    devices: BTreeMap<String, DeviceSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the snapshot for `device`.
    pub fn replace(&mut self, device: &str, snapshot: DeviceSnapshot) {
        match self.devices.get_mut(device) {
            Some(existing) => *existing = snapshot,
            None => {
                self.devices.insert(device.to_string(), snapshot);
            }
        }
    }

    pub fn get(&self, device: &str) -> Option<&DeviceSnapshot> {
        self.devices.get(device)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DeviceSnapshot)> {
        self.devices.iter()
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }
}
