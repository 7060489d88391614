//! Raw per-device readings as reported by the telemetry endpoint.

use std::collections::BTreeMap;

/// Temperature limit the backend assigns to a device nobody has configured.
pub const DEFAULT_TEMP_THRESHOLD: f64 = 30.0;

/// Gas limit (volts) the backend assigns to a device nobody has configured.
pub const DEFAULT_GAS_THRESHOLD: f64 = 1.20;

/// One telemetry response: device identifier to its latest reading.
pub type Frame = BTreeMap<String, Reading>;

/// A single device reading exactly as the backend reports it.
///
/// Every field is optional on the wire. Numeric fields that are missing or
/// not numbers decode as `None`; use the `*_or_zero` accessors when a value
/// is needed for history recording. Keys this type does not know about are
/// dropped at decode time.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    /// Temperature in °C.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            deserialize_with = "lenient::number",
            skip_serializing_if = "Option::is_none"
        )
    )]
    pub t: Option<f64>,

    /// Gas sensor analog output in volts.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            deserialize_with = "lenient::number",
            skip_serializing_if = "Option::is_none"
        )
    )]
    pub ao_v: Option<f64>,

    /// Relative humidity in percent.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            deserialize_with = "lenient::number",
            skip_serializing_if = "Option::is_none"
        )
    )]
    pub h: Option<f64>,

    /// LED state tag, e.g. `"ON"`.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            deserialize_with = "lenient::text",
            skip_serializing_if = "Option::is_none"
        )
    )]
    pub led: Option<String>,

    /// Fan state tag, e.g. `"AUTO"`.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            deserialize_with = "lenient::text",
            skip_serializing_if = "Option::is_none"
        )
    )]
    pub fan: Option<String>,

    /// Configured temperature alert limit.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            deserialize_with = "lenient::number",
            skip_serializing_if = "Option::is_none"
        )
    )]
    pub temp_th: Option<f64>,

    /// Configured gas alert limit.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            deserialize_with = "lenient::number",
            skip_serializing_if = "Option::is_none"
        )
    )]
    pub gas_th: Option<f64>,

    /// The device's own clock at sampling time (`HH:MM:SS`), if reported.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            deserialize_with = "lenient::text",
            skip_serializing_if = "Option::is_none"
        )
    )]
    pub time: Option<String>,
}

impl Reading {
    /// Create a builder for constructing readings.
    pub fn builder() -> ReadingBuilder {
        ReadingBuilder::default()
    }

    pub fn temperature_or_zero(&self) -> f64 {
        self.t.unwrap_or(0.0)
    }

    pub fn gas_or_zero(&self) -> f64 {
        self.ao_v.unwrap_or(0.0)
    }

    pub fn humidity_or_zero(&self) -> f64 {
        self.h.unwrap_or(0.0)
    }

    /// Temperature limit, falling back to [`DEFAULT_TEMP_THRESHOLD`].
    pub fn temp_threshold(&self) -> f64 {
        self.temp_th.unwrap_or(DEFAULT_TEMP_THRESHOLD)
    }

    /// Gas limit, falling back to [`DEFAULT_GAS_THRESHOLD`].
    pub fn gas_threshold(&self) -> f64 {
        self.gas_th.unwrap_or(DEFAULT_GAS_THRESHOLD)
    }
}

/// Builder for [`Reading`].
#[derive(Debug, Default)]
pub struct ReadingBuilder {
    reading: Reading,
}

impl ReadingBuilder {
    pub fn temperature(mut self, value: f64) -> Self {
        self.reading.t = Some(value);
        self
    }

    pub fn gas(mut self, value: f64) -> Self {
        self.reading.ao_v = Some(value);
        self
    }

    pub fn humidity(mut self, value: f64) -> Self {
        self.reading.h = Some(value);
        self
    }

    pub fn led(mut self, state: impl Into<String>) -> Self {
        self.reading.led = Some(state.into());
        self
    }

    pub fn fan(mut self, state: impl Into<String>) -> Self {
        self.reading.fan = Some(state.into());
        self
    }

    pub fn thresholds(mut self, temp_th: f64, gas_th: f64) -> Self {
        self.reading.temp_th = Some(temp_th);
        self.reading.gas_th = Some(gas_th);
        self
    }

    pub fn time(mut self, time: impl Into<String>) -> Self {
        self.reading.time = Some(time.into());
        self
    }

    pub fn build(self) -> Reading {
        self.reading
    }
}

/// Decoders that map loosely-typed backend values into `Option`s.
///
/// The backend parses sensor lines with best-effort number conversion, so a
/// field can arrive as a number, a numeric string, or leftover text.
#[cfg(feature = "serde")]
mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Number(f64),
        Text(String),
        Other(#[allow(dead_code)] serde::de::IgnoredAny),
    }

    pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Loose>::deserialize(deserializer)? {
            Some(Loose::Number(n)) if n.is_finite() => Some(n),
            Some(Loose::Text(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        })
    }

    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Loose>::deserialize(deserializer)? {
            Some(Loose::Text(s)) => Some(s),
            Some(Loose::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }
}
