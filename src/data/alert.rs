//! Staleness and threshold evaluation.
//!
//! Everything here is a pure function of a [`DeviceSnapshot`] and the
//! current time, so it can be called at any moment without touching state.

use std::time::Duration;

use serde::Serialize;

use super::snapshot::DeviceSnapshot;

/// A snapshot older than this is stale.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_millis(5000);

/// Presentation priority of a device, lowest first.
///
/// A gas breach dominates a temperature breach, and any breach dominates
/// staleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Normal,
    Stale,
    TemperatureBreach,
    GasBreach,
}

impl AlertLevel {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            AlertLevel::Normal => "OK",
            AlertLevel::Stale => "STALE",
            AlertLevel::TemperatureBreach => "TEMP",
            AlertLevel::GasBreach => "GAS",
        }
    }
}

/// Derived alert flags for one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AlertState {
    pub stale: bool,
    pub temp_alert: bool,
    pub gas_alert: bool,
}

impl AlertState {
    /// The single dominant signal to present.
    pub fn level(&self) -> AlertLevel {
        if self.gas_alert {
            AlertLevel::GasBreach
        } else if self.temp_alert {
            AlertLevel::TemperatureBreach
        } else if self.stale {
            AlertLevel::Stale
        } else {
            AlertLevel::Normal
        }
    }

    pub fn any_breach(&self) -> bool {
        self.temp_alert || self.gas_alert
    }
}

/// Evaluates snapshots against the freshness window and their own limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertEvaluator {
    stale_after: Duration,
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER)
    }
}

impl AlertEvaluator {
    pub fn new(stale_after: Duration) -> Self {
        Self { stale_after }
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Evaluate `snapshot` as of `now_ms` (Unix milliseconds).
    ///
    /// A snapshot stamped in the future counts as fresh.
    pub fn evaluate(&self, snapshot: &DeviceSnapshot, now_ms: u64) -> AlertState {
        let age_ms = now_ms.saturating_sub(snapshot.last_updated_ms);
        AlertState {
            stale: u128::from(age_ms) > self.stale_after.as_millis(),
            temp_alert: snapshot.temperature > snapshot.temp_threshold,
            gas_alert: snapshot.gas_level > snapshot.gas_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::snapshot::SwitchState;

    const NOW: u64 = 1_700_000_000_000;

    fn snapshot(temperature: f64, temp_th: f64, gas: f64, gas_th: f64, at: u64) -> DeviceSnapshot {
        DeviceSnapshot {
            temperature,
            humidity: 40.0,
            gas_level: gas,
            led: SwitchState::Off,
            fan: SwitchState::Off,
            temp_threshold: temp_th,
            gas_threshold: gas_th,
            device_time: None,
            last_updated_ms: at,
        }
    }

    #[test]
    fn test_temperature_breach_on_fresh_snapshot() {
        let evaluator = AlertEvaluator::default();
        let state = evaluator.evaluate(&snapshot(40.0, 35.0, 1.0, 5.0, NOW), NOW);

        assert_eq!(
            state,
            AlertState {
                stale: false,
                temp_alert: true,
                gas_alert: false
            }
        );
    }

    #[test]
    fn test_staleness_does_not_change_breach_flags() {
        let evaluator = AlertEvaluator::default();
        let state = evaluator.evaluate(&snapshot(40.0, 35.0, 1.0, 5.0, NOW - 6000), NOW);

        assert_eq!(
            state,
            AlertState {
                stale: true,
                temp_alert: true,
                gas_alert: false
            }
        );
    }

    #[test]
    fn test_stale_boundary_is_exclusive() {
        let evaluator = AlertEvaluator::default();
        let fresh = snapshot(20.0, 30.0, 0.5, 1.2, NOW - 5000);
        let stale = snapshot(20.0, 30.0, 0.5, 1.2, NOW - 5001);

        assert!(!evaluator.evaluate(&fresh, NOW).stale);
        assert!(evaluator.evaluate(&stale, NOW).stale);
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        let evaluator = AlertEvaluator::default();
        let state = evaluator.evaluate(&snapshot(20.0, 30.0, 0.5, 1.2, NOW + 10_000), NOW);
        assert!(!state.stale);
    }

    #[test]
    fn test_threshold_equal_is_not_a_breach() {
        let evaluator = AlertEvaluator::default();
        let state = evaluator.evaluate(&snapshot(30.0, 30.0, 1.2, 1.2, NOW), NOW);
        assert!(!state.any_breach());
    }

    #[test]
    fn test_level_precedence_for_every_combination() {
        for stale in [false, true] {
            for temp_alert in [false, true] {
                for gas_alert in [false, true] {
                    let state = AlertState {
                        stale,
                        temp_alert,
                        gas_alert,
                    };
                    let expected = match (gas_alert, temp_alert, stale) {
                        (true, _, _) => AlertLevel::GasBreach,
                        (false, true, _) => AlertLevel::TemperatureBreach,
                        (false, false, true) => AlertLevel::Stale,
                        (false, false, false) => AlertLevel::Normal,
                    };
                    assert_eq!(state.level(), expected, "{state:?}");
                }
            }
        }
    }

    #[test]
    fn test_levels_are_ordered_by_severity() {
        assert!(AlertLevel::GasBreach > AlertLevel::TemperatureBreach);
        assert!(AlertLevel::TemperatureBreach > AlertLevel::Stale);
        assert!(AlertLevel::Stale > AlertLevel::Normal);
    }

    #[test]
    fn test_custom_window() {
        let evaluator = AlertEvaluator::new(Duration::from_secs(1));
        let state = evaluator.evaluate(&snapshot(20.0, 30.0, 0.5, 1.2, NOW - 1500), NOW);
        assert!(state.stale);
    }
}
