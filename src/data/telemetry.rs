//! Sequenced merge of telemetry frames into the live stores.
//!
//! Every fetch issued by the poller carries a request sequence number. A
//! device's snapshot and history only accept data from a request newer than
//! the last one merged for that device, so a slow response can never
//! overwrite state produced by a request issued after it.

use std::collections::BTreeMap;
use std::sync::Arc;

use iotwatch_types::Frame;
use parking_lot::RwLock;
use tracing::debug;

use super::history::{History, Sample};
use super::snapshot::{DeviceSnapshot, SnapshotStore};

/// Telemetry state shared between the poller task and readers.
pub type SharedTelemetry = Arc<RwLock<TelemetryState>>;

/// Result of merging one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The frame was accepted. `superseded` devices were skipped because a
    /// newer request had already been merged for them.
    Applied { updated: usize, superseded: usize },
    /// Every device in the frame was already covered by a newer request.
    Superseded { superseded: usize },
    /// Polling has stopped; nothing was written.
    Inactive,
}

impl MergeOutcome {
    /// Whether this merge produced a state change worth re-rendering.
    pub fn is_applied(&self) -> bool {
        matches!(self, MergeOutcome::Applied { .. })
    }
}

/// Live snapshots and history for the current session.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryState {
    snapshots: SnapshotStore,
    history: History,
    /// Highest request sequence merged per device.
    merged_seq: BTreeMap<String, u64>,
    active: bool,
    revision: u64,
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self::new(super::DEFAULT_HISTORY_CAPACITY)
    }
}

impl TelemetryState {
    /// Create an empty, inactive state.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            snapshots: SnapshotStore::new(),
            history: History::with_capacity(history_capacity),
            merged_seq: BTreeMap::new(),
            active: false,
            revision: 0,
        }
    }

    /// Wrap a new state for sharing with a poller.
    pub fn shared(history_capacity: usize) -> SharedTelemetry {
        Arc::new(RwLock::new(Self::new(history_capacity)))
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of applied merges; bumps once per render-eligible update.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Merge the response to request `seq`, received at `received_at_ms`.
    pub fn merge(&mut self, seq: u64, frame: &Frame, received_at_ms: u64) -> MergeOutcome {
        if !self.active {
            return MergeOutcome::Inactive;
        }

        let mut updated = 0;
        let mut superseded = 0;

        for (device, reading) in frame {
            if self.merged_seq.get(device).is_some_and(|&last| last >= seq) {
                superseded += 1;
                continue;
            }

            let snapshot = DeviceSnapshot::from_reading(reading, received_at_ms);
            self.history.append(
                device,
                Sample {
                    time_ms: received_at_ms,
                    temperature: snapshot.temperature,
                    gas_level: snapshot.gas_level,
                },
            );
            self.snapshots.replace(device, snapshot);
            self.merged_seq.insert(device.clone(), seq);
            updated += 1;
        }

        if updated == 0 && superseded > 0 {
            debug!(seq, superseded, "discarding superseded telemetry response");
            return MergeOutcome::Superseded { superseded };
        }

        self.revision += 1;
        MergeOutcome::Applied {
            updated,
            superseded,
        }
    }

    /// Drop every snapshot and series and stop accepting merges.
    pub fn reset(&mut self) {
        self.snapshots.clear();
        self.history.clear();
        self.merged_seq.clear();
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iotwatch_types::Reading;

    fn frame(devices: &[(&str, f64)]) -> Frame {
        devices
            .iter()
            .map(|(name, t)| (name.to_string(), Reading::builder().temperature(*t).gas(0.5).build()))
            .collect()
    }

    fn active_state() -> TelemetryState {
        let mut state = TelemetryState::default();
        state.set_active(true);
        state
    }

    #[test]
    fn test_merge_registers_devices_and_records_history() {
        let mut state = active_state();
        let outcome = state.merge(1, &frame(&[("a", 20.0), ("b", 30.0)]), 1_000);

        assert_eq!(
            outcome,
            MergeOutcome::Applied {
                updated: 2,
                superseded: 0
            }
        );
        assert_eq!(state.snapshots().len(), 2);
        assert_eq!(state.snapshots().get("a").unwrap().last_updated_ms, 1_000);
        assert_eq!(state.history().series("b").unwrap().latest().unwrap().temperature, 30.0);
        assert_eq!(state.revision(), 1);
    }

    #[test]
    fn test_out_of_order_response_is_discarded() {
        let mut state = active_state();

        // Request 2 completes first, then the slower request 1 arrives.
        state.merge(2, &frame(&[("a", 22.0)]), 2_000);
        let outcome = state.merge(1, &frame(&[("a", 11.0)]), 2_100);

        assert_eq!(outcome, MergeOutcome::Superseded { superseded: 1 });
        assert_eq!(state.snapshots().get("a").unwrap().temperature, 22.0);
        assert_eq!(state.history().series("a").unwrap().len(), 1);
        assert_eq!(state.revision(), 1);
    }

    #[test]
    fn test_ordering_is_per_device() {
        let mut state = active_state();
        state.merge(2, &frame(&[("a", 22.0)]), 2_000);

        // Request 1 is stale for "a" but is the first word on "b".
        let outcome = state.merge(1, &frame(&[("a", 11.0), ("b", 5.0)]), 2_100);

        assert_eq!(
            outcome,
            MergeOutcome::Applied {
                updated: 1,
                superseded: 1
            }
        );
        assert_eq!(state.snapshots().get("a").unwrap().temperature, 22.0);
        assert_eq!(state.snapshots().get("b").unwrap().temperature, 5.0);
    }

    #[test]
    fn test_devices_absent_from_a_frame_are_kept() {
        let mut state = active_state();
        state.merge(1, &frame(&[("a", 20.0), ("b", 30.0)]), 1_000);
        state.merge(2, &frame(&[("a", 21.0)]), 2_000);

        assert_eq!(state.snapshots().len(), 2);
        assert_eq!(state.snapshots().get("b").unwrap().last_updated_ms, 1_000);
    }

    #[test]
    fn test_inactive_state_ignores_merges() {
        let mut state = TelemetryState::default();
        let before = state.clone();

        assert_eq!(state.merge(1, &frame(&[("a", 20.0)]), 1_000), MergeOutcome::Inactive);
        assert_eq!(state, before);
    }

    #[test]
    fn test_reset_discards_everything() {
        let mut state = active_state();
        state.merge(1, &frame(&[("a", 20.0)]), 1_000);
        state.reset();

        assert!(state.snapshots().is_empty());
        assert!(state.history().series("a").is_none());
        assert!(!state.is_active());
        assert_eq!(state.merge(2, &frame(&[("a", 20.0)]), 2_000), MergeOutcome::Inactive);
    }

    #[test]
    fn test_history_bounded_across_many_merges() {
        let mut state = TelemetryState::new(500);
        state.set_active(true);

        for seq in 1..=650u64 {
            state.merge(seq, &frame(&[("a", seq as f64)]), seq * 1_000);
            let series = state.history().series("a").unwrap();
            assert!(series.len() <= 500);
            assert_eq!(series.time().len(), series.temperature().len());
            assert_eq!(series.temperature().len(), series.gas_level().len());
        }

        let series = state.history().series("a").unwrap();
        assert_eq!(series.len(), 500);
        assert_eq!(series.get(0).unwrap().temperature, 151.0);
    }
}
