//! Live telemetry state and the pure derivations over it.
//!
//! ## Submodules
//!
//! - [`snapshot`]: Typed per-device readings ([`DeviceSnapshot`]) and the
//!   current-value map ([`SnapshotStore`])
//! - [`history`]: Bounded per-device trend series ([`History`], [`HistorySeries`])
//! - [`alert`]: Staleness and threshold evaluation ([`AlertEvaluator`])
//! - [`telemetry`]: The sequenced merge that feeds both stores ([`TelemetryState`])
//!
//! ## Data Flow
//!
//! ```text
//! Frame (raw JSON, request seq N)
//!        │
//!        ▼
//! TelemetryState::merge(N, ..)   ── drops devices already merged at seq ≥ N
//!        │
//!        ├──▶ SnapshotStore::replace()   (DeviceSnapshot, stamped on receipt)
//!        │
//!        └──▶ History::append()          (time, temperature, gas)
//!
//! SnapshotStore ──▶ AlertEvaluator::evaluate() ──▶ AlertState (not stored)
//! ```

pub mod alert;
pub mod history;
pub mod snapshot;
pub mod telemetry;

pub use alert::{AlertEvaluator, AlertLevel, AlertState, DEFAULT_STALE_AFTER};
pub use history::{History, HistorySeries, Sample, DEFAULT_HISTORY_CAPACITY};
pub use snapshot::{DeviceSnapshot, SnapshotStore, SwitchState};
pub use telemetry::{MergeOutcome, SharedTelemetry, TelemetryState};
