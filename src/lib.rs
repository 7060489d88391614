//! # iotwatch
//!
//! Client core for an IoT sensor dashboard: keeps a live, correctly ordered
//! view of every device's latest reading, a bounded history for trends, and
//! derived alert states, while gating device commands and user management
//! behind an authenticated session.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Session                            │
//! │  ┌─────────┐   seq   ┌───────────────┐   read  ┌───────────┐ │
//! │  │ poller  │────────▶│     data      │────────▶│   alert   │ │
//! │  │ (timer) │  merge  │ snapshots +   │         │ evaluator │ │
//! │  └────┬────┘         │ history       │         └───────────┘ │
//! │       │              └───────────────┘                       │
//! │       ▼                                                      │
//! │  ┌─────────┐                              ┌────────────────┐ │
//! │  │ source  │◀── HttpSource | FileSource   │    dispatch    │ │
//! │  │ (input) │    | ChannelSource           │ (admin only)   │ │
//! │  └─────────┘                              └────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//!        credentials ──▶ Identity ──▶ Session::login
//! ```
//!
//! - **[`source`]**: the [`TelemetrySource`] trait with implementations for
//!   the REST backend, a JSON file and an in-process channel
//! - **[`poller`]**: fixed-interval fetches with request-order merging
//! - **[`data`]**: latest snapshot per device, bounded history and alert
//!   evaluation
//! - **[`dispatch`]**: fire-and-forget LED/fan commands and limit updates
//! - **[`credentials`]**: persisted user store with guarded deletion
//! - **[`session`]**: ties an [`Identity`] to the above for its lifetime
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use iotwatch::{ChannelSource, Identity, Role, Session, SessionOptions};
//! # use iotwatch::{CommandSink, SourceError};
//! # use iotwatch_types::{CommandRequest, LimitsRequest};
//! # #[derive(Debug)]
//! # struct Discard;
//! # #[async_trait::async_trait]
//! # impl CommandSink for Discard {
//! #     async fn send_command(&self, _: &CommandRequest) -> Result<(), SourceError> { Ok(()) }
//! #     async fn set_limits(&self, _: &LimitsRequest) -> Result<(), SourceError> { Ok(()) }
//! # }
//!
//! # tokio_test::block_on(async {
//! let (tx, source) = ChannelSource::create("example");
//! let mut session = Session::login(
//!     Identity::new("alice", Role::Admin),
//!     Arc::new(source),
//!     Arc::new(Discard),
//!     SessionOptions::default(),
//! );
//!
//! session.start_polling(|state, _outcome| {
//!     for (device, snapshot) in state.snapshots().iter() {
//!         println!("{device}: {:.1}°C", snapshot.temperature);
//!     }
//! });
//! # drop(tx);
//! session.logout().unwrap();
//! # });
//! ```

pub mod config;
pub mod credentials;
pub mod data;
pub mod dispatch;
pub mod poller;
pub mod session;
pub mod source;

// Re-export main types for convenience
pub use config::Settings;
pub use credentials::{CredentialError, CredentialRecord, CredentialStore, DeleteCheck};
pub use data::{
    AlertEvaluator, AlertLevel, AlertState, DeviceSnapshot, History, HistorySeries, MergeOutcome,
    SharedTelemetry, SnapshotStore, TelemetryState,
};
pub use dispatch::{CommandDispatcher, CommandSink, Dispatch};
pub use iotwatch_types::{DeviceAction, Frame, Identity, Reading, Role};
pub use poller::Poller;
pub use session::{DeviceStatus, Session, SessionFile, SessionOptions};
pub use source::{ChannelSource, FileSource, HttpSource, SourceError, TelemetrySource};
