//! Authenticated session context.
//!
//! A [`Session`] is created from an already-validated [`Identity`] and owns
//! everything that only makes sense while someone is logged in: the live
//! telemetry state, the poller that feeds it and the command dispatcher.
//! Logging out stops polling and discards all telemetry.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use iotwatch_types::Identity;
use serde::Serialize;
use tracing::info;

use crate::config::Settings;
use crate::data::{
    AlertEvaluator, AlertLevel, AlertState, DeviceSnapshot, MergeOutcome, SharedTelemetry,
    TelemetryState, DEFAULT_HISTORY_CAPACITY,
};
use crate::dispatch::{CommandDispatcher, CommandSink};
use crate::poller::{Poller, DEFAULT_POLL_INTERVAL};
use crate::source::TelemetrySource;

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub poll_interval: Duration,
    pub history_capacity: usize,
    pub alerts: AlertEvaluator,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            alerts: AlertEvaluator::default(),
        }
    }
}

impl From<&Settings> for SessionOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            poll_interval: Duration::from_millis(settings.polling.interval_ms),
            history_capacity: settings.history.capacity,
            alerts: AlertEvaluator::new(Duration::from_millis(settings.alerts.stale_after_ms)),
        }
    }
}

/// Current view of one device, ready for display or export.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub device: String,
    pub level: AlertLevel,
    pub alerts: AlertState,
    pub snapshot: DeviceSnapshot,
    pub history_len: usize,
}

/// The logged-in operator's session.
#[derive(Debug)]
pub struct Session {
    identity: Identity,
    telemetry: SharedTelemetry,
    poller: Poller,
    dispatcher: CommandDispatcher,
    alerts: AlertEvaluator,
    session_file: Option<SessionFile>,
}

impl Session {
    /// Begin a session for `identity`.
    pub fn login(
        identity: Identity,
        source: Arc<dyn TelemetrySource>,
        sink: Arc<dyn CommandSink>,
        options: SessionOptions,
    ) -> Self {
        let telemetry = TelemetryState::shared(options.history_capacity);
        let poller = Poller::new(telemetry.clone(), source, options.poll_interval);
        let dispatcher = CommandDispatcher::new(identity.clone(), sink);

        info!(username = %identity.username, role = %identity.role, "session started");
        Self {
            identity,
            telemetry,
            poller,
            dispatcher,
            alerts: options.alerts,
            session_file: None,
        }
    }

    /// Remember this identity across restarts until [`logout`](Self::logout).
    pub fn persist_to(mut self, file: SessionFile) -> Result<Self> {
        file.save(&self.identity)?;
        self.session_file = Some(file);
        Ok(self)
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Live state; read-only for everything but the poller.
    pub fn telemetry(&self) -> &SharedTelemetry {
        &self.telemetry
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn alerts(&self) -> &AlertEvaluator {
        &self.alerts
    }

    /// See [`Poller::start`].
    pub fn start_polling<F>(&mut self, on_tick: F) -> bool
    where
        F: FnMut(&TelemetryState, MergeOutcome) + Send + 'static,
    {
        self.poller.start(on_tick)
    }

    pub fn stop_polling(&mut self) -> bool {
        self.poller.stop()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    /// Every known device with its alert state as of `now_ms`.
    pub fn device_statuses(&self, now_ms: u64) -> Vec<DeviceStatus> {
        let state = self.telemetry.read();
        state
            .snapshots()
            .iter()
            .map(|(device, snapshot)| {
                let alerts = self.alerts.evaluate(snapshot, now_ms);
                DeviceStatus {
                    device: device.clone(),
                    level: alerts.level(),
                    alerts,
                    snapshot: snapshot.clone(),
                    history_len: state.history().series(device).map_or(0, |s| s.len()),
                }
            })
            .collect()
    }

    /// End the session: stop polling, drop telemetry, forget the identity.
    pub fn logout(mut self) -> Result<()> {
        self.poller.stop();
        self.telemetry.write().reset();
        if let Some(file) = self.session_file.take() {
            file.clear()?;
        }
        info!(username = %self.identity.username, "session ended");
        Ok(())
    }
}

/// Where the active identity is kept between runs.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The remembered identity, if any.
    pub fn load(&self) -> Result<Option<Identity>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let identity = serde_json::from_str(&content)
                    .with_context(|| format!("malformed session file {}", self.path.display()))?;
                Ok(Some(identity))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    pub fn save(&self, identity: &Identity) -> Result<()> {
        let json = serde_json::to_string_pretty(identity)?;
        fs::write(&self.path, json).with_context(|| format!("writing {}", self.path.display()))
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("removing {}", self.path.display()))
            }
            _ => Ok(()),
        }
    }
}
