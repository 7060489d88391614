//! Periodic telemetry polling.
//!
//! The poller issues one fetch per interval on a background task and feeds
//! each successful response through [`TelemetryState::merge`] tagged with
//! the request's sequence number. Fetches may overlap when the backend is
//! slower than the interval; the sequence check makes sure responses take
//! effect in request order regardless of arrival order.
//!
//! ```text
//!   interval tick ──▶ seq += 1 ──▶ spawn fetch(seq) ─┐
//!                                                    │ (any order)
//!   merge(seq, frame) ◀── join_next ◀────────────────┘
//!         │
//!         └──▶ on_tick(&state, outcome)   only when applied
//! ```
//!
//! At most [`MAX_IN_FLIGHT`] fetches are outstanding; a backend that stops
//! answering costs skipped ticks, not an ever-growing set of open requests.
//! Sequence numbers keep increasing across stop/start.
//!
//! Stopping cancels the timer, aborts every outstanding fetch and marks the
//! state inactive, so a response that still lands is a no-op.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use iotwatch_types::{current_timestamp_ms, Frame};
use parking_lot::RwLockWriteGuard;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::data::{MergeOutcome, SharedTelemetry, TelemetryState};
use crate::source::{SourceError, TelemetrySource};

/// Default fetch interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Fetches allowed to be outstanding at once. Ticks beyond this are skipped
/// until one settles.
pub const MAX_IN_FLIGHT: usize = 4;

/// Drives fetch/merge cycles for one authenticated session.
///
/// Only a [`Session`](crate::Session) constructs a poller, so polling can
/// never run without an identity. Dropping the poller stops it.
#[derive(Debug)]
pub struct Poller {
    state: SharedTelemetry,
    source: Arc<dyn TelemetrySource>,
    interval: Duration,
    /// Last request sequence issued. Outlives individual runs so a restart
    /// keeps numbering above what the state has already merged.
    last_seq: Arc<AtomicU64>,
    running: Option<PollerHandle>,
}

/// Owns the background task; stopping happens on drop.
#[derive(Debug)]
struct PollerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
        self.task.abort();
    }
}

impl Poller {
    pub(crate) fn new(
        state: SharedTelemetry,
        source: Arc<dyn TelemetrySource>,
        interval: Duration,
    ) -> Self {
        Self {
            state,
            source,
            // tokio intervals cannot be zero
            interval: interval.max(MIN_POLL_INTERVAL),
            last_seq: Arc::new(AtomicU64::new(0)),
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling. Returns `false` (and does nothing) if already running.
    ///
    /// `on_tick` runs on the poller task after every applied merge, with a
    /// read lock on the state held. It must not try to write the state.
    /// Requires a tokio runtime.
    pub fn start<F>(&mut self, on_tick: F) -> bool
    where
        F: FnMut(&TelemetryState, MergeOutcome) + Send + 'static,
    {
        if self.running.is_some() {
            return false;
        }

        self.state.write().set_active(true);

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(poll_loop(
            self.state.clone(),
            self.source.clone(),
            self.interval,
            self.last_seq.clone(),
            stop_rx,
            on_tick,
        ));

        info!(
            source = self.source.description(),
            interval_ms = self.interval.as_millis() as u64,
            "telemetry polling started"
        );
        self.running = Some(PollerHandle { stop_tx, task });
        true
    }

    /// Stop polling. Idempotent; returns whether the poller was running.
    pub fn stop(&mut self) -> bool {
        let Some(handle) = self.running.take() else {
            return false;
        };

        self.state.write().set_active(false);
        drop(handle);
        info!(source = self.source.description(), "telemetry polling stopped");
        true
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop<F>(
    state: SharedTelemetry,
    source: Arc<dyn TelemetrySource>,
    interval: Duration,
    last_seq: Arc<AtomicU64>,
    mut stop_rx: watch::Receiver<bool>,
    mut on_tick: F,
) where
    F: FnMut(&TelemetryState, MergeOutcome) + Send + 'static,
{
    let mut timer = tokio::time::interval(interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Outstanding fetches; dropped (and aborted) with this task.
    let mut in_flight: JoinSet<(u64, Result<Frame, SourceError>)> = JoinSet::new();

    loop {
        tokio::select! {
            _ = timer.tick() => {
                if in_flight.len() >= MAX_IN_FLIGHT {
                    debug!(in_flight = in_flight.len(), "backend slow; skipping tick");
                    continue;
                }
                let seq = last_seq.fetch_add(1, Ordering::Relaxed) + 1;
                let source = source.clone();
                in_flight.spawn(async move { (seq, source.fetch().await) });
            }
            Some(joined) = in_flight.join_next() => {
                let Ok((seq, result)) = joined else {
                    // Fetch task panicked or was cancelled; treat as a failed tick.
                    continue;
                };
                match result {
                    Ok(frame) => {
                        let mut guard = state.write();
                        let outcome = guard.merge(seq, &frame, current_timestamp_ms());
                        if outcome.is_applied() {
                            let guard = RwLockWriteGuard::downgrade(guard);
                            on_tick(&*guard, outcome);
                        } else {
                            debug!(seq, ?outcome, "telemetry response not merged");
                        }
                    }
                    Err(e) => {
                        debug!(seq, error = %e, "telemetry fetch failed; skipping tick");
                    }
                }
            }
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use iotwatch_types::Reading;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Answers each fetch with the next scripted (delay, response) pair and
    /// fails once the script runs out.
    #[derive(Debug, Default)]
    struct ScriptedSource {
        script: Mutex<VecDeque<(Duration, Option<f64>)>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: &[(u64, Option<f64>)]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(
                    script
                        .iter()
                        .map(|&(ms, t)| (Duration::from_millis(ms), t))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TelemetrySource for ScriptedSource {
        async fn fetch(&self) -> Result<Frame, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().pop_front();
            let Some((delay, temperature)) = next else {
                return Err(SourceError::Closed);
            };
            tokio::time::sleep(delay).await;
            match temperature {
                Some(t) => {
                    let mut frame = Frame::new();
                    frame.insert("node1".to_string(), Reading::builder().temperature(t).build());
                    Ok(frame)
                }
                None => Err(SourceError::Closed),
            }
        }

        fn description(&self) -> &str {
            "scripted"
        }
    }

    fn poller(source: Arc<ScriptedSource>) -> (Poller, SharedTelemetry) {
        let state = TelemetryState::shared(500);
        let poller = Poller::new(state.clone(), source, Duration::from_millis(1000));
        (poller, state)
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnMut(&TelemetryState, MergeOutcome) + Send + 'static) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let handle = ticks.clone();
        (ticks, move |_: &TelemetryState, _: MergeOutcome| {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_ticks_update_state() {
        let source = ScriptedSource::new(&[(10, Some(20.0)), (10, Some(21.0))]);
        let (mut poller, state) = poller(source);
        let (ticks, on_tick) = counter();

        assert!(poller.start(on_tick));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let guard = state.read();
        assert_eq!(guard.snapshots().get("node1").unwrap().temperature, 21.0);
        assert_eq!(guard.history().series("node1").unwrap().len(), 2);
        assert_eq!(guard.revision(), 2);
        drop(guard);
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_does_not_overwrite_newer_one() {
        // Request 1 takes 1.5s; request 2 (issued at 1s) answers after 100ms.
        let source = ScriptedSource::new(&[(1500, Some(11.0)), (100, Some(22.0))]);
        let (mut poller, state) = poller(source);
        let (ticks, on_tick) = counter();

        poller.start(on_tick);
        tokio::time::sleep(Duration::from_millis(1600)).await;

        let guard = state.read();
        assert_eq!(guard.snapshots().get("node1").unwrap().temperature, 22.0);
        assert_eq!(guard.history().series("node1").unwrap().len(), 1);
        drop(guard);
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_ticks_leave_state_untouched() {
        let source = ScriptedSource::new(&[(10, Some(20.0)), (10, None), (10, None)]);
        let (mut poller, state) = poller(source.clone());
        let (ticks, on_tick) = counter();

        poller.start(on_tick);
        tokio::time::sleep(Duration::from_millis(500)).await;
        let after_first = state.read().clone();

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert!(source.calls.load(Ordering::SeqCst) >= 3);
        assert_eq!(*state.read(), after_first);
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_response() {
        let source = ScriptedSource::new(&[(500, Some(20.0))]);
        let (mut poller, state) = poller(source);
        let (ticks, on_tick) = counter();

        poller.start(on_tick);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(poller.stop());

        tokio::time::sleep(Duration::from_millis(2000)).await;
        let guard = state.read();
        assert!(guard.snapshots().is_empty());
        assert!(!guard.is_active());
        drop(guard);
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_are_idempotent() {
        let source = ScriptedSource::new(&[]);
        let (mut poller, _state) = poller(source);

        assert!(poller.start(|_, _| {}));
        assert!(!poller.start(|_, _| {}));
        assert!(poller.is_running());

        assert!(poller.stop());
        assert!(!poller.stop());
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_merging_fresh_responses() {
        let source = ScriptedSource::new(&[
            (10, Some(20.0)),
            (10, Some(20.0)),
            (10, Some(20.0)),
            (10, Some(99.0)),
        ]);
        let (mut poller, state) = poller(source);

        poller.start(|_, _| {});
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(poller.stop());

        let (ticks, on_tick) = counter();
        assert!(poller.start(on_tick));
        tokio::time::sleep(Duration::from_millis(500)).await;

        let guard = state.read();
        assert_eq!(guard.snapshots().get("node1").unwrap().temperature, 99.0);
        assert_eq!(guard.history().series("node1").unwrap().len(), 4);
        drop(guard);
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_fetches_are_capped() {
        let script: Vec<(u64, Option<f64>)> = vec![(60_000, Some(20.0)); MAX_IN_FLIGHT + 4];
        let source = ScriptedSource::new(&script);
        let (mut poller, _state) = poller(source.clone());

        poller.start(|_, _| {});
        tokio::time::sleep(Duration::from_millis(8500)).await;

        // Ticks at 0..=8s; only the first MAX_IN_FLIGHT reach the backend.
        assert_eq!(source.calls.load(Ordering::SeqCst), MAX_IN_FLIGHT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let source = ScriptedSource::new(&[(10, Some(20.0)), (10, Some(21.0)), (10, Some(22.0))]);
        let (mut poller, state) = poller(source.clone());

        poller.start(|_, _| {});
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(poller);

        let calls = source.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), calls);
        assert!(!state.read().is_active());
    }
}
