//! Role-gated, fire-and-forget device commands.
//!
//! The admin check here is a client-side courtesy; the backend remains the
//! authority. Send failures are logged and dropped. The next poll shows the
//! operator whether a command took effect.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use iotwatch_types::{CommandRequest, DeviceAction, Identity, LimitsRequest};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::source::SourceError;

/// Destination for command and limits requests.
#[async_trait]
pub trait CommandSink: Send + Sync + Debug {
    async fn send_command(&self, request: &CommandRequest) -> Result<(), SourceError>;

    async fn set_limits(&self, request: &LimitsRequest) -> Result<(), SourceError>;
}

/// What happened to a dispatch request.
#[derive(Debug)]
pub enum Dispatch {
    /// The request is in flight. Awaiting the handle is optional; it
    /// resolves once the send settled, successfully or not.
    Sent(JoinHandle<()>),
    /// The active identity is not an administrator; nothing was sent.
    Denied,
    /// The request was malformed (e.g. a non-finite limit); nothing was sent.
    Invalid,
}

impl Dispatch {
    pub fn is_sent(&self) -> bool {
        matches!(self, Dispatch::Sent(_))
    }
}

/// Sends operator commands on behalf of one session identity.
///
/// Requires a tokio runtime: sends run on spawned tasks.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    identity: Identity,
    sink: Arc<dyn CommandSink>,
}

impl CommandDispatcher {
    pub fn new(identity: Identity, sink: Arc<dyn CommandSink>) -> Self {
        Self { identity, sink }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Ask `device` to perform `action`.
    pub fn send_command(&self, device: &str, action: DeviceAction) -> Dispatch {
        if !self.identity.is_admin() {
            debug!(user = %self.identity.username, device, %action, "command denied");
            return Dispatch::Denied;
        }

        let request = CommandRequest {
            device: device.to_string(),
            action,
        };
        let sink = self.sink.clone();
        info!(user = %self.identity.username, device, %action, "sending command");

        Dispatch::Sent(tokio::spawn(async move {
            if let Err(e) = sink.send_command(&request).await {
                warn!(device = %request.device, action = %request.action, error = %e, "command not delivered");
            }
        }))
    }

    /// Change the alert limits of `device`.
    pub fn set_limits(&self, device: &str, temp_threshold: f64, gas_threshold: f64) -> Dispatch {
        if !self.identity.is_admin() {
            debug!(user = %self.identity.username, device, "limits update denied");
            return Dispatch::Denied;
        }
        if !temp_threshold.is_finite() || !gas_threshold.is_finite() {
            debug!(device, temp_threshold, gas_threshold, "ignoring non-finite limits");
            return Dispatch::Invalid;
        }

        let request = LimitsRequest {
            device: device.to_string(),
            temp_th: temp_threshold,
            gas_th: gas_threshold,
        };
        let sink = self.sink.clone();
        info!(
            user = %self.identity.username,
            device,
            temp_threshold,
            gas_threshold,
            "updating limits"
        );

        Dispatch::Sent(tokio::spawn(async move {
            if let Err(e) = sink.set_limits(&request).await {
                warn!(device = %request.device, error = %e, "limits update not delivered");
            }
        }))
    }
}
