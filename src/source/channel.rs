//! Channel-based telemetry source.
//!
//! Serves whatever frame was last pushed through a tokio watch channel.
//! This is useful when another component already receives telemetry (a
//! message bus subscriber, a test harness) and only needs the poller's
//! sequencing and history on top.

use async_trait::async_trait;
use iotwatch_types::Frame;
use tokio::sync::watch;

use super::{SourceError, TelemetrySource};

/// A source that returns the latest frame sent on a watch channel.
///
/// # Example
///
/// ```
/// use iotwatch::ChannelSource;
///
/// // Create a channel pair
/// let (tx, source) = ChannelSource::create("mqtt://broker");
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: watch::Receiver<Frame>,
    description: String,
}

impl ChannelSource {
    /// Create a new channel source.
    ///
    /// * `receiver` - The receiving end of a watch channel
    /// * `source_description` - Where frames come from (e.g., "mqtt://broker")
    pub fn new(receiver: watch::Receiver<Frame>, source_description: &str) -> Self {
        let description = format!("channel: {}", source_description);
        Self {
            receiver,
            description,
        }
    }

    /// Create a channel pair for pushing frames to a ChannelSource.
    ///
    /// The source starts out serving an empty frame.
    pub fn create(source_description: &str) -> (watch::Sender<Frame>, Self) {
        let (tx, rx) = watch::channel(Frame::new());
        let source = Self::new(rx, source_description);
        (tx, source)
    }
}

#[async_trait]
impl TelemetrySource for ChannelSource {
    async fn fetch(&self) -> Result<Frame, SourceError> {
        // A dropped sender means no producer will ever update the frame again.
        if self.receiver.has_changed().is_err() {
            return Err(SourceError::Closed);
        }
        Ok(self.receiver.borrow().clone())
    }

    fn description(&self) -> &str {
        &self.description
    }
}
