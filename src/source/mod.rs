//! Telemetry source abstraction.
//!
//! The poller fetches frames through the [`TelemetrySource`] trait, so the
//! same sequencing logic runs against the live backend, a recorded file, or
//! an in-process channel.

mod channel;
mod file;
mod http;

pub use channel::ChannelSource;
pub use file::FileSource;
pub use http::HttpSource;

use std::fmt::Debug;

use async_trait::async_trait;
use iotwatch_adapters::AdapterError;
use iotwatch_types::Frame;
use thiserror::Error;

/// Why a fetch or send failed. The poller and dispatcher drop these after
/// logging them.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Backend(#[from] AdapterError),

    #[error("Read error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Source closed")]
    Closed,
}

/// Trait for fetching the latest telemetry frame.
///
/// # Example
///
/// ```
/// use iotwatch::{ChannelSource, TelemetrySource};
///
/// # tokio_test::block_on(async {
/// let (_tx, source) = ChannelSource::create("example");
/// let frame = source.fetch().await.unwrap();
/// assert!(frame.is_empty());
/// # });
/// ```
#[async_trait]
pub trait TelemetrySource: Send + Sync + Debug {
    /// Fetch the current reading of every device.
    ///
    /// Each call is one request; the caller tags it with a sequence number.
    async fn fetch(&self) -> Result<Frame, SourceError>;

    /// Returns a human-readable description of the source.
    fn description(&self) -> &str;
}
