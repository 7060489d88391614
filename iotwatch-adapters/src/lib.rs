//! # iotwatch-adapters
//!
//! Client for the REST endpoints of the IoT dashboard backend.
//!
//! The backend exposes three routes this crate talks to:
//!
//! - `GET /realtime` — latest reading per device, decoded as a [`Frame`]
//! - `POST /command` — actuator commands ([`CommandRequest`])
//! - `POST /set_limits` — per-device alert limits ([`LimitsRequest`])
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use iotwatch_adapters::http::HttpClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpClient::builder()
//!         .endpoint("http://localhost:8000")
//!         .build()?;
//!
//!     let frame = client.fetch_realtime().await?;
//!     println!("Backend reports {} devices", frame.len());
//!     Ok(())
//! }
//! ```

pub mod error;

#[cfg(feature = "http")]
pub mod http;

pub use error::AdapterError;

// Re-export types for convenience
pub use iotwatch_types::{CommandRequest, DeviceAction, Frame, LimitsRequest, Reading};

/// Parse the body of a `/realtime` response.
///
/// Exposed separately from the HTTP client so recorded responses can be
/// replayed without a network.
pub fn decode_frame(body: &[u8]) -> Result<Frame, AdapterError> {
    Ok(serde_json::from_slice(body)?)
}
