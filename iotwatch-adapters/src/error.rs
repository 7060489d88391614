//! Error types for the backend client.

use thiserror::Error;

/// Errors that can occur when talking to the dashboard backend.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The request to the dashboard backend could not be completed after
    /// the connection was made (bad URL, broken body, redirect loop).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The backend answered with a non-2xx status, e.g. a 500 from
    /// `/set_limits` for an unknown device.
    #[error("Backend returned status {0}")]
    Status(u16),

    /// `/realtime` answered with something that is not a device map.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The backend host refused or dropped the connection.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The configured per-request timeout elapsed. Never produced unless a
    /// timeout was set on the client builder.
    #[error("Request timed out")]
    Timeout,
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_connect() {
            AdapterError::Connection(err.to_string())
        } else if err.is_decode() {
            AdapterError::Parse(err.to_string())
        } else {
            AdapterError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Parse(err.to_string())
    }
}
