//! HTTP client for the dashboard backend.
//!
//! Requests carry no timeout unless one is configured on the builder; the
//! poller above this client decides what a slow response means.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use iotwatch_types::{CommandRequest, Frame, LimitsRequest};

use crate::AdapterError;

/// Base URL used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000";

const REALTIME_PATH: &str = "/realtime";
const COMMAND_PATH: &str = "/command";
const LIMITS_PATH: &str = "/set_limits";

/// Client for the telemetry, command and limits endpoints.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    endpoint: String,
}

impl HttpClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// The base URL requests are sent to, without a trailing slash.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch the latest reading for every device.
    pub async fn fetch_realtime(&self) -> Result<Frame, AdapterError> {
        let response = self.client.get(self.url(REALTIME_PATH)).send().await?;

        if !response.status().is_success() {
            return Err(AdapterError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        crate::decode_frame(&body)
    }

    /// Ask the backend to forward an actuator command to a device.
    pub async fn send_command(&self, request: &CommandRequest) -> Result<(), AdapterError> {
        self.post(COMMAND_PATH, request).await
    }

    /// Update the alert limits of a device.
    pub async fn set_limits(&self, request: &LimitsRequest) -> Result<(), AdapterError> {
        self.post(LIMITS_PATH, request).await
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<(), AdapterError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;

        if !response.status().is_success() {
            return Err(AdapterError::Status(response.status().as_u16()));
        }

        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }
}

/// Builder for HttpClient.
#[derive(Debug, Default)]
pub struct HttpClientBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl HttpClientBuilder {
    /// Set the backend base URL (default: `http://localhost:8000`).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set a per-request timeout. No timeout is applied by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<HttpClient, AdapterError> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(HttpClient { client, endpoint })
    }
}
