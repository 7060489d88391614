//! Live backend source and command sink.

use async_trait::async_trait;
use iotwatch_adapters::http::HttpClient;
use iotwatch_types::{CommandRequest, Frame, LimitsRequest};

use super::{SourceError, TelemetrySource};
use crate::dispatch::CommandSink;

/// Telemetry source and command sink backed by the dashboard REST API.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: HttpClient,
    description: String,
}

impl HttpSource {
    pub fn new(client: HttpClient) -> Self {
        let description = format!("http: {}", client.endpoint());
        Self {
            client,
            description,
        }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }
}

#[async_trait]
impl TelemetrySource for HttpSource {
    async fn fetch(&self) -> Result<Frame, SourceError> {
        Ok(self.client.fetch_realtime().await?)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[async_trait]
impl CommandSink for HttpSource {
    async fn send_command(&self, request: &CommandRequest) -> Result<(), SourceError> {
        Ok(self.client.send_command(request).await?)
    }

    async fn set_limits(&self, request: &LimitsRequest) -> Result<(), SourceError> {
        Ok(self.client.set_limits(request).await?)
    }
}
