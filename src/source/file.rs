//! File-based telemetry source.
//!
//! Reads a recorded `/realtime` response from disk on every fetch. Useful
//! for offline demos and replaying captured backend output.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use iotwatch_types::Frame;

use super::{SourceError, TelemetrySource};

/// A source that reads telemetry frames from a JSON file.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
}

impl FileSource {
    /// Create a new file source for the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self { path, description }
    }

    /// Returns the path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TelemetrySource for FileSource {
    async fn fetch(&self) -> Result<Frame, SourceError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_json() -> &'static str {
        r#"{
            "node1": { "t": 24.5, "h": 41, "ao_v": 0.8, "led": "ON", "fan": "OFF" }
        }"#
    }

    #[test]
    fn test_file_source_new() {
        let source = FileSource::new("/tmp/realtime.json");
        assert_eq!(source.path(), Path::new("/tmp/realtime.json"));
        assert_eq!(source.description(), "file: /tmp/realtime.json");
    }

    #[tokio::test]
    async fn test_file_source_reads_frame() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", sample_json()).unwrap();

        let source = FileSource::new(file.path());
        let frame = source.fetch().await.unwrap();

        assert!(frame.contains_key("node1"));
        assert_eq!(frame["node1"].t, Some(24.5));

        // Every fetch is a fresh read.
        assert_eq!(source.fetch().await.unwrap(), frame);
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let source = FileSource::new("/nonexistent/path/realtime.json");

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
        assert!(err.to_string().contains("Read error"));
    }

    #[tokio::test]
    async fn test_file_source_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let source = FileSource::new(file.path());

        let err = source.fetch().await.unwrap_err();
        assert!(err.to_string().contains("Parse error"));
    }
}
