//! Typed configuration.
//!
//! Layered in order: built-in defaults, an optional TOML file, then
//! environment variables. Loaded once at startup; fails fast on values that
//! do not parse.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Latency of one fan-out item fetch.
    pub item_delay: Duration,
    /// Latency of one cache fetch.
    pub fetch_delay: Duration,
    /// Latency of one chain step that transforms its input.
    pub step_delay: Duration,
    /// Wait before each item of a generated sequence.
    pub stream_interval: Duration,
    /// Wait inside the long-running cancellable operation.
    pub operation_delay: Duration,
    pub http_timeout: Duration,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            item_delay: Duration::from_millis(100),
            fetch_delay: Duration::from_millis(50),
            step_delay: Duration::from_millis(50),
            stream_interval: Duration::from_millis(50),
            operation_delay: Duration::from_millis(50),
            http_timeout: Duration::from_secs(30),
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

/// On-disk shape. Every field is optional; missing ones keep the default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    item_delay_ms: Option<u64>,
    fetch_delay_ms: Option<u64>,
    step_delay_ms: Option<u64>,
    stream_interval_ms: Option<u64>,
    operation_delay_ms: Option<u64>,
    http_timeout_secs: Option<u64>,
    otel_endpoint: Option<String>,
    log_level: Option<String>,
}

impl Config {
    /// Defaults overridden by environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults, then `path` (if given), then environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("bad config {}: {e}", path.display())))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FileConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.message().to_string()))?;
        let mut config = Self::default();
        config.merge(file);
        Ok(config)
    }

    fn merge(&mut self, file: FileConfig) {
        if let Some(ms) = file.item_delay_ms {
            self.item_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.fetch_delay_ms {
            self.fetch_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.step_delay_ms {
            self.step_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.stream_interval_ms {
            self.stream_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = file.operation_delay_ms {
            self.operation_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = file.http_timeout_secs {
            self.http_timeout = Duration::from_secs(secs);
        }
        if file.otel_endpoint.is_some() {
            self.otel_endpoint = file.otel_endpoint;
        }
        if let Some(level) = file.log_level {
            self.log_level = level;
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(ms) = numeric_var("TASKWEAVE_ITEM_DELAY_MS")? {
            self.item_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = numeric_var("TASKWEAVE_FETCH_DELAY_MS")? {
            self.fetch_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = numeric_var("TASKWEAVE_STEP_DELAY_MS")? {
            self.step_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = numeric_var("TASKWEAVE_STREAM_INTERVAL_MS")? {
            self.stream_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = numeric_var("TASKWEAVE_OPERATION_DELAY_MS")? {
            self.operation_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = numeric_var("TASKWEAVE_HTTP_TIMEOUT_SECS")? {
            self.http_timeout = Duration::from_secs(secs);
        }
        if let Ok(endpoint) = std::env::var("OTEL_ENDPOINT") {
            self.otel_endpoint = Some(endpoint);
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }
}

fn numeric_var(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name}={raw:?} is not a whole number: {e}"))),
        Err(_) => Ok(None),
    }
}
