//! Typed configuration from environment variables or a TOML file.
//!
//! Loads once at startup and fails fast on malformed values. Every field
//! has a default, so an empty environment is a valid configuration.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::queue::QueueOptions;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// Upper bound on pool threads running operation bodies.
    pub worker_threads: usize,
    /// Broadcast buffer for queue events.
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            otel_endpoint: None,
            log_level: "info".to_string(),
            worker_threads: 4,
            event_capacity: 256,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            worker_threads: count_var("OPQUEUE_WORKER_THREADS", defaults.worker_threads)?,
            event_capacity: count_var("OPQUEUE_EVENT_CAPACITY", defaults.event_capacity)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("bad config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file. A missing or unreadable file is [`Error::Io`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            event_capacity: self.event_capacity,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(Error::Config("worker_threads must be at least 1".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn count_var(name: &str, default: usize) -> Result<usize> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            Error::Config(format!("environment variable {name}={raw:?} is not a count: {e}"))
        }),
        Err(_) => Ok(default),
    }
}
