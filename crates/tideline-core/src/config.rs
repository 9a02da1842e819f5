//! Configuration loading and typed config structures for Tideline.
//!
//! The canonical configuration lives in `tideline.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure and a
//! loader that reads the file, applies environment overrides, and
//! validates the result.
//!
//! ```yaml
//! source:
//!   base_url: https://feeds.example.com/api
//!   stream_id: orders
//!   filter: "type=order.*"
//!   mode: journey-and-stream
//! buffer:
//!   limit: 5
//! reconnect:
//!   initial_delay_ms: 200
//!   max_attempts: 10
//! ```

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::Path;

use serde::Deserialize;
use tideline_types::{CategoryStyle, FeedMode, SubscriptionDescriptor};

use crate::buffer::DEFAULT_LIMIT;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value for {name}: {message}")]
    Override {
        /// The environment variable name.
        name: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// A value parsed but is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level feed configuration.
///
/// Mirrors the structure of `tideline.yaml`. Every section has defaults,
/// so an empty file is a valid (idle) configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FeedConfig {
    /// Where events come from and which feed to show.
    #[serde(default)]
    pub source: SourceConfig,

    /// Buffer capacity.
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Live stream reconnect behaviour.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Rendering API server.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FeedConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// A missing file yields the defaults. Environment variables then
    /// override individual values (see [`FeedConfig::apply_overrides`]).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file exists but cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, and
    /// [`ConfigError::Override`] / [`ConfigError::Invalid`] for bad values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => serde_yml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides looked up by variable name.
    ///
    /// - `TIDELINE_BASE_URL` overrides `source.base_url`
    /// - `TIDELINE_STREAM_ID` overrides `source.stream_id`
    /// - `TIDELINE_FILTER` overrides `source.filter`
    /// - `TIDELINE_PAGINATION` overrides `source.pagination`
    /// - `TIDELINE_MODE` overrides `source.mode`
    /// - `TIDELINE_LIMIT` overrides `buffer.limit`
    /// - `TIDELINE_OBSERVER_PORT` overrides `observer.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Override`] if a value does not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TIDELINE_BASE_URL") {
            self.source.base_url = url;
        }
        if let Some(stream_id) = lookup("TIDELINE_STREAM_ID") {
            self.source.stream_id = Some(stream_id);
        }
        if let Some(filter) = lookup("TIDELINE_FILTER") {
            self.source.filter = Some(filter);
        }
        if let Some(pagination) = lookup("TIDELINE_PAGINATION") {
            self.source.pagination = Some(pagination);
        }
        if let Some(mode) = lookup("TIDELINE_MODE") {
            self.source.mode = mode.parse().map_err(|e| ConfigError::Override {
                name: "TIDELINE_MODE",
                message: format!("{e}"),
            })?;
        }
        if let Some(limit) = lookup("TIDELINE_LIMIT") {
            self.buffer.limit = limit.trim().parse().map_err(|e| ConfigError::Override {
                name: "TIDELINE_LIMIT",
                message: format!("{e}"),
            })?;
        }
        if let Some(port) = lookup("TIDELINE_OBSERVER_PORT") {
            self.observer.port = port.trim().parse().map_err(|e| ConfigError::Override {
                name: "TIDELINE_OBSERVER_PORT",
                message: format!("{e}"),
            })?;
        }
        Ok(())
    }

    /// Check cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid(String::from("source.base_url is empty")));
        }
        if self.source.stream_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(ConfigError::Invalid(String::from("source.stream_id is empty")));
        }
        if self.source.default_page_size == 0 {
            return Err(ConfigError::Invalid(String::from(
                "source.default_page_size must be at least 1",
            )));
        }
        if self.reconnect.multiplier == 0 {
            return Err(ConfigError::Invalid(String::from(
                "reconnect.multiplier must be at least 1",
            )));
        }
        if self.reconnect.max_delay_ms < self.reconnect.initial_delay_ms {
            return Err(ConfigError::Invalid(String::from(
                "reconnect.max_delay_ms is below reconnect.initial_delay_ms",
            )));
        }
        if self.reconnect.max_attempts == Some(0) {
            return Err(ConfigError::Invalid(String::from(
                "reconnect.max_attempts must be at least 1 (omit it for no limit)",
            )));
        }
        Ok(())
    }

    /// The subscription described by the `source` section, if a stream is set.
    pub fn descriptor(&self) -> Option<SubscriptionDescriptor> {
        self.source.stream_id.as_ref().map(|stream_id| SubscriptionDescriptor {
            stream_id: stream_id.clone(),
            filter: self.source.filter.clone(),
            pagination: self.source.pagination.clone(),
            mode: self.source.mode,
        })
    }
}

/// Feed source configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the feed API (history and live endpoints hang off it).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Stream to show at startup. `None` leaves the feed idle until the
    /// rendering layer subscribes.
    #[serde(default)]
    pub stream_id: Option<String>,

    /// Opaque filter expression.
    #[serde(default)]
    pub filter: Option<String>,

    /// Opaque pagination expression.
    #[serde(default)]
    pub pagination: Option<String>,

    /// Which sources to consume.
    #[serde(default)]
    pub mode: FeedMode,

    /// Page size requested from the history endpoint when no pagination
    /// expression is set.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream_id: None,
            filter: None,
            pagination: None,
            mode: FeedMode::default(),
            default_page_size: default_page_size(),
        }
    }
}

/// Buffer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BufferConfig {
    /// Maximum events kept on the live path.
    #[serde(default = "default_limit")]
    pub limit: NonZeroUsize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
        }
    }
}

/// Reconnect backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound on the exponential delay (before jitter).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor per consecutive failure.
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,

    /// Maximum random jitter added to each delay.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Consecutive failures before the circuit opens. `null` retries forever.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: Option<u32>,

    /// Seed for the jitter RNG. Unset seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter_ms: default_jitter_ms(),
            max_attempts: default_max_attempts(),
            seed: None,
        }
    }
}

/// Rendering API server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Whether to start the server.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seed for assigning styles to unknown categories.
    #[serde(default)]
    pub style_seed: u64,

    /// Fixed styles per category, checked before any random assignment.
    #[serde(default)]
    pub styles: BTreeMap<String, CategoryStyle>,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
            style_seed: 0,
            styles: BTreeMap::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_base_url() -> String {
    String::from("http://localhost:3000/api")
}

const fn default_page_size() -> u32 {
    100
}

const fn default_limit() -> NonZeroUsize {
    DEFAULT_LIMIT
}

const fn default_initial_delay_ms() -> u64 {
    200
}

const fn default_max_delay_ms() -> u64 {
    5_000
}

const fn default_multiplier() -> u32 {
    2
}

const fn default_jitter_ms() -> u64 {
    250
}

#[allow(clippy::unnecessary_wraps)]
const fn default_max_attempts() -> Option<u32> {
    Some(10)
}

const fn default_true() -> bool {
    true
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    String::from("info")
}
