//! Exchange configuration.
//!
//! `ExchangeConfig` controls how an [`HttpExchange`](crate::net::HttpExchange) decodes its body,
//! how much it is willing to buffer, and how the driver worker sizes its channels.
//!
//! `ExchangeConfig` provides sensible defaults via [`Default`] and a fluent
//! [`ExchangeConfig::builder()`] for customization with validation.
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use http_exchange::config::ExchangeConfig;
//! let cfg = ExchangeConfig::default();
//! assert_eq!(cfg.default_encoding, "utf-8");
//! ```
//!
//! ## Customize with the builder
//! ```rust
//! use http_exchange::config::ExchangeConfig;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = ExchangeConfig::builder()
//!     .default_encoding("windows-1252")
//!     .max_body_size(4 * 1024 * 1024)
//!     .driver_channel_capacity(64)
//!     .build()?; // returns Result<ExchangeConfig, ConfigError>
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `default_encoding`: Encoding label used when neither the caller nor the server names one
//!   (default: `utf-8`).
//! - `max_body_size`: Optional cap on buffered body bytes (default: unlimited).
//! - `driver_channel_capacity`: Bound of the transport event channel (default: 32).
//! - `notify_channel_capacity`: Bound of the notification broadcast channel (default: 64).
//! - `log_level`: Consumer-facing only. The library logs through the `log` facade and never reads
//!   this field; the host application passes it to its logger (see `demos/transcript.rs`).
//!
//! # Errors
//!
//! Builder validation can return [`ConfigError`] if values are invalid (unknown encoding label,
//! zero body size or zero channel capacity).

use std::fmt;

use crate::net::materialize::encoding_for_label;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub default_encoding: String,
    pub max_body_size: Option<usize>,
    pub driver_channel_capacity: usize,
    pub notify_channel_capacity: usize,
    /// Suggested filter for the host's logger. Not read by this crate.
    pub log_level: LogLevel,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            default_encoding: "utf-8".to_string(),
            max_body_size: None,
            driver_channel_capacity: 32,
            notify_channel_capacity: 64,
            log_level: LogLevel::Info,
        }
    }
}

impl ExchangeConfig {
    pub fn builder() -> ExchangeConfigBuilder {
        ExchangeConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExchangeConfigBuilder {
    inner: ExchangeConfig,
}

impl ExchangeConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut ExchangeConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn default_encoding<S: Into<String>>(self, label: S) -> Self { self.map(|c| c.default_encoding = label.into()) }
    pub fn max_body_size(self, bytes: usize) -> Self { self.map(|c| c.max_body_size = Some(bytes)) }
    pub fn unlimited_body(self) -> Self { self.map(|c| c.max_body_size = None) }
    pub fn driver_channel_capacity(self, n: usize) -> Self { self.map(|c| c.driver_channel_capacity = n) }
    pub fn notify_channel_capacity(self, n: usize) -> Self { self.map(|c| c.notify_channel_capacity = n) }
    pub fn log_level(self, level: LogLevel) -> Self { self.map(|c| c.log_level = level) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut ExchangeConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<ExchangeConfig, ConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownEncoding(String),
    ZeroBodySize,
    ZeroChannelCapacity(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownEncoding(label) =>
                write!(f, "default_encoding {label:?} is not a known encoding label"),
            ConfigError::ZeroBodySize =>
                write!(f, "max_body_size must be at least 1 byte"),
            ConfigError::ZeroChannelCapacity(which) =>
                write!(f, "{which} must be at least 1"),
        }
    }
}
impl std::error::Error for ConfigError {}

pub(crate) fn validate(c: &ExchangeConfig) -> Result<(), ConfigError> {
    if encoding_for_label(&c.default_encoding).is_err() {
        return Err(ConfigError::UnknownEncoding(c.default_encoding.clone()));
    }
    if c.max_body_size == Some(0) {
        return Err(ConfigError::ZeroBodySize);
    }
    if c.driver_channel_capacity == 0 {
        return Err(ConfigError::ZeroChannelCapacity("driver_channel_capacity"));
    }
    if c.notify_channel_capacity == 0 {
        return Err(ConfigError::ZeroChannelCapacity("notify_channel_capacity"));
    }
    Ok(())
}
