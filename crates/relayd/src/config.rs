//! Daemon configuration.
//!
//! Values are layered, later sources winning:
//!
//! 1. Built-in defaults
//! 2. TOML file (`relayd --config relay.toml`)
//! 3. Environment (`CHATSERVER_BIND_ADDRESS`, `CHATSERVER_LOG_LEVEL`, ...),
//!    including a `.env` file in the working directory; variables already
//!    set in the process win over the file
//! 4. Command-line flags
//!
//! Everything is validated once, before the runtime starts. An unknown log
//! level or a zero capacity is a startup error, never a crash mid-run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use relay_core::OverflowPolicy;
use relay_protocol::DEFAULT_MAX_LINE_LENGTH;
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::session::SessionLimits;

/// Service name reported in startup logs.
pub const SERVICE_NAME: &str = "ChatServer";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "CHATSERVER";

/// Default listen address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";

const DEFAULT_QUEUE_CAPACITY: usize = 256;
const DEFAULT_MAX_SESSIONS: usize = 1024;
const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 60;
const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Fields that may be overridden from the environment.
const ENV_FIELDS: &[&str] = &["bind_address", "log_level", "log_format", "queue_capacity"];

// ============================================================================
// Log Settings
// ============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    /// Returns the matching tracing filter.
    pub fn as_level_filter(&self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            _ => Err(ConfigError::invalid("log_level", s, "error|warn|info|debug")),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, ConfigError> {
        value.parse()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        };
        f.write_str(label)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Human-readable lines
    Logfmt,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" | "structured" => Ok(Self::Json),
            "logfmt" | "human" | "text" => Ok(Self::Logfmt),
            _ => Err(ConfigError::invalid("log_format", s, "json|logfmt")),
        }
    }
}

impl TryFrom<String> for LogFormat {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Logfmt => f.write_str("logfmt"),
        }
    }
}

// ============================================================================
// Config
// ============================================================================

/// Validated daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address to listen on; `:PORT` means all interfaces
    pub bind_address: String,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
    /// Per-session outbound queue capacity, in lines
    pub queue_capacity: usize,
    /// What a full outbound queue does with a new line
    pub overflow_policy: OverflowPolicy,
    /// Maximum number of logged-in sessions
    pub max_sessions: usize,
    /// Maximum client line length in bytes, terminator excluded
    pub max_line_length: usize,
    pub login_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            log_level: LogLevel::default(),
            log_format: LogFormat::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            login_timeout_secs: DEFAULT_LOGIN_TIMEOUT_SECS,
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT_SECS,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Loads configuration from an optional file plus the process environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or parsed, or if
    /// any resulting value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `CHATSERVER_*` overrides using the given lookup.
    ///
    /// The lookup is injected so tests never touch the real environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for field in ENV_FIELDS {
            let key = format!("{ENV_PREFIX}_{}", field.to_ascii_uppercase());
            if let Some(value) = lookup(&key) {
                self.set(field, &value)?;
            }
        }
        Ok(())
    }

    /// Sets a single field from its string form.
    pub fn set(&mut self, field: &str, value: &str) -> Result<(), ConfigError> {
        match field {
            "bind_address" => self.bind_address = normalize_bind_address(value),
            "log_level" => self.log_level = value.parse()?,
            "log_format" => self.log_format = value.parse()?,
            "overflow_policy" => {
                self.overflow_policy = value
                    .parse()
                    .map_err(|_| ConfigError::invalid(field, value, "drop-oldest|drop-newest"))?;
            }
            "queue_capacity" => self.queue_capacity = parse_number(field, value)?,
            "max_sessions" => self.max_sessions = parse_number(field, value)?,
            "max_line_length" => self.max_line_length = parse_number(field, value)?,
            "login_timeout_secs" => self.login_timeout_secs = parse_number(field, value)?,
            "write_timeout_secs" => self.write_timeout_secs = parse_number(field, value)?,
            "shutdown_timeout_secs" => self.shutdown_timeout_secs = parse_number(field, value)?,
            other => return Err(ConfigError::UnknownField(other.to_string())),
        }
        Ok(())
    }

    /// Checks every value, normalizing the bind address in place.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.bind_address = normalize_bind_address(&self.bind_address);
        if self.bind_address.is_empty() || !self.bind_address.contains(':') {
            return Err(ConfigError::invalid(
                "bind_address",
                &self.bind_address,
                "HOST:PORT or :PORT",
            ));
        }

        let positive = [
            ("queue_capacity", self.queue_capacity as u64),
            ("max_sessions", self.max_sessions as u64),
            ("max_line_length", self.max_line_length as u64),
            ("login_timeout_secs", self.login_timeout_secs),
            ("write_timeout_secs", self.write_timeout_secs),
            ("shutdown_timeout_secs", self.shutdown_timeout_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::invalid(field, "0", "a positive number"));
            }
        }

        Ok(())
    }

    /// Per-session limits derived from this configuration.
    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            queue_capacity: self.queue_capacity,
            overflow_policy: self.overflow_policy,
            max_line_length: self.max_line_length,
            login_timeout: Duration::from_secs(self.login_timeout_secs),
            write_timeout: Duration::from_secs(self.write_timeout_secs),
        }
    }

    /// How long shutdown waits for sessions to close.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Expands `:PORT` to `0.0.0.0:PORT`.
fn normalize_bind_address(value: &str) -> String {
    let value = value.trim();
    if value.starts_with(':') {
        format!("0.0.0.0{value}")
    } else {
        value.to_string()
    }
}

fn parse_number<T: FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, value, "a positive number"))
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid {field}: {value} (expected {expected})")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Unknown config field: {0}")]
    UnknownField(String),
}

impl ConfigError {
    fn invalid(field: &str, value: &str, expected: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }
}
