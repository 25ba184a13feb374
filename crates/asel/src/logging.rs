#![forbid(unsafe_code)]

//! Diagnostic logging setup.
//!
//! Logging is off unless `ASEL_LOG` is set. The picker owns the terminal, so
//! pointing `ASEL_LOG_FILE` at a file is the practical way to watch a live
//! session.
//!
//! # Env Var Contract
//!
//! - `ASEL_LOG` - `EnvFilter` directives, e.g. `debug` or `asel_runtime=trace`
//! - `ASEL_LOG_FORMAT` - `text` (default) or `json`
//! - `ASEL_LOG_FILE` - append to this file instead of stderr
//!
//! # Invariants
//!
//! - Never replaces a subscriber the host application already installed
//! - Invalid settings are reported, never silently ignored

use std::env;
use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG: &str = "ASEL_LOG";
const ENV_LOG_FORMAT: &str = "ASEL_LOG_FORMAT";
const ENV_LOG_FILE: &str = "ASEL_LOG_FILE";

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" | "pretty" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging configuration parsed from environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directives; `None` disables logging.
    pub filter: Option<String>,
    pub format: LogFormat,
    /// Log file; `None` writes to stderr.
    pub file: Option<PathBuf>,
}

impl LogConfig {
    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`LoggingError::Format`] for an unknown `ASEL_LOG_FORMAT`.
    pub fn from_env() -> Result<Self, LoggingError> {
        Self::from_env_with(|key| env::var(key).ok())
    }

    /// Read the configuration through a custom lookup (for tests).
    ///
    /// # Errors
    ///
    /// Returns [`LoggingError::Format`] for an unknown `ASEL_LOG_FORMAT`.
    pub fn from_env_with<F>(get: F) -> Result<Self, LoggingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let filter = get(ENV_LOG).filter(|v| !v.trim().is_empty());
        let format = match get(ENV_LOG_FORMAT) {
            Some(value) => LogFormat::parse(&value).ok_or(LoggingError::Format(value))?,
            None => LogFormat::default(),
        };
        let file = get(ENV_LOG_FILE)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        Ok(Self {
            filter,
            format,
            file,
        })
    }

    /// Whether [`install`](Self::install) would install anything.
    pub fn is_enabled(&self) -> bool {
        self.filter.is_some()
    }

    /// Install a global subscriber.
    ///
    /// Returns `Ok(false)` when logging is disabled.
    ///
    /// # Errors
    ///
    /// Fails on invalid filter directives, an unopenable log file, or when a
    /// global subscriber is already set.
    pub fn install(self) -> Result<bool, LoggingError> {
        let Some(directives) = self.filter else {
            return Ok(false);
        };
        let filter =
            EnvFilter::try_new(&directives).map_err(|e| LoggingError::Filter(e.to_string()))?;

        let ansi = self.file.is_none();
        let writer = match &self.file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| LoggingError::File {
                        path: path.clone(),
                        source,
                    })?;
                BoxMakeWriter::new(Mutex::new(file))
            }
            None => BoxMakeWriter::new(io::stderr),
        };

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_thread_names(true);
        let installed = match self.format {
            LogFormat::Text => tracing_subscriber::registry()
                .with(filter)
                .with(layer)
                .try_init(),
            LogFormat::Json => tracing_subscriber::registry()
                .with(filter)
                .with(layer.json())
                .try_init(),
        };
        installed.map_err(|_| LoggingError::SubscriberAlreadySet)?;

        tracing::debug!(filter = %directives, format = ?self.format, "logging installed");
        Ok(true)
    }
}

/// Install logging from `ASEL_LOG*` variables.
///
/// # Errors
///
/// See [`LogConfig::from_env`] and [`LogConfig::install`].
pub fn init_from_env() -> Result<bool, LoggingError> {
    LogConfig::from_env()?.install()
}

/// Why logging could not be set up.
#[derive(Debug)]
pub enum LoggingError {
    /// `ASEL_LOG_FORMAT` is not a known format.
    Format(String),
    /// `ASEL_LOG` is not a valid filter.
    Filter(String),
    /// The log file could not be opened.
    File { path: PathBuf, source: io::Error },
    /// Another global subscriber is installed.
    SubscriberAlreadySet,
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(value) => write!(f, "unknown log format {value:?} (expected text|json)"),
            Self::Filter(msg) => write!(f, "invalid log filter: {msg}"),
            Self::File { path, source } => {
                write!(f, "cannot open log file {}: {source}", path.display())
            }
            Self::SubscriberAlreadySet => write!(f, "a global tracing subscriber is already set"),
        }
    }
}

impl std::error::Error for LoggingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::File { source, .. } => Some(source),
            _ => None,
        }
    }
}
