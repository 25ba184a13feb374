#![forbid(unsafe_code)]

//! Orchestrator configuration.
//!
//! # Environment Variables
//!
//! | Variable          | Values                       | Effect                         |
//! |-------------------|------------------------------|--------------------------------|
//! | `ASEL_REFRESH_MS` | integer milliseconds         | Refresh period; `0` disables   |
//! | `ASEL_REFRESH`    | `on/1/true`, `off/0/false`   | Enable or disable refresh      |
//!
//! Invalid values keep the default and are reported through
//! [`ConfigParse::errors`]. Refresh is disabled if either variable disables it.

use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::delegate::SelectFn;
use crate::observer::SessionObserver;
use crate::redisplay::RedisplaySignal;
use crate::terminal::TerminalSelect;
use crate::ticker::TickAction;

/// Refresh period used when nothing overrides it.
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_millis(300);

const ENV_REFRESH_MS: &str = "ASEL_REFRESH_MS";
const ENV_REFRESH: &str = "ASEL_REFRESH";

/// What the refresh ticker does on each tick.
#[derive(Clone, Default)]
pub enum RefreshAction {
    /// No ticker runs.
    Disabled,
    /// Ask the attached selection surface to recompute and redraw.
    #[default]
    Redisplay,
    /// Run a caller-supplied action.
    Custom(TickAction),
}

impl RefreshAction {
    /// Wrap a closure as a custom action.
    pub fn custom(action: impl Fn() + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(action))
    }

    /// Whether a ticker should run at all.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Resolve to the closure the ticker runs for one session.
    pub fn bind(&self, redisplay: &RedisplaySignal) -> Option<TickAction> {
        match self {
            Self::Disabled => None,
            Self::Redisplay => {
                let signal = redisplay.clone();
                Some(Arc::new(move || {
                    signal.request_if_attached();
                }))
            }
            Self::Custom(action) => Some(Arc::clone(action)),
        }
    }
}

impl fmt::Debug for RefreshAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Redisplay => f.write_str("Redisplay"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Configuration for [`AsyncSelect`](crate::AsyncSelect).
#[derive(Clone)]
pub struct AsyncSelectConfig {
    /// Action run by the refresh ticker.
    pub refresh: RefreshAction,
    /// Interval between ticks.
    pub refresh_period: Duration,
    /// The selection function the orchestrator wraps.
    pub delegate: Arc<dyn SelectFn>,
    /// Receives session lifecycle events.
    pub observer: Option<Arc<dyn SessionObserver>>,
}

impl Default for AsyncSelectConfig {
    fn default() -> Self {
        Self {
            refresh: RefreshAction::default(),
            refresh_period: DEFAULT_REFRESH_PERIOD,
            delegate: Arc::new(TerminalSelect::default()),
            observer: None,
        }
    }
}

impl fmt::Debug for AsyncSelectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSelectConfig")
            .field("refresh", &self.refresh)
            .field("refresh_period", &self.refresh_period)
            .field("observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl AsyncSelectConfig {
    /// Set the refresh action (builder).
    #[must_use]
    pub fn with_refresh(mut self, refresh: RefreshAction) -> Self {
        self.refresh = refresh;
        self
    }

    /// Set the refresh period (builder). A zero period disables refresh.
    #[must_use]
    pub fn with_refresh_period(mut self, period: Duration) -> Self {
        if period.is_zero() {
            self.refresh = RefreshAction::Disabled;
        } else {
            self.refresh_period = period;
        }
        self
    }

    /// Set the delegate selection function (builder).
    #[must_use]
    pub fn with_delegate(mut self, delegate: impl SelectFn + 'static) -> Self {
        self.delegate = Arc::new(delegate);
        self
    }

    /// Attach a lifecycle observer (builder).
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Defaults with environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let parsed = Self::from_env_with(|key| env::var(key).ok());
        for err in &parsed.errors {
            tracing::warn!(error = %err, "ignoring invalid configuration value");
        }
        parsed.config
    }

    /// Apply overrides from a custom environment lookup (for tests).
    pub fn from_env_with<F>(mut get: F) -> ConfigParse
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let mut errors = Vec::new();
        let mut disabled = false;

        if let Some(value) = get(ENV_REFRESH_MS) {
            match value.trim().parse::<u64>() {
                Ok(0) => disabled = true,
                Ok(ms) => config.refresh_period = Duration::from_millis(ms),
                Err(_) => errors.push(ConfigError::new(
                    "refresh_period",
                    value,
                    "expected milliseconds as a non-negative integer",
                )),
            }
        }

        if let Some(value) = get(ENV_REFRESH) {
            match parse_bool(&value) {
                Some(enabled) => disabled |= !enabled,
                None => errors.push(ConfigError::new(
                    "refresh",
                    value,
                    "expected on|off|1|0|true|false",
                )),
            }
        }

        if disabled {
            config.refresh = RefreshAction::Disabled;
        }
        ConfigParse { config, errors }
    }
}

/// Result of reading configuration from the environment.
#[derive(Debug, Clone)]
pub struct ConfigParse {
    pub config: AsyncSelectConfig,
    pub errors: Vec<ConfigError>,
}

/// An environment value that could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(
        field: &'static str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for ConfigError {}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
