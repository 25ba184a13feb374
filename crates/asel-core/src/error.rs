#![forbid(unsafe_code)]

//! Selection errors.

use std::error::Error;
use std::fmt;
use std::io;

/// Why a selection call did not produce a candidate.
#[derive(Debug)]
pub enum SelectError {
    /// The external program could not be started. Carries the original error.
    Spawn { program: String, source: io::Error },
    /// The user aborted the prompt.
    Cancelled,
    /// Terminal I/O failed inside a selection surface.
    Terminal(io::Error),
    /// Any other failure raised by a delegate selection function.
    Delegate(Box<dyn Error + Send + Sync>),
}

impl SelectError {
    /// Wrap an arbitrary delegate failure.
    pub fn delegate(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Delegate(err.into())
    }

    /// Whether this is a user cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The underlying spawn error, if the program failed to start.
    pub fn spawn_error(&self) -> Option<&io::Error> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for SelectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn { program, source } => write!(f, "failed to spawn {program}: {source}"),
            Self::Cancelled => write!(f, "selection cancelled"),
            Self::Terminal(err) => write!(f, "terminal error: {err}"),
            Self::Delegate(err) => write!(f, "selection failed: {err}"),
        }
    }
}

impl Error for SelectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn { source, .. } => Some(source),
            Self::Terminal(err) => Some(err),
            Self::Delegate(err) => Some(&**err),
            Self::Cancelled => None,
        }
    }
}
