#![forbid(unsafe_code)]

//! The selection-function contract.
//!
//! A [`SelectFn`] owns the interactive part of a selection: it shows the
//! prompt, queries the source as the user types, and returns the accepted
//! string. The orchestrator wraps one; [`TerminalSelect`](crate::TerminalSelect)
//! and [`ScriptedSelect`](crate::ScriptedSelect) are the built-in ones.

use asel_core::{CandidateSource, QueryChannel, SelectError};

use crate::redisplay::RedisplaySignal;

/// Caller options forwarded verbatim to the delegate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectOptions {
    /// Only accept input that is itself a candidate.
    pub require_match: bool,
    /// Text placed in the input line when the prompt opens.
    pub initial_input: Option<String>,
    /// Returned when the user accepts an empty input.
    pub default: Option<String>,
}

impl SelectOptions {
    /// Options with every knob off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require an exact candidate (builder).
    #[must_use]
    pub fn require_match(mut self, require: bool) -> Self {
        self.require_match = require;
        self
    }

    /// Set the initial input (builder).
    #[must_use]
    pub fn with_initial_input(mut self, text: impl Into<String>) -> Self {
        self.initial_input = Some(text.into());
        self
    }

    /// Set the default answer (builder).
    #[must_use]
    pub fn with_default(mut self, text: impl Into<String>) -> Self {
        self.default = Some(text.into());
        self
    }
}

/// One invocation of a selection function.
pub struct SelectRequest<'a> {
    pub prompt: &'a str,
    pub source: &'a mut dyn CandidateSource,
    /// Predicate plus, in async sessions, the output buffer.
    pub channel: &'a QueryChannel,
    pub options: &'a SelectOptions,
    /// Redisplay requests from the refresh ticker.
    pub redisplay: &'a RedisplaySignal,
}

impl std::fmt::Debug for SelectRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectRequest")
            .field("prompt", &self.prompt)
            .field("channel", &self.channel)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// A selection function.
pub trait SelectFn: Send + Sync {
    /// Run one selection.
    ///
    /// # Errors
    ///
    /// [`SelectError::Cancelled`] when the user aborts; any other variant for
    /// failures inside the delegate.
    fn select(&self, request: SelectRequest<'_>) -> Result<String, SelectError>;
}

impl<F> SelectFn for F
where
    F: Fn(SelectRequest<'_>) -> Result<String, SelectError> + Send + Sync,
{
    fn select(&self, request: SelectRequest<'_>) -> Result<String, SelectError> {
        self(request)
    }
}
