#![forbid(unsafe_code)]

//! asel public facade crate.
//!
//! Re-exports the candidate-source model from `asel-core` and the
//! orchestrator and pickers from `asel-runtime`, and adds logging setup and
//! the command-line front end used by the `asel` binary.

pub mod cli;
pub mod logging;

// --- Core re-exports -------------------------------------------------------

pub use asel_core::{
    AsyncSpec, CandidateSource, ChannelQuery, ChannelReply, CompletionAction, CompletionResult,
    LazySource, LinesFromProcess, MatchOptions, Metadata, OutputBuffer, Predicate, QueryChannel,
    SelectError, StaticSource, TryCompletion, lines_from_process, predicate, probe_metadata,
};

// --- Runtime re-exports ----------------------------------------------------

pub use asel_runtime::{
    AsyncSelect, AsyncSelectConfig, RecordingObserver, RedisplaySignal, RefreshAction,
    ScriptStep, ScriptedSelect, SelectFn, SelectOptions, SelectRequest, SessionEvent,
    SessionObserver, TerminalSelect, async_select,
};

// --- Logging re-exports ----------------------------------------------------

pub use logging::{LogConfig, LogFormat, LoggingError};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        AsyncSelect, AsyncSelectConfig, CandidateSource, RefreshAction, SelectError, SelectFn,
        SelectOptions, StaticSource, async_select, lines_from_process, predicate,
    };

    pub use crate::{core, runtime};
}

pub use asel_core as core;
pub use asel_runtime as runtime;
