#![forbid(unsafe_code)]

//! Runtime for asynchronous selection prompts.
//!
//! [`AsyncSelect`] wraps a selection function. When the candidate source
//! names an external program, each call runs that program, streams its
//! stdout into a session buffer the source reads through its query channel,
//! and periodically asks the picker to redisplay. Everything the session
//! acquires is released before the call returns, however it returns.
//!
//! # Key Components
//!
//! - [`AsyncSelect`] / [`async_select`] - the orchestrator
//! - [`AsyncSelectConfig`] - refresh action, period, delegate, observer
//! - [`RefreshTicker`] - periodic refresh thread
//! - [`ProcessHandle`] - external program feeding an output buffer
//! - [`TerminalSelect`] - crossterm picker (the default delegate)
//! - [`ScriptedSelect`] - headless picker for tests
//!
//! # Example
//!
//! ```ignore
//! use asel_core::lines_from_process;
//! use asel_runtime::{SelectOptions, async_select};
//!
//! let mut files = lines_from_process("find", [".", "-type", "f"]);
//! let choice = async_select("File: ", &mut files, None, &SelectOptions::new())?;
//! ```

pub mod config;
pub mod delegate;
pub mod observer;
pub mod orchestrator;
pub mod picker;
pub mod process;
pub mod redisplay;
pub mod simulator;
pub mod terminal;
pub mod ticker;

pub use config::{AsyncSelectConfig, ConfigError, ConfigParse, DEFAULT_REFRESH_PERIOD, RefreshAction};
pub use delegate::{SelectFn, SelectOptions, SelectRequest};
pub use observer::{RecordingObserver, SessionEvent, SessionObserver};
pub use orchestrator::{AsyncSelect, async_select};
pub use picker::{PickerKey, PickerOutcome, PickerState};
pub use process::{ProcessHandle, Termination};
pub use redisplay::{RedisplaySignal, SurfaceGuard};
pub use simulator::{ScriptStep, ScriptedSelect, Snapshot, Transcript};
pub use terminal::{TerminalSelect, TtySession};
pub use ticker::{RefreshTicker, TickAction};
