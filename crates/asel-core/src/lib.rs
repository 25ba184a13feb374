#![forbid(unsafe_code)]

//! Core: candidate sources, session output buffers, and the query channel.
//!
//! # Role in asel
//! `asel-core` holds the data model shared by the orchestrator and by every
//! candidate source. It has no terminal, process, or timer dependencies; the
//! runtime crate wires those around the types defined here.
//!
//! # Modules
//!
//! - [`buffer`] - Append-only [`OutputBuffer`] a background process writes into.
//! - [`channel`] - [`QueryChannel`], the only route from a source to session resources.
//! - [`metadata`] - [`Metadata`] and the [`AsyncSpec`] marker.
//! - [`source`] - The [`CandidateSource`] capability set plus static and lazy sources.
//! - [`matching`] - Standard completion semantics over a candidate list.
//! - [`lines`] - [`LinesFromProcess`], the incremental line-splitting adapter.
//! - [`error`] - [`SelectError`].

pub mod buffer;
pub mod channel;
pub mod error;
pub mod lines;
pub mod matching;
pub mod metadata;
pub mod source;

pub use buffer::{BufferChunk, OutputBuffer};
pub use channel::{ChannelQuery, ChannelReply, Predicate, QueryChannel, predicate};
pub use error::SelectError;
pub use lines::{LINES_FROM_PROCESS_CATEGORY, LinesFromProcess, lines_from_process};
pub use matching::{MatchKind, MatchOptions};
pub use metadata::{AsyncSpec, Metadata};
pub use source::{
    CandidateSource, CompletionAction, CompletionResult, LazySource, StaticSource, TryCompletion,
    probe_metadata,
};
