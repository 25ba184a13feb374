#![forbid(unsafe_code)]

//! Candidate sources.
//!
//! A [`CandidateSource`] answers two questions: what it is
//! ([`metadata`](CandidateSource::metadata)) and which candidates match a
//! query ([`query`](CandidateSource::query)). Sources that report an
//! [`AsyncSpec`](crate::AsyncSpec) in their metadata get a live output buffer
//! through the [`QueryChannel`] when driven by the orchestrator; the rest are
//! plain synchronous collections.

use std::fmt;

use crate::channel::{Predicate, QueryChannel};
use crate::matching::{self, MatchOptions};
use crate::metadata::Metadata;

/// What a selection UI is asking a source for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionAction {
    /// Complete the query as far as it is unambiguous.
    Try,
    /// List every matching candidate.
    All,
    /// Is the query itself an acceptable candidate?
    Test,
    /// Report metadata.
    Metadata,
}

/// Outcome of a [`CompletionAction::Try`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TryCompletion {
    /// Nothing matches.
    NoMatch,
    /// The query is the one and only match.
    Exact,
    /// The longest prefix shared by every match (may equal the query).
    Prefix(String),
}

/// Answer to a [`CandidateSource::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionResult {
    Try(TryCompletion),
    All(Vec<String>),
    Test(bool),
    Metadata(Metadata),
}

impl CompletionResult {
    /// Candidates from an [`All`](Self::All) answer; empty for anything else.
    pub fn into_candidates(self) -> Vec<String> {
        match self {
            Self::All(candidates) => candidates,
            _ => Vec::new(),
        }
    }
}

/// Capability set of a selectable-items provider.
pub trait CandidateSource {
    /// Describe this source. Called once per session, before any query.
    ///
    /// The default reports a synchronous source with no category.
    fn metadata(&self, text: &str, channel: &QueryChannel) -> Metadata {
        let _ = (text, channel);
        Metadata::default()
    }

    /// Answer a completion request for `text`.
    ///
    /// `channel` carries the caller's predicate and, for async sessions, the
    /// session buffer.
    fn query(
        &mut self,
        text: &str,
        channel: &QueryChannel,
        action: CompletionAction,
    ) -> CompletionResult;
}

impl<T: CandidateSource + ?Sized> CandidateSource for Box<T> {
    fn metadata(&self, text: &str, channel: &QueryChannel) -> Metadata {
        (**self).metadata(text, channel)
    }

    fn query(
        &mut self,
        text: &str,
        channel: &QueryChannel,
        action: CompletionAction,
    ) -> CompletionResult {
        (**self).query(text, channel, action)
    }
}

impl<T: CandidateSource + ?Sized> CandidateSource for &mut T {
    fn metadata(&self, text: &str, channel: &QueryChannel) -> Metadata {
        (**self).metadata(text, channel)
    }

    fn query(
        &mut self,
        text: &str,
        channel: &QueryChannel,
        action: CompletionAction,
    ) -> CompletionResult {
        (**self).query(text, channel, action)
    }
}

/// Probe a source's metadata with the caller's predicate.
///
/// Read-only; the orchestrator calls this exactly once per session with an
/// empty `text`.
pub fn probe_metadata(
    text: &str,
    source: &dyn CandidateSource,
    predicate: Option<&Predicate>,
) -> Metadata {
    let channel = QueryChannel::passthrough(predicate.cloned());
    source.metadata(text, &channel)
}

/// A fixed list of candidates.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    candidates: Vec<String>,
    category: Option<String>,
    options: MatchOptions,
}

impl StaticSource {
    /// Create a source over `candidates`.
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            category: None,
            options: MatchOptions::default(),
        }
    }

    /// Set the reported category (builder).
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set matching options (builder).
    #[must_use]
    pub fn with_match_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    /// The underlying candidates.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }
}

impl CandidateSource for StaticSource {
    fn metadata(&self, _text: &str, _channel: &QueryChannel) -> Metadata {
        Metadata {
            category: self.category.clone(),
            ..Metadata::default()
        }
    }

    fn query(
        &mut self,
        text: &str,
        channel: &QueryChannel,
        action: CompletionAction,
    ) -> CompletionResult {
        if action == CompletionAction::Metadata {
            return CompletionResult::Metadata(self.metadata(text, channel));
        }
        matching::complete_with_action(action, &self.candidates, text, channel, self.options)
    }
}

/// Candidates produced on demand for each query.
///
/// The producer sees the query text and may narrow its output up front;
/// standard matching is still applied to whatever it returns.
pub struct LazySource {
    producer: Box<dyn FnMut(&str) -> Vec<String> + Send>,
    category: Option<String>,
    options: MatchOptions,
}

impl LazySource {
    /// Create a source backed by `producer`.
    pub fn new(producer: impl FnMut(&str) -> Vec<String> + Send + 'static) -> Self {
        Self {
            producer: Box::new(producer),
            category: None,
            options: MatchOptions::default(),
        }
    }

    /// Set the reported category (builder).
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set matching options (builder).
    #[must_use]
    pub fn with_match_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }
}

impl fmt::Debug for LazySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySource")
            .field("category", &self.category)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CandidateSource for LazySource {
    fn metadata(&self, _text: &str, _channel: &QueryChannel) -> Metadata {
        Metadata {
            category: self.category.clone(),
            ..Metadata::default()
        }
    }

    fn query(
        &mut self,
        text: &str,
        channel: &QueryChannel,
        action: CompletionAction,
    ) -> CompletionResult {
        if action == CompletionAction::Metadata {
            return CompletionResult::Metadata(self.metadata(text, channel));
        }
        let candidates = (self.producer)(text);
        matching::complete_with_action(action, &candidates, text, channel, self.options)
    }
}
