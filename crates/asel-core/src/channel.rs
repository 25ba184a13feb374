#![forbid(unsafe_code)]

//! The query channel handed to a selection call.
//!
//! A selection function receives a [`QueryChannel`] where a plain filter
//! predicate would otherwise go. The channel answers two kinds of query:
//!
//! - [`ChannelQuery::OutputBuffer`], the reserved sentinel, yields the live
//!   session buffer when the channel was built for an async session;
//! - [`ChannelQuery::Candidate`] runs the caller's original predicate, or
//!   accepts when none was given.
//!
//! No other capability travels through the channel. A candidate whose text
//! happens to spell the sentinel is still just a candidate.

use std::fmt;
use std::sync::Arc;

use crate::buffer::OutputBuffer;

/// Caller-supplied candidate filter.
pub type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Wrap a closure as a [`Predicate`].
pub fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Predicate {
    Arc::new(f)
}

/// A query sent through the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelQuery<'a> {
    /// Reserved sentinel: ask for the session's output buffer.
    OutputBuffer,
    /// Ask whether a candidate passes the caller's predicate.
    Candidate(&'a str),
}

/// The channel's answer.
#[derive(Debug, Clone)]
pub enum ChannelReply {
    /// The live output buffer (only ever returned for the sentinel).
    Buffer(OutputBuffer),
    /// Predicate verdict.
    Accept(bool),
}

impl ChannelReply {
    /// Whether this reply is an acceptance.
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept(true))
    }
}

/// Narrow predicate-shaped channel passed to the delegate selection call.
#[derive(Clone, Default)]
pub struct QueryChannel {
    predicate: Option<Predicate>,
    buffer: Option<OutputBuffer>,
}

impl QueryChannel {
    /// A channel that only forwards to `predicate`.
    ///
    /// This is what a synchronous session hands the delegate.
    pub fn passthrough(predicate: Option<Predicate>) -> Self {
        Self {
            predicate,
            buffer: None,
        }
    }

    /// A channel for an async session: forwards to `predicate` and answers
    /// the sentinel with `buffer`.
    pub fn with_buffer(predicate: Option<Predicate>, buffer: OutputBuffer) -> Self {
        Self {
            predicate,
            buffer: Some(buffer),
        }
    }

    /// Answer a query.
    pub fn call(&self, query: ChannelQuery<'_>) -> ChannelReply {
        match query {
            ChannelQuery::OutputBuffer => match &self.buffer {
                Some(buffer) => ChannelReply::Buffer(buffer.clone()),
                None => ChannelReply::Accept(true),
            },
            ChannelQuery::Candidate(candidate) => ChannelReply::Accept(self.accepts(candidate)),
        }
    }

    /// The session buffer, if this channel belongs to an async session.
    pub fn output_buffer(&self) -> Option<OutputBuffer> {
        match self.call(ChannelQuery::OutputBuffer) {
            ChannelReply::Buffer(buffer) => Some(buffer),
            ChannelReply::Accept(_) => None,
        }
    }

    /// Apply the original predicate; accept when there is none.
    pub fn accepts(&self, candidate: &str) -> bool {
        self.predicate.as_ref().is_none_or(|p| p(candidate))
    }

    /// Whether the caller supplied a predicate.
    pub fn has_predicate(&self) -> bool {
        self.predicate.is_some()
    }

    /// The caller's original predicate.
    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }
}

impl fmt::Debug for QueryChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryChannel")
            .field("predicate", &self.predicate.is_some())
            .field("buffer", &self.buffer.as_ref().map(OutputBuffer::id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_returns_buffer_in_async_session() {
        let buffer = OutputBuffer::new();
        let channel = QueryChannel::with_buffer(None, buffer.clone());
        match channel.call(ChannelQuery::OutputBuffer) {
            ChannelReply::Buffer(b) => assert!(b.ptr_eq(&buffer)),
            other => panic!("expected buffer, got {other:?}"),
        }
        assert!(channel.output_buffer().is_some());
    }

    #[test]
    fn sentinel_without_session_is_plain_accept() {
        let channel = QueryChannel::passthrough(None);
        assert!(channel.call(ChannelQuery::OutputBuffer).is_accept());
        assert!(channel.output_buffer().is_none());
    }

    #[test]
    fn candidates_use_original_predicate() {
        let only_short = predicate(|s| s.len() < 4);
        let channel = QueryChannel::with_buffer(Some(only_short), OutputBuffer::new());
        assert!(channel.accepts("abc"));
        assert!(!channel.accepts("abcd"));
        assert!(matches!(
            channel.call(ChannelQuery::Candidate("abcdef")),
            ChannelReply::Accept(false)
        ));
    }

    #[test]
    fn candidates_accepted_without_predicate() {
        let channel = QueryChannel::with_buffer(None, OutputBuffer::new());
        assert!(!channel.has_predicate());
        assert!(channel.call(ChannelQuery::Candidate("anything")).is_accept());
    }

    #[test]
    fn sentinel_spelled_as_candidate_never_yields_buffer() {
        let rejects_all = predicate(|_| false);
        let channel = QueryChannel::with_buffer(Some(rejects_all), OutputBuffer::new());
        assert!(matches!(
            channel.call(ChannelQuery::Candidate("output-buffer")),
            ChannelReply::Accept(false)
        ));
    }

    #[test]
    fn debug_hides_closure() {
        let channel = QueryChannel::passthrough(Some(predicate(|_| true)));
        let dbg = format!("{channel:?}");
        assert!(dbg.contains("predicate: true"));
        assert!(dbg.contains("buffer: None"));
    }
}
