#![forbid(unsafe_code)]

//! Lines-from-process candidate source.
//!
//! [`LinesFromProcess`] declares itself asynchronous, naming a program to
//! run. When queried inside an async session it pulls the session buffer off
//! the [`QueryChannel`], parses whatever arrived since its last poll into
//! lines, and matches over everything collected so far.
//!
//! # Invariants
//!
//! 1. Each byte of output is parsed exactly once; the private cursor only
//!    moves forward and never past the buffer's end.
//! 2. Only complete lines (terminated by `\n`) are surfaced while the
//!    producer is running.
//! 3. An unterminated final line is surfaced once, after the producer
//!    reached end-of-stream.
//! 4. Empty lines are dropped and a trailing `\r` is stripped.
//! 5. Polling a buffer from a new session restarts parsing from its first
//!    byte and drops the lines collected from the previous one.

use memchr::memrchr;

use crate::buffer::OutputBuffer;
use crate::channel::QueryChannel;
use crate::matching::{self, MatchOptions};
use crate::metadata::{AsyncSpec, Metadata};
use crate::source::{CandidateSource, CompletionAction, CompletionResult};

/// Category reported by [`LinesFromProcess`].
pub const LINES_FROM_PROCESS_CATEGORY: &str = "lines-from-process";

/// Candidates are the stdout lines of a program.
#[derive(Debug, Clone)]
pub struct LinesFromProcess {
    spec: AsyncSpec,
    /// Id of the buffer `cursor` points into.
    buffer: Option<u64>,
    cursor: usize,
    lines: Vec<String>,
    options: MatchOptions,
}

/// Build a [`LinesFromProcess`] source for `program args...`.
pub fn lines_from_process<I, S>(program: impl Into<String>, args: I) -> LinesFromProcess
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    LinesFromProcess::new(AsyncSpec::new(program, args))
}

impl LinesFromProcess {
    /// Create a source that runs `spec`.
    pub fn new(spec: AsyncSpec) -> Self {
        Self {
            spec,
            buffer: None,
            cursor: 0,
            lines: Vec::new(),
            options: MatchOptions::default(),
        }
    }

    /// Set matching options (builder).
    #[must_use]
    pub fn with_match_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    /// The program this source runs.
    pub fn spec(&self) -> &AsyncSpec {
        &self.spec
    }

    /// How far into the buffer this source has parsed.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Every line collected so far, in arrival order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Parse whatever is new in `buffer`. Returns the number of lines added.
    pub fn poll(&mut self, buffer: &OutputBuffer) -> usize {
        if self.buffer != Some(buffer.id()) {
            if let Some(previous) = self.buffer {
                tracing::debug!(
                    previous,
                    buffer = buffer.id(),
                    dropped = self.lines.len(),
                    "new session buffer; restarting parse"
                );
            }
            self.buffer = Some(buffer.id());
            self.cursor = 0;
            self.lines.clear();
        }

        let Some(chunk) = buffer.read_from(self.cursor) else {
            tracing::trace!(buffer = buffer.id(), "poll on destroyed buffer");
            return 0;
        };
        if chunk.bytes.is_empty() {
            return 0;
        }

        let complete = memrchr(b'\n', &chunk.bytes).map_or(0, |i| i + 1);
        let mut added = self.push_lines(&chunk.bytes[..complete]);
        let mut consumed = complete;

        if chunk.finished && complete < chunk.bytes.len() {
            added += self.push_lines(&chunk.bytes[complete..]);
            consumed = chunk.bytes.len();
        }

        self.cursor = chunk.start + consumed;
        if added > 0 {
            tracing::trace!(
                buffer = buffer.id(),
                added,
                total = self.lines.len(),
                cursor = self.cursor,
                "parsed new lines"
            );
        }
        added
    }

    fn push_lines(&mut self, bytes: &[u8]) -> usize {
        let before = self.lines.len();
        for raw in bytes.split(|&b| b == b'\n') {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            if raw.is_empty() {
                continue;
            }
            self.lines.push(String::from_utf8_lossy(raw).into_owned());
        }
        self.lines.len() - before
    }
}

impl CandidateSource for LinesFromProcess {
    fn metadata(&self, _text: &str, _channel: &QueryChannel) -> Metadata {
        Metadata::new()
            .with_async(self.spec.clone())
            .with_category(LINES_FROM_PROCESS_CATEGORY)
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
        match channel.output_buffer() {
            Some(buffer) => {
                self.poll(&buffer);
            }
            None => tracing::debug!(program = %self.spec.program, "queried outside an async session"),
        }
        matching::complete_with_action(action, &self.lines, text, channel, self.options)
    }
}
