#![forbid(unsafe_code)]

//! Session output buffer.
//!
//! An [`OutputBuffer`] is the append-only byte region a background process
//! writes its stdout into. The orchestrator allocates one per async session
//! and destroys it when the session ends; candidate sources only ever see it
//! through the [`QueryChannel`](crate::QueryChannel).
//!
//! # Invariants
//!
//! 1. Bytes are never mutated or removed once appended (until destruction).
//! 2. Reads are clamped: a reader's cursor can never point past the end.
//! 3. After [`destroy`](OutputBuffer::destroy), appends are rejected and
//!    reads yield nothing.
//!
//! The handle is cheap to clone; every clone observes the same state. A
//! mutex serializes the reader thread's appends against adapter reads, so a
//! refresh callback on another thread can never observe a half-written
//! append.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct BufferState {
    bytes: Vec<u8>,
    finished: bool,
    destroyed: bool,
}

/// Shared handle to a session's output buffer.
#[derive(Clone)]
pub struct OutputBuffer {
    id: u64,
    inner: Arc<Mutex<BufferState>>,
}

/// Bytes read from a buffer starting at a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferChunk {
    /// Offset the chunk starts at (the clamped cursor).
    pub start: usize,
    /// Bytes from `start` to the buffer's end at the time of the read.
    pub bytes: Vec<u8>,
    /// Whether the producer had reached end-of-stream when this was read.
    pub finished: bool,
}

impl BufferChunk {
    /// Offset one past the last byte of this chunk.
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.bytes.len()
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBuffer {
    /// Allocate an empty buffer.
    pub fn new() -> Self {
        Self {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            inner: Arc::new(Mutex::new(BufferState::default())),
        }
    }

    /// Process-unique identifier, used for log correlation.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append bytes to the end of the buffer.
    ///
    /// Returns `false` (and stores nothing) once the buffer is destroyed or
    /// finished, which tells a producer to stop.
    pub fn append(&self, bytes: &[u8]) -> bool {
        let mut state = self.lock();
        if state.destroyed || state.finished {
            return false;
        }
        state.bytes.extend_from_slice(bytes);
        true
    }

    /// Mark end-of-stream. Later appends are rejected.
    pub fn finish(&self) {
        self.lock().finished = true;
    }

    /// Release the buffer's contents. Returns how many bytes were released.
    ///
    /// Idempotent: destroying twice releases nothing the second time.
    pub fn destroy(&self) -> usize {
        let mut state = self.lock();
        if state.destroyed {
            return 0;
        }
        state.destroyed = true;
        state.finished = true;
        let released = state.bytes.len();
        state.bytes = Vec::new();
        released
    }

    /// Current length in bytes.
    pub fn len(&self) -> usize {
        self.lock().bytes.len()
    }

    /// Whether no bytes have been appended (or the buffer is destroyed).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the producer reached end-of-stream.
    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    /// Whether the owning session has torn this buffer down.
    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    /// Copy out everything from `cursor` to the current end.
    ///
    /// `cursor` is clamped to the buffer's end. Returns `None` once the
    /// buffer has been destroyed.
    pub fn read_from(&self, cursor: usize) -> Option<BufferChunk> {
        let state = self.lock();
        if state.destroyed {
            return None;
        }
        let start = cursor.min(state.bytes.len());
        Some(BufferChunk {
            start,
            bytes: state.bytes[start..].to_vec(),
            finished: state.finished,
        })
    }

    /// Copy of the whole buffer.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().bytes.clone()
    }

    /// Whether two handles refer to the same buffer.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("OutputBuffer")
            .field("id", &self.id)
            .field("len", &state.bytes.len())
            .field("finished", &state.finished)
            .field("destroyed", &state.destroyed)
            .finish()
    }
}
