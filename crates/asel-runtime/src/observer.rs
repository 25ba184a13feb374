#![forbid(unsafe_code)]

//! Session lifecycle events.
//!
//! The orchestrator reports every resource it acquires and releases to an
//! optional [`SessionObserver`]. Tests use [`RecordingObserver`] to check
//! that each session releases what it acquired; applications can forward
//! events to their own diagnostics.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// A resource lifecycle step within one async session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Output buffer allocated.
    BufferAllocated { buffer: u64 },
    /// Refresh ticker started.
    TickerStarted { period: Duration },
    /// External program running.
    ProcessSpawned { pid: u32 },
    /// External program failed to start.
    SpawnFailed { kind: std::io::ErrorKind },
    /// Refresh ticker stopped and joined.
    TickerStopped { ticks: u64 },
    /// External program killed (if still running) and reaped.
    ProcessReaped {
        pid: u32,
        exit_code: Option<i32>,
        killed: bool,
    },
    /// Output buffer destroyed.
    BufferDestroyed { buffer: u64, bytes: usize },
}

/// Receives [`SessionEvent`]s.
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

impl<F> SessionObserver for F
where
    F: Fn(&SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: &SessionEvent) {
        self(event);
    }
}

/// Observer that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the events recorded so far.
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget recorded events.
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Pid of the first spawned process, if any.
    pub fn spawned_pid(&self) -> Option<u32> {
        self.events().iter().find_map(|e| match e {
            SessionEvent::ProcessSpawned { pid } => Some(*pid),
            _ => None,
        })
    }
}

impl SessionObserver for RecordingObserver {
    fn on_event(&self, event: &SessionEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
