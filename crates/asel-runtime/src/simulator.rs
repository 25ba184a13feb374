#![forbid(unsafe_code)]

//! Headless scripted selection for tests.
//!
//! [`ScriptedSelect`] drives a [`PickerState`] through a fixed list of
//! [`ScriptStep`]s instead of reading a terminal. After every step it records
//! a [`Snapshot`] into a shared [`Transcript`] that the test keeps a handle to,
//! so the outcome can be inspected after the delegate has been moved into a
//! configuration.
//!
//! # Example
//!
//! ```ignore
//! let script = ScriptedSelect::new([
//!     ScriptStep::wait_for_candidates(3),
//!     ScriptStep::Type("y".into()),
//!     ScriptStep::Accept,
//! ]);
//! let transcript = script.transcript();
//! let select = AsyncSelect::new(AsyncSelectConfig::default().with_delegate(script));
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use asel_core::{OutputBuffer, SelectError};

use crate::delegate::{SelectFn, SelectRequest};
use crate::picker::{PickerKey, PickerOutcome, PickerState};

const POLL_INTERVAL: Duration = Duration::from_millis(5);
const DEFAULT_WAIT: Duration = Duration::from_secs(5);
const DEFAULT_HEIGHT: usize = 10;

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Type each character.
    Type(String),
    /// Press one key.
    Key(PickerKey),
    /// Re-read candidates as a redisplay would.
    Refresh,
    /// Refresh until at least `count` candidates are listed.
    WaitForCandidates { count: usize, timeout: Duration },
    /// Block until the refresh ticker requests a redisplay, then refresh.
    WaitForRedisplay(Duration),
    /// Highlight a candidate by index.
    Select(usize),
    /// Press Enter.
    Accept,
    /// Press Esc.
    Cancel,
    /// Return a delegate error with this message.
    Fail(String),
    /// Panic with this message.
    Panic(String),
}

impl ScriptStep {
    /// Wait for `count` candidates with the default timeout.
    pub fn wait_for_candidates(count: usize) -> Self {
        Self::WaitForCandidates {
            count,
            timeout: DEFAULT_WAIT,
        }
    }

    /// Wait for one redisplay request with the default timeout.
    pub fn wait_for_redisplay() -> Self {
        Self::WaitForRedisplay(DEFAULT_WAIT)
    }
}

/// Picker state captured after a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub step: usize,
    pub query: String,
    pub cursor: usize,
    pub candidates: Vec<String>,
    pub selected: Option<String>,
    pub status: Option<&'static str>,
}

impl Snapshot {
    fn capture(step: usize, state: &PickerState) -> Self {
        Self {
            step,
            query: state.query().to_owned(),
            cursor: state.cursor(),
            candidates: state.candidates().to_vec(),
            selected: state.selected_candidate().map(str::to_owned),
            status: state.status(),
        }
    }
}

#[derive(Debug, Default)]
struct TranscriptState {
    snapshots: Vec<Snapshot>,
    buffer: Option<OutputBuffer>,
    redisplays: usize,
}

/// Shared record of what a [`ScriptedSelect`] saw.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    inner: Arc<Mutex<TranscriptState>>,
}

impl Transcript {
    fn with<R>(&self, f: impl FnOnce(&mut TranscriptState) -> R) -> R {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Every snapshot, in step order.
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.with(|s| s.snapshots.clone())
    }

    /// The most recent snapshot.
    pub fn last(&self) -> Option<Snapshot> {
        self.with(|s| s.snapshots.last().cloned())
    }

    /// The session buffer handed over by the channel, if any.
    pub fn buffer(&self) -> Option<OutputBuffer> {
        self.with(|s| s.buffer.clone())
    }

    /// Redisplay requests consumed.
    pub fn redisplays(&self) -> usize {
        self.with(|s| s.redisplays)
    }
}

/// Delegate that plays a script against a [`PickerState`].
#[derive(Debug, Clone)]
pub struct ScriptedSelect {
    steps: Vec<ScriptStep>,
    height: usize,
    transcript: Transcript,
}

impl ScriptedSelect {
    /// Create a delegate playing `steps`.
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            height: DEFAULT_HEIGHT,
            transcript: Transcript::default(),
        }
    }

    /// Set the viewport height (builder).
    #[must_use]
    pub fn with_height(mut self, height: usize) -> Self {
        self.height = height;
        self
    }

    /// Handle to the recording of every run.
    pub fn transcript(&self) -> Transcript {
        self.transcript.clone()
    }
}

impl SelectFn for ScriptedSelect {
    fn select(&self, request: SelectRequest<'_>) -> Result<String, SelectError> {
        let SelectRequest {
            source,
            channel,
            options,
            redisplay,
            ..
        } = request;
        let _surface = redisplay.attach();

        let mut state = PickerState::new(options, self.height);
        state.refresh(source, channel);
        self.transcript.with(|s| {
            s.buffer = channel.output_buffer();
            s.snapshots.push(Snapshot::capture(0, &state));
        });

        for (index, step) in self.steps.iter().enumerate() {
            let outcome = match step {
                ScriptStep::Type(text) => {
                    let mut outcome = PickerOutcome::Continue;
                    for c in text.chars() {
                        outcome = state.handle_key(PickerKey::Char(c), source, channel);
                    }
                    outcome
                }
                ScriptStep::Key(key) => state.handle_key(*key, source, channel),
                ScriptStep::Refresh => {
                    state.refresh(source, channel);
                    PickerOutcome::Continue
                }
                ScriptStep::WaitForCandidates { count, timeout } => {
                    let deadline = Instant::now() + *timeout;
                    state.refresh(source, channel);
                    while state.candidates().len() < *count {
                        if Instant::now() >= deadline {
                            return Err(SelectError::delegate(format!(
                                "timed out waiting for {count} candidates (have {})",
                                state.candidates().len()
                            )));
                        }
                        thread::sleep(POLL_INTERVAL);
                        state.refresh(source, channel);
                    }
                    PickerOutcome::Continue
                }
                ScriptStep::WaitForRedisplay(timeout) => {
                    if !redisplay.wait_timeout(*timeout) {
                        return Err(SelectError::delegate("no redisplay request arrived"));
                    }
                    self.transcript.with(|s| s.redisplays += 1);
                    state.refresh(source, channel);
                    PickerOutcome::Continue
                }
                ScriptStep::Select(i) => {
                    state.select_index(*i);
                    PickerOutcome::Continue
                }
                ScriptStep::Accept => state.handle_key(PickerKey::Accept, source, channel),
                ScriptStep::Cancel => state.handle_key(PickerKey::Cancel, source, channel),
                ScriptStep::Fail(message) => return Err(SelectError::delegate(message.clone())),
                ScriptStep::Panic(message) => panic!("{message}"),
            };

            self.transcript
                .with(|s| s.snapshots.push(Snapshot::capture(index + 1, &state)));

            match outcome {
                PickerOutcome::Continue => {}
                PickerOutcome::Accept(choice) => return Ok(choice),
                PickerOutcome::Cancel => return Err(SelectError::Cancelled),
            }
        }

        tracing::debug!("script ended without a choice");
        Err(SelectError::Cancelled)
    }
}
