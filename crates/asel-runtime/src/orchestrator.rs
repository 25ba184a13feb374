#![forbid(unsafe_code)]

//! The async selection orchestrator.
//!
//! [`AsyncSelect::run`] probes the source's metadata once. Synchronous sources
//! go straight to the delegate with a pass-through channel. Sources that name
//! a program get a session: a fresh [`OutputBuffer`], an optional
//! [`RefreshTicker`], and the running program, all owned by a guard that
//! releases them when the call ends.
//!
//! `AsyncSelect` is itself a [`SelectFn`], so it can serve as another
//! orchestrator's delegate. A nested session ticks the caller's
//! [`RedisplaySignal`] rather than a private one.
//!
//! # Session teardown
//!
//! The guard's `Drop` runs on normal return, on `?` propagation and during
//! panic unwinding. It always stops the ticker first, then kills and reaps the
//! program, then destroys the buffer. A spawn failure tears down whatever was
//! already acquired before the error is returned, and the delegate never runs.

use std::sync::Arc;

use asel_core::{
    AsyncSpec, CandidateSource, OutputBuffer, Predicate, QueryChannel, SelectError,
    probe_metadata,
};
use tracing::{debug, info_span, warn};

use crate::config::AsyncSelectConfig;
use crate::delegate::{SelectFn, SelectOptions, SelectRequest};
use crate::observer::{SessionEvent, SessionObserver};
use crate::process::ProcessHandle;
use crate::redisplay::RedisplaySignal;
use crate::ticker::RefreshTicker;

/// Selection entry point that backs async sources with a live program.
#[derive(Debug, Clone, Default)]
pub struct AsyncSelect {
    config: AsyncSelectConfig,
}

impl AsyncSelect {
    /// Create an orchestrator with `config`.
    pub fn new(config: AsyncSelectConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &AsyncSelectConfig {
        &self.config
    }

    /// Run one selection.
    ///
    /// # Errors
    ///
    /// [`SelectError::Spawn`] if the source's program cannot be started;
    /// otherwise whatever the delegate returns, unchanged.
    pub fn run(
        &self,
        prompt: &str,
        source: &mut dyn CandidateSource,
        predicate: Option<Predicate>,
        options: &SelectOptions,
    ) -> Result<String, SelectError> {
        self.run_with_redisplay(prompt, source, predicate, options, &RedisplaySignal::new())
    }

    /// Run one selection, ticking `redisplay` for the delegate's surface.
    fn run_with_redisplay(
        &self,
        prompt: &str,
        source: &mut dyn CandidateSource,
        predicate: Option<Predicate>,
        options: &SelectOptions,
        redisplay: &RedisplaySignal,
    ) -> Result<String, SelectError> {
        let metadata = probe_metadata("", &*source, predicate.as_ref());

        let Some(spec) = metadata.async_spec else {
            debug!(prompt, "synchronous source; delegating directly");
            let channel = QueryChannel::passthrough(predicate);
            return self.config.delegate.select(SelectRequest {
                prompt,
                source,
                channel: &channel,
                options,
                redisplay,
            });
        };

        let _span = info_span!("asel.session", program = %spec.program).entered();
        let session = SessionGuard::open(&spec, &self.config, redisplay)?;
        let channel = QueryChannel::with_buffer(predicate, session.buffer.clone());

        let result = self.config.delegate.select(SelectRequest {
            prompt,
            source,
            channel: &channel,
            options,
            redisplay,
        });
        match &result {
            Ok(choice) => debug!(choice = %choice, "selection accepted"),
            Err(err) if err.is_cancelled() => debug!("selection cancelled"),
            Err(err) => warn!(error = %err, "selection failed"),
        }

        drop(session);
        result
    }
}

/// Nested use: the session ticks the caller's redisplay signal, so an outer
/// surface redraws while the inner program streams.
impl SelectFn for AsyncSelect {
    fn select(&self, request: SelectRequest<'_>) -> Result<String, SelectError> {
        let predicate = request.channel.predicate().cloned();
        self.run_with_redisplay(
            request.prompt,
            request.source,
            predicate,
            request.options,
            request.redisplay,
        )
    }
}

/// Run one selection with the default configuration.
///
/// # Errors
///
/// See [`AsyncSelect::run`].
pub fn async_select(
    prompt: &str,
    source: &mut dyn CandidateSource,
    predicate: Option<Predicate>,
    options: &SelectOptions,
) -> Result<String, SelectError> {
    AsyncSelect::default().run(prompt, source, predicate, options)
}

/// Owns every resource of one async session.
struct SessionGuard {
    buffer: OutputBuffer,
    ticker: Option<RefreshTicker>,
    process: Option<ProcessHandle>,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl SessionGuard {
    fn open(
        spec: &AsyncSpec,
        config: &AsyncSelectConfig,
        redisplay: &RedisplaySignal,
    ) -> Result<Self, SelectError> {
        let mut guard = Self {
            buffer: OutputBuffer::new(),
            ticker: None,
            process: None,
            observer: config.observer.clone(),
        };
        debug!(buffer = guard.buffer.id(), "output buffer allocated");
        guard.emit(SessionEvent::BufferAllocated {
            buffer: guard.buffer.id(),
        });

        if let Some(action) = config.refresh.bind(redisplay) {
            match RefreshTicker::start(config.refresh_period, action) {
                Ok(ticker) => {
                    guard.ticker = Some(ticker);
                    guard.emit(SessionEvent::TickerStarted {
                        period: config.refresh_period,
                    });
                }
                Err(err) => warn!(error = %err, "refresh ticker unavailable; continuing without"),
            }
        }

        match ProcessHandle::spawn(spec, guard.buffer.clone()) {
            Ok(process) => {
                guard.emit(SessionEvent::ProcessSpawned { pid: process.pid() });
                guard.process = Some(process);
                Ok(guard)
            }
            Err(source) => {
                warn!(program = %spec.program, error = %source, "failed to spawn candidate program");
                guard.emit(SessionEvent::SpawnFailed {
                    kind: source.kind(),
                });
                Err(SelectError::Spawn {
                    program: spec.program.clone(),
                    source,
                })
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            let ticks = ticker.stop();
            self.emit(SessionEvent::TickerStopped { ticks });
        }

        if let Some(mut process) = self.process.take() {
            let pid = process.pid();
            match process.terminate() {
                Ok(done) => self.emit(SessionEvent::ProcessReaped {
                    pid,
                    exit_code: done.status.code(),
                    killed: done.killed,
                }),
                Err(err) => warn!(pid, error = %err, "failed to reap candidate program"),
            }
        }

        let bytes = self.buffer.destroy();
        debug!(buffer = self.buffer.id(), bytes, "output buffer destroyed");
        self.emit(SessionEvent::BufferDestroyed {
            buffer: self.buffer.id(),
            bytes,
        });
    }
}
