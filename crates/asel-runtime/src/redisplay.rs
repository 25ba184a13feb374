#![forbid(unsafe_code)]

//! Redisplay requests from the refresh ticker to a selection surface.
//!
//! A selection surface [`attach`](RedisplaySignal::attach)es for as long as
//! it is on screen. The default refresh action calls
//! [`request_if_attached`](RedisplaySignal::request_if_attached) from the
//! ticker thread; the surface consumes the request at its next idle point
//! with [`take`](RedisplaySignal::take) or
//! [`wait_timeout`](RedisplaySignal::wait_timeout) and recomputes its list.
//! A request only sets a flag, so it never runs concurrently with a
//! candidate-source read.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct RedisplayState {
    surfaces: AtomicUsize,
    requests: AtomicU64,
    pending: Mutex<bool>,
    cvar: Condvar,
}

/// Shared redisplay flag for one selection session.
#[derive(Debug, Clone, Default)]
pub struct RedisplaySignal {
    inner: Arc<RedisplayState>,
}

/// Keeps a surface registered as active; detaches on drop.
#[derive(Debug)]
pub struct SurfaceGuard {
    inner: Arc<RedisplayState>,
}

impl Drop for SurfaceGuard {
    fn drop(&mut self) {
        self.inner.surfaces.fetch_sub(1, Ordering::AcqRel);
    }
}

impl RedisplaySignal {
    /// Create a signal with no attached surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active selection surface.
    pub fn attach(&self) -> SurfaceGuard {
        self.inner.surfaces.fetch_add(1, Ordering::AcqRel);
        SurfaceGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Whether a surface is currently active.
    pub fn is_attached(&self) -> bool {
        self.inner.surfaces.load(Ordering::Acquire) > 0
    }

    /// Ask the surface to recompute and redraw.
    pub fn request(&self) {
        let mut pending = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *pending = true;
        self.inner.requests.fetch_add(1, Ordering::Relaxed);
        self.inner.cvar.notify_all();
    }

    /// Request a redisplay only while a surface is active.
    ///
    /// Returns whether a request was made.
    pub fn request_if_attached(&self) -> bool {
        if !self.is_attached() {
            return false;
        }
        self.request();
        true
    }

    /// Consume a pending request without blocking.
    pub fn take(&self) -> bool {
        let mut pending = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *pending)
    }

    /// Block until a request arrives or `timeout` elapses, consuming it.
    ///
    /// Returns `true` if a request was consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if *pending {
                *pending = false;
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .inner
                .cvar
                .wait_timeout(pending, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            pending = guard;
        }
    }

    /// Total requests made over the signal's lifetime.
    pub fn request_count(&self) -> u64 {
        self.inner.requests.load(Ordering::Relaxed)
    }
}
