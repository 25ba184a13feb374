#![forbid(unsafe_code)]

//! Periodic refresh ticker.
//!
//! A [`RefreshTicker`] runs a refresh action on a background thread every
//! `period` until stopped. The orchestrator starts one per async session
//! (unless refresh is disabled) and stops it unconditionally when the
//! session ends.
//!
//! # Invariants
//!
//! 1. After [`stop`](RefreshTicker::stop) returns, the action is never
//!    invoked again and the thread has exited.
//! 2. Stopping wakes the thread immediately; it does not wait out the
//!    remainder of a period.
//! 3. [`is_running`](RefreshTicker::is_running) turns false even if the
//!    action panics.
//! 4. A zero period is rejected instead of spinning.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// The action a ticker runs on every tick.
pub type TickAction = Arc<dyn Fn() + Send + Sync>;

/// Stop flag shared between the ticker handle and its thread.
#[derive(Debug, Default)]
struct StopState {
    stopped: Mutex<bool>,
    cvar: Condvar,
}

impl StopState {
    fn trigger(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        *stopped = true;
        self.cvar.notify_all();
    }

    /// Wait for either the stop signal or `period`. Returns `true` if stopped.
    fn wait_timeout(&self, period: Duration) -> bool {
        let deadline = Instant::now() + period;
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if *stopped {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cvar
                .wait_timeout(stopped, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            stopped = guard;
        }
    }
}

/// Clears the running flag when the ticker thread exits, however it exits.
struct RunningFlag(Arc<AtomicBool>);

impl Drop for RunningFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A repeating timer bound to one refresh action.
#[derive(Debug)]
pub struct RefreshTicker {
    period: Duration,
    stop: Arc<StopState>,
    ticks: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RefreshTicker {
    /// Start ticking every `period`.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::InvalidInput`] for a zero period, or the
    /// spawn error if the ticker thread cannot be started.
    pub fn start(period: Duration, action: TickAction) -> io::Result<Self> {
        if period.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "refresh period must be positive",
            ));
        }
        let stop = Arc::new(StopState::default());
        let ticks = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));

        let thread = {
            let stop = Arc::clone(&stop);
            let ticks = Arc::clone(&ticks);
            let flag = RunningFlag(Arc::clone(&running));
            thread::Builder::new()
                .name("asel-refresh".into())
                .spawn(move || {
                    let _flag = flag;
                    tracing::trace!(period_ms = period.as_millis() as u64, "refresh ticker started");
                    while !stop.wait_timeout(period) {
                        ticks.fetch_add(1, Ordering::Relaxed);
                        action();
                    }
                    tracing::trace!(
                        ticks = ticks.load(Ordering::Relaxed),
                        "refresh ticker stopped"
                    );
                })?
        };

        Ok(Self {
            period,
            stop,
            ticks,
            running,
            thread: Some(thread),
        })
    }

    /// Tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks fired so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Whether the ticker thread is still alive.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the ticker and join its thread. Returns the total tick count.
    pub fn stop(mut self) -> u64 {
        self.shutdown();
        self.ticks()
    }

    fn shutdown(&mut self) {
        self.stop.trigger();
        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            tracing::warn!("refresh action panicked");
        }
    }
}

impl Drop for RefreshTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_action() -> (TickAction, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        let action: TickAction = Arc::new(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        (action, count)
    }

    #[test]
    fn ticks_repeatedly_until_stopped() {
        let (action, count) = counting_action();
        let ticker = RefreshTicker::start(Duration::from_millis(5), action).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let ticks = ticker.stop();
        assert!(ticks >= 3, "expected at least 3 ticks, got {ticks}");
        assert_eq!(ticks as usize, count.load(Ordering::SeqCst));
    }

    #[test]
    fn no_ticks_after_stop() {
        let (action, count) = counting_action();
        let ticker = RefreshTicker::start(Duration::from_millis(5), action).unwrap();
        thread::sleep(Duration::from_millis(20));
        ticker.stop();
        let after_stop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn stop_wakes_long_period_immediately() {
        let (action, count) = counting_action();
        let ticker = RefreshTicker::start(Duration::from_secs(60), action).unwrap();
        let started = Instant::now();
        assert_eq!(ticker.stop(), 0);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn running_flag_clears_on_drop() {
        let (action, _count) = counting_action();
        let ticker = RefreshTicker::start(Duration::from_millis(50), action).unwrap();
        let running = Arc::clone(&ticker.running);
        assert!(ticker.is_running());
        drop(ticker);
        assert!(!running.load(Ordering::Acquire));
    }

    #[test]
    fn panicking_action_clears_running_flag() {
        let action: TickAction = Arc::new(|| panic!("refresh failed"));
        let ticker = RefreshTicker::start(Duration::from_millis(1), action).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while ticker.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!ticker.is_running());
        assert_eq!(ticker.stop(), 1);
    }

    #[test]
    fn zero_period_is_rejected() {
        let (action, count) = counting_action();
        let err = RefreshTicker::start(Duration::ZERO, action).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn period_is_reported() {
        let (action, _count) = counting_action();
        let ticker = RefreshTicker::start(Duration::from_millis(300), action).unwrap();
        assert_eq!(ticker.period(), Duration::from_millis(300));
        ticker.stop();
    }
}
