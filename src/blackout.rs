//! Blackout window for upstream availability

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Default cool-down after a failed connect.
pub const DEFAULT_BLACKOUT: Duration = Duration::from_secs(30);

/// Availability gate a [`ResourceFactory`](crate::ResourceFactory) can use to
/// implement `is_available`.
///
/// After a failure the upstream is presumed unavailable until the blackout
/// window has elapsed.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::Blackout;
/// use std::time::Duration;
///
/// let blackout = Blackout::new(Duration::from_secs(60));
/// assert!(blackout.is_available());
///
/// blackout.record_failure();
/// assert!(!blackout.is_available());
/// assert_eq!(blackout.failure_count(), 1);
///
/// blackout.record_success();
/// assert!(blackout.is_available());
/// ```
#[derive(Debug)]
pub struct Blackout {
    window: Mutex<Duration>,
    last_failure: Mutex<Option<Instant>>,
    failure_count: AtomicUsize,
}

impl Blackout {
    pub fn new(window: Duration) -> Self {
        Self {
            window: Mutex::new(window),
            last_failure: Mutex::new(None),
            failure_count: AtomicUsize::new(0),
        }
    }

    /// True unless a failure was recorded within the current window.
    pub fn is_available(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Time left until the upstream is presumed available again.
    pub fn remaining(&self) -> Duration {
        let window = *self.window.lock();
        match *self.last_failure.lock() {
            Some(at) => window.saturating_sub(at.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Start a new blackout window.
    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        *self.last_failure.lock() = Some(Instant::now());
    }

    /// End any running blackout.
    pub fn record_success(&self) {
        *self.last_failure.lock() = None;
    }

    pub fn failure_count(&self) -> usize {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn window(&self) -> Duration {
        *self.window.lock()
    }

    pub fn set_window(&self, window: Duration) {
        *self.window.lock() = window;
    }
}

impl Default for Blackout {
    fn default() -> Self {
        Self::new(DEFAULT_BLACKOUT)
    }
}
