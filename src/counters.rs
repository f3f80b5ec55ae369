//! Small thread-safe accumulators used by the pool

use parking_lot::Mutex;
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct GaugeState {
    total: usize,
    peak: usize,
    current: usize,
}

/// Conditional gauge guarding admission of new resources.
///
/// `current` only grows through [`AdmissionGauge::increment_if`], which evaluates
/// the predicate and bumps the counters under one lock. `total` and `peak` are
/// monotonic until [`AdmissionGauge::reset_statistics`] is called.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::AdmissionGauge;
///
/// let gauge = AdmissionGauge::new();
/// assert!(gauge.increment_if(|current| current < 1));
/// assert!(!gauge.increment_if(|current| current < 1));
/// gauge.decrement();
/// assert_eq!(gauge.current(), 0);
/// assert_eq!(gauge.total(), 1);
/// assert_eq!(gauge.peak(), 1);
/// ```
#[derive(Debug, Default)]
pub struct AdmissionGauge {
    state: Mutex<GaugeState>,
}

impl AdmissionGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment `current` iff `condition(current)` holds.
    pub fn increment_if<P>(&self, condition: P) -> bool
    where
        P: FnOnce(usize) -> bool,
    {
        let mut state = self.state.lock();
        if condition(state.current) {
            state.current += 1;
            state.total += 1;
            state.peak = state.peak.max(state.current);
            true
        } else {
            false
        }
    }

    /// Increment unconditionally.
    pub fn increment(&self) {
        self.increment_if(|_| true);
    }

    /// Release one unit of capacity.
    pub fn decrement(&self) {
        let mut state = self.state.lock();
        state.current = state.current.saturating_sub(1);
    }

    pub fn current(&self) -> usize {
        self.state.lock().current
    }

    pub fn peak(&self) -> usize {
        self.state.lock().peak
    }

    pub fn total(&self) -> usize {
        self.state.lock().total
    }

    /// `current - value`, read under the gauge lock.
    pub fn current_minus(&self, value: usize) -> usize {
        self.state.lock().current.saturating_sub(value)
    }

    /// Rebase `total` and `peak` on the live count. `current` tracks real
    /// resources and is never cleared.
    pub fn reset_statistics(&self) {
        let mut state = self.state.lock();
        state.total = state.current;
        state.peak = state.current;
    }
}

#[derive(Debug, Default)]
struct RatioState {
    total: usize,
    hits: usize,
}

/// Hit/miss ratio counter.
#[derive(Debug, Default)]
pub struct HitRatio {
    state: Mutex<RatioState>,
}

impl HitRatio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, hit: bool) {
        let mut state = self.state.lock();
        state.total += 1;
        if hit {
            state.hits += 1;
        }
    }

    pub fn hits(&self) -> usize {
        self.state.lock().hits
    }

    pub fn total(&self) -> usize {
        self.state.lock().total
    }

    /// Percentage of hits, truncated to an integer in `0..=100`.
    pub fn ratio(&self) -> u32 {
        let state = self.state.lock();
        if state.total == 0 {
            0
        } else {
            (state.hits * 100 / state.total) as u32
        }
    }

    pub fn reset(&self) {
        *self.state.lock() = RatioState::default();
    }
}

#[derive(Debug, Default)]
struct StatsState {
    min: Option<Duration>,
    max: Duration,
    total: Duration,
    count: u32,
}

/// Min/avg/max tracker for durations.
#[derive(Debug, Default)]
pub struct DurationStats {
    state: Mutex<StatsState>,
}

impl DurationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, value: Duration) {
        let mut state = self.state.lock();
        state.min = Some(state.min.map_or(value, |min| min.min(value)));
        state.max = state.max.max(value);
        state.total = state.total.saturating_add(value);
        state.count = state.count.saturating_add(1);
    }

    /// Smallest recorded value, zero when nothing was recorded.
    pub fn minimum(&self) -> Duration {
        self.state.lock().min.unwrap_or_default()
    }

    pub fn average(&self) -> Duration {
        let state = self.state.lock();
        if state.count == 0 {
            Duration::ZERO
        } else {
            state.total / state.count
        }
    }

    pub fn maximum(&self) -> Duration {
        self.state.lock().max
    }

    pub fn count(&self) -> u32 {
        self.state.lock().count
    }

    pub fn reset(&self) {
        *self.state.lock() = StatsState::default();
    }
}
