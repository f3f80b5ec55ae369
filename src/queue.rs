//! Bounded, blocking, LRU-ordered holding area for idle resources
//!
//! The queue owns one mutex and one wait condition. Idle wrappers are kept in
//! a map keyed by `(last_used_at, id)` so the least recently used entry is
//! always handed out first. A generation counter, bumped by every
//! [`SlotQueue::drain`], invalidates wrappers that were checked out before the
//! drain: they are refused when offered back.

use crate::errors::{PoolError, PoolResult};
use crate::interrupt::{Interrupt, Wake};
use crate::wrapper::ResourceWrapper;

use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Metadata snapshot of one idle entry, see [`SlotQueue::copy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleEntry {
    pub id: u64,
    pub generation: u64,
    pub created_at: Instant,
    pub last_used_at: Instant,
}

struct QueueState<T> {
    idle: BTreeMap<(Instant, u64), ResourceWrapper<T>>,
    index: HashMap<u64, Instant>,
    generation: u64,
    next_id: u64,
    max_idle: Option<usize>,
    max_life: Option<Duration>,
    waiting: usize,
}

impl<T> QueueState<T> {
    fn pop_lru(&mut self) -> Option<ResourceWrapper<T>> {
        let (_, wrapper) = self.idle.pop_first()?;
        self.index.remove(&wrapper.id());
        Some(wrapper)
    }

    fn take(&mut self, id: u64) -> Option<ResourceWrapper<T>> {
        let last_used = self.index.remove(&id)?;
        self.idle.remove(&(last_used, id))
    }

    fn is_full(&self) -> bool {
        self.max_idle.is_some_and(|max| self.idle.len() >= max)
    }
}

struct Monitor<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
    shutdown: AtomicBool,
}

impl<T: Send> Wake for Monitor<T> {
    fn wake_all(&self) {
        let _state = self.state.lock();
        self.available.notify_all();
    }
}

/// Thread-safe holding area for idle resources.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::SlotQueue;
///
/// let queue = SlotQueue::new();
/// let wrapper = queue.wrap("connection").unwrap();
/// assert!(queue.offer(wrapper).is_ok());
/// assert_eq!(queue.size(), 1);
///
/// // A drain bumps the generation: wrappers issued before it are refused.
/// let wrapper = queue.poll().unwrap().unwrap();
/// queue.drain();
/// assert!(queue.offer(wrapper).is_err());
/// ```
pub struct SlotQueue<T> {
    monitor: Arc<Monitor<T>>,
}

impl<T: Send + 'static> SlotQueue<T> {
    /// Create an unbounded queue with no max-life.
    pub fn new() -> Self {
        Self::with_limits(None, None)
    }

    /// Create a queue holding at most `max_idle` entries, refusing wrappers
    /// older than `max_life`.
    pub fn with_limits(max_idle: Option<usize>, max_life: Option<Duration>) -> Self {
        Self {
            monitor: Arc::new(Monitor {
                state: Mutex::new(QueueState {
                    idle: BTreeMap::new(),
                    index: HashMap::new(),
                    generation: 0,
                    next_id: 0,
                    max_idle,
                    max_life,
                    waiting: 0,
                }),
                available: Condvar::new(),
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    /// Wrap a freshly created resource, stamping it with the current generation.
    ///
    /// Once the queue is shut down the resource is handed back; the caller
    /// must dispose of it.
    pub fn wrap(&self, resource: T) -> Result<ResourceWrapper<T>, T> {
        let mut state = self.monitor.state.lock();
        if self.is_shutdown() {
            return Err(resource);
        }
        let id = state.next_id;
        state.next_id += 1;
        Ok(ResourceWrapper::new(resource, id, state.generation))
    }

    /// Enqueue an idle wrapper and wake one waiter.
    ///
    /// A refused wrapper is handed back; the caller must destroy it.
    pub fn offer(&self, wrapper: ResourceWrapper<T>) -> Result<(), ResourceWrapper<T>> {
        let mut state = self.monitor.state.lock();
        if self.is_shutdown()
            || wrapper.should_close(state.generation, state.max_life)
            || state.is_full()
        {
            return Err(wrapper);
        }
        let key = (wrapper.last_used_at(), wrapper.id());
        state.index.insert(wrapper.id(), key.0);
        state.idle.insert(key, wrapper);
        self.monitor.available.notify_one();
        Ok(())
    }

    /// Remove the least recently used entry without blocking.
    pub fn poll(&self) -> PoolResult<Option<ResourceWrapper<T>>> {
        let mut state = self.monitor.state.lock();
        if self.is_shutdown() {
            return Err(PoolError::Closed);
        }
        Ok(state.pop_lru())
    }

    /// Block until an entry is available, `timeout` elapses or the queue
    /// shuts down. `None` waits indefinitely.
    pub fn poll_timeout(&self, timeout: Option<Duration>) -> PoolResult<ResourceWrapper<T>> {
        self.wait_for(timeout, None)
    }

    /// Like [`poll_timeout`](Self::poll_timeout), additionally failing with
    /// [`PoolError::Interrupted`] once `interrupt` is raised.
    pub fn poll_interruptible(
        &self,
        timeout: Option<Duration>,
        interrupt: &Interrupt,
    ) -> PoolResult<ResourceWrapper<T>> {
        self.wait_for(timeout, Some(interrupt))
    }

    fn wait_for(
        &self,
        timeout: Option<Duration>,
        interrupt: Option<&Interrupt>,
    ) -> PoolResult<ResourceWrapper<T>> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut state = self.monitor.state.lock();
        if let Some(interrupt) = interrupt {
            let weak: Weak<dyn Wake> = Arc::downgrade(&self.monitor) as Weak<dyn Wake>;
            interrupt.park(weak);
        }

        let result = loop {
            if self.is_shutdown() {
                break Err(PoolError::Closed);
            }
            if let Some(wrapper) = state.pop_lru() {
                break Ok(wrapper);
            }
            if interrupt.is_some_and(Interrupt::take) {
                // hand any signal we may have absorbed to another waiter
                self.monitor.available.notify_one();
                break Err(PoolError::Interrupted);
            }

            state.waiting += 1;
            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        state.waiting -= 1;
                        break Err(PoolError::Timeout(timeout.unwrap_or_default()));
                    }
                    self.monitor.available.wait_until(&mut state, deadline);
                }
                None => self.monitor.available.wait(&mut state),
            }
            state.waiting -= 1;
        };

        if let Some(interrupt) = interrupt {
            interrupt.unpark();
        }
        result
    }

    /// Remove a specific idle entry. Returns `None` if a borrower already took it.
    pub fn remove(&self, id: u64) -> Option<ResourceWrapper<T>> {
        self.monitor.state.lock().take(id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.monitor.state.lock().index.contains_key(&id)
    }

    /// Empty the queue and bump the generation. The caller destroys the result.
    pub fn drain(&self) -> Vec<ResourceWrapper<T>> {
        let mut state = self.monitor.state.lock();
        state.generation += 1;
        state.index.clear();
        std::mem::take(&mut state.idle).into_values().collect()
    }

    /// Remove entries that are stale, past max-life, or idle longer than
    /// `max_idle_time`. The caller destroys the result.
    pub fn purge(&self, max_idle_time: Option<Duration>) -> Vec<ResourceWrapper<T>> {
        let mut state = self.monitor.state.lock();
        let (generation, max_life) = (state.generation, state.max_life);
        let expired: Vec<(Instant, u64)> = state
            .idle
            .iter()
            .filter(|(_, w)| w.should_close_idle(generation, max_life, max_idle_time))
            .map(|(key, _)| *key)
            .collect();

        expired
            .into_iter()
            .filter_map(|key| {
                state.index.remove(&key.1);
                state.idle.remove(&key)
            })
            .collect()
    }

    /// Snapshot of the idle entries in LRU order.
    pub fn copy(&self) -> Vec<IdleEntry> {
        let state = self.monitor.state.lock();
        state
            .idle
            .values()
            .map(|w| IdleEntry {
                id: w.id(),
                generation: w.generation(),
                created_at: w.created_at(),
                last_used_at: w.last_used_at(),
            })
            .collect()
    }

    /// Refuse further offers and release every waiter with [`PoolError::Closed`].
    pub fn shutdown(&self) {
        let _state = self.monitor.state.lock();
        self.monitor.shutdown.store(true, Ordering::SeqCst);
        self.monitor.available.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.monitor.shutdown.load(Ordering::SeqCst)
    }

    pub fn size(&self) -> usize {
        self.monitor.state.lock().idle.len()
    }

    /// Number of callers blocked in a timed or indefinite poll.
    pub fn waiting_count(&self) -> usize {
        self.monitor.state.lock().waiting
    }

    /// Free idle slots before max-idle is reached; `usize::MAX` when unbounded.
    pub fn remaining_capacity(&self) -> usize {
        let state = self.monitor.state.lock();
        state
            .max_idle
            .map_or(usize::MAX, |max| max.saturating_sub(state.idle.len()))
    }

    pub fn generation(&self) -> u64 {
        self.monitor.state.lock().generation
    }

    pub fn max_idle(&self) -> Option<usize> {
        self.monitor.state.lock().max_idle
    }

    pub fn set_max_idle(&self, max_idle: Option<usize>) {
        self.monitor.state.lock().max_idle = max_idle;
    }

    pub fn max_life(&self) -> Option<Duration> {
        self.monitor.state.lock().max_life
    }

    pub fn set_max_life(&self, max_life: Option<Duration>) {
        self.monitor.state.lock().max_life = max_life;
    }
}

impl<T: Send + 'static> Default for SlotQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for SlotQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.monitor.state.lock();
        f.debug_struct("SlotQueue")
            .field("idle", &state.idle.len())
            .field("waiting", &state.waiting)
            .field("generation", &state.generation)
            .field("shutdown", &self.monitor.shutdown.load(Ordering::Relaxed))
            .finish()
    }
}
