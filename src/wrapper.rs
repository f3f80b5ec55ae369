//! Pool-side metadata envelope around a resource

use std::time::{Duration, Instant};

/// A resource together with the bookkeeping the pool needs to age,
/// order and invalidate it.
///
/// Wrappers are created by [`SlotQueue::wrap`](crate::SlotQueue::wrap), which
/// stamps them with the queue's current generation and a pool-unique id. The
/// id identifies the wrapped resource.
#[derive(Debug)]
pub struct ResourceWrapper<T> {
    resource: T,
    id: u64,
    generation: u64,
    created_at: Instant,
    last_used_at: Instant,
    activated_at: Option<Instant>,
}

impl<T> ResourceWrapper<T> {
    pub(crate) fn new(resource: T, id: u64, generation: u64) -> Self {
        let now = Instant::now();
        Self {
            resource,
            id,
            generation,
            created_at: now,
            last_used_at: now,
            activated_at: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_used_at(&self) -> Instant {
        self.last_used_at
    }

    /// Refresh the last-used time, which decides the LRU position on the next offer.
    pub fn touch(&mut self) {
        self.last_used_at = Instant::now();
    }

    /// Mark the wrapper as handed to a borrower and start its use timer.
    pub fn activate(&mut self) {
        let now = Instant::now();
        self.activated_at = Some(now);
        self.last_used_at = now;
    }

    /// Time since [`activate`](Self::activate), zero if never activated.
    pub fn active_time(&self) -> Duration {
        self.activated_at
            .map(|at| at.elapsed())
            .unwrap_or_default()
    }

    pub fn resource(&self) -> &T {
        &self.resource
    }

    pub fn resource_mut(&mut self) -> &mut T {
        &mut self.resource
    }

    pub fn into_resource(self) -> T {
        self.resource
    }

    /// True when the wrapper belongs to a stale generation or outlived `max_life`.
    pub fn should_close(&self, generation: u64, max_life: Option<Duration>) -> bool {
        self.generation != generation
            || max_life.is_some_and(|life| self.created_at.elapsed() > life)
    }

    /// Like [`should_close`](Self::should_close), additionally expiring
    /// wrappers idle for longer than `max_idle`.
    pub fn should_close_idle(
        &self,
        generation: u64,
        max_life: Option<Duration>,
        max_idle: Option<Duration>,
    ) -> bool {
        self.should_close(generation, max_life)
            || max_idle.is_some_and(|idle| self.last_used_at.elapsed() > idle)
    }
}

impl<T> PartialEq for ResourceWrapper<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for ResourceWrapper<T> {}
