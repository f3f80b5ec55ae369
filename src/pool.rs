//! The resource pool: admission, borrow/return, fill/drain and maintenance

use crate::config::PoolConfiguration;
use crate::counters::{AdmissionGauge, DurationStats, HitRatio};
use crate::errors::{PoolError, PoolResult};
use crate::factory::ResourceFactory;
use crate::interrupt::Interrupt;
use crate::metrics::PoolMetrics;
use crate::queue::SlotQueue;
use crate::reaper::Reaper;
use crate::wrapper::ResourceWrapper;

use parking_lot::{Mutex, RwLock};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, trace, warn};

/// A borrowed resource that returns itself to the pool when dropped
///
/// Dropping the guard releases the resource as healthy. Call
/// [`mark_broken`](Self::mark_broken) first, or [`release`](Self::release)
/// with `true`, to have it destroyed instead.
pub struct PooledObject<F: ResourceFactory> {
    wrapper: Option<ResourceWrapper<F::Resource>>,
    broken: bool,
    pool: Arc<PoolShared<F>>,
}

impl<F: ResourceFactory> PooledObject<F> {
    fn new(wrapper: ResourceWrapper<F::Resource>, pool: Arc<PoolShared<F>>) -> Self {
        Self {
            wrapper: Some(wrapper),
            broken: false,
            pool,
        }
    }

    fn wrapper(&self) -> &ResourceWrapper<F::Resource> {
        self.wrapper.as_ref().expect("Value already taken")
    }

    /// Pool-unique identity of the borrowed resource
    pub fn id(&self) -> u64 {
        self.wrapper().id()
    }

    pub fn created_at(&self) -> Instant {
        self.wrapper().created_at()
    }

    /// Time since the resource was handed out
    pub fn active_time(&self) -> Duration {
        self.wrapper().active_time()
    }

    /// Destroy the resource instead of pooling it when the guard drops.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Return the resource now, destroying it when `error` is set.
    pub fn release(mut self, error: bool) {
        if let Some(wrapper) = self.wrapper.take() {
            self.pool.checkin(wrapper, error || self.broken);
        }
    }
}

impl<F: ResourceFactory> Deref for PooledObject<F> {
    type Target = F::Resource;

    fn deref(&self) -> &Self::Target {
        self.wrapper().resource()
    }
}

impl<F: ResourceFactory> DerefMut for PooledObject<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.wrapper
            .as_mut()
            .expect("Value already taken")
            .resource_mut()
    }
}

impl<F: ResourceFactory> Drop for PooledObject<F> {
    fn drop(&mut self) {
        if let Some(wrapper) = self.wrapper.take() {
            self.pool.checkin(wrapper, self.broken);
        }
    }
}

impl<F: ResourceFactory> std::fmt::Debug for PooledObject<F>
where
    F::Resource: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledObject")
            .field("resource", &self.wrapper.as_ref().map(|w| w.resource()))
            .field("broken", &self.broken)
            .finish()
    }
}

struct PoolShared<F: ResourceFactory> {
    factory: F,
    queue: SlotQueue<F::Resource>,
    config: RwLock<PoolConfiguration>,
    gauge: AdmissionGauge,
    hit_ratio: HitRatio,
    connect_time: DurationStats,
    use_time: DurationStats,
    wait_time: DurationStats,
    unavailable_count: AtomicUsize,
    created_at: SystemTime,
    last_access_at: Mutex<SystemTime>,
    last_cleanup_at: Mutex<SystemTime>,
    reaper: Mutex<Option<Reaper>>,
}

impl<F: ResourceFactory> PoolShared<F> {
    fn checkout(&self, interrupt: Option<&Interrupt>) -> PoolResult<ResourceWrapper<F::Resource>> {
        *self.last_access_at.lock() = SystemTime::now();
        let config = self.config.read().clone();
        let mut creates = 0;

        loop {
            if self.queue.is_shutdown() {
                return Err(PoolError::Closed);
            }
            if !self.factory.is_available() {
                return Err(PoolError::Unavailable);
            }

            let mut wrapper = match self.queue.poll()? {
                Some(wrapper) => {
                    self.hit_ratio.record(true);
                    wrapper
                }
                None => {
                    self.hit_ratio.record(false);
                    // admission is claimed before the slow create so concurrent
                    // callers cannot overshoot max-connections
                    let admitted = self.gauge.increment_if(|current| {
                        config.max_connections.is_none_or(|max| current < max)
                    });
                    if admitted {
                        let wrapper = self.create()?;
                        creates += 1;
                        wrapper
                    } else {
                        self.wait(config.max_wait_time, interrupt)?
                    }
                }
            };

            if self.queue.is_shutdown() {
                self.destroy(wrapper);
                return Err(PoolError::Closed);
            }

            if config.test_scheme.on_borrow() && !self.factory.test_resource(wrapper.resource_mut()) {
                debug!(id = wrapper.id(), "resource failed validation on borrow");
                self.destroy(wrapper);
                if creates > config.borrow_retries {
                    warn!(creates, "validation keeps failing on fresh resources");
                    return Err(PoolError::Unavailable);
                }
                continue;
            }

            wrapper.activate();
            return Ok(wrapper);
        }
    }

    fn checkin(&self, mut wrapper: ResourceWrapper<F::Resource>, error: bool) {
        if self.queue.is_shutdown() || error {
            self.destroy(wrapper);
            return;
        }

        self.use_time.record(wrapper.active_time());
        let scheme = self.config.read().test_scheme;
        if scheme.on_return() && !self.factory.test_resource(wrapper.resource_mut()) {
            debug!(id = wrapper.id(), "resource failed validation on return");
            self.destroy(wrapper);
            return;
        }

        wrapper.touch();
        if let Err(rejected) = self.queue.offer(wrapper) {
            self.destroy(rejected);
        }
    }

    /// Create and wrap a resource for an already admitted gauge slot.
    fn create(&self) -> PoolResult<ResourceWrapper<F::Resource>> {
        let start = Instant::now();
        let resource = match self.factory.create_resource() {
            Ok(resource) => resource,
            Err(err) => {
                self.gauge.decrement();
                self.mark_unavailable(&err);
                return Err(PoolError::connect(err));
            }
        };
        self.connect_time.record(start.elapsed());

        match self.queue.wrap(resource) {
            Ok(wrapper) => {
                debug!(id = wrapper.id(), generation = wrapper.generation(), "resource created");
                Ok(wrapper)
            }
            Err(resource) => {
                self.factory.close_resource(resource);
                self.gauge.decrement();
                Err(PoolError::Closed)
            }
        }
    }

    fn wait(
        &self,
        max_wait: Option<Duration>,
        interrupt: Option<&Interrupt>,
    ) -> PoolResult<ResourceWrapper<F::Resource>> {
        let start = Instant::now();
        let polled = match interrupt {
            Some(interrupt) => self.queue.poll_interruptible(max_wait, interrupt),
            None => self.queue.poll_timeout(max_wait),
        };
        match polled {
            Ok(wrapper) => {
                self.wait_time.record(start.elapsed());
                Ok(wrapper)
            }
            Err(PoolError::Timeout(waited)) => Err(PoolError::Exhausted(waited)),
            Err(err) => Err(err),
        }
    }

    fn destroy(&self, wrapper: ResourceWrapper<F::Resource>) {
        let id = wrapper.id();
        self.factory.close_resource(wrapper.into_resource());
        self.gauge.decrement();
        debug!(id, "resource destroyed");
    }

    // Counts every failed creation, concurrent failures included.
    fn mark_unavailable(&self, err: &F::Error) {
        let count = self.unavailable_count.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(error = %err, unavailable_count = count, "resource creation failed, draining idle resources");
        self.drain();
    }

    fn fill(&self) {
        let target = self.config.read().fill_target();
        while !self.queue.is_shutdown()
            && self.factory.is_available()
            && self.gauge.increment_if(|current| current < target)
        {
            let wrapper = match self.create() {
                Ok(wrapper) => wrapper,
                Err(_) => return,
            };
            if let Err(rejected) = self.queue.offer(wrapper) {
                // shut down, or max-idle shrank underneath us
                self.destroy(rejected);
                return;
            }
        }
    }

    fn drain(&self) {
        let drained = self.queue.drain();
        if !drained.is_empty() {
            debug!(count = drained.len(), "draining idle resources");
        }
        for wrapper in drained {
            self.destroy(wrapper);
        }
    }

    fn reset(&self) {
        info!(generation = self.queue.generation(), "resetting pool");
        self.drain();
        self.fill();
    }

    fn reap(&self) {
        *self.last_cleanup_at.lock() = SystemTime::now();
        let config = self.config.read().clone();

        let purged = self.queue.purge(config.max_idle_time);
        let mut closed = purged.len();
        for wrapper in purged {
            self.destroy(wrapper);
        }

        let mut tested = 0;
        if config.test_scheme.on_idle() {
            for entry in self.queue.copy() {
                if self.queue.is_shutdown() {
                    break;
                }
                // already borrowed
                let Some(mut wrapper) = self.queue.remove(entry.id) else {
                    continue;
                };
                tested += 1;
                if !self.factory.test_resource(wrapper.resource_mut()) {
                    debug!(id = entry.id, "idle resource failed validation");
                    self.destroy(wrapper);
                    closed += 1;
                } else if let Err(rejected) = self.queue.offer(wrapper) {
                    self.destroy(rejected);
                    closed += 1;
                }
            }
        }

        self.fill();
        trace!(closed, tested, idle = self.queue.size(), "reaper pass complete");
    }
}

impl<F: ResourceFactory> Drop for PoolShared<F> {
    fn drop(&mut self) {
        if let Some(reaper) = self.reaper.get_mut().take() {
            reaper.cancel();
        }
        self.queue.shutdown();
        for wrapper in self.queue.drain() {
            self.factory.close_resource(wrapper.into_resource());
            self.gauge.decrement();
        }
    }
}

/// A thread-safe pool of resources produced by a [`ResourceFactory`]
///
/// Cloning the pool yields another handle to the same pool. Each pool owns a
/// reaper thread that purges expired idle resources, optionally validates
/// idle ones, and refills the pool to `min_connections` every duty cycle.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{PoolConfiguration, ResourceFactory, ResourcePool};
/// use std::convert::Infallible;
///
/// struct Sessions;
///
/// impl ResourceFactory for Sessions {
///     type Resource = String;
///     type Error = Infallible;
///
///     fn create_resource(&self) -> Result<String, Infallible> {
///         Ok("session".to_string())
///     }
///     fn test_resource(&self, _: &mut String) -> bool { true }
///     fn close_resource(&self, _: String) {}
/// }
///
/// let pool = ResourcePool::new(Sessions, PoolConfiguration::new().with_min_connections(2));
/// assert_eq!(pool.idle_count(), 2);
///
/// let session = pool.acquire().unwrap();
/// assert_eq!(*session, "session");
/// assert_eq!(pool.busy_count(), 1);
/// drop(session);
///
/// pool.close();
/// assert!(pool.acquire().is_err());
/// ```
pub struct ResourcePool<F: ResourceFactory> {
    shared: Arc<PoolShared<F>>,
}

impl<F: ResourceFactory> Clone for ResourcePool<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: ResourceFactory> ResourcePool<F> {
    /// Create a pool, start its reaper and fill it to `min_connections`.
    pub fn new(factory: F, config: PoolConfiguration) -> Self {
        let now = SystemTime::now();
        let period = config.effective_duty_cycle();
        let shared = Arc::new(PoolShared {
            factory,
            queue: SlotQueue::with_limits(config.max_idle, config.max_life_time),
            config: RwLock::new(config),
            gauge: AdmissionGauge::new(),
            hit_ratio: HitRatio::new(),
            connect_time: DurationStats::new(),
            use_time: DurationStats::new(),
            wait_time: DurationStats::new(),
            unavailable_count: AtomicUsize::new(0),
            created_at: now,
            last_access_at: Mutex::new(now),
            last_cleanup_at: Mutex::new(now),
            reaper: Mutex::new(None),
        });

        let weak = Arc::downgrade(&shared);
        let reaper = Reaper::spawn("esox-pool-reaper", period, move || match weak.upgrade() {
            Some(shared) => {
                shared.reap();
                true
            }
            None => false,
        });
        *shared.reaper.lock() = Some(reaper);

        shared.fill();
        Self { shared }
    }

    /// Borrow a resource, blocking up to `max_wait_time` when the pool is at
    /// `max_connections`.
    pub fn acquire(&self) -> PoolResult<PooledObject<F>> {
        let wrapper = self.shared.checkout(None)?;
        Ok(PooledObject::new(wrapper, Arc::clone(&self.shared)))
    }

    /// Like [`acquire`](Self::acquire), failing with
    /// [`PoolError::Interrupted`] if `interrupt` is raised while blocked.
    pub fn acquire_interruptible(&self, interrupt: &Interrupt) -> PoolResult<PooledObject<F>> {
        let wrapper = self.shared.checkout(Some(interrupt))?;
        Ok(PooledObject::new(wrapper, Arc::clone(&self.shared)))
    }

    /// Borrow a resource from async code; the blocking acquire runs on
    /// tokio's blocking thread pool.
    pub async fn acquire_async(&self) -> PoolResult<PooledObject<F>> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || pool.acquire())
            .await
            .map_err(|_| PoolError::Interrupted)?
    }

    /// Return a borrowed resource, destroying it when `error` is set.
    ///
    /// The resource always goes back to the pool it was borrowed from.
    pub fn release(&self, object: PooledObject<F>, error: bool) {
        object.release(error);
    }

    /// Create resources until `min(min_connections, max_connections)` exist.
    pub fn fill(&self) {
        self.shared.fill();
    }

    /// Destroy every idle resource and invalidate those currently borrowed.
    pub fn drain(&self) {
        self.shared.drain();
    }

    /// Drain, then fill.
    pub fn reset(&self) {
        self.shared.reset();
    }

    pub async fn reset_async(&self) -> PoolResult<()> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || pool.reset())
            .await
            .map_err(|_| PoolError::Interrupted)
    }

    /// Run one maintenance pass now, as the reaper does every duty cycle.
    pub fn reap(&self) {
        self.shared.reap();
    }

    /// Shut the pool down. Idle resources are destroyed immediately, borrowed
    /// ones when they are released, and blocked callers fail with
    /// [`PoolError::Closed`].
    pub fn close(&self) {
        info!("closing pool");
        self.shared.queue.shutdown();
        self.shared.drain();
        let reaper = self.shared.reaper.lock().take();
        if let Some(reaper) = reaper {
            reaper.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.queue.is_shutdown()
    }

    /// Set a property by its string key, see [`PoolConfiguration::set`].
    pub fn configure(&self, key: &str, value: &str) -> PoolResult<()> {
        self.update(|config| config.set(key, value))
    }

    /// Restore a property to its default.
    pub fn unconfigure(&self, key: &str) -> PoolResult<()> {
        self.update(|config| config.clear(key))
    }

    /// Replace the whole configuration.
    pub fn reconfigure(&self, config: PoolConfiguration) -> PoolResult<()> {
        self.update(move |current| {
            *current = config;
            Ok(())
        })
    }

    pub fn configuration(&self) -> PoolConfiguration {
        self.shared.config.read().clone()
    }

    fn update<C>(&self, change: C) -> PoolResult<()>
    where
        C: FnOnce(&mut PoolConfiguration) -> PoolResult<()>,
    {
        let needs_reset = {
            let mut config = self.shared.config.write();
            let old = config.clone();
            change(&mut *config)?;
            self.reconcile(&old, &*config)
        };
        if needs_reset {
            self.shared.reset();
        }
        Ok(())
    }

    // Applies the cheap side effects of a change; returns whether a reset is due.
    fn reconcile(&self, old: &PoolConfiguration, new: &PoolConfiguration) -> bool {
        if old == new || self.is_closed() {
            return false;
        }
        info!(?new, "pool reconfigured");

        let queue = &self.shared.queue;
        if old.max_idle != new.max_idle {
            queue.set_max_idle(new.max_idle);
        }
        if old.max_life_time != new.max_life_time {
            queue.set_max_life(new.max_life_time);
        }
        if old.effective_duty_cycle() != new.effective_duty_cycle() {
            if let Some(reaper) = self.shared.reaper.lock().as_ref() {
                reaper.reschedule(new.effective_duty_cycle());
            }
        }
        old.min_connections != new.min_connections || old.max_connections != new.max_connections
    }

    pub fn factory(&self) -> &F {
        &self.shared.factory
    }

    /// Resources owned by the pool, idle or borrowed
    pub fn active_count(&self) -> usize {
        self.shared.gauge.current()
    }

    pub fn idle_count(&self) -> usize {
        self.shared.queue.size()
    }

    pub fn busy_count(&self) -> usize {
        self.shared.gauge.current_minus(self.shared.queue.size())
    }

    pub fn unavailable_count(&self) -> usize {
        self.shared.unavailable_count.load(Ordering::Relaxed)
    }

    /// Snapshot of the pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        let shared = &self.shared;
        let idle = shared.queue.size();
        PoolMetrics {
            active_count: shared.gauge.current(),
            idle_count: idle,
            busy_count: shared.gauge.current_minus(idle),
            peak_count: shared.gauge.peak(),
            total_count: shared.gauge.total(),
            wait_queue_size: shared.queue.waiting_count(),
            cache_hit_ratio: shared.hit_ratio.ratio(),
            avg_connect_time: shared.connect_time.average(),
            max_connect_time: shared.connect_time.maximum(),
            avg_use_time: shared.use_time.average(),
            max_use_time: shared.use_time.maximum(),
            avg_wait_time: shared.wait_time.average(),
            max_wait_time: shared.wait_time.maximum(),
            unavailable_count: shared.unavailable_count.load(Ordering::Relaxed),
            created_at: shared.created_at,
            last_access_at: *shared.last_access_at.lock(),
            last_cleanup_at: *shared.last_cleanup_at.lock(),
        }
    }

    /// Zero the hit ratio and timing statistics and rebase peak/total counts.
    pub fn reset_statistics(&self) {
        let shared = &self.shared;
        shared.hit_ratio.reset();
        shared.connect_time.reset();
        shared.use_time.reset();
        shared.wait_time.reset();
        shared.gauge.reset_statistics();
    }
}

impl<F: ResourceFactory> std::fmt::Debug for ResourcePool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePool")
            .field("queue", &self.shared.queue)
            .field("active", &self.shared.gauge.current())
            .field("config", &*self.shared.config.read())
            .finish()
    }
}
