use esox_resourcepool::{
    Blackout, Interrupt, PoolConfiguration, PoolError, ResourceFactory, ResourcePool, TestScheme,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Refused;

impl fmt::Display for Refused {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection refused")
    }
}

impl std::error::Error for Refused {}

/// Hands out sequential ids and records what the pool does with them.
#[derive(Default)]
struct Tracked {
    created: AtomicUsize,
    closed: Arc<AtomicUsize>,
    fail_create: AtomicBool,
    down: AtomicBool,
    failing_tests: AtomicUsize,
    rejected: Mutex<HashSet<usize>>,
    blackout: Option<Blackout>,
}

impl Tracked {
    fn with_blackout(window: Duration) -> Self {
        Self {
            blackout: Some(Blackout::new(window)),
            ..Self::default()
        }
    }

    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ResourceFactory for Tracked {
    type Resource = usize;
    type Error = Refused;

    fn create_resource(&self) -> Result<usize, Refused> {
        if self.fail_create.load(Ordering::SeqCst) {
            if let Some(blackout) = &self.blackout {
                blackout.record_failure();
            }
            return Err(Refused);
        }
        Ok(self.created.fetch_add(1, Ordering::SeqCst))
    }

    fn test_resource(&self, resource: &mut usize) -> bool {
        if self.rejected.lock().contains(resource) {
            return false;
        }
        self.failing_tests
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
    }

    fn close_resource(&self, _resource: usize) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn is_available(&self) -> bool {
        !self.down.load(Ordering::SeqCst)
            && self.blackout.as_ref().is_none_or(|b| b.is_available())
    }
}

fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_max_connections_bounds_creation() {
    let pool = ResourcePool::new(
        Tracked::default(),
        PoolConfiguration::new().with_max_connections(3),
    );

    thread::scope(|scope| {
        for _ in 0..10 {
            let pool = pool.clone();
            scope.spawn(move || {
                let resource = pool.acquire().unwrap();
                thread::sleep(Duration::from_millis(10));
                drop(resource);
            });
        }
    });

    let metrics = pool.metrics();
    assert!(pool.factory().created() <= 3);
    assert!(metrics.peak_count <= 3);
    assert_eq!(metrics.active_count, pool.factory().created());
    assert_eq!(metrics.busy_count, 0);
}

#[test]
fn test_active_is_idle_plus_busy() {
    let pool = ResourcePool::new(
        Tracked::default(),
        PoolConfiguration::new().with_min_connections(2),
    );
    let check = |pool: &ResourcePool<Tracked>| {
        assert_eq!(pool.active_count(), pool.idle_count() + pool.busy_count());
    };

    check(&pool);
    let a = pool.acquire().unwrap();
    let b = pool.acquire().unwrap();
    let c = pool.acquire().unwrap();
    check(&pool);
    assert_eq!(pool.busy_count(), 3);

    drop(b);
    check(&pool);
    drop((a, c));
    check(&pool);
    assert_eq!(pool.idle_count(), 3);
}

#[test]
fn test_borrowed_resource_destroyed_after_drain() {
    let pool = ResourcePool::new(Tracked::default(), PoolConfiguration::default());
    let borrowed = pool.acquire().unwrap();

    pool.drain();
    drop(borrowed);

    assert_eq!(pool.idle_count(), 0);
    assert_eq!(pool.active_count(), 0);
    assert_eq!(pool.factory().closed(), 1);
}

#[test]
fn test_hit_ratio() {
    let pool = ResourcePool::new(Tracked::default(), PoolConfiguration::default());

    for _ in 0..3 {
        drop(pool.acquire().unwrap());
    }

    assert_eq!(pool.factory().created(), 1);
    assert_eq!(pool.metrics().cache_hit_ratio, 66);
}

#[test]
fn test_min_connections_fills_pool() {
    let pool = ResourcePool::new(
        Tracked::default(),
        PoolConfiguration::new().with_min_connections(2),
    );

    assert_eq!(pool.idle_count(), 2);
    assert_eq!(pool.busy_count(), 0);
    assert_eq!(pool.factory().created(), 2);
}

#[test]
fn test_fill_respects_max_connections() {
    let config = PoolConfiguration::new()
        .with_min_connections(5)
        .with_max_connections(2);
    let pool = ResourcePool::new(Tracked::default(), config);

    assert_eq!(pool.idle_count(), 2);
    pool.fill();
    assert_eq!(pool.factory().created(), 2);
}

#[test]
fn test_max_idle_bounds_idle_resources() {
    let pool = ResourcePool::new(
        Tracked::default(),
        PoolConfiguration::new().with_max_idle(1),
    );

    let a = pool.acquire().unwrap();
    let b = pool.acquire().unwrap();
    drop(a);
    drop(b);

    assert_eq!(pool.idle_count(), 1);
    assert_eq!(pool.factory().closed(), 1);
    assert_eq!(pool.active_count(), 1);
}

#[test]
fn test_borrow_validation_recovers() {
    let factory = Tracked::default();
    factory.failing_tests.store(2, Ordering::SeqCst);
    let pool = ResourcePool::new(
        factory,
        PoolConfiguration::new().with_test_scheme(TestScheme::Borrow),
    );

    let resource = pool.acquire().unwrap();

    assert_eq!(*resource, 2);
    assert_eq!(pool.factory().created(), 3);
    assert_eq!(pool.factory().closed(), 2);
}

#[test]
fn test_borrow_validation_gives_up() {
    let factory = Tracked::default();
    factory.failing_tests.store(usize::MAX, Ordering::SeqCst);
    let pool = ResourcePool::new(
        factory,
        PoolConfiguration::new().with_test_scheme(TestScheme::Borrow),
    );

    assert!(matches!(pool.acquire(), Err(PoolError::Unavailable)));
    assert_eq!(pool.factory().created(), 3);
    assert_eq!(pool.factory().closed(), 3);
    assert_eq!(pool.active_count(), 0);
}

#[test]
fn test_borrow_retries_is_configurable() {
    let factory = Tracked::default();
    factory.failing_tests.store(usize::MAX, Ordering::SeqCst);
    let config = PoolConfiguration::new()
        .with_test_scheme(TestScheme::Borrow)
        .with_borrow_retries(0);
    let pool = ResourcePool::new(factory, config);

    assert!(matches!(pool.acquire(), Err(PoolError::Unavailable)));
    assert_eq!(pool.factory().created(), 1);
}

#[test]
fn test_exhausted_after_max_wait() {
    let config = PoolConfiguration::new()
        .with_max_connections(1)
        .with_max_wait_time(Duration::from_millis(50));
    let pool = ResourcePool::new(Tracked::default(), config);
    let _held = pool.acquire().unwrap();

    let start = Instant::now();
    let result = pool.acquire();

    assert!(matches!(result, Err(PoolError::Exhausted(_))));
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert_eq!(pool.factory().created(), 1);
}

#[test]
fn test_waiter_gets_released_resource() {
    let config = PoolConfiguration::new()
        .with_max_connections(1)
        .with_max_wait_time(Duration::from_secs(5));
    let pool = ResourcePool::new(Tracked::default(), config);
    let held = pool.acquire().unwrap();

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.acquire().map(|resource| *resource))
    };
    wait_until(|| pool.metrics().wait_queue_size == 1);
    drop(held);

    assert_eq!(waiter.join().unwrap().unwrap(), 0);
    assert!(pool.metrics().max_wait_time > Duration::ZERO);
}

#[test]
fn test_close_releases_waiters() {
    let pool = ResourcePool::new(
        Tracked::default(),
        PoolConfiguration::new().with_max_connections(1),
    );
    let held = pool.acquire().unwrap();

    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.acquire().map(|_| ()))
    };
    wait_until(|| pool.metrics().wait_queue_size == 1);
    pool.close();

    assert!(matches!(waiter.join().unwrap(), Err(PoolError::Closed)));
    drop(held);
    assert_eq!(pool.factory().closed(), 1);
    assert_eq!(pool.active_count(), 0);
}

#[test]
fn test_acquire_interruptible() {
    let pool = ResourcePool::new(
        Tracked::default(),
        PoolConfiguration::new().with_max_connections(1),
    );
    let _held = pool.acquire().unwrap();
    let interrupt = Interrupt::new();

    let waiter = {
        let pool = pool.clone();
        let interrupt = interrupt.clone();
        thread::spawn(move || pool.acquire_interruptible(&interrupt).map(|_| ()))
    };
    wait_until(|| pool.metrics().wait_queue_size == 1);
    interrupt.interrupt();

    assert!(matches!(waiter.join().unwrap(), Err(PoolError::Interrupted)));
    assert!(!interrupt.is_interrupted());
    assert_eq!(pool.metrics().wait_queue_size, 0);
}

#[test]
fn test_create_failure_drains_pool() {
    let pool = ResourcePool::new(Tracked::default(), PoolConfiguration::default());
    let borrowed = pool.acquire().unwrap();
    pool.factory().fail_create.store(true, Ordering::SeqCst);

    let result = pool.acquire();

    assert!(matches!(result, Err(PoolError::Connect(_))));
    assert_eq!(pool.unavailable_count(), 1);
    assert_eq!(pool.active_count(), 1);

    // borrowed before the failure, so it belongs to an older generation
    drop(borrowed);
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(pool.factory().closed(), 1);
}

#[test]
fn test_connect_error_keeps_source() {
    let pool = ResourcePool::new(Tracked::default(), PoolConfiguration::default());
    pool.factory().fail_create.store(true, Ordering::SeqCst);

    let err = pool.acquire().unwrap_err();
    let source = std::error::Error::source(&err).map(|s| s.to_string());
    assert_eq!(source.as_deref(), Some("connection refused"));
}

#[test]
fn test_unavailable_factory() {
    let pool = ResourcePool::new(Tracked::default(), PoolConfiguration::default());
    pool.factory().down.store(true, Ordering::SeqCst);

    assert!(matches!(pool.acquire(), Err(PoolError::Unavailable)));
    assert_eq!(pool.factory().created(), 0);
}

#[test]
fn test_blackout_after_create_failure() {
    let pool = ResourcePool::new(
        Tracked::with_blackout(Duration::from_millis(100)),
        PoolConfiguration::default(),
    );
    pool.factory().fail_create.store(true, Ordering::SeqCst);

    assert!(matches!(pool.acquire(), Err(PoolError::Connect(_))));
    assert!(matches!(pool.acquire(), Err(PoolError::Unavailable)));

    pool.factory().fail_create.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150));
    assert!(pool.acquire().is_ok());
}

#[test]
fn test_configure_max_idle() {
    let pool = ResourcePool::new(Tracked::default(), PoolConfiguration::default());
    let borrowed: Vec<_> = (0..3).map(|_| pool.acquire().unwrap()).collect();

    pool.configure("max-idle", "1").unwrap();
    drop(borrowed);

    assert_eq!(pool.idle_count(), 1);
    assert_eq!(pool.factory().closed(), 2);
    assert_eq!(pool.configuration().get("max-idle").unwrap(), "1");
}

#[test]
fn test_configure_min_connections_resets() {
    let pool = ResourcePool::new(Tracked::default(), PoolConfiguration::default());

    pool.configure("min-connections", "2").unwrap();
    assert_eq!(pool.idle_count(), 2);

    pool.unconfigure("min-connections").unwrap();
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(pool.factory().closed(), 2);
}

#[test]
fn test_configure_test_scheme() {
    let pool = ResourcePool::new(Tracked::default(), PoolConfiguration::default());

    pool.configure("test-scheme", "return").unwrap();
    assert_eq!(pool.configuration().test_scheme, TestScheme::Return);

    let resource = pool.acquire().unwrap();
    pool.factory().rejected.lock().insert(*resource);
    drop(resource);
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(pool.factory().closed(), 1);
}

#[test]
fn test_configure_rejects_bad_input() {
    let pool = ResourcePool::new(Tracked::default(), PoolConfiguration::default());
    let before = pool.configuration();

    assert!(matches!(
        pool.configure("pool-size", "3"),
        Err(PoolError::UnknownProperty(_))
    ));
    assert!(matches!(
        pool.configure("max-connections", "many"),
        Err(PoolError::InvalidProperty { .. })
    ));
    assert!(matches!(
        pool.configure("test-scheme", "sometimes"),
        Err(PoolError::InvalidProperty { .. })
    ));
    assert_eq!(pool.configuration(), before);
}

#[test]
fn test_reconfigure_max_connections() {
    let pool = ResourcePool::new(Tracked::default(), PoolConfiguration::default());
    let config = PoolConfiguration::new()
        .with_max_connections(1)
        .with_max_wait_time(Duration::from_millis(20));

    pool.reconfigure(config).unwrap();
    let _held = pool.acquire().unwrap();

    assert!(matches!(pool.acquire(), Err(PoolError::Exhausted(_))));
}

#[test]
fn test_reap_purges_expired_idle() {
    let config = PoolConfiguration::new()
        .with_min_connections(1)
        .with_max_idle_time(Duration::from_millis(50));
    let pool = ResourcePool::new(Tracked::default(), config);
    assert_eq!(pool.idle_count(), 1);

    thread::sleep(Duration::from_millis(100));
    pool.reap();

    // expired resource closed, then refilled to min-connections
    assert_eq!(pool.factory().closed(), 1);
    assert_eq!(pool.factory().created(), 2);
    assert_eq!(pool.idle_count(), 1);
}

#[test]
fn test_reap_validates_idle() {
    let pool = ResourcePool::new(
        Tracked::default(),
        PoolConfiguration::new().with_test_scheme(TestScheme::Idle),
    );
    let borrowed: Vec<_> = (0..3).map(|_| pool.acquire().unwrap()).collect();
    drop(borrowed);
    pool.factory().rejected.lock().insert(1);

    pool.reap();

    assert_eq!(pool.idle_count(), 2);
    assert_eq!(pool.factory().closed(), 1);
    assert!(pool.metrics().last_cleanup_at >= pool.metrics().created_at);
}

#[test]
fn test_max_life_time() {
    let pool = ResourcePool::new(
        Tracked::default(),
        PoolConfiguration::new().with_max_life_time(Duration::from_millis(50)),
    );
    let resource = pool.acquire().unwrap();
    thread::sleep(Duration::from_millis(100));
    drop(resource);

    assert_eq!(pool.idle_count(), 0);
    assert_eq!(pool.factory().closed(), 1);
}

#[test]
fn test_reset_statistics() {
    let pool = ResourcePool::new(Tracked::default(), PoolConfiguration::default());
    let a = pool.acquire().unwrap();
    let b = pool.acquire().unwrap();
    drop(a);
    drop(b);

    pool.reset_statistics();
    let metrics = pool.metrics();

    assert_eq!(metrics.cache_hit_ratio, 0);
    assert_eq!(metrics.total_count, 2);
    assert_eq!(metrics.peak_count, 2);
    assert_eq!(metrics.avg_use_time, Duration::ZERO);
}

#[test]
fn test_drop_pool_closes_idle() {
    let factory = Tracked::default();
    let closed = Arc::clone(&factory.closed);
    let pool = ResourcePool::new(factory, PoolConfiguration::new().with_min_connections(2));

    drop(pool);

    assert_eq!(closed.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_async_acquire() {
    let config = PoolConfiguration::new()
        .with_max_connections(2)
        .with_max_wait_time(Duration::from_secs(5));
    let pool = ResourcePool::new(Tracked::default(), config);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move {
                let resource = pool.acquire_async().await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
                drop(resource);
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert!(pool.factory().created() <= 2);
    assert_eq!(pool.busy_count(), 0);
}
