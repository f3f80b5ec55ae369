//! Basic usage examples for ResourcePool

use esox_resourcepool::{
    Blackout, PoolConfiguration, PoolError, ResourceFactory, ResourcePool, TestScheme,
};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[derive(Debug)]
struct Session {
    id: u32,
    healthy: bool,
}

#[derive(Debug)]
struct ConnectError(String);

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connect failed: {}", self.0)
    }
}

impl std::error::Error for ConnectError {}

/// Simulated remote endpoint that refuses every `fail_every`-th connect.
struct Endpoint {
    next_id: AtomicU32,
    fail_every: u32,
    blackout: Blackout,
}

impl Endpoint {
    fn new(fail_every: u32) -> Self {
        Self {
            next_id: AtomicU32::new(1),
            fail_every,
            blackout: Blackout::new(Duration::from_millis(200)),
        }
    }
}

impl ResourceFactory for Endpoint {
    type Resource = Session;
    type Error = ConnectError;

    fn create_resource(&self) -> Result<Session, ConnectError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if self.fail_every > 0 && id % self.fail_every == 0 {
            self.blackout.record_failure();
            return Err(ConnectError(format!("session {id} refused")));
        }
        std::thread::sleep(Duration::from_millis(5));
        Ok(Session { id, healthy: true })
    }

    fn test_resource(&self, session: &mut Session) -> bool {
        session.healthy
    }

    fn close_resource(&self, session: Session) {
        println!("   closing session {}", session.id);
    }

    fn is_available(&self) -> bool {
        self.blackout.is_available()
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== EsoxSolutions.ResourcePool - Basic Examples ===\n");

    // Example 1: Borrow and return
    simple_pool();

    // Example 2: Bounded pool with wait time
    bounded_pool();

    // Example 3: Validation and broken resources
    validation();

    // Example 4: Live reconfiguration
    reconfiguration();

    // Example 5: Failing endpoint
    failing_endpoint();
}

fn simple_pool() {
    println!("1. Simple Pool:");
    let pool = ResourcePool::new(Endpoint::new(0), PoolConfiguration::new().with_min_connections(2));
    println!("   Idle after construction: {}", pool.idle_count());

    {
        let session = pool.acquire().unwrap();
        println!("   Got session: {}", session.id);
        // Session automatically returned when dropped
    }

    println!("   Idle after return: {}\n", pool.idle_count());
}

fn bounded_pool() {
    println!("2. Bounded Pool:");
    let config = PoolConfiguration::new()
        .with_max_connections(1)
        .with_max_wait_time(Duration::from_millis(50));
    let pool = ResourcePool::new(Endpoint::new(0), config);

    let held = pool.acquire().unwrap();
    match pool.acquire() {
        Err(PoolError::Exhausted(waited)) => println!("   Exhausted after {waited:?}"),
        other => println!("   Unexpected: {other:?}"),
    }
    drop(held);

    let again = pool.acquire().unwrap();
    println!("   Reused session: {}\n", again.id);
}

fn validation() {
    println!("3. Validation:");
    let config = PoolConfiguration::new().with_test_scheme(TestScheme::Always);
    let pool = ResourcePool::new(Endpoint::new(0), config);

    {
        let mut session = pool.acquire().unwrap();
        session.healthy = false;
        println!("   Session {} went bad while borrowed", session.id);
    }
    println!("   Idle after returning a bad session: {}", pool.idle_count());

    let mut session = pool.acquire().unwrap();
    session.mark_broken();
    drop(session);
    println!("   Active after dropping a broken session: {}\n", pool.active_count());
}

fn reconfiguration() {
    println!("4. Reconfiguration:");
    let pool = ResourcePool::new(Endpoint::new(0), PoolConfiguration::default());

    pool.configure("min-connections", "3").unwrap();
    println!("   Idle after min-connections=3: {}", pool.idle_count());

    pool.configure("max-idle", "1").unwrap();
    let sessions: Vec<_> = (0..3).map(|_| pool.acquire().unwrap()).collect();
    drop(sessions);
    println!("   Idle after returning 3 with max-idle=1: {}", pool.idle_count());

    if let Err(err) = pool.configure("pool-size", "4") {
        println!("   Rejected: {err}");
    }

    let metrics = pool.metrics();
    println!("\n   Metrics:");
    for (key, value) in metrics.export() {
        println!("     {}: {}", key, value);
    }
    println!();
}

fn failing_endpoint() {
    println!("5. Failing Endpoint:");
    let pool = ResourcePool::new(Endpoint::new(2), PoolConfiguration::default());

    let first = pool.acquire().unwrap();
    println!("   Got session: {}", first.id);
    match pool.acquire() {
        Err(err) => println!("   Second acquire failed: {err}"),
        Ok(session) => println!("   Got session: {}", session.id),
    }
    match pool.acquire() {
        Err(err) => println!("   During blackout: {err}"),
        Ok(session) => println!("   Got session: {}", session.id),
    }
    println!("   Unavailable events: {}", pool.unavailable_count());
    drop(first);
    pool.close();
}
