//! Async usage examples

use esox_resourcepool::{Interrupt, PoolConfiguration, PoolError, ResourceFactory, ResourcePool};
use std::convert::Infallible;
use std::time::Duration;
use tokio::time::sleep;

struct Buffers;

impl ResourceFactory for Buffers {
    type Resource = Vec<u8>;
    type Error = Infallible;

    fn create_resource(&self) -> Result<Vec<u8>, Infallible> {
        Ok(Vec::with_capacity(64 * 1024))
    }

    fn test_resource(&self, buffer: &mut Vec<u8>) -> bool {
        buffer.clear();
        true
    }

    fn close_resource(&self, _buffer: Vec<u8>) {}
}

#[tokio::main]
async fn main() {
    println!("=== EsoxSolutions.ResourcePool - Async Examples ===\n");

    // Example 1: Async acquire
    async_acquire().await;

    // Example 2: Concurrent access
    concurrent_access().await;

    // Example 3: Interrupting a blocked acquire
    interrupt_waiter().await;
}

async fn async_acquire() {
    println!("1. Async Acquire:");
    let pool = ResourcePool::new(Buffers, PoolConfiguration::default());

    {
        let buffer = pool.acquire_async().await.unwrap();
        println!("   Got buffer with capacity {}", buffer.capacity());
    }

    println!();
}

async fn concurrent_access() {
    println!("2. Concurrent Access:");
    let config = PoolConfiguration::new()
        .with_max_connections(4)
        .with_max_wait_time(Duration::from_secs(5));
    let pool = ResourcePool::new(Buffers, config);

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let pool = pool.clone();
            tokio::spawn(async move {
                let mut buffer = pool.acquire_async().await.unwrap();
                buffer.extend_from_slice(&[i as u8; 128]);
                sleep(Duration::from_millis(10)).await;
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    let metrics = pool.metrics();
    println!("   Created: {}", metrics.total_count);
    println!("   Peak: {}", metrics.peak_count);
    println!("   Hit ratio: {}%", metrics.cache_hit_ratio);
    println!("   Avg wait: {:?}\n", metrics.avg_wait_time);
}

async fn interrupt_waiter() {
    println!("3. Interrupt:");
    let pool = ResourcePool::new(Buffers, PoolConfiguration::new().with_max_connections(1));
    let _held = pool.acquire().unwrap();

    let interrupt = Interrupt::new();
    let waiter = {
        let pool = pool.clone();
        let interrupt = interrupt.clone();
        tokio::task::spawn_blocking(move || pool.acquire_interruptible(&interrupt).map(|_| ()))
    };

    sleep(Duration::from_millis(50)).await;
    interrupt.interrupt();
    match waiter.await.unwrap() {
        Err(PoolError::Interrupted) => println!("   Waiter was interrupted"),
        other => println!("   Unexpected: {other:?}"),
    }
}
