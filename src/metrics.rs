//! Read-only metrics snapshot of a resource pool

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{PoolConfiguration, ResourceFactory, ResourcePool};
/// use std::convert::Infallible;
///
/// struct Numbers;
///
/// impl ResourceFactory for Numbers {
///     type Resource = u32;
///     type Error = Infallible;
///
///     fn create_resource(&self) -> Result<u32, Infallible> { Ok(7) }
///     fn test_resource(&self, _: &mut u32) -> bool { true }
///     fn close_resource(&self, _: u32) {}
/// }
///
/// let pool = ResourcePool::new(Numbers, PoolConfiguration::default());
/// {
///     let _conn = pool.acquire().unwrap();
///     let metrics = pool.metrics();
///     assert_eq!(metrics.active_count, 1);
///     assert_eq!(metrics.busy_count, 1);
/// }
/// assert_eq!(pool.metrics().idle_count, 1);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolMetrics {
    /// Resources owned by the pool, idle or checked out
    pub active_count: usize,

    /// Resources sitting idle in the pool
    pub idle_count: usize,

    /// Resources checked out by borrowers
    pub busy_count: usize,

    /// Highest `active_count` observed
    pub peak_count: usize,

    /// Resources admitted since creation
    pub total_count: usize,

    /// Callers blocked waiting for a resource
    pub wait_queue_size: usize,

    /// Requests served from the idle set, as a percentage
    pub cache_hit_ratio: u32,

    pub avg_connect_time: Duration,
    pub max_connect_time: Duration,
    pub avg_use_time: Duration,
    pub max_use_time: Duration,
    pub avg_wait_time: Duration,
    pub max_wait_time: Duration,

    /// Failed resource creations
    pub unavailable_count: usize,

    pub created_at: SystemTime,
    pub last_access_at: SystemTime,
    pub last_cleanup_at: SystemTime,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    ///
    /// Durations are rendered in milliseconds, timestamps in milliseconds
    /// since the Unix epoch.
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        let mut put = |key: &str, value: String| {
            metrics.insert(key.to_string(), value);
        };

        put("active_count", self.active_count.to_string());
        put("idle_count", self.idle_count.to_string());
        put("busy_count", self.busy_count.to_string());
        put("peak_count", self.peak_count.to_string());
        put("total_count", self.total_count.to_string());
        put("wait_queue_size", self.wait_queue_size.to_string());
        put("cache_hit_ratio", self.cache_hit_ratio.to_string());
        put("avg_connect_time_ms", millis(self.avg_connect_time));
        put("max_connect_time_ms", millis(self.max_connect_time));
        put("avg_use_time_ms", millis(self.avg_use_time));
        put("max_use_time_ms", millis(self.max_use_time));
        put("avg_wait_time_ms", millis(self.avg_wait_time));
        put("max_wait_time_ms", millis(self.max_wait_time));
        put("unavailable_count", self.unavailable_count.to_string());
        put("created_at", epoch_millis(self.created_at));
        put("last_access_at", epoch_millis(self.last_access_at));
        put("last_cleanup_at", epoch_millis(self.last_cleanup_at));
        metrics
    }
}

fn millis(duration: Duration) -> String {
    duration.as_millis().to_string()
}

fn epoch_millis(time: SystemTime) -> String {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string()
}
