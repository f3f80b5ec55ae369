//! # EsoxSolutions.ResourcePool
//!
//! Highly concurrent pool for expensive, reusable resources such as network
//! connections or remote sessions.
//!
//! ## Features
//!
//! - Bounded admission: at most `max_connections` resources exist at once,
//!   and creating one never holds a pool lock
//! - Blocking acquire with a configurable wait, timeout and interruption
//! - LRU hand-out of idle resources, bounded by `max_idle`
//! - Age limits (`max_life_time`, `max_idle_time`) enforced by a per-pool reaper
//! - Validation on borrow, return, or while idle
//! - Pool-wide flush through generations: resources borrowed before a
//!   `drain` are destroyed when they come back
//! - Live reconfiguration through typed or string-keyed properties
//! - Hit ratio, connect/use/wait time and count metrics
//! - Automatic return of borrowed resources via RAII (Drop trait)
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_resourcepool::{PoolConfiguration, ResourceFactory, ResourcePool};
//! use std::convert::Infallible;
//!
//! struct Connections;
//!
//! impl ResourceFactory for Connections {
//!     type Resource = String;
//!     type Error = Infallible;
//!
//!     fn create_resource(&self) -> Result<String, Infallible> {
//!         Ok("connected".to_string())
//!     }
//!
//!     fn test_resource(&self, conn: &mut String) -> bool {
//!         *conn == "connected"
//!     }
//!
//!     fn close_resource(&self, _conn: String) {}
//! }
//!
//! let pool = ResourcePool::new(Connections, PoolConfiguration::new().with_max_connections(4));
//! {
//!     let conn = pool.acquire().unwrap();
//!     println!("Got: {}", *conn);
//!     // Resource automatically returned when `conn` goes out of scope
//! }
//! assert_eq!(pool.idle_count(), 1);
//! ```

mod blackout;
mod config;
mod counters;
mod errors;
mod factory;
mod interrupt;
mod metrics;
mod pool;
mod queue;
mod reaper;
mod wrapper;

pub use blackout::{Blackout, DEFAULT_BLACKOUT};
pub use config::{
    PoolConfiguration, TestScheme, DEFAULT_BORROW_RETRIES, DEFAULT_DUTY_CYCLE, DUTY_CYCLE,
    MAX_CONNECTIONS, MAX_IDLE, MAX_IDLE_TIME, MAX_LIFE_TIME, MAX_WAIT_TIME, MIN_CONNECTIONS,
    MIN_DUTY_CYCLE, TEST_SCHEME, VALID_PROPERTIES,
};
pub use counters::{AdmissionGauge, DurationStats, HitRatio};
pub use errors::{PoolError, PoolResult};
pub use factory::ResourceFactory;
pub use interrupt::Interrupt;
pub use metrics::PoolMetrics;
pub use pool::{PooledObject, ResourcePool};
pub use queue::{IdleEntry, SlotQueue};
pub use wrapper::ResourceWrapper;
