//! Pool configuration options

use crate::errors::{PoolError, PoolResult};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const MIN_CONNECTIONS: &str = "min-connections";
pub const MAX_CONNECTIONS: &str = "max-connections";
pub const MAX_IDLE: &str = "max-idle";
pub const MAX_IDLE_TIME: &str = "max-idle-time";
pub const MAX_LIFE_TIME: &str = "max-life-time";
pub const MAX_WAIT_TIME: &str = "max-wait-time";
pub const DUTY_CYCLE: &str = "duty-cycle";
pub const TEST_SCHEME: &str = "test-scheme";

/// Every key accepted by [`PoolConfiguration::set`].
pub const VALID_PROPERTIES: [&str; 8] = [
    MIN_CONNECTIONS,
    MAX_CONNECTIONS,
    MAX_IDLE,
    MAX_IDLE_TIME,
    MAX_LIFE_TIME,
    MAX_WAIT_TIME,
    DUTY_CYCLE,
    TEST_SCHEME,
];

pub const DEFAULT_DUTY_CYCLE: Duration = Duration::from_secs(60);

/// The reaper never runs more often than this.
pub const MIN_DUTY_CYCLE: Duration = Duration::from_secs(5);

/// Forced re-creations allowed when borrow-side validation keeps failing.
pub const DEFAULT_BORROW_RETRIES: usize = 2;

/// When resources are validated with [`ResourceFactory::test_resource`](crate::ResourceFactory::test_resource).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TestScheme {
    #[default]
    Never,
    Borrow,
    Return,
    Idle,
    Always,
}

impl TestScheme {
    pub fn on_borrow(self) -> bool {
        matches!(self, TestScheme::Borrow | TestScheme::Always)
    }

    pub fn on_return(self) -> bool {
        matches!(self, TestScheme::Return | TestScheme::Always)
    }

    pub fn on_idle(self) -> bool {
        matches!(self, TestScheme::Idle | TestScheme::Always)
    }
}

impl FromStr for TestScheme {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(TestScheme::Never),
            "borrow" => Ok(TestScheme::Borrow),
            "return" => Ok(TestScheme::Return),
            "idle" => Ok(TestScheme::Idle),
            "always" => Ok(TestScheme::Always),
            _ => Err(invalid(TEST_SCHEME, s)),
        }
    }
}

impl fmt::Display for TestScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Configuration for resource pool behavior
///
/// `None` stands for "no limit" (or "wait forever" for `max_wait_time`).
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{PoolConfiguration, TestScheme};
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_min_connections(2)
///     .with_max_connections(10)
///     .with_max_wait_time(Duration::from_millis(500))
///     .with_test_scheme(TestScheme::Borrow);
///
/// assert_eq!(config.max_connections, Some(10));
/// assert!(config.test_scheme.on_borrow());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolConfiguration {
    /// Resources the pool keeps alive, idle or active
    pub min_connections: usize,

    /// Upper bound on idle plus active resources
    pub max_connections: Option<usize>,

    /// Upper bound on idle resources
    pub max_idle: Option<usize>,

    /// Idle resources older than this are reaped
    pub max_idle_time: Option<Duration>,

    /// Resources older than this are never pooled again
    pub max_life_time: Option<Duration>,

    /// How long `acquire` blocks once the pool is at `max_connections`
    pub max_wait_time: Option<Duration>,

    /// Reaper period, see [`effective_duty_cycle`](Self::effective_duty_cycle)
    pub duty_cycle: Duration,

    pub test_scheme: TestScheme,

    /// Forced re-creations tolerated when validation on borrow keeps failing
    pub borrow_retries: usize,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            min_connections: 0,
            max_connections: None,
            max_idle: None,
            max_idle_time: None,
            max_life_time: None,
            max_wait_time: None,
            duty_cycle: DEFAULT_DUTY_CYCLE,
            test_scheme: TestScheme::Never,
            borrow_retries: DEFAULT_BORROW_RETRIES,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_connections(mut self, count: usize) -> Self {
        self.min_connections = count;
        self
    }

    pub fn with_max_connections(mut self, count: usize) -> Self {
        self.max_connections = Some(count);
        self
    }

    pub fn with_max_idle(mut self, count: usize) -> Self {
        self.max_idle = Some(count);
        self
    }

    pub fn with_max_idle_time(mut self, time: Duration) -> Self {
        self.max_idle_time = Some(time);
        self
    }

    pub fn with_max_life_time(mut self, time: Duration) -> Self {
        self.max_life_time = Some(time);
        self
    }

    pub fn with_max_wait_time(mut self, time: Duration) -> Self {
        self.max_wait_time = Some(time);
        self
    }

    pub fn with_duty_cycle(mut self, period: Duration) -> Self {
        self.duty_cycle = period;
        self
    }

    pub fn with_test_scheme(mut self, scheme: TestScheme) -> Self {
        self.test_scheme = scheme;
        self
    }

    pub fn with_borrow_retries(mut self, retries: usize) -> Self {
        self.borrow_retries = retries;
        self
    }

    /// Reaper period clamped to [`MIN_DUTY_CYCLE`].
    pub fn effective_duty_cycle(&self) -> Duration {
        self.duty_cycle.max(MIN_DUTY_CYCLE)
    }

    /// Number of resources `fill` keeps alive: `min(min_connections, max_connections)`.
    pub fn fill_target(&self) -> usize {
        self.max_connections
            .map_or(self.min_connections, |max| self.min_connections.min(max))
    }

    /// Set a property from its string form.
    ///
    /// Counts are integers; a non-positive `max-*` value means no limit.
    /// `max-idle-time`, `max-life-time` and `duty-cycle` are in seconds,
    /// `max-wait-time` in milliseconds.
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::{PoolConfiguration, PoolError};
    /// use std::time::Duration;
    ///
    /// let mut config = PoolConfiguration::new();
    /// config.set("max-connections", "8").unwrap();
    /// config.set("max-wait-time", "250").unwrap();
    /// config.set("max-idle", "0").unwrap();
    ///
    /// assert_eq!(config.max_connections, Some(8));
    /// assert_eq!(config.max_wait_time, Some(Duration::from_millis(250)));
    /// assert_eq!(config.max_idle, None);
    /// assert!(matches!(config.set("pool-size", "1"), Err(PoolError::UnknownProperty(_))));
    /// ```
    pub fn set(&mut self, key: &str, value: &str) -> PoolResult<()> {
        match key {
            MIN_CONNECTIONS => {
                let count = parse_int(key, value)?;
                self.min_connections =
                    usize::try_from(count).map_err(|_| invalid(key, value))?;
            }
            MAX_CONNECTIONS => self.max_connections = parse_limit(key, value)?,
            MAX_IDLE => self.max_idle = parse_limit(key, value)?,
            MAX_IDLE_TIME => {
                self.max_idle_time = parse_limit(key, value)?.map(secs);
            }
            MAX_LIFE_TIME => {
                self.max_life_time = parse_limit(key, value)?.map(secs);
            }
            MAX_WAIT_TIME => {
                self.max_wait_time = parse_limit(key, value)?
                    .map(|ms| Duration::from_millis(ms as u64));
            }
            DUTY_CYCLE => {
                let seconds = parse_int(key, value)?;
                self.duty_cycle = if seconds > 0 {
                    secs(seconds as usize)
                } else {
                    DEFAULT_DUTY_CYCLE
                };
            }
            TEST_SCHEME => self.test_scheme = value.parse()?,
            _ => return Err(PoolError::UnknownProperty(key.to_string())),
        }
        Ok(())
    }

    /// Restore a property to its default.
    pub fn clear(&mut self, key: &str) -> PoolResult<()> {
        let defaults = Self::default();
        match key {
            MIN_CONNECTIONS => self.min_connections = defaults.min_connections,
            MAX_CONNECTIONS => self.max_connections = defaults.max_connections,
            MAX_IDLE => self.max_idle = defaults.max_idle,
            MAX_IDLE_TIME => self.max_idle_time = defaults.max_idle_time,
            MAX_LIFE_TIME => self.max_life_time = defaults.max_life_time,
            MAX_WAIT_TIME => self.max_wait_time = defaults.max_wait_time,
            DUTY_CYCLE => self.duty_cycle = defaults.duty_cycle,
            TEST_SCHEME => self.test_scheme = defaults.test_scheme,
            _ => return Err(PoolError::UnknownProperty(key.to_string())),
        }
        Ok(())
    }

    /// String form of a property, as accepted by [`set`](Self::set).
    /// Unlimited values render as `"0"`.
    pub fn get(&self, key: &str) -> PoolResult<String> {
        let limit = |value: Option<u128>| value.unwrap_or(0).to_string();
        let value = match key {
            MIN_CONNECTIONS => self.min_connections.to_string(),
            MAX_CONNECTIONS => limit(self.max_connections.map(|v| v as u128)),
            MAX_IDLE => limit(self.max_idle.map(|v| v as u128)),
            MAX_IDLE_TIME => limit(self.max_idle_time.map(|d| d.as_secs() as u128)),
            MAX_LIFE_TIME => limit(self.max_life_time.map(|d| d.as_secs() as u128)),
            MAX_WAIT_TIME => limit(self.max_wait_time.map(|d| d.as_millis())),
            DUTY_CYCLE => self.duty_cycle.as_secs().to_string(),
            TEST_SCHEME => self.test_scheme.to_string(),
            _ => return Err(PoolError::UnknownProperty(key.to_string())),
        };
        Ok(value)
    }
}

fn invalid(key: &str, value: &str) -> PoolError {
    PoolError::InvalidProperty {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn secs(seconds: usize) -> Duration {
    Duration::from_secs(seconds as u64)
}

fn parse_int(key: &str, value: &str) -> PoolResult<i64> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

// Non-positive means unlimited.
fn parse_limit(key: &str, value: &str) -> PoolResult<Option<usize>> {
    let parsed = parse_int(key, value)?;
    if parsed <= 0 {
        Ok(None)
    } else {
        usize::try_from(parsed)
            .map(Some)
            .map_err(|_| invalid(key, value))
    }
}
