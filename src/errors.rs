//! Error types for the resource pool

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Pool is closed")]
    Closed,

    #[error("Resource source is unavailable")]
    Unavailable,

    #[error("Pool exhausted - no resource returned within {0:?}")]
    Exhausted(Duration),

    #[error("Failed to create resource: {0}")]
    Connect(#[source] Arc<dyn std::error::Error + Send + Sync>),

    #[error("Waiting thread was interrupted")]
    Interrupted,

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unknown pool property: {0}")]
    UnknownProperty(String),

    #[error("Invalid value {value:?} for pool property {key}")]
    InvalidProperty { key: String, value: String },
}

impl PoolError {
    pub(crate) fn connect<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PoolError::Connect(Arc::new(err))
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
