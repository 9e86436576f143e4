//! Error types for the resource pool

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Error returned by a [`ResourceFactory`](crate::ResourceFactory) or by
/// [`Resource::dispose`](crate::Resource::dispose).
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Shared form of a factory error, kept so that `PoolError` stays `Clone`.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Exception thrown when instantiating resource: {0}")]
    CreationFailed(#[source] SharedError),

    #[error("Exception thrown when activating resource: {0}")]
    ActivationFailed(#[source] SharedError),

    #[error("Pool exhausted - no resource became available within {0:?}")]
    PoolExhausted(Duration),

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("There are still {0} active resource(s)")]
    ActiveResourcesOutstanding(usize),

    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Pool has been shut down")]
    ShutDown,
}

impl PoolError {
    pub(crate) fn creation(err: BoxError) -> Self {
        Self::CreationFailed(Arc::from(err))
    }

    pub(crate) fn activation(err: BoxError) -> Self {
        Self::ActivationFailed(Arc::from(err))
    }

    /// Whether retrying the acquisition later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::PoolExhausted(_) | Self::Cancelled)
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
