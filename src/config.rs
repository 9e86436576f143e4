//! Pool configuration options

use std::time::Duration;

use tokio::sync::Semaphore;

use crate::errors::{PoolError, PoolResult};

fn always<T>(_: &T) -> bool {
    true
}

/// Configuration for resource pool behavior
///
/// All values are fixed once the pool is constructed.
///
/// # Examples
///
/// ```
/// use lagoon::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::<String>::new()
///     .with_min_objects(1)
///     .with_max_objects(4)
///     .with_acquisition_timeout(Duration::from_millis(500));
///
/// assert_eq!(config.max_objects, 4);
/// assert_eq!(config.sweep_interval, Duration::from_secs(10));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfiguration<T> {
    /// Floor the background reclaimer will not shrink the pool below
    pub min_objects: usize,

    /// Maximum number of resources that can be checked out simultaneously
    pub max_objects: usize,

    /// Period of the background reclaimer
    pub sweep_interval: Duration,

    /// Maximum time to wait for a resource when the pool is saturated
    pub acquisition_timeout: Duration,

    /// Decides whether a freshly created resource goes through the factory's
    /// activation step
    pub object_activator: fn(&T) -> bool,

    /// Decides whether an idle resource is torn down on shutdown. Resources
    /// rejected here are handed back to the caller instead.
    pub object_passivator: fn(&T) -> bool,
}

impl<T> Default for PoolConfiguration<T> {
    fn default() -> Self {
        Self {
            min_objects: 3,
            max_objects: 10,
            sweep_interval: Duration::from_secs(10),
            acquisition_timeout: Duration::from_secs(30),
            object_activator: always::<T>,
            object_passivator: always::<T>,
        }
    }
}

impl<T> PoolConfiguration<T> {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the reclaimer floor
    pub fn with_min_objects(mut self, count: usize) -> Self {
        self.min_objects = count;
        self
    }

    /// Set the maximum number of concurrently checked out resources
    ///
    /// # Examples
    ///
    /// ```
    /// use lagoon::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::<u32>::new().with_max_objects(50);
    ///
    /// assert_eq!(config.max_objects, 50);
    /// ```
    pub fn with_max_objects(mut self, count: usize) -> Self {
        self.max_objects = count;
        self
    }

    /// Set the reclaimer period
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the maximum wait for a saturated pool
    pub fn with_acquisition_timeout(mut self, timeout: Duration) -> Self {
        self.acquisition_timeout = timeout;
        self
    }

    /// Set the activation predicate
    pub fn with_activator(mut self, activator: fn(&T) -> bool) -> Self {
        self.object_activator = activator;
        self
    }

    /// Set the passivation predicate
    ///
    /// # Examples
    ///
    /// ```
    /// use lagoon::PoolConfiguration;
    ///
    /// // Keep every idle resource alive when the pool shuts down.
    /// let config = PoolConfiguration::<Vec<u8>>::new().with_passivator(|_| false);
    ///
    /// assert!(!(config.object_passivator)(&Vec::new()));
    /// ```
    pub fn with_passivator(mut self, passivator: fn(&T) -> bool) -> Self {
        self.object_passivator = passivator;
        self
    }

    /// Check that the limits describe a usable pool
    pub fn validate(&self) -> PoolResult<()> {
        if self.max_objects == 0 {
            return Err(PoolError::InvalidConfiguration(
                "max_objects must be greater than 0".to_string(),
            ));
        }
        if self.max_objects > Semaphore::MAX_PERMITS {
            return Err(PoolError::InvalidConfiguration(format!(
                "max_objects must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.min_objects > self.max_objects {
            return Err(PoolError::InvalidConfiguration(format!(
                "min_objects ({}) must not exceed max_objects ({})",
                self.min_objects, self.max_objects
            )));
        }
        if self.sweep_interval.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "sweep_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfiguration::<i32>::default();

        assert_eq!(config.min_objects, 3);
        assert_eq!(config.max_objects, 10);
        assert_eq!(config.sweep_interval, Duration::from_secs(10));
        assert_eq!(config.acquisition_timeout, Duration::from_secs(30));
        assert!((config.object_activator)(&1));
        assert!((config.object_passivator)(&1));
    }

    #[test]
    fn test_rejects_zero_max() {
        let config = PoolConfiguration::<i32>::new()
            .with_min_objects(0)
            .with_max_objects(0);

        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_min_above_max() {
        let config = PoolConfiguration::<i32>::new()
            .with_min_objects(5)
            .with_max_objects(2);

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_objects (5)"));
    }

    #[test]
    fn test_rejects_zero_sweep_interval() {
        let config = PoolConfiguration::<i32>::new().with_sweep_interval(Duration::ZERO);

        assert!(config.validate().is_err());
    }
}
