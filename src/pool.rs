//! Core resource pool implementation

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::factory::{Resource, ResourceFactory};
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};
use crate::pooled::{PooledObject, PooledWrapper};
use crate::reclaimer::Reclaimer;

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tokio::sync::{Semaphore, SemaphorePermit, TryAcquireError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Idle resources, most recently released on top.
struct Idle<T> {
    stack: Vec<PooledWrapper<T>>,
    /// Flipped under the same lock that guards the stack so that a release
    /// racing a shutdown never parks a resource in a dead pool.
    shut_down: bool,
}

/// State shared between the pool, its handles and the reclaimer.
pub(crate) struct PoolInner<T: Resource> {
    factory: Box<dyn ResourceFactory<T>>,
    config: PoolConfiguration<T>,
    idle: Mutex<Idle<T>>,
    /// Checked out resources by id, with the instant they were handed out.
    active: DashMap<Uuid, Instant>,
    /// One permit per resource that may still be checked out. Idle resources
    /// hold no permit.
    slots: Semaphore,
    metrics: MetricsTracker,
}

impl<T: Resource> PoolInner<T> {
    fn available_count(&self) -> usize {
        self.idle.lock().stack.len()
    }

    /// Pop the most recently released resource and mark it active.
    fn claim_idle(&self) -> PoolResult<Option<PooledWrapper<T>>> {
        let mut idle = self.idle.lock();
        if idle.shut_down {
            return Err(PoolError::ShutDown);
        }
        let wrapper = idle.stack.pop();
        if let Some(wrapper) = &wrapper {
            self.active.insert(wrapper.id(), Instant::now());
        }
        Ok(wrapper)
    }

    /// Mark a freshly created resource active.
    fn register(&self, wrapper: PooledWrapper<T>) -> PoolResult<PooledWrapper<T>> {
        {
            let idle = self.idle.lock();
            if !idle.shut_down {
                self.active.insert(wrapper.id(), Instant::now());
                return Ok(wrapper);
            }
        }
        self.retire(wrapper);
        Err(PoolError::ShutDown)
    }

    /// Move a resource from active back to available.
    ///
    /// Both moves happen under the idle lock, so a resource is always in
    /// exactly one of the two sets. Unknown or already released ids are
    /// ignored.
    pub(crate) fn release(&self, wrapper: PooledWrapper<T>) {
        let id = wrapper.id();
        let (checked_out_at, late) = {
            let mut idle = self.idle.lock();
            let Some((_, checked_out_at)) = self.active.remove(&id) else {
                drop(idle);
                trace!(%id, "ignoring release of a resource that is not checked out");
                return;
            };
            if idle.shut_down {
                (checked_out_at, Some(wrapper))
            } else {
                idle.stack.push(wrapper);
                (checked_out_at, None)
            }
        };
        self.slots.add_permits(1);
        self.metrics.released.fetch_add(1, Ordering::Relaxed);

        match late {
            Some(wrapper) => self.retire(wrapper),
            None => trace!(
                %id,
                held_ms = checked_out_at.elapsed().as_millis() as u64,
                "resource returned to pool"
            ),
        }
    }

    /// Stop tracking a detached resource.
    pub(crate) fn forget(&self, id: Uuid) {
        if self.active.remove(&id).is_some() {
            self.slots.add_permits(1);
            debug!(%id, "resource detached from pool");
        }
    }

    /// Tear down a resource that can no longer be pooled, if the passivator
    /// agrees. Otherwise it is simply dropped.
    fn retire(&self, wrapper: PooledWrapper<T>) {
        if (self.config.object_passivator)(wrapper.resource()) {
            wrapper.destroy();
            self.metrics.destroyed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// One reclaimer sweep: destroy idle resources while the pool is above
    /// its floor. Work is bounded by the idle count seen at the start.
    pub(crate) fn prune(&self) -> usize {
        let min_objects = self.config.min_objects;
        let observed = self.available_count();
        let mut current_size = self.active.len() + observed;

        if current_size <= min_objects || observed == 0 {
            return 0;
        }

        let mut destroyed = 0;
        for _ in 0..observed {
            if current_size <= min_objects {
                break;
            }
            // The lock is released before teardown so a slow dispose only
            // delays this sweep.
            let Some(wrapper) = self.idle.lock().stack.pop() else {
                break;
            };
            wrapper.destroy();
            current_size -= 1;
            destroyed += 1;
        }

        self.metrics.destroyed.fetch_add(destroyed, Ordering::Relaxed);
        if destroyed > 0 {
            debug!(
                destroyed,
                active = self.active.len(),
                available = self.available_count(),
                "reclaimed idle resources"
            );
        }
        destroyed
    }
}

/// Thread-safe pool of expensive, reusable resources
///
/// Idle resources are reused most-recently-released first. When nothing is
/// idle a new resource is created, as long as fewer than `max_objects` are
/// checked out; otherwise the caller waits up to `acquisition_timeout` for
/// one to come back. A background reclaimer trims idle resources down to
/// `min_objects` every `sweep_interval`.
///
/// Must be created from within a Tokio runtime.
pub struct Pool<T: Resource> {
    inner: Arc<PoolInner<T>>,
    reclaimer: Reclaimer,
}

impl<T: Resource> Pool<T> {
    /// Create a new pool around a factory
    pub fn new<F>(factory: F, config: PoolConfiguration<T>) -> PoolResult<Self>
    where
        F: ResourceFactory<T>,
    {
        config.validate()?;

        debug!(
            min_objects = config.min_objects,
            max_objects = config.max_objects,
            sweep_interval_ms = config.sweep_interval.as_millis() as u64,
            "creating resource pool"
        );

        let sweep_interval = config.sweep_interval;
        let inner = Arc::new(PoolInner {
            factory: Box::new(factory),
            slots: Semaphore::new(config.max_objects),
            idle: Mutex::new(Idle {
                stack: Vec::with_capacity(config.max_objects),
                shut_down: false,
            }),
            active: DashMap::new(),
            metrics: MetricsTracker::default(),
            config,
        });
        let reclaimer = Reclaimer::start(Arc::downgrade(&inner), sweep_interval);

        Ok(Self { inner, reclaimer })
    }

    /// Get a resource from the pool
    ///
    /// Reuses an idle resource when there is one, creates a new one when
    /// capacity allows, and otherwise waits for a resource to be released.
    /// Cancellation is honored before any work starts and while waiting; a
    /// factory call that has already started always runs to completion.
    pub async fn acquire(&self, cancel: &CancellationToken) -> PoolResult<PooledObject<T>> {
        if cancel.is_cancelled() {
            return Err(PoolError::Cancelled);
        }

        let permit = match self.inner.slots.try_acquire() {
            Ok(permit) => permit,
            Err(TryAcquireError::Closed) => return Err(PoolError::ShutDown),
            Err(TryAcquireError::NoPermits) => self.wait_for_slot(cancel).await?,
        };

        if let Some(wrapper) = self.inner.claim_idle()? {
            permit.forget();
            self.inner.metrics.reused.fetch_add(1, Ordering::Relaxed);
            trace!(id = %wrapper.id(), "reusing idle resource");
            return Ok(self.hand_out(wrapper));
        }

        let wrapper = self.create(cancel).await?;
        let wrapper = self.inner.register(wrapper)?;
        permit.forget();
        Ok(self.hand_out(wrapper))
    }

    /// Get an idle resource without creating or waiting
    pub fn try_acquire(&self) -> Option<PooledObject<T>> {
        let permit = self.inner.slots.try_acquire().ok()?;
        let wrapper = self.inner.claim_idle().ok().flatten()?;
        permit.forget();
        self.inner.metrics.reused.fetch_add(1, Ordering::Relaxed);
        Some(self.hand_out(wrapper))
    }

    /// Return a checked out resource to the pool
    ///
    /// Releasing a handle twice is a no-op. Dropping the handle or calling
    /// [`Resource::dispose`] on it has the same effect.
    pub fn release(&self, handle: &mut PooledObject<T>) -> PoolResult<()> {
        if !handle.belongs_to(&self.inner) {
            return Err(PoolError::InvalidArgument("handle belongs to a different pool"));
        }
        handle.release_to_pool();
        Ok(())
    }

    /// Run one reclaimer sweep now, returning how many resources were destroyed
    pub fn prune(&self) -> usize {
        self.inner.prune()
    }

    /// Shut the pool down
    ///
    /// Fails while resources are still checked out. Otherwise every idle
    /// resource accepted by the passivator is torn down; the ones it rejects
    /// are handed back to the caller. Calling this again is a no-op.
    pub fn shutdown(&self) -> PoolResult<Vec<T>> {
        let drained = {
            let mut idle = self.inner.idle.lock();
            if idle.shut_down {
                return Ok(Vec::new());
            }
            let active = self.inner.active.len();
            if active > 0 {
                return Err(PoolError::ActiveResourcesOutstanding(active));
            }
            idle.shut_down = true;
            std::mem::take(&mut idle.stack)
        };

        self.inner.slots.close();
        self.reclaimer.stop();

        let mut kept = Vec::new();
        let mut destroyed = 0;
        for wrapper in drained {
            if (self.inner.config.object_passivator)(wrapper.resource()) {
                wrapper.destroy();
                destroyed += 1;
            } else {
                kept.push(wrapper.into_inner());
            }
        }
        self.inner.metrics.destroyed.fetch_add(destroyed, Ordering::Relaxed);

        debug!(destroyed, kept = kept.len(), "resource pool shut down");
        Ok(kept)
    }

    /// Whether [`shutdown`](Self::shutdown) has completed
    pub fn is_shut_down(&self) -> bool {
        self.inner.idle.lock().shut_down
    }

    /// Get available count
    pub fn available_count(&self) -> usize {
        self.inner.available_count()
    }

    /// Get active count
    pub fn active_count(&self) -> usize {
        self.inner.active.len()
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfiguration<T> {
        &self.inner.config
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        self.inner.metrics.get_metrics(
            self.active_count(),
            self.available_count(),
            self.inner.config.max_objects,
        )
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
    }

    /// Wait for a checked out resource to come back. Cancellation wins over
    /// a timeout that fires at the same moment.
    async fn wait_for_slot(&self, cancel: &CancellationToken) -> PoolResult<SemaphorePermit<'_>> {
        let timeout = self.inner.config.acquisition_timeout;
        self.inner.metrics.saturated_waits.fetch_add(1, Ordering::Relaxed);
        trace!(active = self.active_count(), "pool saturated, waiting for a release");

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(PoolError::Cancelled),
            waited = tokio::time::timeout(timeout, self.inner.slots.acquire()) => match waited {
                Ok(Ok(permit)) => Ok(permit),
                Ok(Err(_)) => Err(PoolError::ShutDown),
                Err(_) => {
                    self.inner.metrics.exhausted_events.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        timeout_ms = timeout.as_millis() as u64,
                        active = self.active_count(),
                        "pool empty and timeout exceeded"
                    );
                    Err(PoolError::PoolExhausted(timeout))
                }
            },
        }
    }

    async fn create(&self, cancel: &CancellationToken) -> PoolResult<PooledWrapper<T>> {
        let inner = &self.inner;

        let mut resource = inner.factory.create().map_err(|error| {
            inner.metrics.creation_failures.fetch_add(1, Ordering::Relaxed);
            warn!(%error, "failed to create pooled resource");
            PoolError::creation(error)
        })?;

        if (inner.config.object_activator)(&resource) {
            if let Err(error) = inner.factory.activate(&mut resource, cancel).await {
                inner.metrics.activation_failures.fetch_add(1, Ordering::Relaxed);
                warn!(%error, "failed to activate pooled resource");
                if let Err(teardown) = resource.dispose() {
                    warn!(error = %teardown, "failed to dispose resource after activation failure");
                }
                return Err(PoolError::activation(error));
            }
        }

        inner.metrics.created.fetch_add(1, Ordering::Relaxed);
        let wrapper = PooledWrapper::new(resource);
        debug!(id = %wrapper.id(), "created pooled resource");
        Ok(wrapper)
    }

    fn hand_out(&self, wrapper: PooledWrapper<T>) -> PooledObject<T> {
        PooledObject::new(wrapper, Arc::clone(&self.inner))
    }
}
