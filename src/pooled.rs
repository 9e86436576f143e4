//! Pooled wrapper and the handle given to consumers

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::{trace, warn};
use uuid::Uuid;

use crate::errors::BoxError;
use crate::factory::Resource;
use crate::pool::PoolInner;

/// Binds one resource to its identity for as long as the pool tracks it.
pub(crate) struct PooledWrapper<T> {
    id: Uuid,
    resource: T,
}

impl<T: Resource> PooledWrapper<T> {
    pub(crate) fn new(resource: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource,
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn resource(&self) -> &T {
        &self.resource
    }

    pub(crate) fn into_inner(self) -> T {
        self.resource
    }

    /// Actually tear the resource down. Teardown failures are logged and
    /// swallowed so one broken resource cannot fail a sweep or a shutdown.
    pub(crate) fn destroy(self) -> bool {
        let Self { id, resource } = self;
        match resource.dispose() {
            Ok(()) => {
                trace!(%id, "disposed pooled resource");
                true
            }
            Err(error) => {
                warn!(%id, %error, "failed to dispose pooled resource");
                false
            }
        }
    }
}

/// A checked out resource that goes back to its pool when dropped
///
/// The handle dereferences to the resource, so consumer code uses it exactly
/// like a privately owned instance. Ending its use, either by dropping it or by
/// calling [`Resource::dispose`] on it, returns the resource to the pool
/// instead of tearing it down.
///
/// Handle-specific operations are associated functions
/// ([`PooledObject::id`], [`PooledObject::is_released`],
/// [`PooledObject::detach`]) so that every method call on the handle reaches
/// the resource.
///
/// # Panics
///
/// Dereferencing a handle after it was passed to
/// [`Pool::release`](crate::Pool::release) panics, because its resource is
/// back in the pool. Check [`PooledObject::is_released`] when a handle may
/// outlive its release.
///
/// # Examples
///
/// ```
/// use lagoon::{BoxError, Pool, PoolConfiguration, Resource, ResourceFactory};
/// use tokio_util::sync::CancellationToken;
///
/// struct Buffer(Vec<u8>);
///
/// impl Resource for Buffer {}
///
/// struct BufferFactory;
///
/// impl ResourceFactory<Buffer> for BufferFactory {
///     fn create(&self) -> Result<Buffer, BoxError> {
///         Ok(Buffer(Vec::with_capacity(4096)))
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), lagoon::PoolError> {
/// let pool = Pool::new(BufferFactory, PoolConfiguration::default())?;
///
/// let mut buffer = pool.acquire(&CancellationToken::new()).await?;
/// buffer.0.extend_from_slice(b"hello");
/// assert_eq!(pool.active_count(), 1);
///
/// // Disposing the handle parks the buffer in the pool.
/// buffer.dispose().unwrap();
/// assert_eq!(pool.active_count(), 0);
/// assert_eq!(pool.available_count(), 1);
/// # Ok(())
/// # }
/// ```
pub struct PooledObject<T: Resource> {
    wrapper: Option<PooledWrapper<T>>,
    id: Uuid,
    pool: Arc<PoolInner<T>>,
}

impl<T: Resource> PooledObject<T> {
    pub(crate) fn new(wrapper: PooledWrapper<T>, pool: Arc<PoolInner<T>>) -> Self {
        Self {
            id: wrapper.id(),
            wrapper: Some(wrapper),
            pool,
        }
    }

    /// Identity of the pooled resource, stable across checkouts
    ///
    /// This is an associated function, so a method of the same name on the
    /// resource stays reachable through the handle.
    pub fn id(this: &Self) -> Uuid {
        this.id
    }

    /// Whether this handle has already given its resource back
    pub fn is_released(this: &Self) -> bool {
        this.wrapper.is_none()
    }

    /// Take the resource out of the pool for good
    ///
    /// The pool stops tracking it and frees its admission slot. Returns
    /// `None` if the handle was already released.
    pub fn detach(mut this: Self) -> Option<T> {
        let wrapper = this.wrapper.take()?;
        this.pool.forget(wrapper.id());
        Some(wrapper.into_inner())
    }

    pub(crate) fn belongs_to(&self, pool: &Arc<PoolInner<T>>) -> bool {
        Arc::ptr_eq(&self.pool, pool)
    }

    pub(crate) fn release_to_pool(&mut self) {
        if let Some(wrapper) = self.wrapper.take() {
            self.pool.release(wrapper);
        }
    }
}

impl<T: Resource> Deref for PooledObject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        match &self.wrapper {
            Some(wrapper) => &wrapper.resource,
            None => panic!("resource {} already returned to the pool", self.id),
        }
    }
}

impl<T: Resource> DerefMut for PooledObject<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.wrapper {
            Some(wrapper) => &mut wrapper.resource,
            None => panic!("resource {} already returned to the pool", self.id),
        }
    }
}

impl<T: Resource> Resource for PooledObject<T> {
    fn dispose(mut self) -> Result<(), BoxError> {
        self.release_to_pool();
        Ok(())
    }
}

impl<T: Resource> Drop for PooledObject<T> {
    fn drop(&mut self) {
        self.release_to_pool();
    }
}

impl<T: Resource + fmt::Debug> fmt::Debug for PooledObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledObject")
            .field("id", &self.id)
            .field("resource", &self.wrapper.as_ref().map(|w| &w.resource))
            .finish()
    }
}
