//! Resource capability and factory traits

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::errors::BoxError;

/// A reusable, expensive-to-create entity managed by a [`Pool`](crate::Pool).
///
/// `dispose` is the end-of-life signal. Called on a raw resource it tears the
/// resource down; called on a [`PooledObject`](crate::PooledObject) it hands
/// the resource back to its pool instead.
pub trait Resource: Send + Sync + 'static {
    /// Tear the resource down for good.
    fn dispose(self) -> Result<(), BoxError>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Knows how to build and warm up one kind of resource.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use lagoon::{BoxError, Resource, ResourceFactory};
/// use tokio_util::sync::CancellationToken;
///
/// struct Connection {
///     ready: bool,
/// }
///
/// impl Resource for Connection {}
///
/// struct ConnectionFactory;
///
/// #[async_trait]
/// impl ResourceFactory<Connection> for ConnectionFactory {
///     fn create(&self) -> Result<Connection, BoxError> {
///         Ok(Connection { ready: false })
///     }
///
///     async fn activate(
///         &self,
///         conn: &mut Connection,
///         _cancel: &CancellationToken,
///     ) -> Result<(), BoxError> {
///         conn.ready = true;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ResourceFactory<T: Send + 'static>: Send + Sync + 'static {
    /// Construct a raw resource.
    fn create(&self) -> Result<T, BoxError>;

    /// Warm up a freshly created resource. Only called when the pool's
    /// activator accepts the resource.
    async fn activate(
        &self,
        _resource: &mut T,
        _cancel: &CancellationToken,
    ) -> Result<(), BoxError> {
        Ok(())
    }
}
