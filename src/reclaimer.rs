//! Background trimming of idle resources

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::factory::Resource;
use crate::pool::PoolInner;

/// Periodic sweep owned by a pool
///
/// The task only holds a weak reference to the pool internals, so it never
/// keeps a pool alive. It stops when cancelled or once the pool is gone.
pub(crate) struct Reclaimer {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl Reclaimer {
    pub(crate) fn start<T: Resource>(pool: Weak<PoolInner<T>>, interval: Duration) -> Self {
        let stop = CancellationToken::new();
        let cancelled = stop.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }

                let Some(pool) = pool.upgrade() else {
                    break;
                };
                pool.prune();
            }
            trace!("reclaimer stopped");
        });

        Self { stop, task }
    }

    pub(crate) fn stop(&self) {
        self.stop.cancel();
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Reclaimer {
    fn drop(&mut self) {
        self.stop();
        self.task.abort();
    }
}
