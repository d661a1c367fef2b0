// ABOUTME: Controller-bound transfer pool with zero queueing.
// ABOUTME: A submission without a free worker is rejected immediately.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Semaphore, oneshot};

use super::{PoolError, TaskHandle};

pub struct ControllerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl ControllerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Workers currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `future` on a free worker or fail with `PoolError::Rejected`.
    pub fn try_submit<F, T>(&self, future: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| PoolError::Rejected { pool: "controller" })?;
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let output = future.await;
            drop(permit);
            let _ = tx.send(output);
        });
        Ok(TaskHandle::new(rx))
    }
}
