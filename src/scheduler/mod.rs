// ABOUTME: Process-wide upload worker pools with explicit sizing and policies.
// ABOUTME: Priority queue for archive work, zero-queue controller pool, elastic URL fetch.

mod controller;
mod elastic;
mod priority;

pub use controller::ControllerPool;
pub use elastic::ElasticPool;
pub use priority::PriorityPool;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::config::PoolsConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("{pool} pool rejected the task: all workers are busy")]
    Rejected { pool: &'static str },

    #[error("{pool} pool queue is full")]
    QueueFull { pool: &'static str },

    #[error("worker pool is shut down")]
    Closed,

    #[error("task was dropped before it completed")]
    Cancelled,
}

impl PoolError {
    /// Backpressure the caller should treat as a retriable local failure.
    pub fn is_rejection(&self) -> bool {
        matches!(self, PoolError::Rejected { .. } | PoolError::QueueFull { .. })
    }
}

/// Result of a task running on one of the pools.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(rx: oneshot::Receiver<T>) -> Self {
        Self { rx }
    }

    pub async fn join(self) -> Result<T, PoolError> {
        self.rx.await.map_err(|_| PoolError::Cancelled)
    }
}

/// The three upload pools, built once at process start.
pub struct UploadPools {
    pub file_storage: PriorityPool,
    pub controller: ControllerPool,
    pub url_fetch: ElasticPool,
}

impl UploadPools {
    /// Must be called inside a tokio runtime; workers are spawned eagerly.
    pub fn new(config: &PoolsConfig) -> Self {
        tracing::debug!(
            file_storage = config.file_storage_workers,
            controller = config.controller_workers,
            url_fetch_core = config.url_fetch_core_workers,
            url_fetch_max = config.url_fetch_max_workers,
            "starting upload pools"
        );
        Self {
            file_storage: PriorityPool::new(
                config.file_storage_workers,
                config.file_storage_queue_capacity,
            ),
            controller: ControllerPool::new(config.controller_workers),
            url_fetch: ElasticPool::new(
                config.url_fetch_core_workers,
                config.url_fetch_max_workers,
                config.url_fetch_queue_capacity,
                config.url_fetch_keep_alive,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_backpressure() {
        assert!(PoolError::Rejected { pool: "controller" }.is_rejection());
        assert!(PoolError::QueueFull { pool: "url-fetch" }.is_rejection());
        assert!(!PoolError::Closed.is_rejection());
    }

    #[tokio::test]
    async fn pools_follow_config() {
        let pools = UploadPools::new(&PoolsConfig {
            controller_workers: 2,
            ..PoolsConfig::default()
        });
        assert_eq!(pools.controller.size(), 2);
        assert_eq!(pools.file_storage.workers(), 4);
        assert_eq!(pools.url_fetch.workers(), 5);
    }
}
