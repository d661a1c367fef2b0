// ABOUTME: Fixed-size worker pool draining a priority queue.
// ABOUTME: Higher priority first; FIFO by submission sequence within a priority.

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use tokio::sync::{Notify, oneshot};
use tokio_util::sync::CancellationToken;

use super::{PoolError, TaskHandle};

/// A task waiting in the queue.
///
/// Ordering: priority first (higher pops first), then sequence number
/// (lower pops first) so equal priorities keep submission order.
struct QueuedTask {
    priority: i32,
    sequence: u64,
    task: BoxFuture<'static, ()>,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct Shared {
    queue: Mutex<BinaryHeap<QueuedTask>>,
    available: Notify,
    next_sequence: AtomicU64,
    shutdown: CancellationToken,
}

/// Worker pool for local archive extraction and digest work.
pub struct PriorityPool {
    shared: Arc<Shared>,
    workers: usize,
}

impl PriorityPool {
    /// Spawn `workers` tasks on the current runtime.
    ///
    /// `initial_capacity` only pre-sizes the queue; submissions are never
    /// refused for lack of space.
    pub fn new(workers: usize, initial_capacity: usize) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(BinaryHeap::with_capacity(initial_capacity)),
            available: Notify::new(),
            next_sequence: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        });
        let workers = workers.max(1);
        for id in 0..workers {
            tokio::spawn(worker_loop(id, shared.clone()));
        }
        Self { shared, workers }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn submit<F, T>(&self, priority: i32, future: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.shared.shutdown.is_cancelled() {
            return Err(PoolError::Closed);
        }
        let (tx, rx) = oneshot::channel();
        let task = async move {
            let _ = tx.send(future.await);
        }
        .boxed();
        let sequence = self.shared.next_sequence.fetch_add(1, AtomicOrdering::Relaxed);
        self.shared.queue.lock().push(QueuedTask {
            priority,
            sequence,
            task,
        });
        self.shared.available.notify_one();
        Ok(TaskHandle::new(rx))
    }

    /// Stop the workers; queued tasks are dropped and their handles fail.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
        self.shared.queue.lock().clear();
    }
}

impl Drop for PriorityPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn worker_loop(id: usize, shared: Arc<Shared>) {
    loop {
        let next = shared.queue.lock().pop();
        match next {
            Some(queued) => {
                tracing::debug!(
                    worker = id,
                    priority = queued.priority,
                    sequence = queued.sequence,
                    "running queued task"
                );
                queued.task.await;
            }
            None => {
                tokio::select! {
                    _ = shared.shutdown.cancelled() => break,
                    _ = shared.available.notified() => {}
                }
            }
        }
    }
}
