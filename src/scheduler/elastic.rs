// ABOUTME: URL-fetch pool: core workers plus transient ones under load.
// ABOUTME: Bounded queue; callers choose between waiting and failing fast.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, oneshot};

use super::{PoolError, TaskHandle};

type Task = BoxFuture<'static, ()>;

struct Shared {
    queue: Mutex<mpsc::Receiver<Task>>,
    workers: AtomicUsize,
    max_workers: usize,
    keep_alive: Duration,
}

pub struct ElasticPool {
    tx: mpsc::Sender<Task>,
    shared: Arc<Shared>,
}

impl ElasticPool {
    pub fn new(
        core_workers: usize,
        max_workers: usize,
        queue_capacity: usize,
        keep_alive: Duration,
    ) -> Self {
        let core_workers = core_workers.max(1);
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let shared = Arc::new(Shared {
            queue: Mutex::new(rx),
            workers: AtomicUsize::new(core_workers),
            max_workers: max_workers.max(core_workers),
            keep_alive,
        });
        for _ in 0..core_workers {
            tokio::spawn(worker(shared.clone(), None, false));
        }
        Self { tx, shared }
    }

    /// Live workers, core and transient.
    pub fn workers(&self) -> usize {
        self.shared.workers.load(Ordering::Acquire)
    }

    /// Queue the task, waiting for space when no extra worker can start.
    pub async fn submit<F, T>(&self, future: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (task, handle) = wrap(future);
        match self.tx.try_send(task) {
            Ok(()) => Ok(handle),
            Err(TrySendError::Closed(_)) => Err(PoolError::Closed),
            Err(TrySendError::Full(task)) => match self.grow(task) {
                Ok(()) => Ok(handle),
                Err(task) => {
                    self.tx.send(task).await.map_err(|_| PoolError::Closed)?;
                    Ok(handle)
                }
            },
        }
    }

    /// Queue the task or fail with `PoolError::QueueFull` right away.
    pub fn try_submit<F, T>(&self, future: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (task, handle) = wrap(future);
        match self.tx.try_send(task) {
            Ok(()) => Ok(handle),
            Err(TrySendError::Closed(_)) => Err(PoolError::Closed),
            Err(TrySendError::Full(task)) => self
                .grow(task)
                .map(|()| handle)
                .map_err(|_| PoolError::QueueFull { pool: "url-fetch" }),
        }
    }

    /// Start a transient worker that runs `task` first; hands the task back
    /// when the pool is already at its maximum size.
    fn grow(&self, task: Task) -> Result<(), Task> {
        let grew = self
            .shared
            .workers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.shared.max_workers).then_some(n + 1)
            })
            .is_ok();
        if !grew {
            return Err(task);
        }
        tracing::debug!(workers = self.workers(), "url-fetch pool grew");
        tokio::spawn(worker(self.shared.clone(), Some(task), true));
        Ok(())
    }
}

fn wrap<F, T>(future: F) -> (Task, TaskHandle<T>)
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let task = async move {
        let _ = tx.send(future.await);
    }
    .boxed();
    (task, TaskHandle::new(rx))
}

async fn worker(shared: Arc<Shared>, first: Option<Task>, transient: bool) {
    if let Some(task) = first {
        task.await;
    }
    loop {
        let receive = async { shared.queue.lock().await.recv().await };
        let next = if transient {
            match tokio::time::timeout(shared.keep_alive, receive).await {
                Ok(next) => next,
                // idle past keep-alive
                Err(_) => break,
            }
        } else {
            receive.await
        };
        match next {
            Some(task) => task.await,
            None => break,
        }
    }
    shared.workers.fetch_sub(1, Ordering::AcqRel);
}
