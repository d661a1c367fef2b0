// ABOUTME: Integration tests for the upload worker pools.
// ABOUTME: Priority order with stable ties, controller rejection, elastic growth.

mod support;

use mtadeploy::scheduler::{ControllerPool, ElasticPool, PoolError, PriorityPool};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Occupy the only worker of `pool` until the returned sender fires.
async fn block_worker(pool: &PriorityPool) -> oneshot::Sender<()> {
    let (started_tx, started_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    pool.submit(i32::MAX, async move {
        let _ = started_tx.send(());
        let _ = release_rx.await;
    })
    .unwrap();
    started_rx.await.unwrap();
    release_tx
}

#[tokio::test]
async fn higher_priority_runs_first_and_ties_keep_submission_order() {
    support::init_tracing();
    let pool = PriorityPool::new(1, 2);
    let release = block_worker(&pool).await;

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();
    for (label, priority) in [("3a", 3), ("1", 1), ("2", 2), ("3b", 3)] {
        let order = order.clone();
        handles.push(
            pool.submit(priority, async move { order.lock().push(label) })
                .unwrap(),
        );
    }
    // Four tasks queued behind a capacity hint of two: the queue grows.
    assert_eq!(pool.queued(), 4);

    release.send(()).unwrap();
    for handle in handles {
        handle.join().await.unwrap();
    }
    assert_eq!(*order.lock(), vec!["3a", "3b", "2", "1"]);
}

#[tokio::test]
async fn controller_pool_rejects_instead_of_queueing() {
    let pool = ControllerPool::new(1);
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let busy = pool
        .try_submit(async move {
            let _ = release_rx.await;
        })
        .unwrap();

    let err = pool.try_submit(async {}).err().unwrap();
    assert!(err.is_rejection());
    assert!(matches!(err, PoolError::Rejected { .. }));

    release_tx.send(()).unwrap();
    busy.join().await.unwrap();
    let value = pool.try_submit(async { 7 }).unwrap().join().await.unwrap();
    assert_eq!(value, 7);
}

#[tokio::test]
async fn elastic_pool_grows_to_max_and_runs_everything() {
    let pool = ElasticPool::new(1, 3, 1, Duration::from_millis(50));
    let (release_tx, release_rx) = tokio::sync::watch::channel(false);

    let mut handles = Vec::new();
    for i in 0..3 {
        let mut release = release_rx.clone();
        handles.push(
            pool.submit(async move {
                while !*release.borrow() {
                    if release.changed().await.is_err() {
                        break;
                    }
                }
                i
            })
            .await
            .unwrap(),
        );
    }
    assert!((1..=3).contains(&pool.workers()));

    release_tx.send(true).unwrap();
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.join().await.unwrap());
    }
    results.sort();
    assert_eq!(results, vec![0, 1, 2]);
}
