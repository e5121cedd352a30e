//! Bounded-concurrency fan-out: every component that issues concurrent
//! uploads (layer pushes, weight pushes) runs through here rather than
//! rolling its own `tokio::spawn` loop.
//!
//! First error cancels sibling tasks via a derived [`CancellationToken`];
//! `wait` (the `await` on the returned future) yields the first error,
//! discarding the rest.

use crate::error::{PusherError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Default concurrency when `COG_PUSH_CONCURRENCY` is unset or invalid.
pub const DEFAULT_PUSH_CONCURRENCY: usize = 4;

/// Reads `COG_PUSH_CONCURRENCY`: a positive integer overrides the default;
/// anything else (unset, empty, zero, negative, non-numeric) falls back to
/// [`DEFAULT_PUSH_CONCURRENCY`].
pub fn get_push_concurrency() -> usize {
    std::env::var("COG_PUSH_CONCURRENCY")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|n| *n > 0)
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_PUSH_CONCURRENCY)
}

/// Runs `task` over `items` with at most `limit` concurrent in flight,
/// cancelling siblings via `cancel` on the first error and returning that
/// error. Every spawned task completes or observes cancellation before
/// this returns.
pub async fn run_bounded<T, F, Fut>(
    items: Vec<T>,
    limit: usize,
    cancel: CancellationToken,
    task: F,
) -> Result<()>
where
    T: Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    run_bounded_collect(items, limit, cancel, task).await.map(|_| ())
}

/// Like [`run_bounded`] but preserves each task's result in input order.
pub async fn run_bounded_collect<T, R, F, Fut>(
    items: Vec<T>,
    limit: usize,
    cancel: CancellationToken,
    task: F,
) -> Result<Vec<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let task = Arc::new(task);
    let mut handles = Vec::with_capacity(items.len());

    for (idx, item) in items.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();
        let task = task.clone();
        handles.push((
            idx,
            tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| PusherError::Cancelled)?;
                if cancel.is_cancelled() {
                    return Err(PusherError::Cancelled);
                }
                task(item, cancel.clone()).await
            }),
        ));
    }

    let mut results: Vec<Option<R>> = (0..handles.len()).map(|_| None).collect();
    let mut first_err = None;

    for (idx, handle) in handles {
        match handle.await {
            Ok(Ok(value)) => results[idx] = Some(value),
            Ok(Err(e)) => {
                if first_err.is_none() {
                    cancel.cancel();
                    first_err = Some(e);
                }
            }
            Err(join_err) => {
                if first_err.is_none() {
                    cancel.cancel();
                    first_err = Some(PusherError::Io(format!("task panicked: {join_err}")));
                }
            }
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(results.into_iter().map(|r| r.expect("all tasks succeeded")).collect()),
    }
}
