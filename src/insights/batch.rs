use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use futures::{stream, StreamExt};
use log::{info, warn};
use serde::Serialize;
use tokio::sync::watch;

use crate::error::{BuildLensError, Result};

pub const BATCH_CONCURRENCY: usize = 10;

/// Successful items of a batch, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchResult<T> {
    pub items: Vec<T>,
    /// Labels of inputs whose operation failed and were left out of `items`.
    pub failed: Vec<String>,
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchResult<T> {
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Cancels whole batches. Clones share the same signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Await an optional fetch, falling back to `default` when it fails.
pub async fn best_effort<T, F>(fetch: F, default: T, what: &str) -> T
where
    F: Future<Output = Result<T>>,
{
    match fetch.await {
        Ok(value) => value,
        Err(e) => {
            warn!("Ignoring failed fetch of {what}: {e}");
            default
        }
    }
}

/// Run `op` for every item, keeping the successes in input order.
///
/// Items run concurrently (at most `BATCH_CONCURRENCY` at a time). A failing item is
/// logged and skipped; only an empty input or cancellation fails the batch.
pub async fn process_batch<I, T, F, Fut>(
    items: Vec<I>,
    op: F,
    cancel: &CancelToken,
) -> Result<BatchResult<T>>
where
    I: Display,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if items.is_empty() {
        return Err(BuildLensError::Validation(
            "Batch must contain at least one item".to_string(),
        ));
    }
    if cancel.is_cancelled() {
        return Err(BuildLensError::Cancelled);
    }

    let total = items.len();
    info!("Processing batch of {total} items...");

    let run = stream::iter(items)
        .map(|item| {
            let label = item.to_string();
            let fut = op(item);
            async move { (label, fut.await) }
        })
        .buffered(BATCH_CONCURRENCY)
        .fold(BatchResult::default(), |mut batch, (label, outcome)| async move {
            match outcome {
                Ok(value) => batch.items.push(value),
                Err(e) => {
                    warn!("Skipping {label}: {e}");
                    batch.failed.push(label);
                }
            }
            batch
        });

    tokio::select! {
        biased;
        () = cancel.cancelled() => {
            warn!("Batch of {total} items cancelled");
            Err(BuildLensError::Cancelled)
        }
        batch = run => {
            info!(
                "Batch finished: {} succeeded, {} failed",
                batch.items.len(),
                batch.failed.len()
            );
            Ok(batch)
        }
    }
}
