//! Bounded-concurrency map over async work.
//!
//! Used to fan a prompt out across many models (or many prompts across one
//! model) without unbounded in-flight requests.

use futures::stream::{self, StreamExt};
use std::future::Future;

/// Worker count matching the machine's available parallelism.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Map `f` over `items` with at most `workers` futures in flight. Results
/// keep input order.
pub async fn map_ordered<I, F, Fut, T>(items: I, workers: usize, f: F) -> Vec<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    stream::iter(items)
        .map(f)
        .buffered(workers.max(1))
        .collect::<Vec<_>>()
        .await
}

/// Like [`map_ordered`], but results arrive in completion order.
pub async fn map_unordered<I, F, Fut, T>(items: I, workers: usize, f: F) -> Vec<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    stream::iter(items)
        .map(f)
        .buffer_unordered(workers.max(1))
        .collect::<Vec<_>>()
        .await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
