//! Bounded fan-out with an explicit join.

use std::future::Future;

use futures::stream::{self, StreamExt};

/// Default number of in-flight tasks per batch.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Run `task` over every item with at most `limit` futures in flight and
/// wait for all of them. Output order is completion order.
pub async fn bounded<I, F, Fut, T>(items: I, limit: usize, task: F) -> Vec<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    stream::iter(items)
        .map(task)
        .buffer_unordered(limit.max(1))
        .collect()
        .await
}
