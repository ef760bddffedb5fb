use futures::stream::{self, StreamExt};
use std::future::Future;

/// Run `worker` over every item with at most `limit` futures in flight.
///
/// Each item is started exactly once, in input order, as slots free up.
/// Results come back in completion order; `worker` receives the item's
/// input index so callers can restore ordering if they need it.
pub async fn run_with_concurrency<T, R, F, Fut>(items: Vec<T>, limit: usize, worker: F) -> Vec<R>
where
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = R>,
{
    let limit = limit.max(1);
    let total = items.len();

    tracing::debug!("Running batch of {} with concurrency {}", total, limit);

    stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| worker(index, item))
        .buffer_unordered(limit)
        .collect()
        .await
}
