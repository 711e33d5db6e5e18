//! Bounded worker pool.
//!
//! Runs one future per item with at most `width` of them in flight, and
//! waits for every one of them before returning.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Fixed-width permit pool shared by retrieval and install fan-out.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    /// Maximum number of tasks in flight.
    width: usize,
    /// Permits gating task start.
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    /// Creates a pool with the given width. A width of zero is raised to one.
    #[must_use]
    pub fn new(width: usize) -> Self {
        let width = width.max(1);
        Self {
            width,
            semaphore: Arc::new(Semaphore::new(width)),
        }
    }

    /// Maximum number of tasks in flight.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Runs `task` for every item and returns the outputs in input order.
    ///
    /// A task holds its permit until its future completes.
    pub async fn run<I, F, Fut, T>(&self, items: I, task: F) -> Vec<T>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = T>,
    {
        let futures = items.into_iter().map(|item| {
            let semaphore = Arc::clone(&self.semaphore);
            let future = task(item);
            async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                future.await
            }
        });

        join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_never_exceeds_width() {
        let pool = WorkerPool::new(3);
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let results = pool
            .run(0..12, |i| {
                let in_flight = &in_flight;
                let peak = &peak;
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    i * 2
                }
            })
            .await;

        assert_eq!(results, (0..12).map(|i| i * 2).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_width_is_raised() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.width(), 1);
        let results = pool.run(vec!["a", "b"], |s| async move { s.len() }).await;
        assert_eq!(results, vec![1, 1]);
    }
}
