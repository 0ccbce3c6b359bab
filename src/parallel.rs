use std::future::Future;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::task::JoinError;

/// Completed task: its index and the join result
pub type Completed<T> = (usize, Result<T, JoinError>);

/// Bounded pool of spawned tokio tasks, each tagged with an index.
///
/// The caller decides when to admit work; the pool only reports whether it
/// has room under its bound and hands back tasks as they finish.
pub struct WorkerPool<T> {
    bound: usize,
    running: FuturesUnordered<BoxFuture<'static, Completed<T>>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Creates a pool running at most `bound` tasks (at least one)
    pub fn new(bound: usize) -> Self {
        Self {
            bound: bound.max(1),
            running: FuturesUnordered::new(),
        }
    }

    /// Maximum number of tasks in flight
    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Number of tasks in flight
    pub fn in_flight(&self) -> usize {
        self.running.len()
    }

    /// Checks if another task may be spawned
    pub fn has_capacity(&self) -> bool {
        self.running.len() < self.bound
    }

    /// Checks if nothing is running
    pub fn is_idle(&self) -> bool {
        self.running.is_empty()
    }

    /// Spawns `task` on the runtime under `index`
    pub fn spawn<F>(&mut self, index: usize, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        self.running.push(handle.map(move |joined| (index, joined)).boxed());
    }

    /// Waits for the next task to finish; `None` when the pool is idle
    pub async fn next_completed(&mut self) -> Option<Completed<T>> {
        self.running.next().await
    }
}
