//! Bounded worker pool
//!
//! Background resolution and export tasks run through one pool: a
//! semaphore bounds how many run at once and a join set keeps every
//! handle, so shutdown can wait for stragglers and abort whatever outlives
//! the grace period.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

/// Pool of tracked background tasks
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
}

impl WorkerPool {
    /// Create a pool allowing at most `max_concurrent` gated tasks at once
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Spawn a task gated by a concurrency permit
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = Arc::clone(&self.semaphore);
        let mut tasks = self.tasks.lock();
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            future.await;
        });
        Self::reap(&mut tasks);
    }

    /// Spawn a task that skips the permit gate (snapshot handling and
    /// wrap-triggered exports must not starve behind resolutions) but is
    /// still tracked and joined at shutdown.
    pub fn spawn_ungated<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        tasks.spawn(future);
        Self::reap(&mut tasks);
    }

    /// Drop handles of tasks that already finished so the set stays small
    fn reap(tasks: &mut JoinSet<()>) {
        while tasks.try_join_next().is_some() {}
    }

    /// Number of tasks not yet reaped
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Wait up to `grace` for outstanding tasks, then abort the rest
    pub async fn shutdown(&self, grace: Duration) {
        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        outstanding = tasks.len(),
                        "shutdown grace period expired, aborting outstanding tasks"
                    );
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    break;
                }
            }
        }
    }
}
