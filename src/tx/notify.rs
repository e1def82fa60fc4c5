//! Bounded executor for commit completion callbacks.
//!
//! Terminal commit results are handed to waiting callers on a
//! [`NotificationPool`] rather than on the commit task itself. At most
//! `workers` callbacks run at once and at most `workers + queue_capacity`
//! are admitted; beyond that, [`NotificationPool::dispatch`] waits for a
//! slot instead of dropping the notification.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Default number of concurrently running notification callbacks.
pub const DEFAULT_NOTIFICATION_WORKERS: usize = 20;

/// Default number of notification callbacks allowed to wait for a worker.
pub const DEFAULT_NOTIFICATION_QUEUE_CAPACITY: usize = 1000;

/// Bounded pool running completion callbacks.
#[derive(Debug)]
pub struct NotificationPool {
    admitted: Arc<Semaphore>,
    running: Arc<Semaphore>,
    workers: usize,
    queue_capacity: usize,
}

impl NotificationPool {
    /// Creates a pool. Zero workers is raised to one.
    #[must_use]
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        let workers = workers.max(1);
        Self {
            admitted: Arc::new(Semaphore::new(workers.saturating_add(queue_capacity))),
            running: Arc::new(Semaphore::new(workers)),
            workers,
            queue_capacity,
        }
    }

    /// Runs `job` on the pool, waiting while the pool is saturated.
    pub async fn dispatch<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(admission) = Arc::clone(&self.admitted).acquire_owned().await else {
            tracing::warn!("notification pool closed, dropping notification");
            return;
        };
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            let _admission = admission;
            let Ok(_worker) = running.acquire_owned().await else {
                return;
            };
            job.await;
        });
    }

    /// Returns the number of worker slots.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Returns the number of queue slots.
    #[must_use]
    pub const fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Returns the number of admission slots currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.admitted.available_permits()
    }
}

impl Default for NotificationPool {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_WORKERS, DEFAULT_NOTIFICATION_QUEUE_CAPACITY)
    }
}
