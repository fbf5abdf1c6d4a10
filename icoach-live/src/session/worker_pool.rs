//! Shared pool for blocking, model-bound work
//!
//! A fixed number of permits bounds how many jobs run at once across all
//! sessions. Jobs execute on Tokio's blocking threads; the submitting session
//! awaits its one job while other sessions keep going.
//!
//! A job that has started always runs to completion. If the submitter goes
//! away first (connection dropped), the result is discarded when the job
//! finishes and its permit is released then.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Worker pool is shut down")]
    Closed,

    #[error("Job '{0}' panicked")]
    Panicked(&'static str),
}

#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight gauge when the job ends, however it ends
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl WorkerPool {
    /// Pool running at most `capacity` jobs at once (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run `job` on a pool worker and wait for its result
    ///
    /// Waits for a free worker first. `label` names the job in logs.
    pub async fn run<F, T>(&self, label: &'static str, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let guard = InFlight::enter(&self.in_flight);
        debug!(job = label, "Pool job started");

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _guard = guard;
            job()
        });

        handle.await.map_err(|e| {
            error!(job = label, "Pool job failed: {}", e);
            PoolError::Panicked(label)
        })
    }

    /// Stop accepting jobs. Running jobs finish normally.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}
