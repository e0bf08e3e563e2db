//! Bounded worker pool for recognition and dispatch
//!
//! A fixed number of workers drain a bounded queue. Submission never waits:
//! when the queue is full the job is rejected, so a slow backend can never
//! stall the capture loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// A unit of work for the pool
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Cloneable submission side of a [`WorkerPool`]
///
/// Safe to use from non-runtime threads such as the capture thread.
#[derive(Clone)]
pub struct PoolHandle {
    tx: mpsc::Sender<Job>,
}

impl PoolHandle {
    /// Queue `job` without waiting
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolFull`] if the queue is at capacity, or
    /// [`Error::PoolClosed`] if the workers have stopped
    pub fn try_submit<F>(&self, job: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tx.try_send(Box::pin(job)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::PoolFull,
            mpsc::error::TrySendError::Closed(_) => Error::PoolClosed,
        })
    }

    /// Reserve a queue slot without waiting
    ///
    /// The slot is released if dropped unused.
    ///
    /// # Errors
    ///
    /// Same as [`try_submit`](Self::try_submit)
    pub fn try_reserve(&self) -> Result<Slot<'_>> {
        self.tx
            .try_reserve()
            .map(|permit| Slot { permit })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(()) => Error::PoolFull,
                mpsc::error::TrySendError::Closed(()) => Error::PoolClosed,
            })
    }

    /// Jobs currently waiting for a worker
    #[must_use]
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// A reserved place in the queue; submitting into it cannot fail
pub struct Slot<'a> {
    permit: mpsc::Permit<'a, Job>,
}

impl Slot<'_> {
    pub fn submit<F>(self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.permit.send(Box::pin(job));
    }
}

/// Fixed-size pool of async workers
pub struct WorkerPool {
    handle: PoolHandle,
    workers: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Spawn `workers` workers sharing a queue of `capacity` jobs
    ///
    /// Zero values are raised to one. Must be called within a tokio runtime.
    #[must_use]
    pub fn new(workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let cancel = CancellationToken::new();

        let workers = (0..workers.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(worker, Arc::clone(&rx), cancel.clone()))
            })
            .collect::<Vec<_>>();

        tracing::debug!(workers = workers.len(), capacity, "worker pool started");

        Self {
            handle: PoolHandle { tx },
            workers,
            cancel,
        }
    }

    #[must_use]
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// Stop accepting work and wait for workers to finish their current job
    ///
    /// Queued jobs that have not started are dropped.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "worker exited abnormally");
            }
        }
        tracing::debug!("worker pool stopped");
    }
}

async fn run_worker(worker: usize, rx: Arc<Mutex<mpsc::Receiver<Job>>>, cancel: CancellationToken) {
    loop {
        let job = {
            let mut rx = rx.lock().await;
            tokio::select! {
                () = cancel.cancelled() => None,
                job = rx.recv() => job,
            }
        };

        let Some(job) = job else {
            break;
        };

        // A panicking job takes down its own task, not the worker
        if let Err(e) = tokio::spawn(job).await {
            tracing::warn!(worker, error = %e, "pool job panicked");
        }
    }

    tracing::trace!(worker, "worker stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Notify;

    use super::*;

    #[tokio::test]
    async fn test_jobs_run() {
        let pool = WorkerPool::new(2, 8);
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let done = Arc::clone(&done);
            pool.handle()
                .try_submit(async move {
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while done.load(Ordering::SeqCst) < 5 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let pool = WorkerPool::new(1, 1);
        let handle = pool.handle();
        let gate = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());

        let (g, s) = (Arc::clone(&gate), Arc::clone(&started));
        handle
            .try_submit(async move {
                s.notify_one();
                g.notified().await;
            })
            .unwrap();
        started.notified().await;

        tokio_test::assert_ok!(handle.try_submit(async {}));
        assert!(matches!(handle.try_submit(async {}), Err(Error::PoolFull)));
        assert_eq!(handle.queued(), 1);

        gate.notify_one();
    }

    #[tokio::test]
    async fn test_reserved_slot_counts_against_capacity() {
        let pool = WorkerPool::new(1, 1);
        let handle = pool.handle();
        let gate = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());

        let (g, s) = (Arc::clone(&gate), Arc::clone(&started));
        handle
            .try_submit(async move {
                s.notify_one();
                g.notified().await;
            })
            .unwrap();
        started.notified().await;

        let slot = handle.try_reserve().unwrap();
        assert!(matches!(handle.try_reserve(), Err(Error::PoolFull)));
        drop(slot);

        let done = Arc::new(Notify::new());
        let d = Arc::clone(&done);
        handle.try_reserve().unwrap().submit(async move { d.notify_one() });
        gate.notify_one();

        tokio::time::timeout(Duration::from_secs(5), done.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_panicking_job_keeps_worker_alive() {
        let pool = WorkerPool::new(1, 4);
        let handle = pool.handle();
        let done = Arc::new(Notify::new());

        tokio_test::assert_ok!(handle.try_submit(async { panic!("boom") }));
        let d = Arc::clone(&done);
        handle.try_submit(async move { d.notify_one() }).unwrap();

        tokio::time::timeout(Duration::from_secs(5), done.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_closed() {
        let pool = WorkerPool::new(2, 4);
        let handle = pool.handle();
        pool.shutdown().await;

        assert!(matches!(handle.try_submit(async {}), Err(Error::PoolClosed)));
    }
}
