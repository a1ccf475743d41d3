//! Fire-and-forget job queue.
//!
//! `submit` returns immediately; the job runs on the tokio runtime once a
//! worker slot is free. A failing job is logged and counted, never
//! propagated. `drain` waits for everything submitted so far.
//!
//! Jobs that touch the same file or record field serialize on a
//! [`KeyedLocks`] entry; unrelated jobs still run in parallel.

use super::EnrichError;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedMutexGuard, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Outcome counts since the queue was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStats {
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
struct Counters {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> JobStats {
        JobStats {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

pub struct JobQueue {
    slots: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
    counters: Arc<Counters>,
}

impl JobQueue {
    /// A queue running at most `workers` jobs at once.
    pub fn new(workers: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(workers.max(1))),
            tasks: Mutex::new(JoinSet::new()),
            counters: Arc::default(),
        }
    }

    /// Schedule `job`. Must be called from within a tokio runtime.
    pub fn submit<F>(&self, name: &'static str, job: F)
    where
        F: Future<Output = Result<(), EnrichError>> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        let counters = Arc::clone(&self.counters);
        let task = async move {
            // closed only on drop, and the queue owns the semaphore
            let Ok(_permit) = slots.acquire_owned().await else {
                return;
            };
            debug!(job = name, "job started");
            match job.await {
                Ok(()) => {
                    counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    debug!(job = name, "job finished");
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(job = name, error = %e, "enrichment job failed");
                }
            }
        };

        match self.tasks.lock() {
            Ok(mut tasks) => {
                // reap finished tasks so a long-lived queue does not grow
                while let Some(result) = tasks.try_join_next() {
                    if result.is_err() {
                        self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
                tasks.spawn(task);
            }
            Err(_) => {
                error!(job = name, "job queue lock poisoned; running detached");
                tokio::spawn(task);
            }
        }
    }

    /// Wait until every submitted job has finished.
    pub async fn drain(&self) -> JobStats {
        loop {
            let mut pending = match self.tasks.lock() {
                Ok(mut tasks) => std::mem::take(&mut *tasks),
                Err(_) => break,
            };
            if pending.is_empty() {
                break;
            }
            while let Some(result) = pending.join_next().await {
                if let Err(e) = result {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    error!(error = %e, "enrichment job panicked");
                }
            }
        }
        self.stats()
    }

    pub fn stats(&self) -> JobStats {
        self.counters.snapshot()
    }
}

/// One async mutex per key, created on first use and dropped once nobody
/// holds or waits for it.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    pub async fn lock(&self, key: impl Into<String>) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            Arc::clone(locks.entry(key.into()).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
