//! Worker pools for build jobs.
//!
//! `ParallelPool` runs jobs on a dedicated rayon pool; each job drives its own
//! compiler child processes. `SequentialPool` runs each job on submission and
//! stands in when a parallel pool cannot be created. The dispatcher only sees
//! the `WorkerPool` trait.

use super::runner::{BuildJob, NativeBuildRunner};
use anyhow::{Result, anyhow};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};

/// A build job that failed on a pool worker.
#[derive(Debug)]
pub struct JobFailure {
    pub units: Vec<String>,
    pub error: anyhow::Error,
}

pub trait WorkerPool: Send {
    /// Hand a job to the pool. A parallel pool returns immediately; a
    /// sequential one returns the job's own error.
    fn submit(&mut self, job: BuildJob) -> Result<()>;

    /// Stop accepting jobs, wait for every submitted job, return the failures.
    fn close_and_join(self: Box<Self>) -> Vec<JobFailure>;

    /// Abandon queued jobs without waiting.
    fn terminate(self: Box<Self>);
}

/// Runs every job on the calling thread at submission time.
pub struct SequentialPool {
    runner: Arc<NativeBuildRunner>,
}

impl SequentialPool {
    pub fn new(runner: Arc<NativeBuildRunner>) -> Self {
        Self { runner }
    }
}

impl WorkerPool for SequentialPool {
    fn submit(&mut self, job: BuildJob) -> Result<()> {
        self.runner.run(job).map(|_| ())
    }

    fn close_and_join(self: Box<Self>) -> Vec<JobFailure> {
        Vec::new()
    }

    fn terminate(self: Box<Self>) {}
}

/// Fixed-size pool of worker threads.
pub struct ParallelPool {
    pool: rayon::ThreadPool,
    runner: Arc<NativeBuildRunner>,
    cancelled: Arc<AtomicBool>,
    tx: Sender<Option<JobFailure>>,
    rx: Receiver<Option<JobFailure>>,
}

impl ParallelPool {
    pub fn new(
        workers: usize,
        runner: Arc<NativeBuildRunner>,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("nativize-build-{}", i))
            .build()?;
        let (tx, rx) = channel();
        Ok(Self {
            pool,
            runner,
            cancelled: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl WorkerPool for ParallelPool {
    fn submit(&mut self, job: BuildJob) -> Result<()> {
        let runner = Arc::clone(&self.runner);
        let cancelled = Arc::clone(&self.cancelled);
        let tx = self.tx.clone();

        self.pool.spawn(move || {
            if cancelled.load(Ordering::SeqCst) {
                return;
            }
            let units = job.unit_names();
            let error = match catch_unwind(AssertUnwindSafe(|| runner.run(job))) {
                Ok(Ok(_)) => None,
                Ok(Err(e)) => Some(e),
                Err(payload) => Some(anyhow!("build job panicked: {}", panic_message(&*payload))),
            };
            // The receiver is gone once the pool was terminated.
            let _ = tx.send(error.map(|error| JobFailure { units, error }));
        });
        Ok(())
    }

    fn close_and_join(self: Box<Self>) -> Vec<JobFailure> {
        let ParallelPool { pool, tx, rx, .. } = *self;
        drop(tx);
        // Every spawned job holds a sender; the iterator ends when the last finishes.
        let failures = rx.iter().flatten().collect();
        drop(pool);
        failures
    }

    fn terminate(self: Box<Self>) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}
