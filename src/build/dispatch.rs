//! Per-input-path build dispatch.

use super::pool::{ParallelPool, SequentialPool, WorkerPool};
use super::runner::{BuildJob, NativeBuildRunner};
use crate::translate::CompileUnit;
use anyhow::{Result, bail};
use colored::*;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Creates the worker pool the first time one is needed.
pub type PoolFactory = Box<dyn Fn(usize, Arc<NativeBuildRunner>) -> io::Result<Box<dyn WorkerPool>>>;

fn parallel_pool_factory() -> PoolFactory {
    Box::new(|workers, runner| {
        ParallelPool::new(workers, runner)
            .map(|pool| Box::new(pool) as Box<dyn WorkerPool>)
            .map_err(io::Error::other)
    })
}

/// Decides, batch by batch, whether units build inline or on the pool.
///
/// The pool is created lazily, at most once, and shared by every batch of
/// the run. Call `finish` after the last batch, or `abort` if the run failed.
pub struct BuildDispatcher {
    runner: Option<Arc<NativeBuildRunner>>,
    parallel: usize,
    pool: Option<Box<dyn WorkerPool>>,
    factory: PoolFactory,
    dispatched: usize,
}

impl BuildDispatcher {
    /// `runner` is `None` when the native build step was not requested.
    pub fn new(runner: Option<Arc<NativeBuildRunner>>, parallel: usize) -> Self {
        Self {
            runner,
            parallel,
            pool: None,
            factory: parallel_pool_factory(),
            dispatched: 0,
        }
    }

    pub fn with_pool_factory(mut self, factory: PoolFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Units handed to a build so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    fn pool(&mut self, runner: &Arc<NativeBuildRunner>) -> &mut Box<dyn WorkerPool> {
        let (factory, parallel) = (&self.factory, self.parallel);
        self.pool.get_or_insert_with(|| {
            // Running out of threads is not an error; build inline instead.
            factory(parallel, Arc::clone(runner))
                .unwrap_or_else(|_| {
                    Box::new(SequentialPool::new(Arc::clone(runner))) as Box<dyn WorkerPool>
                })
        })
    }

    pub fn dispatch(&mut self, base_dir: Option<&Path>, units: Vec<CompileUnit>) -> Result<()> {
        let Some(runner) = self.runner.clone() else {
            return Ok(());
        };
        if units.is_empty() {
            return Ok(());
        }
        let count = units.len();

        if count > 1 && self.parallel > 1 {
            let pool = self.pool(&runner);
            for unit in units {
                pool.submit(BuildJob {
                    base_dir: base_dir.map(Path::to_path_buf),
                    units: vec![unit],
                })?;
            }
        } else {
            runner.run(BuildJob {
                base_dir: base_dir.map(Path::to_path_buf),
                units,
            })?;
        }
        self.dispatched += count;
        Ok(())
    }

    /// Wait for all pool jobs and fail if any of them did.
    pub fn finish(self) -> Result<()> {
        let Some(pool) = self.pool else {
            return Ok(());
        };
        let failures = pool.close_and_join();
        if failures.is_empty() {
            return Ok(());
        }
        for failure in &failures {
            eprintln!(
                "{} Build of {} failed: {:#}",
                "x".red(),
                failure.units.join(", "),
                failure.error
            );
        }
        bail!("{} build job(s) failed", failures.len());
    }

    /// Drop queued work without waiting for it.
    pub fn abort(self) {
        if let Some(pool) = self.pool {
            pool.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::pool::JobFailure;
    use crate::toolchain::{BuildContext, NativeToolchain};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingToolchain {
        calls: Mutex<Vec<(Vec<String>, Option<PathBuf>)>>,
    }

    impl NativeToolchain for RecordingToolchain {
        fn build(&self, units: &[CompileUnit], ctx: &BuildContext<'_>) -> Result<Vec<PathBuf>> {
            self.calls.lock().unwrap().push((
                units.iter().map(|u| u.name.clone()).collect(),
                ctx.working_dir.map(Path::to_path_buf),
            ));
            Ok(Vec::new())
        }
    }

    /// Records submissions without running anything.
    struct QueueOnlyPool {
        submitted: Arc<Mutex<Vec<BuildJob>>>,
    }

    impl WorkerPool for QueueOnlyPool {
        fn submit(&mut self, job: BuildJob) -> Result<()> {
            self.submitted.lock().unwrap().push(job);
            Ok(())
        }

        fn close_and_join(self: Box<Self>) -> Vec<JobFailure> {
            Vec::new()
        }

        fn terminate(self: Box<Self>) {}
    }

    fn units(names: &[&str]) -> Vec<CompileUnit> {
        names
            .iter()
            .map(|n| CompileUnit::new(*n, PathBuf::from(format!("{n}.pyx")), PathBuf::from(format!("{n}.c"))))
            .collect()
    }

    fn setup(parallel: usize) -> (Arc<RecordingToolchain>, BuildDispatcher) {
        let toolchain = Arc::new(RecordingToolchain::default());
        let runner = Arc::new(NativeBuildRunner::new(toolchain.clone()));
        (toolchain, BuildDispatcher::new(Some(runner), parallel))
    }

    fn queue_factory(
        submitted: &Arc<Mutex<Vec<BuildJob>>>,
        created: &Arc<AtomicUsize>,
    ) -> PoolFactory {
        let submitted = Arc::clone(submitted);
        let created = Arc::clone(created);
        Box::new(move |_, _| {
            created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(QueueOnlyPool {
                submitted: Arc::clone(&submitted),
            }) as Box<dyn WorkerPool>)
        })
    }

    #[test]
    fn test_no_units_no_build() {
        let (toolchain, mut dispatcher) = setup(4);
        dispatcher.dispatch(None, Vec::new()).unwrap();
        dispatcher.finish().unwrap();
        assert!(toolchain.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_build_not_requested_is_noop() {
        let mut dispatcher = BuildDispatcher::new(None, 4);
        dispatcher.dispatch(None, units(&["a", "b"])).unwrap();
        assert_eq!(dispatcher.dispatched(), 0);
        dispatcher.finish().unwrap();
    }

    #[test]
    fn test_single_unit_is_synchronous_regardless_of_parallelism() {
        let submitted = Arc::new(Mutex::new(Vec::new()));
        let created = Arc::new(AtomicUsize::new(0));
        let (toolchain, dispatcher) = setup(8);
        let mut dispatcher = dispatcher.with_pool_factory(queue_factory(&submitted, &created));

        dispatcher.dispatch(None, units(&["only"])).unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 0);
        assert_eq!(toolchain.calls.lock().unwrap().len(), 1);
        dispatcher.finish().unwrap();
    }

    #[test]
    fn test_sequential_degree_builds_batch_as_one_job() {
        let (toolchain, mut dispatcher) = setup(1);
        dispatcher.dispatch(None, units(&["a", "b", "c"])).unwrap();

        let calls = toolchain.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, vec!["a", "b", "c"]);
        assert_eq!(calls[0].1, None);
    }

    #[test]
    fn test_parallel_submits_one_job_per_unit_without_waiting() {
        let submitted = Arc::new(Mutex::new(Vec::new()));
        let created = Arc::new(AtomicUsize::new(0));
        let (toolchain, dispatcher) = setup(4);
        let mut dispatcher = dispatcher.with_pool_factory(queue_factory(&submitted, &created));
        let base = PathBuf::from("/proj");

        dispatcher.dispatch(Some(base.as_path()), units(&["a", "b", "c"])).unwrap();
        dispatcher.dispatch(None, units(&["d", "e"])).unwrap();

        // Pool created once and shared across batches.
        assert_eq!(created.load(Ordering::SeqCst), 1);
        let jobs = submitted.lock().unwrap();
        assert_eq!(jobs.len(), 5);
        assert!(jobs.iter().all(|j| j.units.len() == 1));
        assert_eq!(jobs[0].base_dir.as_deref(), Some(base.as_path()));
        assert_eq!(jobs[4].base_dir, None);
        // Nothing ran: submission never blocks on a job.
        assert!(toolchain.calls.lock().unwrap().is_empty());
        assert_eq!(dispatcher.dispatched(), 5);
    }

    #[test]
    fn test_pool_creation_failure_falls_back_to_sequential() {
        let (toolchain, dispatcher) = setup(4);
        let mut dispatcher = dispatcher.with_pool_factory(Box::new(|_, _| {
            Err(io::Error::new(io::ErrorKind::OutOfMemory, "no threads left"))
        }));

        dispatcher.dispatch(None, units(&["a", "b"])).unwrap();
        {
            let calls = toolchain.calls.lock().unwrap();
            assert_eq!(calls.len(), 2);
            assert_eq!(calls[0].0, vec!["a"]);
            assert_eq!(calls[1].0, vec!["b"]);
        }
        dispatcher.finish().unwrap();
    }

    #[test]
    fn test_real_pool_builds_everything() {
        let (toolchain, mut dispatcher) = setup(3);
        dispatcher.dispatch(None, units(&["a", "b", "c", "d"])).unwrap();
        dispatcher.finish().unwrap();

        let mut built: Vec<String> = toolchain
            .calls
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(names, _)| names.clone())
            .collect();
        built.sort();
        assert_eq!(built, vec!["a", "b", "c", "d"]);
    }
}
