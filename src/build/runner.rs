//! Execution of a single build job.

use crate::toolchain::{BuildContext, NativeToolchain};
use crate::translate::CompileUnit;
use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::sync::Arc;

/// Compile units that share a base directory, built in one toolchain call.
#[derive(Debug)]
pub struct BuildJob {
    /// Set only for in-place builds.
    pub base_dir: Option<PathBuf>,
    pub units: Vec<CompileUnit>,
}

impl BuildJob {
    pub fn unit_names(&self) -> Vec<String> {
        self.units.iter().map(|u| u.name.clone()).collect()
    }
}

/// Runs build jobs against a native toolchain.
///
/// For a job with a base directory the toolchain runs inside that directory
/// and gets a fresh temporary build area created in it. The temporary
/// directory is a `TempDir`, so it is removed on every exit path including
/// toolchain failure. The working directory is applied to the toolchain's
/// child processes, never to this process, so concurrent jobs on the worker
/// pool cannot observe each other's directory.
pub struct NativeBuildRunner {
    toolchain: Arc<dyn NativeToolchain>,
}

impl NativeBuildRunner {
    pub fn new(toolchain: Arc<dyn NativeToolchain>) -> Self {
        Self { toolchain }
    }

    pub fn run(&self, job: BuildJob) -> Result<Vec<PathBuf>> {
        let Some(base_dir) = job.base_dir.as_deref() else {
            return self.toolchain.build(&job.units, &BuildContext::default());
        };

        if !base_dir.is_dir() {
            bail!("Build directory {} does not exist", base_dir.display());
        }
        let build_temp = tempfile::Builder::new()
            .prefix(".nativize-temp-")
            .tempdir_in(base_dir)
            .with_context(|| {
                format!("Failed to create temporary build directory in {}", base_dir.display())
            })?;

        let ctx = BuildContext {
            working_dir: Some(base_dir),
            build_temp: Some(build_temp.path()),
            inplace: true,
        };
        self.toolchain.build(&job.units, &ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Observed {
        working_dir: Option<PathBuf>,
        build_temp: Option<PathBuf>,
        temp_existed: bool,
        inplace: bool,
    }

    #[derive(Default)]
    struct FakeToolchain {
        fail: bool,
        remove_temp: bool,
        observed: Mutex<Observed>,
    }

    impl NativeToolchain for FakeToolchain {
        fn build(&self, units: &[CompileUnit], ctx: &BuildContext<'_>) -> Result<Vec<PathBuf>> {
            let mut observed = self.observed.lock().unwrap();
            observed.working_dir = ctx.working_dir.map(Path::to_path_buf);
            observed.build_temp = ctx.build_temp.map(Path::to_path_buf);
            observed.temp_existed = ctx.build_temp.is_some_and(Path::is_dir);
            observed.inplace = ctx.inplace;

            if self.remove_temp
                && let Some(temp) = ctx.build_temp
            {
                std::fs::remove_dir_all(temp).unwrap();
            }
            if self.fail {
                bail!("toolchain exploded");
            }
            Ok(units.iter().map(|u| u.generated.clone()).collect())
        }
    }

    fn unit(name: &str) -> CompileUnit {
        CompileUnit::new(name, PathBuf::from(format!("{name}.pyx")), PathBuf::from(format!("{name}.c")))
    }

    #[test]
    fn test_job_without_base_dir_builds_directly() {
        let toolchain = Arc::new(FakeToolchain::default());
        let runner = NativeBuildRunner::new(toolchain.clone());
        let built = runner
            .run(BuildJob {
                base_dir: None,
                units: vec![unit("a"), unit("b")],
            })
            .unwrap();

        assert_eq!(built.len(), 2);
        let observed = toolchain.observed.lock().unwrap();
        assert!(observed.working_dir.is_none());
        assert!(observed.build_temp.is_none());
        assert!(!observed.inplace);
    }

    #[test]
    fn test_temp_dir_lives_in_base_dir_and_is_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = Arc::new(FakeToolchain::default());
        let runner = NativeBuildRunner::new(toolchain.clone());
        let cwd_before = std::env::current_dir().unwrap();

        runner
            .run(BuildJob {
                base_dir: Some(tmp.path().to_path_buf()),
                units: vec![unit("a")],
            })
            .unwrap();

        let observed = toolchain.observed.lock().unwrap();
        let temp = observed.build_temp.clone().unwrap();
        assert!(observed.temp_existed);
        assert!(observed.inplace);
        assert_eq!(observed.working_dir.as_deref(), Some(tmp.path()));
        assert_eq!(temp.parent(), Some(tmp.path()));
        assert!(!temp.exists());
        assert_eq!(std::env::current_dir().unwrap(), cwd_before);
    }

    #[test]
    fn test_cleanup_on_toolchain_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = Arc::new(FakeToolchain {
            fail: true,
            ..Default::default()
        });
        let runner = NativeBuildRunner::new(toolchain.clone());
        let cwd_before = std::env::current_dir().unwrap();

        let err = runner
            .run(BuildJob {
                base_dir: Some(tmp.path().to_path_buf()),
                units: vec![unit("a")],
            })
            .unwrap_err();

        assert_eq!(err.to_string(), "toolchain exploded");
        let temp = toolchain.observed.lock().unwrap().build_temp.clone().unwrap();
        assert!(!temp.exists());
        assert_eq!(std::env::current_dir().unwrap(), cwd_before);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_temp_dir_already_removed_by_toolchain() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = Arc::new(FakeToolchain {
            remove_temp: true,
            ..Default::default()
        });
        let runner = NativeBuildRunner::new(toolchain);
        assert!(
            runner
                .run(BuildJob {
                    base_dir: Some(tmp.path().to_path_buf()),
                    units: vec![unit("a")],
                })
                .is_ok()
        );
    }

    #[test]
    fn test_missing_base_dir_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = NativeBuildRunner::new(Arc::new(FakeToolchain::default()));
        let result = runner.run(BuildJob {
            base_dir: Some(tmp.path().join("gone")),
            units: vec![unit("a")],
        });
        assert!(result.is_err());
    }
}
