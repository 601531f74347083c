//! Ties discovery, translation and native builds together for one run.

use crate::build::{BuildDispatcher, NativeBuildRunner};
use crate::config::BuildConfiguration;
use crate::discovery;
use crate::package::PackageResolver;
use crate::toolchain::NativeToolchain;
use crate::translate::{self, Translator};
use anyhow::{Context, Result, bail};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a finished run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub translated: usize,
    /// Units handed to the native build, including ones it found up to date.
    pub dispatched: usize,
    pub elapsed: Duration,
}

/// Translate and (optionally) build every source pattern in `config`.
///
/// `toolchain` is only consulted when `config.build` is set. A failure
/// anywhere terminates the worker pool before the error is returned; on
/// success the pool is drained and any failed job fails the run.
pub fn run(
    config: &BuildConfiguration,
    translator: &dyn Translator,
    toolchain: Option<Arc<dyn NativeToolchain>>,
) -> Result<RunSummary> {
    let start = Instant::now();
    let runner = if config.build {
        let toolchain =
            toolchain.context("Native build requested but no toolchain is available")?;
        Some(Arc::new(NativeBuildRunner::new(toolchain)))
    } else {
        None
    };

    let mut dispatcher = BuildDispatcher::new(runner, config.parallel);
    let translated = match compile_all(config, translator, &mut dispatcher) {
        Ok(translated) => translated,
        Err(e) => {
            dispatcher.abort();
            return Err(e);
        }
    };

    let dispatched = dispatcher.dispatched();
    dispatcher.finish()?;
    Ok(RunSummary {
        translated,
        dispatched,
        elapsed: start.elapsed(),
    })
}

fn compile_all(
    config: &BuildConfiguration,
    translator: &dyn Translator,
    dispatcher: &mut BuildDispatcher,
) -> Result<usize> {
    let resolver = PackageResolver::new(&config.project.translator.package_markers);
    let mut translated = 0;
    for pattern in &config.sources {
        translated += compile_pattern(pattern, config, translator, &resolver, dispatcher)?;
    }
    Ok(translated)
}

/// Handle one command-line source pattern; returns the number of units translated.
pub fn compile_pattern(
    pattern: &str,
    config: &BuildConfiguration,
    translator: &dyn Translator,
    resolver: &PackageResolver,
    dispatcher: &mut BuildDispatcher,
) -> Result<usize> {
    let paths = discovery::expand(pattern)?;
    if paths.is_empty() {
        bail!("'{}' doesn't match any files", pattern);
    }

    let mut translated = 0;
    for path in paths {
        let path = std::path::absolute(&path)
            .with_context(|| format!("Failed to resolve {}", path.display()))?;
        let base_dir = config.inplace.then(|| resolver.build_base_dir(&path));

        let units = translate::translate_path(translator, &path, config)?;
        translated += units.len();
        dispatcher.dispatch(base_dir.as_deref(), units)?;
    }
    Ok(translated)
}
