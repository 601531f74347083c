//! Translation of source modules into compile units.
//!
//! The translator itself is an external program; this module defines the
//! `Translator` seam, the `CompileUnit` it hands back, and the per-input-path
//! invocation used by the orchestrator.

mod external;

pub use external::ExternalTranslator;

use crate::config::BuildConfiguration;
use crate::discovery;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// One translated module, ready for the native build.
///
/// Each unit is moved into exactly one build job.
#[derive(Debug, PartialEq, Eq)]
pub struct CompileUnit {
    /// Package-qualified module name (`pkg.sub.mod`).
    pub name: String,
    /// Source the unit was translated from.
    pub source: PathBuf,
    /// Generated C or C++ file.
    pub generated: PathBuf,
    /// Whether `generated` is C++.
    pub cplus: bool,
}

impl CompileUnit {
    pub fn new(name: impl Into<String>, source: PathBuf, generated: PathBuf) -> Self {
        Self {
            name: name.into(),
            source,
            generated,
            cplus: false,
        }
    }

    /// Module path relative to the package base, without extension.
    pub fn module_path(&self) -> PathBuf {
        self.name.split('.').collect()
    }
}

/// Turns source patterns into compile units.
///
/// With `keep_going` set in the configuration, modules that fail to translate
/// are left out of the result; otherwise the first failure is returned.
pub trait Translator: Send + Sync {
    fn translate(&self, patterns: &[String], config: &BuildConfiguration)
    -> Result<Vec<CompileUnit>>;
}

/// Translate everything below one discovered input path.
pub fn translate_path(
    translator: &dyn Translator,
    path: &Path,
    config: &BuildConfiguration,
) -> Result<Vec<CompileUnit>> {
    let patterns = discovery::patterns_for_path(path, &config.project.translator.extensions);
    translator.translate(&patterns, config)
}
