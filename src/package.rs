//! Package boundary resolution.
//!
//! A directory is package-like when it holds one of the configured marker
//! files (`__init__.py` and friends). Walking upward through package-like
//! parents yields the base directory an in-place build runs from, and the
//! package-qualified path of the module below it.

use std::path::{Path, PathBuf};

/// Result of resolving a source path against its package nesting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageContext {
    /// First ancestor that is not itself a package directory.
    pub base_dir: PathBuf,
    /// Path from `base_dir` to the input, always `/`-separated.
    pub relative_path: String,
}

impl PackageContext {
    /// Dotted module name for the source, e.g. `pkg/sub/mod.pyx` -> `pkg.sub.mod`.
    pub fn module_name(&self) -> String {
        let without_ext = match self.relative_path.rsplit_once('/') {
            Some((dirs, file)) => format!("{}/{}", dirs, strip_extension(file)),
            None => strip_extension(&self.relative_path).to_string(),
        };
        without_ext.replace('/', ".")
    }
}

fn strip_extension(file: &str) -> &str {
    match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    }
}

/// Classifies directories by the presence of package marker files.
#[derive(Debug, Clone)]
pub struct PackageResolver {
    markers: Vec<String>,
}

impl PackageResolver {
    pub fn new(markers: &[String]) -> Self {
        Self {
            markers: markers.to_vec(),
        }
    }

    pub fn is_package_dir(&self, dir: &Path) -> bool {
        !dir.as_os_str().is_empty() && self.markers.iter().any(|m| dir.join(m).is_file())
    }

    /// Walk up from `path` while the parent is package-like.
    ///
    /// The input may not exist; only its ancestors are inspected.
    pub fn find_package_base(&self, path: &Path) -> PackageContext {
        let mut base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut relative_path = file_name(path);

        while self.is_package_dir(&base_dir) {
            let segment = file_name(&base_dir);
            let Some(parent) = base_dir.parent() else {
                break;
            };
            relative_path = format!("{}/{}", segment, relative_path);
            base_dir = parent.to_path_buf();
        }

        PackageContext {
            base_dir,
            relative_path,
        }
    }

    /// Working directory for building `path` in place: the nearest ancestor
    /// (or `path` itself) that is a directory and not part of a package.
    pub fn build_base_dir(&self, path: &Path) -> PathBuf {
        let mut base_dir = path.to_path_buf();
        while !base_dir.is_dir() || self.is_package_dir(&base_dir) {
            match base_dir.parent() {
                Some(parent) => base_dir = parent.to_path_buf(),
                None => break,
            }
        }
        base_dir
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
