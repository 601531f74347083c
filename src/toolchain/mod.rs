//! Toolchain discovery and the native build seam.
//!
//! `NativeToolchain` is what a build job calls to turn compile units into
//! shared artifacts. `CcToolchain` implements it on top of a detected (or
//! configured) C compiler.

mod cc;
pub mod types;

pub use cc::CcToolchain;
pub use types::{CompilerType, Toolchain, ToolchainError};

use crate::translate::CompileUnit;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Where a native build runs and puts its outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildContext<'a> {
    /// Directory the compiler runs in; the process directory when `None`.
    pub working_dir: Option<&'a Path>,
    /// Intermediate output directory.
    pub build_temp: Option<&'a Path>,
    /// Place artifacts next to their sources.
    pub inplace: bool,
}

/// Builds compile units into native artifacts. Failures are returned as-is.
pub trait NativeToolchain: Send + Sync {
    fn build(&self, units: &[CompileUnit], ctx: &BuildContext<'_>) -> Result<Vec<PathBuf>>;
}

/// Detect the best available toolchain for the current platform
pub fn detect_toolchain() -> Result<Toolchain, ToolchainError> {
    #[cfg(not(windows))]
    {
        detect_unix_toolchain()
    }

    #[cfg(windows)]
    {
        Err(ToolchainError::NotFound(
            "Set [toolchain] compiler in nativize.toml or the CC environment variable".to_string(),
        ))
    }
}

/// Detect toolchain on Unix-like systems (Linux, macOS)
#[cfg(not(windows))]
fn detect_unix_toolchain() -> Result<Toolchain, ToolchainError> {
    use std::process::Command;

    for (cmd, compiler_type) in [("clang", CompilerType::Clang), ("gcc", CompilerType::GCC)] {
        if let Ok(output) = Command::new("which").arg(cmd).output()
            && output.status.success()
        {
            let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let version = Command::new(cmd)
                .arg("--version")
                .output()
                .map(|o| {
                    String::from_utf8_lossy(&o.stdout)
                        .lines()
                        .next()
                        .unwrap_or("unknown")
                        .to_string()
                })
                .unwrap_or_else(|_| "unknown".to_string());

            return Ok(Toolchain::new_simple(
                compiler_type,
                PathBuf::from(path_str),
                version,
            ));
        }
    }

    Err(ToolchainError::NotFound(
        "No C compiler found. Please install clang or gcc.".to_string(),
    ))
}

/// Get a cached toolchain or detect a new one
pub fn get_or_detect_toolchain() -> Result<Toolchain, ToolchainError> {
    let cache_path = get_toolchain_cache_path();

    if cache_path.exists()
        && let Ok(contents) = std::fs::read_to_string(&cache_path)
        && let Ok(cached) = toml::from_str::<Toolchain>(&contents)
        && cached.cc_path.exists()
    {
        return Ok(cached);
    }

    let toolchain = detect_toolchain()?;

    if let Ok(toml_str) = toml::to_string_pretty(&toolchain)
        && let Some(parent) = cache_path.parent()
    {
        let _ = std::fs::create_dir_all(parent);
        let _ = std::fs::write(&cache_path, toml_str);
    }

    Ok(toolchain)
}

/// Get the path to the toolchain cache file
fn get_toolchain_cache_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".nativize")
        .join("toolchain.toml")
}
