use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Supported compiler families
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::upper_case_acronyms)]
pub enum CompilerType {
    /// Clang/LLVM (clang / clang++)
    Clang,
    /// GNU Compiler Collection (gcc / g++)
    GCC,
    /// Anything named explicitly through config or `$CC`
    Custom,
}

/// Represents a discovered compiler toolchain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toolchain {
    /// Type of compiler
    pub compiler_type: CompilerType,

    /// Absolute path to the C compiler
    pub cc_path: PathBuf,

    /// Absolute path to the C++ compiler
    pub cxx_path: PathBuf,

    /// Compiler version string
    pub version: String,
}

impl Toolchain {
    /// Creates a toolchain from a C compiler path, deriving the C++ driver.
    pub fn new_simple(compiler_type: CompilerType, cc_path: PathBuf, version: String) -> Self {
        let cc = cc_path.to_string_lossy();
        let cxx_path = if cc.ends_with("clang") {
            PathBuf::from(format!("{}++", cc))
        } else if let Some(prefix) = cc.strip_suffix("gcc") {
            PathBuf::from(format!("{}g++", prefix))
        } else {
            cc_path.clone()
        };

        Self {
            compiler_type,
            cc_path,
            cxx_path,
            version,
        }
    }

    /// Compiler driver for C (`false`) or C++ (`true`) sources
    pub fn compiler(&self, cplus: bool) -> &PathBuf {
        if cplus { &self.cxx_path } else { &self.cc_path }
    }
}

/// Error type for toolchain operations
#[derive(Debug)]
pub enum ToolchainError {
    /// No suitable toolchain found
    NotFound(String),
    /// IO error
    IoError(std::io::Error),
}

impl std::fmt::Display for ToolchainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolchainError::NotFound(msg) => write!(f, "Toolchain not found: {}", msg),
            ToolchainError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for ToolchainError {}

impl From<std::io::Error> for ToolchainError {
    fn from(e: std::io::Error) -> Self {
        ToolchainError::IoError(e)
    }
}
