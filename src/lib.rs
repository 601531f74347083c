//! # nativize - Parallel Native Extension Builder
//!
//! nativize discovers source modules from glob patterns, hands them to an
//! external source-to-C translator, and builds the generated code into
//! native extension modules, optionally in place and in parallel.
//!
//! ## Quick Start
//!
//! ```bash
//! # Translate and build every module under src/ next to its source
//! nativize -i -j 8 src/
//!
//! # Translate only, skipping modules that fail
//! nativize -k 'lib/**/*.{py,pyx}'
//! ```
//!
//! ## Module Organization
//!
//! - [`discovery`] - Glob expansion of source patterns
//! - [`package`] - Package boundary and base-directory resolution
//! - [`translate`] - Translator seam and the external translator
//! - [`build`] - Dispatch, worker pools and per-job build execution
//! - [`toolchain`] - Native compiler detection and invocation
//! - [`orchestrate`] - The end-to-end run

/// Native build dispatch, worker pools and job execution.
pub mod build;

/// Command-line parsing.
pub mod cli;

/// Build configuration and `nativize.toml` parsing.
pub mod config;

/// Source pattern expansion.
pub mod discovery;

/// Discovery -> translation -> build for one run.
pub mod orchestrate;

/// Package directory resolution.
pub mod package;

/// Native toolchain detection and invocation.
pub mod toolchain;

/// Source-to-C translation.
pub mod translate;
