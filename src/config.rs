//! Build configuration.
//!
//! `BuildConfiguration` is assembled once at startup from the command line and
//! the optional `nativize.toml` project file, then handed by reference to every
//! stage of the run. Repeated `-X`, `-E` and `-s` occurrences are folded with
//! the pure `merge_*` functions below, each producing a fresh map.

use anyhow::{Context, Result, bail};
use colored::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const PROJECT_FILE: &str = "nativize.toml";

/// Value of a compiler directive (`-X name=value`).
#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl fmt::Display for DirectiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            DirectiveValue::Int(i) => write!(f, "{}", i),
            DirectiveValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Value of a compile-time environment binding (`-E name=value`).
#[derive(Debug, Clone, PartialEq)]
pub enum EnvValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            EnvValue::Int(i) => write!(f, "{}", i),
            EnvValue::Float(x) => write!(f, "{:?}", x),
            EnvValue::Str(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
        }
    }
}

pub type Directives = BTreeMap<String, DirectiveValue>;
pub type CompileTimeEnv = BTreeMap<String, EnvValue>;
pub type TranslatorOptions = BTreeMap<String, bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageLevel {
    Two,
    Three,
    ThreeStr,
}

impl LanguageLevel {
    pub fn flag(self) -> &'static str {
        match self {
            LanguageLevel::Two => "-2",
            LanguageLevel::Three => "-3",
            LanguageLevel::ThreeStr => "--3str",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotateMode {
    /// Annotated report of the source only.
    Default,
    /// Annotated report including the full generated code.
    FullC,
}

impl AnnotateMode {
    pub fn flag(self) -> &'static str {
        match self {
            AnnotateMode::Default => "--annotate",
            AnnotateMode::FullC => "--annotate-fullc",
        }
    }
}

/// Immutable snapshot of everything the run needs.
#[derive(Debug, Clone)]
pub struct BuildConfiguration {
    pub sources: Vec<String>,
    pub parallel: usize,
    pub keep_going: bool,
    pub force: bool,
    pub quiet: bool,
    pub build: bool,
    pub inplace: bool,
    pub lenient: bool,
    pub annotate: Option<AnnotateMode>,
    pub no_docstrings: bool,
    pub language_level: Option<LanguageLevel>,
    pub directives: Directives,
    pub compile_time_env: CompileTimeEnv,
    pub options: TranslatorOptions,
    pub excludes: Vec<String>,
    pub project: ProjectConfig,
}

impl Default for BuildConfiguration {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            parallel: default_parallelism(),
            keep_going: false,
            force: false,
            quiet: false,
            build: false,
            inplace: false,
            lenient: false,
            annotate: None,
            no_docstrings: false,
            language_level: None,
            directives: Directives::new(),
            compile_time_env: CompileTimeEnv::new(),
            options: TranslatorOptions::new(),
            excludes: Vec::new(),
            project: ProjectConfig::default(),
        }
    }
}

impl BuildConfiguration {
    /// Whether the translator should emit C++ instead of C.
    pub fn cplus(&self) -> bool {
        self.options.get("cplus").copied().unwrap_or(false)
    }
}

/// One and a half jobs per available processor.
pub fn default_parallelism() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus * 3 / 2
}

// --- Project file (nativize.toml) ---

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ProjectConfig {
    pub translator: TranslatorConfig,
    pub toolchain: ToolchainConfig,
    pub directives: BTreeMap<String, toml::Value>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TranslatorConfig {
    pub program: String,
    pub extensions: Vec<String>,
    pub package_markers: Vec<String>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            program: "cython".to_string(),
            extensions: vec!["py".to_string(), "pyx".to_string()],
            package_markers: vec![
                "__init__.py".to_string(),
                "__init__.pyx".to_string(),
                "__init__.pxd".to_string(),
            ],
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ToolchainConfig {
    pub compiler: Option<String>,
    pub flags: Vec<String>,
    pub ldflags: Vec<String>,
    pub include_dirs: Vec<PathBuf>,
    pub python_config: Option<String>,
    pub ext_suffix: Option<String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            compiler: None,
            flags: Vec::new(),
            ldflags: Vec::new(),
            include_dirs: Vec::new(),
            python_config: Some("python3-config".to_string()),
            ext_suffix: None,
        }
    }
}

impl ProjectConfig {
    /// Default directives from the `[directives]` table.
    pub fn default_directives(&self) -> Directives {
        self.directives
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    toml::Value::Boolean(b) => DirectiveValue::Bool(*b),
                    toml::Value::Integer(i) => DirectiveValue::Int(*i),
                    toml::Value::String(s) => parse_directive_value(s),
                    other => DirectiveValue::Str(other.to_string()),
                };
                (name.clone(), value)
            })
            .collect()
    }
}

/// Load `nativize.toml` from `dir`, falling back to defaults when absent.
pub fn load_project_config(dir: &Path) -> Result<ProjectConfig> {
    let path = dir.join(PROJECT_FILE);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {} - check file permissions", path.display()))?;
    let config: ProjectConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {} - check for syntax errors", path.display()))?;

    if config.translator.extensions.is_empty() {
        eprintln!(
            "   {} [translator] extensions is empty, directories will match nothing",
            "!".yellow()
        );
    }
    Ok(config)
}

// --- Merge functions for repeatable flags ---

fn split_assignments(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn check_name(name: &str, raw: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if !valid {
        bail!("Invalid name '{}' in '{}'", name, raw);
    }
    Ok(())
}

fn parse_directive_value(value: &str) -> DirectiveValue {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => DirectiveValue::Bool(true),
        "false" | "no" | "off" => DirectiveValue::Bool(false),
        _ => match value.parse::<i64>() {
            Ok(i) => DirectiveValue::Int(i),
            Err(_) => DirectiveValue::Str(value.to_string()),
        },
    }
}

/// Fold one `-X NAME=VALUE,...` occurrence into `current`.
pub fn merge_directives(current: &Directives, raw: &str) -> Result<Directives> {
    let mut merged = current.clone();
    for item in split_assignments(raw) {
        let Some((name, value)) = item.split_once('=') else {
            bail!("Expected '=' in directive '{}'", item);
        };
        let name = name.trim();
        check_name(name, raw)?;
        merged.insert(name.to_string(), parse_directive_value(value.trim()));
    }
    Ok(merged)
}

fn parse_env_value(value: &str) -> EnvValue {
    let quoted = |q: char| value.len() >= 2 && value.starts_with(q) && value.ends_with(q);
    if quoted('"') || quoted('\'') {
        return EnvValue::Str(value[1..value.len() - 1].to_string());
    }
    match value {
        "True" => EnvValue::Bool(true),
        "False" => EnvValue::Bool(false),
        _ => {
            if let Ok(i) = value.parse::<i64>() {
                EnvValue::Int(i)
            } else if let Ok(x) = value.parse::<f64>() {
                EnvValue::Float(x)
            } else {
                EnvValue::Str(value.to_string())
            }
        }
    }
}

/// Fold one `-E NAME=VALUE,...` occurrence into `current`.
pub fn merge_compile_time_env(current: &CompileTimeEnv, raw: &str) -> Result<CompileTimeEnv> {
    let mut merged = current.clone();
    for item in split_assignments(raw) {
        let Some((name, value)) = item.split_once('=') else {
            bail!("Expected '=' in compile-time binding '{}'", item);
        };
        let name = name.trim();
        check_name(name, raw)?;
        merged.insert(name.to_string(), parse_env_value(value.trim()));
    }
    Ok(merged)
}

/// Fold one `-s NAME[=VALUE],...` occurrence into `current`.
///
/// `false`, `f`, `0` and `no` (any case) turn an option off; any other value,
/// or a bare name, turns it on.
pub fn merge_options(current: &TranslatorOptions, raw: &str) -> Result<TranslatorOptions> {
    let mut merged = current.clone();
    for item in split_assignments(raw) {
        let (name, enabled) = match item.split_once('=') {
            Some((name, value)) => (
                name.trim(),
                !matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "false" | "f" | "0" | "no"
                ),
            ),
            None => (item, true),
        };
        check_name(name, raw)?;
        merged.insert(name.to_string(), enabled);
    }
    Ok(merged)
}
