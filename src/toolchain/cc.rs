use super::{BuildContext, CompilerType, NativeToolchain, Toolchain, get_or_detect_toolchain};
use crate::build::FeedbackAnalyzer;
use crate::config::{BuildConfiguration, ToolchainConfig};
use crate::translate::CompileUnit;
use anyhow::{Context, Result, bail};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const DEFAULT_EXT_SUFFIX: &str = ".so";

/// Compiles generated C/C++ into shared extension modules with a cc-style driver.
#[derive(Debug, Clone)]
pub struct CcToolchain {
    toolchain: Toolchain,
    cflags: Vec<String>,
    ldflags: Vec<String>,
    ext_suffix: String,
    force: bool,
    quiet: bool,
}

impl CcToolchain {
    pub fn new(toolchain: Toolchain, ext_suffix: impl Into<String>) -> Self {
        Self {
            toolchain,
            cflags: Vec::new(),
            ldflags: Vec::new(),
            ext_suffix: ext_suffix.into(),
            force: false,
            quiet: false,
        }
    }

    pub fn from_config(config: &BuildConfiguration) -> Result<Self> {
        let tc_config = &config.project.toolchain;
        let toolchain = select_toolchain(tc_config)?;
        if !config.quiet {
            println!(
                "   {} Using compiler: {} ({})",
                "🔧".cyan(),
                toolchain.cc_path.display(),
                toolchain.version
            );
        }

        let (probed_includes, probed_suffix) = match &tc_config.python_config {
            Some(program) => probe_python_config(program),
            None => (Vec::new(), None),
        };

        let mut cflags: Vec<String> = tc_config
            .include_dirs
            .iter()
            .map(|dir| format!("-I{}", dir.display()))
            .collect();
        cflags.extend(probed_includes);
        cflags.extend(tc_config.flags.iter().cloned());

        let ext_suffix = tc_config
            .ext_suffix
            .clone()
            .or(probed_suffix)
            .unwrap_or_else(|| DEFAULT_EXT_SUFFIX.to_string());

        Ok(Self {
            toolchain,
            cflags,
            ldflags: tc_config.ldflags.clone(),
            ext_suffix,
            force: config.force,
            quiet: config.quiet,
        })
    }

    /// Where the artifact for `unit` goes.
    pub fn artifact_path(&self, unit: &CompileUnit, cwd: &Path, inplace: bool) -> PathBuf {
        let leaf = unit.name.rsplit('.').next().unwrap_or(&unit.name);
        let file_name = format!("{}{}", leaf, self.ext_suffix);
        if inplace {
            unit.source.with_file_name(file_name)
        } else {
            cwd.join("build")
                .join("lib")
                .join(unit.module_path())
                .with_file_name(file_name)
        }
    }

    fn run(&self, cmd: &mut Command, unit: &CompileUnit, stage: &str) -> Result<()> {
        let output = cmd.output().with_context(|| {
            format!(
                "Failed to execute compiler '{}'",
                self.toolchain.cc_path.display()
            )
        })?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            eprintln!(
                "{} Error {} {}:\n{}",
                "x".red(),
                stage,
                unit.name,
                stderr.trim_end()
            );
            if let Some(hint) = FeedbackAnalyzer::analyze(&stderr) {
                eprintln!("\n{} {}", "💡".yellow(), hint);
            }
            bail!("{} {} failed", stage, unit.name);
        }
        if !self.quiet && !stderr.trim().is_empty() {
            println!("{} Warning in {}:\n{}", "!".yellow(), unit.name, stderr.trim_end());
        }
        Ok(())
    }
}

fn select_toolchain(config: &ToolchainConfig) -> Result<Toolchain> {
    let explicit = config.compiler.clone().or_else(|| std::env::var("CC").ok());
    if let Some(compiler) = explicit {
        return Ok(Toolchain::new_simple(
            CompilerType::Custom,
            PathBuf::from(compiler),
            "custom".to_string(),
        ));
    }
    Ok(get_or_detect_toolchain()?)
}

/// Include flags and extension suffix reported by `python3-config`.
fn probe_python_config(program: &str) -> (Vec<String>, Option<String>) {
    let query = |flag: &str| -> Option<String> {
        let output = Command::new(program).arg(flag).output().ok()?;
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
    };

    let includes = query("--includes")
        .map(|s| {
            s.split_whitespace()
                .filter(|f| f.starts_with("-I"))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let suffix = query("--extension-suffix").filter(|s| !s.is_empty());
    (includes, suffix)
}

fn is_newer(artifact: &Path, input: &Path) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(artifact), modified(input)) {
        (Some(out), Some(src)) => out >= src,
        _ => false,
    }
}

impl NativeToolchain for CcToolchain {
    fn build(&self, units: &[CompileUnit], ctx: &BuildContext<'_>) -> Result<Vec<PathBuf>> {
        let cwd = match ctx.working_dir {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        let temp_dir = ctx
            .build_temp
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.join("build").join("temp"));

        let mut artifacts = Vec::with_capacity(units.len());
        for unit in units {
            let artifact = self.artifact_path(unit, &cwd, ctx.inplace);
            if !self.force && is_newer(&artifact, &unit.generated) {
                artifacts.push(artifact);
                continue;
            }
            if !self.quiet {
                println!("   {} Building {}", "⚙".blue(), unit.name);
            }

            fs::create_dir_all(&temp_dir)
                .with_context(|| format!("Failed to create {}", temp_dir.display()))?;
            if let Some(parent) = artifact.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }

            let compiler = self.toolchain.compiler(unit.cplus);
            let object = temp_dir.join(format!("{}.o", unit.name));

            let mut compile = Command::new(compiler);
            compile
                .current_dir(&cwd)
                .args(["-fPIC", "-c"])
                .arg(&unit.generated)
                .arg("-o")
                .arg(&object)
                .args(&self.cflags);
            self.run(&mut compile, unit, "compiling")?;

            let mut link = Command::new(compiler);
            link.current_dir(&cwd)
                .arg("-shared")
                .arg(&object)
                .arg("-o")
                .arg(&artifact)
                .args(&self.ldflags);
            self.run(&mut link, unit, "linking")?;

            artifacts.push(artifact);
        }
        Ok(artifacts)
    }
}
