use super::{CompileUnit, Translator};
use crate::config::{BuildConfiguration, ProjectConfig};
use crate::discovery::{self, ExcludeSet};
use crate::package::PackageResolver;
use anyhow::{Context, Result, bail};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Options the translator understands; anything else passed with `-s` is ignored.
const KNOWN_OPTIONS: &[&str] = &["cplus"];

/// Runs an external source-to-C translator once per module.
pub struct ExternalTranslator {
    program: String,
    resolver: PackageResolver,
}

struct PendingSource {
    path: PathBuf,
    module: String,
}

impl ExternalTranslator {
    pub fn new(program: impl Into<String>, resolver: PackageResolver) -> Self {
        Self {
            program: program.into(),
            resolver,
        }
    }

    pub fn from_config(project: &ProjectConfig) -> Self {
        Self::new(
            project.translator.program.clone(),
            PackageResolver::new(&project.translator.package_markers),
        )
    }

    fn collect_sources(
        &self,
        patterns: &[String],
        config: &BuildConfiguration,
    ) -> Result<Vec<PendingSource>> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let excludes = ExcludeSet::new(&config.excludes, &cwd)?;
        let mut seen = HashSet::new();
        let mut sources = Vec::new();

        for pattern in patterns {
            let matches = discovery::expand(pattern)?;
            if matches.is_empty() {
                bail!("'{}' doesn't match any files", pattern);
            }
            for path in matches {
                if !path.is_file() {
                    continue;
                }
                let path = std::path::absolute(&path)
                    .with_context(|| format!("Failed to resolve {}", path.display()))?;
                if excludes.is_excluded(&path) {
                    continue;
                }
                let module = self.resolver.find_package_base(&path).module_name();
                // First source wins when two files map to one module.
                if !seen.insert(module.clone()) {
                    continue;
                }
                sources.push(PendingSource { path, module });
            }
        }
        Ok(sources)
    }

    fn translate_one(
        &self,
        source: &PendingSource,
        config: &BuildConfiguration,
        args: &[String],
        pb: &ProgressBar,
    ) -> Result<CompileUnit> {
        let cplus = config.cplus();
        let generated = source.path.with_extension(if cplus { "cpp" } else { "c" });
        let mut unit = CompileUnit::new(&source.module, source.path.clone(), generated.clone());
        unit.cplus = cplus;

        if !config.force && is_up_to_date(&generated, &source.path) {
            pb.inc(1);
            return Ok(unit);
        }

        if !config.quiet {
            pb.set_message(format!("Translating {}", source.module));
        }
        let output = Command::new(&self.program)
            .args(args)
            .arg("--module-name")
            .arg(&source.module)
            .arg("-o")
            .arg(&generated)
            .arg(&source.path)
            .output()
            .with_context(|| format!("Failed to execute translator '{}'", self.program))?;

        pb.inc(1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            if generated.exists() {
                let _ = fs::remove_file(&generated);
            }
            bail!(
                "Translation of {} failed:\n{}",
                source.path.display(),
                stderr.trim_end()
            );
        }
        if !config.quiet && !stderr.trim().is_empty() {
            pb.println(format!(
                "{} Warning in {}:\n{}",
                "!".yellow(),
                source.path.display(),
                stderr.trim_end()
            ));
        }
        Ok(unit)
    }
}

/// Command-line arguments shared by every translator invocation.
pub fn translator_args(config: &BuildConfiguration) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(level) = config.language_level {
        args.push(level.flag().to_string());
    }

    let mut directives = config.project.default_directives();
    directives.extend(config.directives.clone());
    for (name, value) in &directives {
        args.push("-X".to_string());
        args.push(format!("{}={}", name, value));
    }
    for (name, value) in &config.compile_time_env {
        args.push("-E".to_string());
        args.push(format!("{}={}", name, value));
    }

    if let Some(mode) = config.annotate {
        args.push(mode.flag().to_string());
    }
    if config.lenient {
        args.push("--lenient".to_string());
    }
    if config.no_docstrings {
        args.push("--no-docstrings".to_string());
    }
    if config.cplus() {
        args.push("--cplus".to_string());
    }
    args
}

fn is_up_to_date(generated: &Path, source: &Path) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(generated), modified(source)) {
        (Some(out), Some(src)) => out >= src,
        _ => false,
    }
}

impl Translator for ExternalTranslator {
    fn translate(
        &self,
        patterns: &[String],
        config: &BuildConfiguration,
    ) -> Result<Vec<CompileUnit>> {
        for name in config.options.keys() {
            if !KNOWN_OPTIONS.contains(&name.as_str()) {
                eprintln!("   {} Ignoring unknown option '{}'", "!".yellow(), name);
            }
        }

        let sources = self.collect_sources(patterns, config)?;
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let args = translator_args(config);
        let pb = if config.quiet {
            ProgressBar::hidden()
        } else {
            let style = ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .progress_chars("#>-");
            ProgressBar::new(sources.len() as u64).with_style(style)
        };

        let translate_all = || -> Vec<Result<CompileUnit>> {
            sources
                .par_iter()
                .map(|source| self.translate_one(source, config, &args, &pb))
                .collect()
        };
        let results = match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel.max(1))
            .build()
        {
            Ok(pool) => pool.install(translate_all),
            Err(_) => sources
                .iter()
                .map(|source| self.translate_one(source, config, &args, &pb))
                .collect(),
        };
        pb.finish_and_clear();

        let mut units = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(unit) => units.push(unit),
                Err(e) if config.keep_going => {
                    eprintln!("{} Skipping module: {:#}", "!".yellow(), e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(units)
    }
}
