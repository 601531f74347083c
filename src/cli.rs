//! Command-line surface.
//!
//! Parses flags with clap and folds them, together with the project file,
//! into a `BuildConfiguration`.

use crate::config::{
    self, AnnotateMode, BuildConfiguration, CompileTimeEnv, Directives, LanguageLevel,
    ProjectConfig, TranslatorOptions,
};
use anyhow::Result;
use clap::{ArgGroup, Parser};

#[derive(Parser, Debug)]
#[command(name = "nativize")]
#[command(about = "Translate source modules to C and build native extension modules", version = env!("CARGO_PKG_VERSION"))]
#[command(group(ArgGroup::new("language_level").args(["py2", "py3", "py3str"])))]
pub struct Cli {
    /// Set a compiler directive
    #[arg(short = 'X', long = "directive", value_name = "NAME=VALUE,...")]
    pub directives: Vec<String>,

    /// Set a compile-time environment variable
    #[arg(short = 'E', long = "compile-time-env", value_name = "NAME=VALUE,...")]
    pub compile_time_env: Vec<String>,

    /// Set a translator option
    #[arg(short = 's', long = "option", value_name = "NAME=VALUE")]
    pub options: Vec<String>,

    /// Use language level 2 by default
    #[arg(short = '2')]
    pub py2: bool,

    /// Use language level 3 by default
    #[arg(short = '3')]
    pub py3: bool,

    /// Use language level 3 with str literals by default
    #[arg(long = "3str")]
    pub py3str: bool,

    /// Produce a colorized HTML report of the source
    #[arg(short = 'a', long, overrides_with = "annotate_fullc")]
    pub annotate: bool,

    /// Produce a colorized HTML report including the full generated code
    #[arg(long, overrides_with = "annotate")]
    pub annotate_fullc: bool,

    /// Exclude file patterns from translation
    #[arg(short = 'x', long = "exclude", value_name = "PATTERN")]
    pub excludes: Vec<String>,

    /// Build native extension modules
    #[arg(short = 'b', long)]
    pub build: bool,

    /// Build native extension modules in place (implies -b)
    #[arg(short = 'i', long)]
    pub inplace: bool,

    /// Run builds in N parallel jobs
    #[arg(short = 'j', long, value_name = "N", default_value_t = config::default_parallelism())]
    pub parallel: usize,

    /// Force retranslation and rebuild
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Be less verbose
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Ignore some translation-time errors (unknown names, uninitialized state)
    #[arg(long)]
    pub lenient: bool,

    /// Translate as much as possible, skipping modules that fail
    #[arg(short = 'k', long)]
    pub keep_going: bool,

    /// Strip docstrings from generated code
    #[arg(long)]
    pub no_docstrings: bool,

    /// Source files, directories or glob patterns
    #[arg(required = true, value_name = "SOURCES")]
    pub sources: Vec<String>,
}

impl Cli {
    fn language_level(&self) -> Option<LanguageLevel> {
        if self.py2 {
            Some(LanguageLevel::Two)
        } else if self.py3 {
            Some(LanguageLevel::Three)
        } else if self.py3str {
            Some(LanguageLevel::ThreeStr)
        } else {
            None
        }
    }

    fn annotate_mode(&self) -> Option<AnnotateMode> {
        if self.annotate_fullc {
            Some(AnnotateMode::FullC)
        } else if self.annotate {
            Some(AnnotateMode::Default)
        } else {
            None
        }
    }

    /// Fold the parsed flags and the project file into one configuration.
    pub fn into_configuration(self, project: ProjectConfig) -> Result<BuildConfiguration> {
        let directives = self
            .directives
            .iter()
            .try_fold(Directives::new(), |acc, raw| config::merge_directives(&acc, raw))?;
        let compile_time_env = self
            .compile_time_env
            .iter()
            .try_fold(CompileTimeEnv::new(), |acc, raw| {
                config::merge_compile_time_env(&acc, raw)
            })?;
        let options = self
            .options
            .iter()
            .try_fold(TranslatorOptions::new(), |acc, raw| config::merge_options(&acc, raw))?;

        Ok(BuildConfiguration {
            language_level: self.language_level(),
            annotate: self.annotate_mode(),
            build: self.build || self.inplace,
            inplace: self.inplace,
            parallel: self.parallel,
            keep_going: self.keep_going,
            force: self.force,
            quiet: self.quiet,
            lenient: self.lenient,
            no_docstrings: self.no_docstrings,
            directives,
            compile_time_env,
            options,
            excludes: self.excludes,
            sources: self.sources,
            project,
        })
    }
}
