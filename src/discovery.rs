//! Source discovery.
//!
//! Expands glob-style patterns (`*`, `?`, `[..]`, `**` and `{a,b}`
//! alternation) into concrete paths by walking the pattern's literal prefix
//! with `walkdir` and matching with `globset`. No shell expansion involved.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn has_glob_meta(component: &str) -> bool {
    component.contains(['*', '?', '[', '{'])
}

/// Split a pattern into its literal leading directory and the glob tail.
/// Returns `None` when the whole pattern is literal.
fn split_glob_root(pattern: &str) -> Option<(String, Vec<&str>)> {
    let components: Vec<&str> = pattern.split('/').collect();
    let first_glob = components.iter().position(|c| has_glob_meta(c))?;

    let root = components[..first_glob].join("/");
    let root = if root.is_empty() && pattern.starts_with('/') {
        "/".to_string()
    } else {
        root
    };
    Some((root, components[first_glob..].to_vec()))
}

fn compile(pattern: &str) -> Result<GlobMatcher> {
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("Invalid source pattern '{}'", pattern))?;
    Ok(glob.compile_matcher())
}

/// Expand one pattern. Matches come back sorted; duplicates across
/// different patterns are the caller's business.
pub fn expand(pattern: &str) -> Result<Vec<PathBuf>> {
    let Some((root, tail)) = split_glob_root(pattern) else {
        let path = Path::new(pattern);
        return Ok(if path.exists() {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        });
    };

    let matcher = compile(pattern)?;
    let walk_root = if root.is_empty() { "." } else { root.as_str() };
    if !Path::new(walk_root).is_dir() {
        return Ok(Vec::new());
    }

    let mut walker = WalkDir::new(walk_root).follow_links(true).sort_by_file_name();
    if !tail.iter().any(|c| c.contains("**")) {
        walker = walker.max_depth(tail.len());
    }

    // Dot-prefixed entries are skipped unless the pattern names them.
    let visible = |entry: &walkdir::DirEntry| {
        entry.depth() == 0
            || !entry.file_name().to_string_lossy().starts_with('.')
            || hidden_requested(&tail, entry.depth())
    };

    let mut matches = Vec::new();
    for entry in walker.into_iter().filter_entry(visible) {
        let entry = entry.with_context(|| format!("Failed to read files for '{}'", pattern))?;
        let path = entry.path();
        let candidate = if root.is_empty() {
            path.strip_prefix(".").unwrap_or(path)
        } else {
            path
        };
        if matcher.is_match(candidate) {
            matches.push(path.to_path_buf());
        }
    }
    Ok(matches)
}

/// Whether the pattern component lining up with `depth` starts with a dot.
/// Below a `**` the alignment is lost, so only the final component counts.
fn hidden_requested(tail: &[&str], depth: usize) -> bool {
    if tail.iter().take(depth).any(|c| c.contains("**")) {
        return tail.last().is_some_and(|c| c.starts_with('.'));
    }
    tail.get(depth - 1).is_some_and(|c| c.starts_with('.'))
}

/// `path` as a glob that matches only itself.
fn literal_glob(path: &Path) -> String {
    globset::escape(&path.to_string_lossy())
}

/// Recursive pattern covering every source below `dir`.
pub fn recursive_pattern(dir: &Path, extensions: &[String]) -> String {
    let dir = literal_glob(dir);
    let dir = dir.trim_end_matches('/');
    match extensions {
        [single] => format!("{}/**/*.{}", dir, single),
        many => format!("{}/**/*.{{{}}}", dir, many.join(",")),
    }
}

/// Patterns to hand the translator for one discovered input path.
pub fn patterns_for_path(path: &Path, extensions: &[String]) -> Vec<String> {
    if path.is_dir() {
        vec![recursive_pattern(path, extensions)]
    } else {
        vec![literal_glob(path)]
    }
}

/// Exclusion patterns, matched against absolute paths.
pub struct ExcludeSet {
    set: GlobSet,
}

impl ExcludeSet {
    pub fn new(patterns: &[String], cwd: &Path) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let anchored = if Path::new(pattern).is_absolute() || pattern.starts_with("**") {
                pattern.clone()
            } else {
                format!("{}/{}", literal_glob(cwd).trim_end_matches('/'), pattern)
            };
            let glob = GlobBuilder::new(&anchored)
                .literal_separator(true)
                .build()
                .with_context(|| format!("Invalid exclude pattern '{}'", pattern))?;
            builder.add(glob);
        }
        let set = builder.build().context("Failed to compile exclude patterns")?;
        Ok(Self { set })
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        self.set.is_match(path)
    }
}
