// src/stage/paths.rs

//! Path sets: root-relative source globs plus a destination directory.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use globset::{Glob, GlobMatcher};
use tracing::debug;

use crate::config::PathSetConfig;
use crate::errors::{AssetdagError, Result};

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// A source file selected by a [`PathSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute (root-joined) path.
    pub path: PathBuf,
    /// Path relative to the glob base of the pattern that selected it.
    pub rel: PathBuf,
}

#[derive(Clone)]
struct SourcePattern {
    glob: String,
    base: PathBuf,
    matcher: GlobMatcher,
}

/// Immutable description of one stage's inputs and output directory.
#[derive(Clone)]
pub struct PathSet {
    name: String,
    patterns: Vec<SourcePattern>,
    dest: PathBuf,
}

impl fmt::Debug for PathSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathSet")
            .field("name", &self.name)
            .field("sources", &self.sources())
            .field("dest", &self.dest)
            .finish()
    }
}

impl PathSet {
    pub fn from_config(name: &str, cfg: &PathSetConfig) -> Result<Self> {
        let patterns = cfg
            .src
            .iter()
            .map(|glob| {
                let matcher = Glob::new(glob)?.compile_matcher();
                Ok(SourcePattern {
                    glob: glob.clone(),
                    base: glob_base(glob),
                    matcher,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            patterns,
            dest: PathBuf::from(&cfg.dest),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sources(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.glob.as_str()).collect()
    }

    /// Destination directory, relative to the project root.
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Glob bases, relative to the project root, deduplicated.
    pub fn bases(&self) -> Vec<&Path> {
        let mut bases: Vec<&Path> = self.patterns.iter().map(|p| p.base.as_path()).collect();
        bases.sort();
        bases.dedup();
        bases
    }

    /// Whether `rel` (root-relative, forward slashes) is one of this set's
    /// sources.
    pub fn matches(&self, rel: &str) -> bool {
        self.patterns.iter().any(|p| p.matcher.is_match(rel))
    }

    /// All files under `root` selected by the source globs, sorted by path.
    ///
    /// A glob base that does not exist is an error.
    pub fn expand(&self, root: &Path) -> Result<Vec<SourceFile>> {
        let mut found: BTreeMap<PathBuf, SourceFile> = BTreeMap::new();

        for base in self.bases() {
            let dir = root.join(base);
            if !dir.is_dir() {
                return Err(AssetdagError::MissingDirectory(dir));
            }

            for path in walk_files(&dir)? {
                let Ok(rel_to_root) = path.strip_prefix(root) else {
                    continue;
                };
                let rel_str = rel_to_root.to_string_lossy().replace('\\', "/");

                let Some(pattern) = self.patterns.iter().find(|p| p.matcher.is_match(&rel_str)) else {
                    continue;
                };
                let rel = rel_to_root
                    .strip_prefix(&pattern.base)
                    .unwrap_or(rel_to_root)
                    .to_path_buf();
                found.entry(path.clone()).or_insert(SourceFile { path, rel });
            }
        }

        debug!(set = %self.name, files = found.len(), "expanded path set");
        Ok(found.into_values().collect())
    }
}

/// Longest leading run of path components without glob metacharacters.
///
/// `src/styles/**/*.scss` → `src/styles`; a literal file path yields its
/// parent directory.
pub fn glob_base(glob: &str) -> PathBuf {
    let components: Vec<&str> = glob.split('/').collect();
    let literal: Vec<&str> = components
        .iter()
        .take_while(|c| !c.contains(GLOB_META))
        .copied()
        .collect();

    if literal.len() == components.len() {
        // No metacharacters at all: the pattern names a single file.
        return Path::new(glob)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
    }

    literal.iter().collect()
}

/// Recursively list regular files under `dir`.
fn walk_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries =
            std::fs::read_dir(&dir).with_context(|| format!("reading directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }

    Ok(files)
}
