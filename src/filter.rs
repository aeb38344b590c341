//! Narrow the set of changed files by glob patterns and by which diff
//! layers touched them.
use std::collections::{BTreeMap, BTreeSet};

use glob::{MatchOptions, Pattern};
use tracing::debug;

use crate::config::Config;
use crate::diff::{LayerKind, ParsedLayer};
use crate::error::{DiffCovError, Result};

/// fnmatch semantics: `*` also matches `/`.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl PathFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.include, &config.exclude)
    }

    /// With include patterns, a path must match one of them; a path
    /// matching any exclude pattern is dropped either way. A pattern
    /// matches the whole path or its file name.
    pub fn matches(&self, path: &str) -> bool {
        if !self.include.is_empty() && !any_match(&self.include, path) {
            debug!(path, "not matched by include patterns");
            return false;
        }
        if any_match(&self.exclude, path) {
            debug!(path, "excluded");
            return false;
        }
        true
    }

    pub fn apply<'a>(&self, paths: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
        paths
            .into_iter()
            .filter(|p| self.matches(p))
            .map(str::to_string)
            .collect()
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p)
                .map_err(|e| DiffCovError::Config(format!("invalid glob pattern '{p}': {e}")))
        })
        .collect()
}

fn any_match(patterns: &[Pattern], path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    patterns
        .iter()
        .any(|p| p.matches_with(path, MATCH_OPTIONS) || p.matches_with(name, MATCH_OPTIONS))
}

/// Which diff layers touched each path, and which paths are untracked.
/// Supplied by the version-control side; this module only reads it.
#[derive(Debug, Clone, Default)]
pub struct StatusFacts {
    touched_by: BTreeMap<String, BTreeSet<LayerKind>>,
    untracked: BTreeSet<String>,
}

impl StatusFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_layers(layers: &[ParsedLayer], untracked: &[String]) -> Self {
        let mut facts = Self::new();
        for layer in layers {
            for path in layer.changes.paths() {
                facts.record(path, layer.kind);
            }
        }
        for path in untracked {
            facts.mark_untracked(path);
        }
        facts
    }

    pub fn record(&mut self, path: &str, kind: LayerKind) {
        self.touched_by.entry(path.to_string()).or_default().insert(kind);
    }

    pub fn mark_untracked(&mut self, path: &str) {
        self.untracked.insert(path.to_string());
    }
}

/// `ignore_staged`, `ignore_unstaged` and `include_untracked`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags {
    pub ignore_staged: bool,
    pub ignore_unstaged: bool,
    pub include_untracked: bool,
}

impl StatusFlags {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ignore_staged: config.ignore_staged,
            ignore_unstaged: config.ignore_unstaged,
            include_untracked: config.include_untracked,
        }
    }

    fn ignores(&self, kind: LayerKind) -> bool {
        match kind {
            LayerKind::Staged => self.ignore_staged,
            LayerKind::Unstaged => self.ignore_unstaged,
            LayerKind::Committed | LayerKind::File => false,
        }
    }

    /// A path survives unless every layer that touched it is ignored, or it
    /// is untracked and untracked files are not wanted. Paths the facts do
    /// not mention are kept.
    pub fn keeps(&self, facts: &StatusFacts, path: &str) -> bool {
        if facts.untracked.contains(path) {
            return self.include_untracked;
        }
        match facts.touched_by.get(path) {
            Some(kinds) => kinds.iter().any(|k| !self.ignores(*k)),
            None => true,
        }
    }
}

/// Paths that pass both the status flags and the glob patterns.
pub fn filter_paths<'a>(
    paths: impl IntoIterator<Item = &'a str>,
    filter: &PathFilter,
    flags: StatusFlags,
    facts: &StatusFacts,
) -> BTreeSet<String> {
    paths
        .into_iter()
        .filter(|p| {
            let keep = flags.keeps(facts, p);
            if !keep {
                debug!(path = %p, "dropped by git status flags");
            }
            keep
        })
        .filter(|p| filter.matches(p))
        .map(str::to_string)
        .collect()
}
