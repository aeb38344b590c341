//! Run configuration, threaded explicitly through every entry point.
//!
//! Values come from built-in defaults, then an optional TOML file, then the
//! command line (applied by the binary on top of what this module loads).
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{DiffCovError, Result};

/// Tables searched, in order, in a `pyproject.toml`-style file.
const TOOL_TABLES: &[&str] = &["diffcov", "diff_cover", "diff_quality"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Branch the committed diff is taken against.
    pub compare_branch: String,
    /// `...` (symmetric difference from the merge base) or `..` (tip to tip).
    pub diff_range_notation: String,
    pub ignore_staged: bool,
    pub ignore_unstaged: bool,
    pub include_untracked: bool,
    pub ignore_whitespace: bool,
    /// Glob patterns; when non-empty a path must match one of them.
    pub include: Vec<String>,
    /// Glob patterns; matching paths are dropped.
    pub exclude: Vec<String>,
    /// Roots that coverage report paths may be relative to.
    pub src_roots: Vec<String>,
    pub fail_under: f64,
    /// Fail on the first unreadable report instead of skipping it.
    pub strict: bool,
    pub quiet: bool,
    /// List the uncovered or violating lines in text output.
    pub show_uncovered: bool,
    pub expand_coverage_report: bool,
    /// Read the diff from this file instead of running git.
    pub diff_file: Option<PathBuf>,
    /// Quality tool name (diff-quality mode).
    pub violations: Option<String>,
    /// Extra command-line options passed to the quality tool.
    pub options: Option<String>,
    /// Prefix stripped from paths in eslint reports.
    pub report_root_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compare_branch: "origin/main".to_string(),
            diff_range_notation: "...".to_string(),
            ignore_staged: false,
            ignore_unstaged: false,
            include_untracked: false,
            ignore_whitespace: false,
            include: Vec::new(),
            exclude: Vec::new(),
            src_roots: vec!["src/main/java".to_string(), "src/test/java".to_string()],
            fail_under: 0.0,
            strict: false,
            quiet: false,
            show_uncovered: false,
            expand_coverage_report: false,
            diff_file: None,
            violations: None,
            options: None,
            report_root_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    ///
    /// Settings are read from a `[tool.diffcov]` (or `[tool.diff_cover]`,
    /// `[tool.diff_quality]`) table when present, otherwise from top-level
    /// keys, ignoring other tables. A file that yields no settings at all is
    /// rejected.
    pub fn from_file(path: &Path) -> Result<Self> {
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            return Err(DiffCovError::Config(format!(
                "only .toml configuration files are supported: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let doc: toml::Table = toml::from_str(content)
            .map_err(|e| DiffCovError::Config(format!("invalid TOML: {e}")))?;

        let tool_table = doc.get("tool").and_then(|t| t.as_table()).and_then(|tool| {
            TOOL_TABLES
                .iter()
                .find_map(|name| tool.get(*name).and_then(|t| t.as_table()))
        });
        let table = match tool_table {
            Some(t) => t.clone(),
            // Sections such as `[project]` belong to other tools; no setting
            // is a table.
            None => doc.into_iter().filter(|(_, v)| !v.is_table()).collect(),
        };
        if table.is_empty() {
            return Err(DiffCovError::Config(
                "no diffcov settings found in configuration file".to_string(),
            ));
        }

        // Accept `compare-branch` as well as `compare_branch`.
        let table: toml::Table = table
            .into_iter()
            .map(|(k, v)| (k.replace('-', "_"), v))
            .collect();
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| DiffCovError::Config(e.to_string()))
    }

    /// Reject settings that would make the run meaningless, before any
    /// parsing work starts.
    pub fn validate(&self) -> Result<()> {
        if !self.fail_under.is_finite() || !(0.0..=100.0).contains(&self.fail_under) {
            return Err(DiffCovError::Config(format!(
                "fail-under must be between 0 and 100, got {}",
                self.fail_under
            )));
        }
        if self.diff_range_notation != "..." && self.diff_range_notation != ".." {
            return Err(DiffCovError::Config(format!(
                "diff range notation must be '...' or '..', got '{}'",
                self.diff_range_notation
            )));
        }
        if self.compare_branch.trim().is_empty() && self.diff_file.is_none() {
            return Err(DiffCovError::Config(
                "compare branch must not be empty".to_string(),
            ));
        }
        for pattern in self.include.iter().chain(&self.exclude) {
            glob::Pattern::new(pattern).map_err(|e| {
                DiffCovError::Config(format!("invalid glob pattern '{pattern}': {e}"))
            })?;
        }
        Ok(())
    }
}
