//! `git` as a diff source: committed, staged and unstaged layers plus
//! untracked files.
use std::path::PathBuf;

use anyhow::Context;

use crate::command::execute;
use crate::config::Config;
use crate::diff::{DiffLayer, DiffSource, LayerKind};
use crate::paths::{unquote_git_path, Workspace};

/// Thin wrapper around the subset of `git diff` we need.
#[derive(Debug, Clone)]
pub struct GitDiffTool {
    pub compare_branch: String,
    pub range_notation: String,
    pub ignore_whitespace: bool,
    pub ignore_staged: bool,
    pub ignore_unstaged: bool,
    pub include_untracked: bool,
}

impl GitDiffTool {
    pub fn from_config(config: &Config) -> Self {
        Self {
            compare_branch: config.compare_branch.clone(),
            range_notation: config.diff_range_notation.clone(),
            ignore_whitespace: config.ignore_whitespace,
            ignore_staged: config.ignore_staged,
            ignore_unstaged: config.ignore_unstaged,
            include_untracked: config.include_untracked,
        }
    }

    /// Global options plus `diff` options shared by every layer.
    ///
    /// Prefixes are forced to `a/` and `b/` whatever the user's git config
    /// says, and context is dropped since only changed lines matter.
    fn diff_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "-c",
            "diff.mnemonicprefix=no",
            "-c",
            "diff.noprefix=no",
            "diff",
            "--no-color",
            "--no-ext-diff",
            "-U0",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if self.ignore_whitespace {
            args.push("--ignore-all-space".to_string());
            args.push("--ignore-blank-lines".to_string());
        }
        args
    }

    fn committed_range(&self) -> String {
        format!("{}{}HEAD", self.compare_branch, self.range_notation)
    }

    /// Committed changes not yet in the compare branch.
    pub fn diff_committed(&self) -> anyhow::Result<String> {
        let mut args = self.diff_args();
        args.push(self.committed_range());
        git(&args)
    }

    /// `git diff --cached`
    pub fn diff_staged(&self) -> anyhow::Result<String> {
        let mut args = self.diff_args();
        args.push("--cached".to_string());
        git(&args)
    }

    /// `git diff` against the index.
    pub fn diff_unstaged(&self) -> anyhow::Result<String> {
        git(&self.diff_args())
    }
}

impl DiffSource for GitDiffTool {
    fn name(&self) -> String {
        let mut layers = Vec::new();
        if !self.ignore_staged {
            layers.push("staged");
        }
        if !self.ignore_unstaged {
            layers.push("unstaged");
        }
        let mut name = self.committed_range();
        if !layers.is_empty() {
            name.push_str(&format!(", {} changes", layers.join(" and ")));
        }
        if self.include_untracked {
            name.push_str(", untracked files");
        }
        name
    }

    fn fetch_layers(&self) -> anyhow::Result<Vec<DiffLayer>> {
        let mut layers = vec![DiffLayer {
            kind: LayerKind::Committed,
            text: self.diff_committed()?,
        }];
        if !self.ignore_staged {
            layers.push(DiffLayer {
                kind: LayerKind::Staged,
                text: self.diff_staged()?,
            });
        }
        if !self.ignore_unstaged {
            layers.push(DiffLayer {
                kind: LayerKind::Unstaged,
                text: self.diff_unstaged()?,
            });
        }
        Ok(layers)
    }

    fn untracked_files(&self) -> anyhow::Result<Vec<String>> {
        if !self.include_untracked {
            return Ok(Vec::new());
        }
        let args: Vec<String> = ["ls-files", "--exclude-standard", "--others"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Ok(parse_file_list(&git(&args)?))
    }
}

/// One path per line, C-quoted by git when `core.quotePath` applies.
fn parse_file_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(unquote_git_path)
        .collect()
}

/// Top-level directory of the current repository.
pub fn repo_root() -> anyhow::Result<PathBuf> {
    let out = git(&["rev-parse".to_string(), "--show-toplevel".to_string()])?;
    Ok(PathBuf::from(out.trim()))
}

/// The repository root together with the working directory's position
/// inside it (`git rev-parse --show-prefix`).
pub fn workspace() -> anyhow::Result<Workspace> {
    let root = repo_root()?;
    let prefix = git(&["rev-parse".to_string(), "--show-prefix".to_string()])?;
    Ok(Workspace::new(root, prefix.trim()))
}

fn git(args: &[String]) -> anyhow::Result<String> {
    let output = execute("git", args, &[0]).context("git command failed")?;
    Ok(output.stdout)
}
