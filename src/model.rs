//! Uniform in-memory representation of coverage data, independent of any
//! specific format. Parsers produce a `CoverageData`; `ingest` folds one or
//! more of those into a `MergedCoverage` keyed by repository path.
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::paths;

/// Percentage of `passing` over `total`, 100.0 when there is nothing to count.
#[must_use]
pub fn percent(passing: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        100.0 * passing as f64 / total as f64
    }
}

/// A single line that was instrumentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCoverage {
    pub line_number: u32,
    pub hit_count: u64,
}

/// A single branch arm on a given line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchCoverage {
    pub line_number: u32,
    pub branch_index: u32,
    pub hit_count: u64,
}

/// Coverage data for a single source file, as an adapter read it.
#[derive(Debug, Clone, Default)]
pub struct FileCoverage {
    pub path: String,
    pub lines: Vec<LineCoverage>,
    pub branches: Vec<BranchCoverage>,
}

impl FileCoverage {
    pub fn new(path: String) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    /// Fill gaps between consecutive measured lines with the hit count of
    /// the line before the gap. Some generators only list the first line of
    /// a multi-line statement.
    pub fn expand_gaps(&mut self) {
        self.lines.sort_by_key(|l| l.line_number);
        let mut expanded: Vec<LineCoverage> = Vec::with_capacity(self.lines.len());
        for line in self.lines.drain(..) {
            if let Some(prev) = expanded.last() {
                let (prev_number, prev_hits) = (prev.line_number, prev.hit_count);
                for gap in prev_number.saturating_add(1)..line.line_number {
                    expanded.push(LineCoverage {
                        line_number: gap,
                        hit_count: prev_hits,
                    });
                }
            }
            expanded.push(line);
        }
        self.lines = expanded;
    }

    /// Collapse the raw line/branch entries into measured/covered sets.
    #[must_use]
    pub fn to_record(&self) -> LineCoverageRecord {
        let mut record = LineCoverageRecord::default();
        for line in &self.lines {
            record.measured.insert(line.line_number);
            if line.hit_count > 0 {
                record.covered.insert(line.line_number);
            }
        }
        for branch in &self.branches {
            let stats = record.branches.entry(branch.line_number).or_default();
            stats.total += 1;
            if branch.hit_count > 0 {
                stats.covered += 1;
            }
        }
        record
    }
}

/// The complete result of parsing a single coverage file.
#[derive(Debug, Clone, Default)]
pub struct CoverageData {
    pub files: Vec<FileCoverage>,
}

impl CoverageData {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Arms seen and arms taken at one branch point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BranchStats {
    pub total: u32,
    pub covered: u32,
}

/// Per-file line coverage. Invariant: `covered ⊆ measured`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineCoverageRecord {
    pub measured: BTreeSet<u32>,
    pub covered: BTreeSet<u32>,
    pub branches: BTreeMap<u32, BranchStats>,
}

impl LineCoverageRecord {
    /// Union another report's view of the same file into this one.
    ///
    /// A line counts as covered when any report executed it.
    pub fn merge(&mut self, other: &LineCoverageRecord) {
        self.measured.extend(other.measured.iter().copied());
        self.covered.extend(other.covered.iter().copied());
        self.covered.retain(|line| self.measured.contains(line));
        for (line, theirs) in &other.branches {
            let ours = self.branches.entry(*line).or_default();
            ours.total = ours.total.max(theirs.total);
            ours.covered = ours.covered.max(theirs.covered).min(ours.total);
        }
    }

    pub fn is_covered(&self, line: u32) -> bool {
        self.covered.contains(&line)
    }

    pub fn is_measured(&self, line: u32) -> bool {
        self.measured.contains(&line)
    }
}

/// Coverage for every file mentioned by at least one input report.
#[derive(Debug, Clone, Default)]
pub struct MergedCoverage {
    files: BTreeMap<String, LineCoverageRecord>,
    src_roots: Vec<String>,
}

impl MergedCoverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source roots let a report that records `pkg/File.java` answer for the
    /// diff path `src/main/java/pkg/File.java`.
    #[must_use]
    pub fn with_src_roots(mut self, roots: &[String]) -> Self {
        self.src_roots = roots.iter().map(|r| paths::to_unix_path(r)).collect();
        self
    }

    pub fn add(&mut self, path: String, record: &LineCoverageRecord) {
        self.files.entry(path).or_default().merge(record);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Coverage for a diff path, or `None` when no report mentions it.
    ///
    /// Matches under the exact path and under every source-root-relative
    /// form of it are merged.
    pub fn lookup(&self, diff_path: &str) -> Option<Cow<'_, LineCoverageRecord>> {
        let mut matches = Vec::new();
        if let Some(record) = self.files.get(diff_path) {
            matches.push(record);
        }
        for root in &self.src_roots {
            if let Some(rel) = paths::strip_dir_prefix(diff_path, root) {
                if rel == diff_path {
                    continue;
                }
                if let Some(record) = self.files.get(&rel) {
                    matches.push(record);
                }
            }
        }

        match matches.as_slice() {
            [] => None,
            [only] => Some(Cow::Borrowed(*only)),
            [first, rest @ ..] => {
                let mut merged = (*first).clone();
                for record in rest {
                    merged.merge(record);
                }
                Some(Cow::Owned(merged))
            }
        }
    }
}
