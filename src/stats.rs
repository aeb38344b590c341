//! Intersect changed lines with coverage or violation data.
//!
//! Every file is computed independently, so the work fans out over rayon;
//! results land in a `BTreeMap`, which keeps the output independent of
//! completion order.
use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::diff::ChangedLines;
use crate::model::{percent, BranchStats, MergedCoverage};
use crate::violations::{Violation, ViolationMap};

/// Statistics for one file of the diff.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SrcStats {
    pub percent_covered: f64,
    /// Changed lines that were measured (coverage) or checked (quality).
    pub total_num_lines: usize,
    /// Changed lines that were measured and executed. Empty in quality mode.
    pub covered_lines: Vec<u32>,
    /// Changed lines not covered, or carrying at least one violation.
    pub violation_lines: Vec<u32>,
    /// Findings on changed lines, in line order. Empty in coverage mode.
    pub violations: Vec<Violation>,
    /// Branch arms on changed lines, summed. Zero when the reports carry no
    /// branch data, and in quality mode.
    pub branches: BranchStats,
}

impl SrcStats {
    fn new(total_num_lines: usize, covered_lines: Vec<u32>, violation_lines: Vec<u32>) -> Self {
        Self {
            percent_covered: percent(total_num_lines - violation_lines.len(), total_num_lines),
            total_num_lines,
            covered_lines,
            violation_lines,
            violations: Vec::new(),
            branches: BranchStats::default(),
        }
    }
}

/// Aggregates over every file in [`DiffStats::src_stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Totals {
    pub total_num_lines: usize,
    pub total_num_violations: usize,
    /// Computed from the sums, not by averaging files.
    pub total_percent_covered: f64,
    /// Added lines across all in-scope files of the diff, measured or not.
    pub num_changed_lines: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffStats {
    pub src_stats: BTreeMap<String, SrcStats>,
    pub totals: Totals,
}

impl DiffStats {
    fn from_files(src_stats: BTreeMap<String, SrcStats>, num_changed_lines: usize) -> Self {
        let total_num_lines: usize = src_stats.values().map(|s| s.total_num_lines).sum();
        let total_num_violations: usize = src_stats.values().map(|s| s.violation_lines.len()).sum();
        let totals = Totals {
            total_num_lines,
            total_num_violations,
            total_percent_covered: percent(total_num_lines - total_num_violations, total_num_lines),
            num_changed_lines,
        };
        Self { src_stats, totals }
    }

    /// Nothing in the diff overlaps anything measured or checked.
    pub fn is_empty(&self) -> bool {
        self.src_stats.is_empty()
    }
}

/// Coverage mode: a changed line counts when some report measured it, and
/// is missing when no report executed it. Files without such lines are
/// left out.
pub fn coverage_stats(
    changed: &ChangedLines,
    coverage: &MergedCoverage,
    scope: &BTreeSet<String>,
) -> DiffStats {
    let src_stats: BTreeMap<String, SrcStats> = scope
        .par_iter()
        .filter_map(|path| {
            let lines = changed.lines(path)?;
            let Some(record) = coverage.lookup(path) else {
                debug!(path = %path, "no coverage data");
                return None;
            };
            let relevant: Vec<u32> = lines
                .iter()
                .copied()
                .filter(|l| record.is_measured(*l))
                .collect();
            if relevant.is_empty() {
                debug!(path = %path, "no measured changed lines");
                return None;
            }
            let (covered, missing): (Vec<u32>, Vec<u32>) =
                relevant.iter().partition(|l| record.is_covered(**l));
            let mut stats = SrcStats::new(relevant.len(), covered, missing);
            stats.branches = relevant
                .iter()
                .filter_map(|l| record.branches.get(l))
                .fold(BranchStats::default(), |acc, b| BranchStats {
                    total: acc.total.saturating_add(b.total),
                    covered: acc.covered.saturating_add(b.covered),
                });
            Some((path.clone(), stats))
        })
        .collect();
    DiffStats::from_files(src_stats, num_changed_in(changed, scope))
}

/// Quality mode: every changed line is checked; a line with any number of
/// violations counts once.
pub fn quality_stats(
    changed: &ChangedLines,
    violations: &ViolationMap,
    scope: &BTreeSet<String>,
) -> DiffStats {
    let src_stats: BTreeMap<String, SrcStats> = scope
        .par_iter()
        .filter_map(|path| {
            let lines = changed.lines(path)?;
            if lines.is_empty() {
                return None;
            }
            let found: Vec<Violation> = violations
                .get(path)
                .map(|record| {
                    record
                        .iter()
                        .filter(|v| lines.contains(&v.line))
                        .collect()
                })
                .unwrap_or_default();
            let violation_lines: Vec<u32> = found
                .iter()
                .map(|v| v.line)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let mut stats = SrcStats::new(lines.len(), Vec::new(), violation_lines);
            stats.violations = found;
            Some((path.clone(), stats))
        })
        .collect();
    DiffStats::from_files(src_stats, num_changed_in(changed, scope))
}

fn num_changed_in(changed: &ChangedLines, scope: &BTreeSet<String>) -> usize {
    scope
        .iter()
        .filter_map(|p| changed.lines(p))
        .map(BTreeSet::len)
        .sum()
}
