//! Output formatting for diff coverage and diff quality results.

use std::fmt::Write;

use serde_json::json;

use crate::stats::{DiffStats, SrcStats};

/// Shown instead of a zero score when nothing in the diff was measured.
pub const NO_DATA_MESSAGE: &str = "No lines with coverage information in this diff.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportKind {
    Coverage,
    /// Quality report for the named tool.
    Quality(String),
}

/// Everything a formatter needs.
pub struct DiffReport<'a> {
    pub kind: ReportKind,
    /// Coverage report files, or the quality tool name.
    pub report_name: String,
    /// Description of what the diff compares.
    pub diff_name: String,
    pub stats: &'a DiffStats,
    /// List missing or violating lines in text output.
    pub show_uncovered: bool,
}

impl DiffReport<'_> {
    #[must_use]
    pub fn format(&self, formatter: &dyn ReportFormatter) -> String {
        formatter.format(self)
    }

    fn title(&self) -> &'static str {
        match self.kind {
            ReportKind::Coverage => "Diff Coverage",
            ReportKind::Quality(_) => "Diff Quality",
        }
    }

    fn missing_label(&self) -> &'static str {
        match self.kind {
            ReportKind::Coverage => "Missing",
            ReportKind::Quality(_) => "Violations",
        }
    }
}

/// Trait for formatting diff reports.
pub trait ReportFormatter {
    fn format(&self, report: &DiffReport) -> String;
}

/// Look up a formatter by the name used on the command line.
pub fn formatter_for(name: &str) -> Option<&'static dyn ReportFormatter> {
    match name {
        "text" => Some(&TextFormatter),
        "markdown" | "md" => Some(&MarkdownFormatter),
        "json" => Some(&JsonFormatter),
        _ => None,
    }
}

const RULE: &str = "-------------";

/// Plain text formatter.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, report: &DiffReport) -> String {
        let mut out = String::new();
        writeln!(out, "{RULE}").unwrap();
        writeln!(out, "{}", report.title()).unwrap();
        if let ReportKind::Quality(tool) = &report.kind {
            writeln!(out, "Quality Report: {tool}").unwrap();
        }
        writeln!(out, "Diff: {}", report.diff_name).unwrap();
        writeln!(out, "{RULE}").unwrap();

        if report.stats.is_empty() {
            writeln!(out, "{NO_DATA_MESSAGE}").unwrap();
            writeln!(out, "{RULE}").unwrap();
            return out;
        }

        for (path, stats) in &report.stats.src_stats {
            write!(out, "{path} ({:.1}%)", stats.percent_covered).unwrap();
            if report.show_uncovered && !stats.violation_lines.is_empty() {
                match report.kind {
                    ReportKind::Coverage => {
                        write!(
                            out,
                            ": Missing lines {}",
                            format_line_ranges(&stats.violation_lines)
                        )
                        .unwrap();
                    }
                    ReportKind::Quality(_) => {
                        out.push(':');
                        for v in &stats.violations {
                            write!(
                                out,
                                "\n    {path}:{}: {}",
                                v.line,
                                v.message.as_deref().unwrap_or("")
                            )
                            .unwrap();
                        }
                    }
                }
            }
            out.push('\n');
        }

        let totals = &report.stats.totals;
        writeln!(out, "{RULE}").unwrap();
        writeln!(out, "Total:   {}", plural_lines(totals.total_num_lines)).unwrap();
        writeln!(
            out,
            "{}: {}",
            report.missing_label(),
            plural_lines(totals.total_num_violations)
        )
        .unwrap();
        let label = match report.kind {
            ReportKind::Coverage => "Coverage",
            ReportKind::Quality(_) => "Quality",
        };
        writeln!(out, "{label}: {:.1}%", totals.total_percent_covered).unwrap();
        writeln!(out, "{RULE}").unwrap();
        out
    }
}

/// Markdown formatter.
pub struct MarkdownFormatter;

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, report: &DiffReport) -> String {
        let mut md = String::new();
        writeln!(md, "# {}\n", report.title()).unwrap();
        if let ReportKind::Quality(tool) = &report.kind {
            writeln!(md, "## Quality Report: {tool}\n").unwrap();
        }
        writeln!(md, "## Diff: {}\n", report.diff_name).unwrap();

        if report.stats.is_empty() {
            writeln!(md, "{NO_DATA_MESSAGE}").unwrap();
            return md;
        }

        for (path, stats) in &report.stats.src_stats {
            write!(md, "- {path} ({:.1}%)", stats.percent_covered).unwrap();
            if !stats.violation_lines.is_empty() {
                match report.kind {
                    ReportKind::Coverage => {
                        write!(md, ": Missing lines {}", format_line_ranges(&stats.violation_lines))
                            .unwrap();
                    }
                    ReportKind::Quality(_) => {
                        md.push(':');
                        for v in &stats.violations {
                            write!(
                                md,
                                "\n    - {path}:{}: {}",
                                v.line,
                                v.message.as_deref().unwrap_or("")
                            )
                            .unwrap();
                        }
                    }
                }
            }
            md.push('\n');
        }

        let totals = &report.stats.totals;
        md.push('\n');
        writeln!(md, "## Summary\n").unwrap();
        writeln!(md, "- **Total**: {}", plural_lines(totals.total_num_lines)).unwrap();
        writeln!(
            md,
            "- **{}**: {}",
            report.missing_label(),
            plural_lines(totals.total_num_violations)
        )
        .unwrap();
        let label = match report.kind {
            ReportKind::Coverage => "Coverage",
            ReportKind::Quality(_) => "Quality",
        };
        writeln!(md, "- **{label}**: {:.1}%", totals.total_percent_covered).unwrap();
        md
    }
}

/// JSON formatter. Percentages are exact; violations are `[line, message]`
/// pairs.
pub struct JsonFormatter;

impl ReportFormatter for JsonFormatter {
    fn format(&self, report: &DiffReport) -> String {
        let src_stats: serde_json::Map<String, serde_json::Value> = report
            .stats
            .src_stats
            .iter()
            .map(|(path, stats)| (path.clone(), src_stats_json(stats)))
            .collect();
        let totals = &report.stats.totals;
        let value = json!({
            "report_name": report.report_name,
            "diff_name": report.diff_name,
            "src_stats": src_stats,
            "total_num_lines": totals.total_num_lines,
            "total_num_violations": totals.total_num_violations,
            "total_percent_covered": totals.total_percent_covered,
            "num_changed_lines": totals.num_changed_lines,
        });
        let mut out = serde_json::to_string_pretty(&value).unwrap_or_default();
        out.push('\n');
        out
    }
}

fn src_stats_json(stats: &SrcStats) -> serde_json::Value {
    let violations: Vec<serde_json::Value> = stats
        .violations
        .iter()
        .map(|v| json!([v.line, v.message]))
        .collect();
    json!({
        "percent_covered": stats.percent_covered,
        "violation_lines": stats.violation_lines,
        "covered_lines": stats.covered_lines,
        "violations": violations,
        "num_branches": stats.branches.total,
        "num_branches_covered": stats.branches.covered,
    })
}

fn plural_lines(n: usize) -> String {
    if n == 1 {
        "1 line".to_string()
    } else {
        format!("{n} lines")
    }
}

/// Coalesce sorted line numbers into `(start, end)` runs of consecutive
/// lines.
#[must_use]
pub fn coalesce_ranges(lines: &[u32]) -> Vec<(u32, u32)> {
    let mut ranges: Vec<(u32, u32)> = Vec::new();
    for &line in lines {
        match ranges.last_mut() {
            Some((_, end)) if end.checked_add(1) == Some(line) => *end = line,
            Some((_, end)) if *end == line => {}
            _ => ranges.push((line, line)),
        }
    }
    ranges
}

/// Format line numbers into compact range notation, e.g. "1-5, 8, 10".
///
/// The input slice must be sorted in ascending order.
#[must_use]
pub fn format_line_ranges(lines: &[u32]) -> String {
    coalesce_ranges(lines)
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
