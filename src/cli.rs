//! Command handlers for the diffcov CLI.
//!
//! Each `cmd_*` function returns a [`RunResult`] instead of printing, so the
//! whole pipeline can be tested without capturing stdout.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::config::Config;
use crate::diff::{combine_layers, parse_layers, ChangedLines, DiffSource};
use crate::filter::{filter_paths, PathFilter, StatusFacts, StatusFlags};
use crate::ingest::{load_coverage, IngestOptions};
use crate::paths::Workspace;
use crate::report::{formatter_for, DiffReport, ReportFormatter, ReportKind};
use crate::stats::{coverage_stats, quality_stats, DiffStats};
use crate::threshold::{evaluate, Outcome};
use crate::violations::{QualityReporter, ToolRegistry};

/// Outcome of one `cover` or `quality` run.
#[derive(Debug)]
pub struct RunResult {
    pub kind: ReportKind,
    pub report_name: String,
    pub diff_name: String,
    pub stats: DiffStats,
    pub outcome: Outcome,
}

impl RunResult {
    #[must_use]
    pub fn report(&self, show_uncovered: bool) -> DiffReport<'_> {
        DiffReport {
            kind: self.kind.clone(),
            report_name: self.report_name.clone(),
            diff_name: self.diff_name.clone(),
            stats: &self.stats,
            show_uncovered,
        }
    }

    #[must_use]
    pub fn render(&self, formatter: &dyn ReportFormatter, show_uncovered: bool) -> String {
        self.report(show_uncovered).format(formatter)
    }
}

/// Changed lines of the diff plus the paths that survive the filters.
pub fn changed_lines(
    config: &Config,
    source: &dyn DiffSource,
    workspace: Option<&Workspace>,
) -> Result<(ChangedLines, BTreeSet<String>)> {
    let filter = PathFilter::from_config(config)?;
    let layers = source.fetch_layers()?;
    let parsed = parse_layers(&layers)?;
    let mut changed = combine_layers(&parsed);

    let untracked = source.untracked_files()?;
    for path in &untracked {
        let full = workspace.map_or_else(|| PathBuf::from(path), |ws| ws.absolute(path));
        let bytes = std::fs::read(&full)
            .with_context(|| format!("Failed to read untracked file {}", full.display()))?;
        let line_count = String::from_utf8_lossy(&bytes).lines().count();
        changed.add_whole_file(path.clone(), u32::try_from(line_count).unwrap_or(u32::MAX));
    }

    let facts = StatusFacts::from_layers(&parsed, &untracked);
    let scope = filter_paths(
        changed.in_scope_paths(),
        &filter,
        StatusFlags::from_config(config),
        &facts,
    );
    info!(
        files = changed.len(),
        in_scope = scope.len(),
        lines = changed.num_changed_lines(),
        "parsed diff"
    );
    Ok((changed, scope))
}

/// Diff coverage: intersect the diff with one or more coverage reports.
pub fn cmd_cover(
    config: &Config,
    source: &dyn DiffSource,
    reports: &[PathBuf],
    workspace: Option<&Workspace>,
) -> Result<RunResult> {
    config.validate()?;
    let (changed, scope) = changed_lines(config, source, workspace)?;

    let coverage = load_coverage(
        reports,
        &IngestOptions {
            workspace: workspace.cloned(),
            src_roots: config.src_roots.clone(),
            expand_gaps: config.expand_coverage_report,
            strict: config.strict,
        },
    )?;
    debug!(files = coverage.len(), "merged coverage");

    let stats = coverage_stats(&changed, &coverage, &scope);
    let outcome = evaluate(stats.totals.total_percent_covered, config.fail_under);
    Ok(RunResult {
        kind: ReportKind::Coverage,
        report_name: reports
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
        diff_name: source.name(),
        stats,
        outcome,
    })
}

/// Diff quality: intersect the diff with a quality tool's violations, read
/// from `reports` or produced by running the tool.
pub fn cmd_quality(
    config: &Config,
    source: &dyn DiffSource,
    registry: &ToolRegistry,
    reports: &[PathBuf],
    workspace: Option<&Workspace>,
) -> Result<RunResult> {
    config.validate()?;
    let Some(tool) = config.violations.as_deref() else {
        bail!("a quality tool is required (--violations)");
    };
    let driver = registry.get(tool)?;

    let (changed, scope) = changed_lines(config, source, workspace)?;

    let mut reporter = QualityReporter::new(driver, config.options.as_deref())
        .with_workspace(workspace)
        .strict(config.strict);
    if !reports.is_empty() {
        reporter = reporter.load_reports(reports)?;
    }
    let scope: BTreeSet<String> = scope.into_iter().filter(|p| reporter.supports(p)).collect();
    let paths: Vec<String> = scope.iter().cloned().collect();
    let violations = reporter.collect(&paths)?;

    let stats = quality_stats(&changed, &violations, &scope);
    let outcome = evaluate(stats.totals.total_percent_covered, config.fail_under);
    Ok(RunResult {
        kind: ReportKind::Quality(tool.to_string()),
        report_name: tool.to_string(),
        diff_name: source.name(),
        stats,
        outcome,
    })
}

/// Where a rendered report goes: `None` is stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    pub format: String,
    pub path: Option<PathBuf>,
}

/// Parse `json:out.json,markdown:report.md,text`.
pub fn parse_formats(spec: &str) -> Result<Vec<OutputSpec>> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|item| {
            let (format, path) = match item.split_once(':') {
                Some((f, p)) if !p.is_empty() => (f, Some(PathBuf::from(p))),
                Some((f, _)) => (f, None),
                None => (item, None),
            };
            if formatter_for(format).is_none() {
                bail!("unknown report format '{format}' (expected text, markdown or json)");
            }
            Ok(OutputSpec {
                format: format.to_string(),
                path,
            })
        })
        .collect()
}

/// Render `result` once per output; returns what goes to stdout.
pub fn write_outputs(
    result: &RunResult,
    outputs: &[OutputSpec],
    show_uncovered: bool,
) -> Result<String> {
    let mut stdout = String::new();
    for output in outputs {
        let Some(formatter) = formatter_for(&output.format) else {
            bail!("unknown report format '{}'", output.format);
        };
        let rendered = result.render(formatter, show_uncovered);
        match &output.path {
            Some(path) => {
                std::fs::write(path, rendered)
                    .with_context(|| format!("Failed to write report {}", path.display()))?;
                info!(path = %path.display(), format = %output.format, "wrote report");
            }
            None => stdout.push_str(&rendered),
        }
    }
    Ok(stdout)
}
