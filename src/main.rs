use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use diffcov::cli::{self, OutputSpec, RunResult};
use diffcov::config::Config;
use diffcov::diff::{DiffFile, DiffSource, StdinDiff};
use diffcov::error::ExitCode;
use diffcov::git::{self, GitDiffTool};
use diffcov::paths::Workspace;
use diffcov::violations::ToolRegistry;

/// Coverage and lint results restricted to the lines a diff changes.
#[derive(Parser)]
#[command(name = "diffcov", version, about)]
struct Cli {
    /// TOML configuration file (top-level keys or a [tool.diffcov] table).
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    /// More log output (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print errors; no report on stdout.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Coverage of the changed lines, from one or more coverage reports.
    Cover {
        /// Cobertura, Clover, JaCoCo or LCOV reports (format is detected).
        #[arg(required = true)]
        reports: Vec<PathBuf>,

        /// Directories that report paths may be relative to.
        #[arg(long = "src-roots", num_args = 1..)]
        src_roots: Vec<String>,

        /// Fill gaps between measured lines with the preceding line's status.
        #[arg(long)]
        expand_coverage_report: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Lint violations on the changed lines, from reports or a live run.
    Quality {
        /// Quality tool (pycodestyle, pylint, eslint, checkstylexml, ...).
        #[arg(long)]
        violations: String,

        /// Pre-generated reports; when omitted the tool is run on each file.
        reports: Vec<PathBuf>,

        /// Extra options passed to the tool.
        #[arg(long, allow_hyphen_values = true)]
        options: Option<String>,

        /// Prefix stripped from paths in eslint reports.
        #[arg(long)]
        report_root_path: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Branch to compare against.
    #[arg(long)]
    compare_branch: Option<String>,

    /// `...` (from the merge base) or `..`.
    #[arg(long)]
    diff_range_notation: Option<String>,

    /// Read the diff from a file (`-` for stdin) instead of running git.
    #[arg(long)]
    diff_file: Option<PathBuf>,

    /// Exit with status 1 when the total is below this percentage.
    #[arg(long)]
    fail_under: Option<f64>,

    /// Only consider paths matching these globs.
    #[arg(long, num_args = 1..)]
    include: Vec<String>,

    /// Skip paths matching these globs.
    #[arg(long, num_args = 1..)]
    exclude: Vec<String>,

    #[arg(long)]
    ignore_staged: bool,

    #[arg(long)]
    ignore_unstaged: bool,

    /// Count every line of untracked files as changed.
    #[arg(long)]
    include_untracked: bool,

    #[arg(long)]
    ignore_whitespace: bool,

    /// Fail on any unreadable report instead of skipping it.
    #[arg(long)]
    strict: bool,

    /// List missing or violating lines.
    #[arg(long)]
    show_uncovered: bool,

    /// Outputs, e.g. `json:report.json,markdown:report.md` (default: text).
    #[arg(long)]
    format: Option<String>,
}

impl CommonArgs {
    /// Command-line values win over the configuration file.
    fn apply(&self, config: &mut Config) {
        if let Some(branch) = &self.compare_branch {
            config.compare_branch = branch.clone();
        }
        if let Some(notation) = &self.diff_range_notation {
            config.diff_range_notation = notation.clone();
        }
        if let Some(path) = &self.diff_file {
            config.diff_file = Some(path.clone());
        }
        if let Some(fail_under) = self.fail_under {
            config.fail_under = fail_under;
        }
        if !self.include.is_empty() {
            config.include = self.include.clone();
        }
        if !self.exclude.is_empty() {
            config.exclude = self.exclude.clone();
        }
        config.ignore_staged |= self.ignore_staged;
        config.ignore_unstaged |= self.ignore_unstaged;
        config.include_untracked |= self.include_untracked;
        config.ignore_whitespace |= self.ignore_whitespace;
        config.strict |= self.strict;
        config.show_uncovered |= self.show_uncovered;
    }
}

fn init_logging(quiet: bool, verbose: u8) {
    let filter = match (quiet, verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("diffcov: {e:#}");
            ExitCode::Error
        }
    };

    std::process::exit(exit_code as i32);
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = match &cli.config_file {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.quiet |= cli.quiet;

    let (result, format) = match cli.command {
        Commands::Cover {
            reports,
            src_roots,
            expand_coverage_report,
            common,
        } => {
            common.apply(&mut config);
            if !src_roots.is_empty() {
                config.src_roots = src_roots;
            }
            config.expand_coverage_report |= expand_coverage_report;
            config.validate()?;
            let workspace = workspace(&config);
            let source = diff_source(&config);
            (
                cli::cmd_cover(&config, source.as_ref(), &reports, workspace.as_ref())?,
                common.format,
            )
        }
        Commands::Quality {
            violations,
            reports,
            options,
            report_root_path,
            common,
        } => {
            common.apply(&mut config);
            config.violations = Some(violations);
            if options.is_some() {
                config.options = options;
            }
            if report_root_path.is_some() {
                config.report_root_path = report_root_path;
            }
            config.validate()?;
            let workspace = workspace(&config);
            let source = diff_source(&config);
            let registry = ToolRegistry::builtin(&config);
            (
                cli::cmd_quality(&config, source.as_ref(), &registry, &reports, workspace.as_ref())?,
                common.format,
            )
        }
    };

    emit(&result, format.as_deref(), &config)?;
    Ok(ExitCode::from(result.outcome))
}

fn emit(result: &RunResult, format: Option<&str>, config: &Config) -> Result<()> {
    let outputs = match format {
        Some(spec) => cli::parse_formats(spec)?,
        None => vec![OutputSpec {
            format: "text".to_string(),
            path: None,
        }],
    };
    let stdout = cli::write_outputs(result, &outputs, config.show_uncovered)?;
    if !config.quiet {
        print!("{stdout}");
    }
    Ok(())
}

fn diff_source(config: &Config) -> Box<dyn DiffSource> {
    match &config.diff_file {
        Some(path) if path.as_os_str() == "-" => Box::new(StdinDiff),
        Some(path) => Box::new(DiffFile { path: path.clone() }),
        None => Box::new(GitDiffTool::from_config(config)),
    }
}

/// With a diff file there may be no repository at all.
fn workspace(config: &Config) -> Option<Workspace> {
    match git::workspace() {
        Ok(ws) => Some(ws),
        Err(e) if config.diff_file.is_some() => {
            tracing::debug!(error = %e, "not in a git repository");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not determine repository root");
            None
        }
    }
}
