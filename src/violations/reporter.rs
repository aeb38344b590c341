use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::{merge_maps, QualityDriver, ViolationMap};
use crate::command::execute;
use crate::error::{DiffCovError, Result};
use crate::paths::{PathNormalizer, Workspace};

/// Collects violations for a set of source files from one quality tool,
/// either out of pre-generated reports or by running the tool.
pub struct QualityReporter {
    driver: Arc<dyn QualityDriver>,
    /// `(name, content)` of each input report.
    reports: Vec<(String, String)>,
    options: Vec<String>,
    normalizer: PathNormalizer,
    workspace: Option<Workspace>,
    strict: bool,
}

impl QualityReporter {
    /// `options` is split on whitespace and passed to the tool before the
    /// source path.
    pub fn new(driver: Arc<dyn QualityDriver>, options: Option<&str>) -> Self {
        Self {
            driver,
            reports: Vec::new(),
            options: options
                .map(|o| o.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            normalizer: PathNormalizer::default(),
            workspace: None,
            strict: false,
        }
    }

    /// Use report texts instead of running the tool.
    #[must_use]
    pub fn with_reports(mut self, reports: Vec<(String, String)>) -> Self {
        self.reports = reports;
        self
    }

    /// Read report files. Invalid UTF-8 is replaced rather than rejected,
    /// since only the lines the grammar matches matter.
    pub fn load_reports(self, paths: &[PathBuf]) -> Result<Self> {
        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            let name = path.display().to_string();
            let bytes = std::fs::read(path).map_err(|e| DiffCovError::ReportParse {
                path: name.clone(),
                message: e.to_string(),
            })?;
            reports.push((name, String::from_utf8_lossy(&bytes).into_owned()));
        }
        Ok(self.with_reports(reports))
    }

    /// Source files are located under the workspace root, and reported
    /// paths are mapped back to repository paths.
    #[must_use]
    pub fn with_workspace(mut self, workspace: Option<&Workspace>) -> Self {
        self.normalizer = PathNormalizer::for_workspace(workspace);
        self.workspace = workspace.cloned();
        self
    }

    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Whether the tool checks files like `path`.
    pub fn supports(&self, path: &str) -> bool {
        let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.driver
            .supported_extensions()
            .iter()
            .any(|s| s.eq_ignore_ascii_case(ext))
    }

    /// Violations for `paths`, keyed by repository path. Paths the tool
    /// does not support are left out.
    pub fn collect(&self, paths: &[String]) -> Result<ViolationMap> {
        let wanted: Vec<&String> = paths.iter().filter(|p| self.supports(p)).collect();
        if wanted.is_empty() {
            return Ok(ViolationMap::new());
        }
        let found = if self.reports.is_empty() {
            self.run_tool(&wanted)?
        } else {
            self.parse_reports()?
        };
        Ok(found
            .into_iter()
            .filter(|(path, _)| wanted.iter().any(|w| *w == path))
            .collect())
    }

    fn normalized(&self, map: ViolationMap) -> ViolationMap {
        let mut out = ViolationMap::new();
        for (path, record) in map {
            let mut single = ViolationMap::new();
            single.insert(self.normalizer.normalize(&path), record);
            merge_maps(&mut out, single);
        }
        out
    }

    /// Each report is parsed on its own so that one bad report can be
    /// skipped outside strict mode.
    fn parse_reports(&self) -> Result<ViolationMap> {
        let mut merged = ViolationMap::new();
        let mut first_error: Option<DiffCovError> = None;
        let mut loaded = 0usize;
        for (name, content) in &self.reports {
            match self
                .driver
                .parse_reports(std::slice::from_ref(content))
                .map_err(|e| e.in_report(name))
            {
                Ok(map) => {
                    info!(report = %name, tool = self.driver.name(), files = map.len(), "loaded quality report");
                    loaded += 1;
                    merge_maps(&mut merged, self.normalized(map));
                }
                Err(e) if self.strict => return Err(e),
                Err(e) => {
                    warn!(report = %name, error = %e, "skipping quality report");
                    first_error.get_or_insert(e);
                }
            }
        }
        match (loaded, first_error) {
            (0, Some(e)) => Err(e),
            _ => Ok(merged),
        }
    }

    /// Run the tool once per existing file, in parallel, and merge the
    /// results in path order.
    fn run_tool(&self, paths: &[&String]) -> Result<ViolationMap> {
        let name = self.driver.name().to_string();
        if !self.driver.installed() {
            return Err(DiffCovError::ToolNotInstalled(name));
        }
        let command = self.driver.command();
        let Some((program, fixed)) = command.split_first() else {
            return Err(DiffCovError::ToolNotInstalled(name));
        };

        let results: Vec<Result<ViolationMap>> = paths
            .par_iter()
            .filter_map(|p| {
                let on_disk = match &self.workspace {
                    Some(ws) => ws.absolute(p),
                    None => PathBuf::from(p.as_str()),
                };
                if on_disk.exists() {
                    Some(on_disk)
                } else {
                    debug!(path = %p, "not on disk, skipping");
                    None
                }
            })
            .map(|path| {
                let mut args: Vec<String> = fixed.to_vec();
                args.extend(self.options.iter().cloned());
                args.push(path.to_string_lossy().into_owned());
                let output = execute(program, &args, self.driver.exit_codes())?;
                let text = if self.driver.output_stderr() {
                    output.stderr
                } else {
                    output.stdout
                };
                self.driver.parse_reports(&[text])
            })
            .collect();

        let mut merged = ViolationMap::new();
        for result in results {
            merge_maps(&mut merged, self.normalized(result?));
        }
        info!(tool = %name, files = paths.len(), "ran quality tool");
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violations::regex_driver;
    use crate::violations::{Violation, ViolationRecord};

    fn reporter() -> QualityReporter {
        QualityReporter::new(Arc::new(regex_driver::pycodestyle()), None)
    }

    #[test]
    fn test_supports_by_extension() {
        let r = reporter();
        assert!(r.supports("src/a.py"));
        assert!(r.supports("src/A.PY"));
        assert!(!r.supports("src/a.js"));
        assert!(!r.supports("Makefile"));
    }

    #[test]
    fn test_collect_from_reports_merges_and_filters() {
        let r = reporter().with_reports(vec![
            (
                "one.txt".to_string(),
                "a.py:1:1: E231 missing whitespace\nb.py:2:1: E302 blank lines\n".to_string(),
            ),
            (
                "two.txt".to_string(),
                "a.py:1:1: E231 missing whitespace\na.py:4:1: W291 trailing\n".to_string(),
            ),
        ]);
        let map = r
            .collect(&["a.py".to_string(), "c.js".to_string()])
            .unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["a.py"]);
        let expected: ViolationRecord = [
            Violation::new(1, "E231 missing whitespace"),
            Violation::new(4, "W291 trailing"),
        ]
        .into_iter()
        .collect();
        assert_eq!(map["a.py"], expected);
    }

    #[test]
    fn test_collect_normalizes_report_paths() {
        let r = reporter()
            .with_workspace(Some(&Workspace::new("/repo", "")))
            .with_reports(vec![(
                "r.txt".to_string(),
                "/repo/src/a.py:3:1: E501 line too long\n".to_string(),
            )]);
        let map = r.collect(&["src/a.py".to_string()]).unwrap();
        assert_eq!(map["src/a.py"].lines(), [3].into_iter().collect());
    }

    #[test]
    fn test_no_supported_paths_skips_tool() {
        // Not installed, but never asked to run.
        let r = QualityReporter::new(Arc::new(crate::violations::xml::PmdDriver), None);
        assert!(r.collect(&["a.py".to_string()]).unwrap().is_empty());
    }

    #[test]
    fn test_live_mode_requires_installed_tool() {
        let r = QualityReporter::new(Arc::new(crate::violations::xml::PmdDriver), None);
        let err = r.collect(&["Foo.java".to_string()]).unwrap_err();
        assert!(matches!(err, DiffCovError::ToolNotInstalled(name) if name == "pmd"));
    }

    #[test]
    fn test_bad_report_skipped_unless_strict() {
        let driver = Arc::new(crate::violations::xml::CheckstyleXmlDriver);
        let reports = vec![
            ("bad.xml".to_string(), "<checkstyle><file name=\"a\"></checkstyle>".to_string()),
            (
                "good.xml".to_string(),
                r#"<checkstyle><file name="A.java"><error line="2" severity="error" message="m"/></file></checkstyle>"#
                    .to_string(),
            ),
        ];
        let lenient = QualityReporter::new(driver.clone(), None).with_reports(reports.clone());
        assert_eq!(lenient.collect(&["A.java".to_string()]).unwrap()["A.java"].len(), 1);

        let strict = QualityReporter::new(driver, None)
            .with_reports(reports)
            .strict(true);
        let err = strict.collect(&["A.java".to_string()]).unwrap_err();
        assert!(err.to_string().contains("bad.xml"), "{err}");
    }

    /// Runs a shell script in place of a linter; the script sees the
    /// options first and the source path last.
    struct ShellLint {
        script: &'static str,
        stderr: bool,
    }

    impl QualityDriver for ShellLint {
        fn name(&self) -> &str {
            "shell-lint"
        }

        fn supported_extensions(&self) -> &[&str] {
            &["py"]
        }

        fn command(&self) -> Vec<String> {
            ["sh", "-c", self.script, "shell-lint"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        }

        fn exit_codes(&self) -> &[i32] {
            &[0, 1]
        }

        fn output_stderr(&self) -> bool {
            self.stderr
        }

        fn parse_reports(&self, reports: &[String]) -> Result<ViolationMap> {
            regex_driver::pycodestyle().parse_reports(reports)
        }

        fn installed(&self) -> bool {
            true
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_live_run_reads_stdout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/a.py"), "x = 1\n").unwrap();
        // Started from `sub/`; diff paths stay repository-relative.
        let ws = Workspace::new(dir.path(), "sub");

        let driver = ShellLint {
            script: r#"echo "$2:3:1: E501 line too long ($1)"; exit 1"#,
            stderr: false,
        };
        let r = QualityReporter::new(Arc::new(driver), Some("--max=80")).with_workspace(Some(&ws));
        let map = r
            .collect(&["sub/a.py".to_string(), "sub/missing.py".to_string()])
            .unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["sub/a.py"]);
        let expected: ViolationRecord = [Violation::new(3, "E501 line too long (--max=80)")]
            .into_iter()
            .collect();
        assert_eq!(map["sub/a.py"], expected);
    }

    #[cfg(unix)]
    #[test]
    fn test_live_run_reads_stderr() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.py"), "y = 2\n").unwrap();
        let ws = Workspace::new(dir.path(), "");

        let driver = ShellLint {
            script: r#"echo "$1:7:1: W291 trailing whitespace" >&2; echo "$1:9:1: E999 ignored""#,
            stderr: true,
        };
        let r = QualityReporter::new(Arc::new(driver), None).with_workspace(Some(&ws));
        let map = r.collect(&["b.py".to_string()]).unwrap();
        assert_eq!(map["b.py"].lines(), [7].into_iter().collect());
    }

    #[cfg(unix)]
    #[test]
    fn test_live_run_rejects_unexpected_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("c.py"), "").unwrap();
        let ws = Workspace::new(dir.path(), "");
        let driver = ShellLint {
            script: "echo boom >&2; exit 3",
            stderr: false,
        };
        let r = QualityReporter::new(Arc::new(driver), None).with_workspace(Some(&ws));
        let err = r.collect(&["c.py".to_string()]).unwrap_err();
        assert!(matches!(err, DiffCovError::Command { .. }), "{err}");
    }

    #[test]
    fn test_options_split_on_whitespace() {
        let r = QualityReporter::new(Arc::new(regex_driver::flake8()), Some("--max-line-length=100  --select E"));
        assert_eq!(r.options, vec!["--max-line-length=100", "--select", "E"]);
    }
}
