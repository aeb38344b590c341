use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::detect::{detect_format, Format};
use crate::error::{DiffCovError, Result};
use crate::model::{CoverageData, MergedCoverage};
use crate::parsers::parser_for;
use crate::paths::{PathNormalizer, Workspace};

/// How coverage reports are folded into one `MergedCoverage`.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Absolute report paths under the root become relative to it; relative
    /// ones are read from the working directory.
    pub workspace: Option<Workspace>,
    pub src_roots: Vec<String>,
    /// Fill gaps between measured lines (see `FileCoverage::expand_gaps`).
    pub expand_gaps: bool,
    /// Fail on the first unreadable report instead of skipping it.
    pub strict: bool,
}

/// Read a coverage file, detect its schema from the content and parse it.
///
/// A report that parses but mentions no source file is an error: it almost
/// always means the wrong file was passed.
pub fn read_report(path: &Path) -> Result<(Format, CoverageData)> {
    let name = path.display().to_string();
    let content = std::fs::read(path).map_err(|e| DiffCovError::ReportParse {
        path: name.clone(),
        message: e.to_string(),
    })?;

    let format = detect_format(&content)
        .ok_or(DiffCovError::UnknownFormat)
        .map_err(|e| e.in_report(&name))?;
    let data = parser_for(format)
        .parse(&content)
        .map_err(|e| e.in_report(&name))?;

    if data.files.is_empty() {
        return Err(DiffCovError::ReportParse {
            path: name,
            message: format!("no source files found in {format} report"),
        });
    }
    Ok((format, data))
}

/// Parse every report and merge them: per path, measured and covered lines
/// are unioned.
///
/// Reports are parsed in parallel; merging happens in argument order so the
/// result does not depend on which parse finishes first. Outside strict mode
/// a bad report is logged and skipped as long as another one parses.
pub fn load_coverage(reports: &[PathBuf], opts: &IngestOptions) -> Result<MergedCoverage> {
    if reports.is_empty() {
        return Err(DiffCovError::Config(
            "at least one coverage report is required".to_string(),
        ));
    }

    let parsed: Vec<(&PathBuf, Result<(Format, CoverageData)>)> = reports
        .par_iter()
        .map(|path| (path, read_report(path)))
        .collect();

    let normalizer = PathNormalizer::for_workspace(opts.workspace.as_ref());
    let mut merged = MergedCoverage::new().with_src_roots(&opts.src_roots);
    let mut first_error: Option<DiffCovError> = None;
    let mut loaded = 0usize;

    for (path, result) in parsed {
        match result {
            Ok((format, data)) => {
                info!(
                    report = %path.display(),
                    %format,
                    files = data.files.len(),
                    "loaded coverage report"
                );
                loaded += 1;
                for mut file in data.files {
                    if opts.expand_gaps {
                        file.expand_gaps();
                    }
                    let key = normalizer.normalize(&file.path);
                    debug!(raw = %file.path, path = %key, "coverage entry");
                    merged.add(key, &file.to_record());
                }
            }
            Err(e) if opts.strict => return Err(e),
            Err(e) => {
                warn!(report = %path.display(), error = %e, "skipping coverage report");
                first_error.get_or_insert(e);
            }
        }
    }

    match (loaded, first_error) {
        (0, Some(e)) => Err(e),
        _ => Ok(merged),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_report_detects_by_content() {
        let dir = tempfile::tempdir().unwrap();
        // Extension says XML, content says LCOV.
        let path = write(dir.path(), "coverage.xml", "SF:a.py\nDA:1,1\nend_of_record\n");
        let (format, data) = read_report(&path).unwrap();
        assert_eq!(format, Format::Lcov);
        assert_eq!(data.files.len(), 1);
    }

    #[test]
    fn test_read_report_unknown_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "junk.txt", "hello");
        let err = read_report(&path).unwrap_err();
        assert!(err.to_string().contains("junk.txt"), "{err}");
    }

    #[test]
    fn test_read_report_zero_files_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "empty.xml", "<coverage><packages/></coverage>");
        assert!(matches!(
            read_report(&path),
            Err(DiffCovError::ReportParse { .. })
        ));
    }

    #[test]
    fn test_load_coverage_lenient_skips_bad_report() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(dir.path(), "lcov.info", "SF:a.py\nDA:1,1\nDA:2,0\nend_of_record\n");
        let bad = write(dir.path(), "bad.xml", "<coverage><oops></coverage>");

        let merged = load_coverage(&[bad.clone(), good.clone()], &IngestOptions::default()).unwrap();
        assert_eq!(merged.len(), 1);

        let strict = IngestOptions {
            strict: true,
            ..Default::default()
        };
        assert!(load_coverage(&[good, bad], &strict).is_err());
    }

    #[test]
    fn test_load_coverage_all_bad_fails() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write(dir.path(), "bad.txt", "nope");
        assert!(load_coverage(&[bad], &IngestOptions::default()).is_err());
        assert!(load_coverage(&[], &IngestOptions::default()).is_err());
    }

    #[test]
    fn test_load_coverage_strips_root() {
        let dir = tempfile::tempdir().unwrap();
        let report = write(
            dir.path(),
            "lcov.info",
            "SF:/repo/src/a.py\nDA:1,1\nend_of_record\n",
        );
        let opts = IngestOptions {
            workspace: Some(Workspace::new("/repo", "")),
            ..Default::default()
        };
        let merged = load_coverage(&[report], &opts).unwrap();
        assert_eq!(merged.paths().collect::<Vec<_>>(), vec!["src/a.py"]);
    }
}
