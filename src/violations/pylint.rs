/// Driver for pylint.
///
/// Output is requested with a fixed message template:
///
///   path/to/file.py:123: [C0111(missing-docstring), Foo.bar] Missing docstring
///
/// The duplicate-code check (R0801) is the one multi-line message: it is
/// followed by one `==module.path:[line:...]` line per file involved, and
/// every listed file gets the violation.
use std::sync::LazyLock;

use regex::Regex;

use super::{QualityDriver, Violation, ViolationMap};
use crate::command::run_for_code;
use crate::error::{DiffCovError, Result};
use crate::paths;

static PYLINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^:]+):(\d+): \[(\w+),? ?([^\]]*)] (.*)$").expect("static regex")
});

static DUPE_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Similar lines in (\d+) files").expect("static regex"));

static DUPE_LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^==((?:\w|\.)+?):\[?(\d+)").expect("static regex"));

const DUPE_CODE: &str = "R0801";

/// Pylint's exit status is a bit mask; 2, 4, 8 and 16 only say which
/// message categories were issued. 1 (fatal) and 32 (usage error) are
/// failures.
const EXIT_CODES: [i32; 16] = [0, 2, 4, 6, 8, 10, 12, 14, 16, 18, 20, 22, 24, 26, 28, 30];

pub struct PylintDriver;

impl PylintDriver {
    /// Files named by the lines following an R0801 message at `idx`.
    fn dupe_code_locations(
        lines: &[&str],
        idx: usize,
        message: &str,
    ) -> Result<Vec<(String, String)>> {
        let Some(caps) = DUPE_CODE_RE.captures(message) else {
            return Ok(Vec::new());
        };
        let count: usize = caps[1].parse().unwrap_or(0);
        let mut locations = Vec::with_capacity(count);
        for offset in 1..=count {
            let line = lines.get(idx + offset).copied().unwrap_or("");
            let loc = DUPE_LOCATION_RE.captures(line).ok_or_else(|| {
                DiffCovError::report(format!(
                    "pylint {DUPE_CODE} report lists {count} files but line {} is {line:?}",
                    idx + offset + 1
                ))
            })?;
            locations.push((format!("{}.py", &loc[1]), loc[2].to_string()));
        }
        Ok(locations)
    }
}

impl QualityDriver for PylintDriver {
    fn name(&self) -> &str {
        "pylint"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["py"]
    }

    fn command(&self) -> Vec<String> {
        vec![
            "pylint".to_string(),
            "--msg-template={path}:{line}: [{msg_id}({symbol}), {obj}] {msg}".to_string(),
        ]
    }

    fn exit_codes(&self) -> &[i32] {
        &EXIT_CODES
    }

    fn parse_reports(&self, reports: &[String]) -> Result<ViolationMap> {
        let mut out = ViolationMap::new();
        for report in reports {
            let lines: Vec<&str> = report.lines().collect();
            for (idx, line) in lines.iter().enumerate() {
                // Source snippets and score lines do not match.
                let Some(caps) = PYLINT_RE.captures(line) else {
                    continue;
                };
                let code = &caps[3];
                let function = &caps[4];
                let message = &caps[5];

                let files = if code == DUPE_CODE {
                    Self::dupe_code_locations(&lines, idx, message)?
                } else {
                    vec![(caps[1].to_string(), caps[2].to_string())]
                };

                let text = if function.is_empty() {
                    format!("{code}: {message}")
                } else {
                    format!("{code}: {function}: {message}")
                };
                for (path, line_number) in files {
                    let Ok(line_number) = line_number.parse::<u32>() else {
                        continue;
                    };
                    out.entry(paths::to_unix_path(&path))
                        .or_default()
                        .push(Violation::new(line_number, text.clone()));
                }
            }
        }
        Ok(out)
    }

    fn installed(&self) -> bool {
        run_for_code("pylint", &["--version"]) == Some(0)
    }
}
