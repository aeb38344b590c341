//! Drivers for tools whose output is one finding per line (or, for
//! pydocstyle, per small block) that a single regex can take apart.
use std::sync::LazyLock;

use regex::Regex;

use super::{QualityDriver, Violation, ViolationMap};
use crate::command::run_for_code;
use crate::error::Result;
use crate::paths;

static PYCODESTYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^:]+):(\d+).*([EW]\d{3}.*)$").expect("static regex")
});

// path/to/file.py:328: undefined name '_thing'
static PYFLAKES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:]+):(\d+):\d*:? (.*)$").expect("static regex"));

// new_file.py:1:17: E231 whitespace
static FLAKE8_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^:]+):(\d+):(?:\d+): ([a-zA-Z]+\d+.*)$").expect("static regex")
});

// file.js: line 3, col 7, Missing semicolon.
static COMPACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^:]+): line (\d+), col \d+, (.*)$").expect("static regex")
});

// The location line is followed by the message indented by 8 spaces.
static PYDOCSTYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^(.+?):(\d+).*?$.+?^        (.*?)$").expect("static regex")
});

// [src/foo.c:123]: (error) Array 'yolo[4]' accessed at index 4, which is out of bounds.
static CPPCHECK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(.*?):(\d+)\]: (.*$)").expect("static regex"));

// [WARN] src/Foo.java:12:5: Missing a Javadoc comment.
static CHECKSTYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\w+\]\s+([^:]+):(\d+):(?:\d+:)? (.*)$").expect("static regex")
});

/// A driver whose report grammar is one regex with three groups:
/// path, line number, message.
pub struct RegexDriver {
    name: &'static str,
    extensions: &'static [&'static str],
    command: &'static [&'static str],
    install_check: &'static [&'static str],
    exit_codes: &'static [i32],
    expression: &'static Regex,
    /// Match against the whole report instead of line by line.
    multiline: bool,
    output_stderr: bool,
    /// Paths in the report are relative to this directory (eslint).
    report_root_path: Option<String>,
}

impl RegexDriver {
    /// Strip `root` from reported paths.
    pub fn with_report_root(mut self, root: Option<String>) -> Self {
        self.report_root_path = root.map(|r| paths::to_unix_path(&r));
        self
    }

    fn relativize(&self, path: &str) -> String {
        let unix = paths::to_unix_path(path);
        match &self.report_root_path {
            Some(root) => paths::strip_dir_prefix(&unix, root).unwrap_or(unix),
            None => unix,
        }
    }

    fn record(&self, out: &mut ViolationMap, path: &str, line: &str, message: &str) {
        // A line number too large for u32 cannot be in any diff.
        let Ok(line) = line.parse::<u32>() else {
            return;
        };
        out.entry(self.relativize(path))
            .or_default()
            .push(Violation::new(line, message));
    }
}

impl QualityDriver for RegexDriver {
    fn name(&self) -> &str {
        self.name
    }

    fn supported_extensions(&self) -> &[&str] {
        self.extensions
    }

    fn command(&self) -> Vec<String> {
        self.command.iter().map(|s| s.to_string()).collect()
    }

    fn exit_codes(&self) -> &[i32] {
        self.exit_codes
    }

    fn output_stderr(&self) -> bool {
        self.output_stderr
    }

    fn parse_reports(&self, reports: &[String]) -> Result<ViolationMap> {
        let mut out = ViolationMap::new();
        for report in reports {
            if self.multiline {
                for caps in self.expression.captures_iter(report) {
                    self.record(&mut out, &caps[1], &caps[2], &caps[3]);
                }
            } else {
                for line in report.lines() {
                    if let Some(caps) = self.expression.captures(line) {
                        self.record(&mut out, &caps[1], &caps[2], &caps[3]);
                    }
                }
            }
        }
        Ok(out)
    }

    fn installed(&self) -> bool {
        match self.install_check.split_first() {
            Some((program, args)) => run_for_code(program, args) == Some(0),
            None => false,
        }
    }
}

fn driver(
    name: &'static str,
    extensions: &'static [&'static str],
    command: &'static [&'static str],
    install_check: &'static [&'static str],
    expression: &'static Regex,
) -> RegexDriver {
    RegexDriver {
        name,
        extensions,
        command,
        install_check,
        exit_codes: &[0],
        expression,
        multiline: false,
        output_stderr: false,
        report_root_path: None,
    }
}

/// Exit code 1 means "violations found".
const ZERO_OR_ONE: &[i32] = &[0, 1];

pub fn pycodestyle() -> RegexDriver {
    RegexDriver {
        exit_codes: ZERO_OR_ONE,
        ..driver(
            "pycodestyle",
            &["py"],
            &["pycodestyle"],
            &["pycodestyle", "--version"],
            &PYCODESTYLE_RE,
        )
    }
}

pub fn pyflakes() -> RegexDriver {
    RegexDriver {
        exit_codes: ZERO_OR_ONE,
        ..driver(
            "pyflakes",
            &["py"],
            &["pyflakes"],
            &["pyflakes", "--version"],
            &PYFLAKES_RE,
        )
    }
}

pub fn flake8() -> RegexDriver {
    RegexDriver {
        exit_codes: ZERO_OR_ONE,
        ..driver(
            "flake8",
            &["py"],
            &["flake8"],
            &["flake8", "--version"],
            &FLAKE8_RE,
        )
    }
}

pub fn pydocstyle() -> RegexDriver {
    RegexDriver {
        exit_codes: ZERO_OR_ONE,
        multiline: true,
        ..driver(
            "pydocstyle",
            &["py"],
            &["pydocstyle"],
            &["pydocstyle", "--version"],
            &PYDOCSTYLE_RE,
        )
    }
}

pub fn jshint() -> RegexDriver {
    driver("jshint", &["js"], &["jshint"], &["jshint", "-v"], &COMPACT_RE)
}

pub fn eslint() -> RegexDriver {
    driver(
        "eslint",
        &["js"],
        &["eslint", "--format=compact"],
        &["eslint", "-v"],
        &COMPACT_RE,
    )
}

pub fn cppcheck() -> RegexDriver {
    RegexDriver {
        output_stderr: true,
        ..driver(
            "cppcheck",
            &["c", "cpp", "h", "hpp"],
            &["cppcheck", "--quiet"],
            &["cppcheck", "--version"],
            &CPPCHECK_RE,
        )
    }
}

pub fn checkstyle() -> RegexDriver {
    driver(
        "checkstyle",
        &["java"],
        &["checkstyle"],
        &["java", "com.puppycrawl.tools.checkstyle.Main", "-version"],
        &CHECKSTYLE_RE,
    )
}
