use std::fmt;

/// Result of comparing the total against `--fail-under`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    pub fn passed(self) -> bool {
        self == Outcome::Pass
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Pass => "pass",
            Outcome::Fail => "fail",
        })
    }
}

/// Fail when `total_percent` is strictly below `fail_under`.
#[must_use]
pub fn evaluate(total_percent: f64, fail_under: f64) -> Outcome {
    if total_percent < fail_under {
        Outcome::Fail
    } else {
        Outcome::Pass
    }
}
