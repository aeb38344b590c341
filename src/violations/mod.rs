//! Static-analysis results, normalized to per-file `(line, message)` lists.
//!
//! Each quality tool has a [`QualityDriver`] that knows the tool's command
//! line and output grammar. A [`QualityReporter`] feeds a driver either
//! pre-generated reports or the output of running the tool live.
pub mod pylint;
pub mod regex_driver;
pub mod registry;
pub mod reporter;
pub mod xml;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::Result;

pub use registry::ToolRegistry;
pub use reporter::QualityReporter;

/// A single finding tied to a line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Violation {
    pub line: u32,
    pub message: Option<String>,
}

impl Violation {
    pub fn new(line: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            message: Some(message.into()),
        }
    }
}

/// Violations of one file, ordered by line and then by first appearance,
/// without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViolationRecord {
    by_line: BTreeMap<u32, Vec<Option<String>>>,
    len: usize,
}

impl ViolationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        let messages = self.by_line.entry(violation.line).or_default();
        if messages.contains(&violation.message) {
            return;
        }
        messages.push(violation.message);
        self.len += 1;
    }

    pub fn merge(&mut self, other: &ViolationRecord) {
        for v in other.iter() {
            self.push(v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Violation> + '_ {
        self.by_line.iter().flat_map(|(line, messages)| {
            messages.iter().map(|message| Violation {
                line: *line,
                message: message.clone(),
            })
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Lines with at least one violation.
    pub fn lines(&self) -> BTreeSet<u32> {
        self.by_line.keys().copied().collect()
    }
}

impl FromIterator<Violation> for ViolationRecord {
    fn from_iter<I: IntoIterator<Item = Violation>>(iter: I) -> Self {
        let mut record = ViolationRecord::new();
        for v in iter {
            record.push(v);
        }
        record
    }
}

/// Violations keyed by the path the tool reported.
pub type ViolationMap = BTreeMap<String, ViolationRecord>;

/// Fold `other` into `into`, merging records of the same path.
pub fn merge_maps(into: &mut ViolationMap, other: ViolationMap) {
    for (path, record) in other {
        match into.get_mut(&path) {
            Some(existing) => existing.merge(&record),
            None => {
                into.insert(path, record);
            }
        }
    }
}

/// Everything the core needs to know about one quality tool.
pub trait QualityDriver: Send + Sync {
    /// Tool identifier used for registry lookup (e.g. "pylint").
    fn name(&self) -> &str;

    /// File extensions the tool checks, without the dot.
    fn supported_extensions(&self) -> &[&str];

    /// Command and fixed arguments; options and the source path are appended.
    fn command(&self) -> Vec<String>;

    /// Exit codes that do not indicate a failed run.
    fn exit_codes(&self) -> &[i32] {
        &[0]
    }

    /// Whether findings are written to stderr rather than stdout.
    fn output_stderr(&self) -> bool {
        false
    }

    /// Parse report texts into violations keyed by reported path.
    fn parse_reports(&self, reports: &[String]) -> Result<ViolationMap>;

    /// Whether the tool can be run on this machine.
    fn installed(&self) -> bool;
}
