/// Parse unified diffs into the set of new-revision line numbers each file
/// gains. This is the "changed lines" side of every diff-coverage and
/// diff-quality computation.
///
/// Also provides a [`DiffSource`] trait that abstracts over different
/// ways to obtain a diff (stdin, a diff file, git).
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::Context;
use regex::Regex;

use crate::error::{DiffCovError, Result};
use crate::paths::unquote_git_path;

// ---------------------------------------------------------------------------
// Diff sources
// ---------------------------------------------------------------------------

/// Which diff a layer came from. Later layers override earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerKind {
    Committed,
    Staged,
    Unstaged,
    /// A pre-generated diff read from a file or stdin.
    File,
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LayerKind::Committed => "committed",
            LayerKind::Staged => "staged",
            LayerKind::Unstaged => "unstaged",
            LayerKind::File => "file",
        })
    }
}

/// Raw diff text plus where it came from.
#[derive(Debug, Clone)]
pub struct DiffLayer {
    pub kind: LayerKind,
    pub text: String,
}

/// A source for obtaining unified diffs.
pub trait DiffSource {
    /// Description shown in reports, e.g. `origin/main...HEAD, staged and unstaged changes`.
    fn name(&self) -> String;

    /// Fetch the diff layers, oldest first.
    fn fetch_layers(&self) -> anyhow::Result<Vec<DiffLayer>>;

    /// Files not yet known to version control, relative to the repository
    /// root. Every line of these counts as changed.
    fn untracked_files(&self) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Diff from stdin.
pub struct StdinDiff;

impl DiffSource for StdinDiff {
    fn name(&self) -> String {
        "stdin".to_string()
    }

    fn fetch_layers(&self) -> anyhow::Result<Vec<DiffLayer>> {
        let text =
            std::io::read_to_string(std::io::stdin()).context("Failed to read diff from stdin")?;
        Ok(vec![DiffLayer {
            kind: LayerKind::File,
            text,
        }])
    }
}

/// Diff from a pre-generated file.
pub struct DiffFile {
    pub path: PathBuf,
}

impl DiffSource for DiffFile {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch_layers(&self) -> anyhow::Result<Vec<DiffLayer>> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read diff file {}", self.path.display()))?;
        Ok(vec![DiffLayer {
            kind: LayerKind::File,
            text,
        }])
    }
}

// ---------------------------------------------------------------------------
// Changed-line model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Modified,
    Added,
    Deleted,
    Renamed,
    Binary,
}

/// What a diff did to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub status: FileStatus,
    /// New-revision line numbers that were added or modified.
    pub added: BTreeSet<u32>,
    /// New-revision positions at which lines were removed.
    pub deleted: BTreeSet<u32>,
}

impl FileChange {
    pub fn new(status: FileStatus) -> Self {
        Self {
            status,
            added: BTreeSet::new(),
            deleted: BTreeSet::new(),
        }
    }

    /// Deleted and binary files carry no lines that can be measured.
    pub fn in_scope(&self) -> bool {
        !matches!(self.status, FileStatus::Deleted | FileStatus::Binary)
    }

    fn absorb(&mut self, other: FileChange) {
        if other.status != FileStatus::Modified {
            self.status = other.status;
        }
        self.added.extend(other.added);
        self.deleted.extend(other.deleted);
    }
}

/// Per-file changes of one or more diffs, keyed by repository path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedLines {
    files: BTreeMap<String, FileChange>,
}

impl ChangedLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&FileChange> {
        self.files.get(path)
    }

    /// Added lines of `path`; `None` if the diff does not mention it.
    pub fn lines(&self, path: &str) -> Option<&BTreeSet<u32>> {
        self.files.get(path).map(|c| &c.added)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileChange)> {
        self.files.iter().map(|(p, c)| (p.as_str(), c))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Paths that can contribute changed lines (not deleted, not binary).
    pub fn in_scope_paths(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|(_, c)| c.in_scope())
            .map(|(p, _)| p)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total added lines across in-scope files.
    pub fn num_changed_lines(&self) -> usize {
        self.files
            .values()
            .filter(|c| c.in_scope())
            .map(|c| c.added.len())
            .sum()
    }

    /// Record a file that version control does not track yet: all of its
    /// `line_count` lines are new.
    pub fn add_whole_file(&mut self, path: String, line_count: u32) {
        let change = self
            .files
            .entry(path)
            .or_insert_with(|| FileChange::new(FileStatus::Added));
        change.added.extend(1..=line_count);
    }

    fn insert(&mut self, path: String, change: FileChange) {
        match self.files.get_mut(&path) {
            Some(existing) => existing.absorb(change),
            None => {
                self.files.insert(path, change);
            }
        }
    }

    /// Apply a later diff on top of this one: lines it removes are dropped,
    /// lines it adds are unioned in.
    pub fn layer(&mut self, later: &ChangedLines) {
        for (path, change) in &later.files {
            let entry = self
                .files
                .entry(path.clone())
                .or_insert_with(|| FileChange::new(change.status));
            entry.added.retain(|line| !change.deleted.contains(line));
            entry.added.extend(change.added.iter().copied());
            entry.deleted = change.deleted.clone();
            if change.status != FileStatus::Modified {
                entry.status = change.status;
            }
            if change.status == FileStatus::Deleted {
                entry.added.clear();
            }
        }
    }
}

/// A diff layer after parsing.
#[derive(Debug, Clone)]
pub struct ParsedLayer {
    pub kind: LayerKind,
    pub changes: ChangedLines,
}

/// Parse every layer; the first malformed one aborts.
pub fn parse_layers(layers: &[DiffLayer]) -> Result<Vec<ParsedLayer>> {
    layers
        .iter()
        .map(|layer| {
            Ok(ParsedLayer {
                kind: layer.kind,
                changes: parse_diff(&layer.text)?,
            })
        })
        .collect()
}

/// Fold parsed layers, oldest first, into one changed-line set.
pub fn combine_layers(layers: &[ParsedLayer]) -> ChangedLines {
    let mut combined = ChangedLines::new();
    for layer in layers {
        combined.layer(&layer.changes);
    }
    combined
}

// ---------------------------------------------------------------------------
// Diff parsing
// ---------------------------------------------------------------------------

/// `@@ -old_start[,old_count] +new_start[,new_count] @@`
static HUNK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("static regex")
});

/// `@@@ -a,b -c,d +e,f @@@` from `diff --cc`; one `@` per parent plus one.
static COMBINED_HUNK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(@{3,}) (.+?) @{3,}").expect("static regex"));

/// Parse a unified diff (e.g. `git diff`) into per-file changes.
///
/// Hunk line counts are enforced, so a truncated or miscounted hunk is an
/// error rather than a silently shifted set of line numbers.
pub fn parse_diff(diff_text: &str) -> Result<ChangedLines> {
    let mut parser = DiffParser::default();
    let mut last = 0;
    for (idx, line) in diff_text.lines().enumerate() {
        last = idx + 1;
        parser.feed(last, line)?;
    }
    parser.finish(last)
}

/// Per-file state while its headers and hunks are read.
struct Section {
    path: Option<String>,
    change: FileChange,
    seen_hunk: bool,
}

impl Section {
    fn new(path: Option<String>) -> Self {
        Self {
            path,
            change: FileChange::new(FileStatus::Modified),
            seen_hunk: false,
        }
    }
}

enum Hunk {
    Unified {
        new_line: u32,
        old_left: u32,
        new_left: u32,
    },
    Combined {
        new_line: u32,
        parents: usize,
    },
}

#[derive(Default)]
struct DiffParser {
    result: ChangedLines,
    section: Option<Section>,
    hunk: Option<Hunk>,
}

/// The new-file line after `line`; a counter past `u32::MAX` means the
/// hunk header lied about where it starts.
fn next_line(line: u32, line_no: usize) -> Result<u32> {
    line.checked_add(1)
        .ok_or_else(|| parse_error(line_no, "line number out of range"))
}

fn parse_error(line: usize, message: impl Into<String>) -> DiffCovError {
    DiffCovError::DiffParse {
        line,
        message: message.into(),
    }
}

impl DiffParser {
    fn feed(&mut self, line_no: usize, line: &str) -> Result<()> {
        if self.feed_hunk(line_no, line)? {
            return Ok(());
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            self.start_section(git_header_path(rest));
        } else if let Some(rest) = line
            .strip_prefix("diff --cc ")
            .or_else(|| line.strip_prefix("diff --combined "))
        {
            self.start_section(Some(unquote_git_path(rest.trim())));
        } else if line.starts_with("@@") {
            self.start_hunk(line_no, line)?;
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            let needs_section = self.section.as_ref().map_or(true, |s| s.seen_hunk);
            if needs_section {
                self.start_section(None);
            }
            if let Some(section) = self.section.as_mut() {
                match header_path(rest) {
                    Some(path) => section.path = Some(path),
                    None => section.change.status = FileStatus::Deleted,
                }
            }
        } else if line.starts_with("--- ") {
            // A plain `diff -u` has no `diff --git` line; `---` opens the file.
            if self.section.as_ref().map_or(true, |s| s.seen_hunk) {
                self.start_section(None);
            }
        } else if let Some(rest) = line.strip_prefix("rename to ") {
            if let Some(section) = self.section.as_mut() {
                section.path = Some(unquote_git_path(rest.trim()));
                section.change.status = FileStatus::Renamed;
            }
        } else if line.starts_with("new file mode") {
            self.set_status(FileStatus::Added);
        } else if line.starts_with("deleted file mode") {
            self.set_status(FileStatus::Deleted);
        } else if (line.starts_with("Binary files ") && line.ends_with(" differ"))
            || line == "GIT binary patch"
        {
            self.set_status(FileStatus::Binary);
        } else if (line.starts_with('+') || line.starts_with('-'))
            && self.section.as_ref().is_some_and(|s| s.seen_hunk)
        {
            return Err(parse_error(
                line_no,
                "line is outside of any hunk; the preceding hunk header undercounts",
            ));
        }
        // index, mode, similarity and preamble lines carry nothing we need.
        Ok(())
    }

    /// Consume `line` as a hunk body line. Returns false once the current
    /// hunk (if any) is complete and the line belongs to the headers.
    fn feed_hunk(&mut self, line_no: usize, line: &str) -> Result<bool> {
        let Some(hunk) = self.hunk.as_mut() else {
            return Ok(false);
        };
        let Some(section) = self.section.as_mut() else {
            return Ok(false);
        };
        let change = &mut section.change;

        match hunk {
            Hunk::Unified {
                new_line,
                old_left,
                new_left,
            } => {
                if *old_left == 0 && *new_left == 0 {
                    if line.starts_with('\\') {
                        return Ok(true);
                    }
                    self.hunk = None;
                    return Ok(false);
                }
                match line.as_bytes().first() {
                    Some(b'+') => {
                        if *new_left == 0 {
                            return Err(parse_error(
                                line_no,
                                "more added lines than the hunk header declares",
                            ));
                        }
                        change.added.insert(*new_line);
                        *new_line = next_line(*new_line, line_no)?;
                        *new_left -= 1;
                    }
                    Some(b'-') => {
                        if *old_left == 0 {
                            return Err(parse_error(
                                line_no,
                                "more removed lines than the hunk header declares",
                            ));
                        }
                        change.deleted.insert(*new_line);
                        *old_left -= 1;
                    }
                    Some(b' ') | None => {
                        if *old_left == 0 || *new_left == 0 {
                            return Err(parse_error(
                                line_no,
                                "more context lines than the hunk header declares",
                            ));
                        }
                        *new_line = next_line(*new_line, line_no)?;
                        *old_left -= 1;
                        *new_left -= 1;
                    }
                    // "\ No newline at end of file"
                    Some(b'\\') => {}
                    Some(_) => {
                        return Err(parse_error(
                            line_no,
                            format!("unexpected line inside hunk: {line:?}"),
                        ));
                    }
                }
                Ok(true)
            }
            Hunk::Combined { new_line, parents } => {
                if line.starts_with("diff ") || line.starts_with("@@") {
                    self.hunk = None;
                    return Ok(false);
                }
                if line.starts_with('\\') {
                    return Ok(true);
                }
                let columns = line.as_bytes().get(..*parents).unwrap_or(b"");
                if !line.is_empty()
                    && (columns.len() < *parents || !columns.iter().all(|c| b" +-".contains(c)))
                {
                    self.hunk = None;
                    return Ok(false);
                }
                if columns.contains(&b'-') {
                    change.deleted.insert(*new_line);
                } else {
                    if columns.contains(&b'+') {
                        change.added.insert(*new_line);
                    }
                    *new_line = next_line(*new_line, line_no)?;
                }
                Ok(true)
            }
        }
    }

    fn start_hunk(&mut self, line_no: usize, line: &str) -> Result<()> {
        let Some(section) = self.section.as_mut() else {
            return Err(parse_error(line_no, "hunk header before any file header"));
        };
        if section.path.is_none() && section.change.status != FileStatus::Deleted {
            return Err(parse_error(line_no, "hunk header before the file's new path"));
        }
        section.seen_hunk = true;

        if line.starts_with("@@@") {
            let caps = COMBINED_HUNK_RE
                .captures(line)
                .ok_or_else(|| parse_error(line_no, format!("malformed hunk header: {line}")))?;
            let parents = caps[1].len() - 1;
            let new_range = caps[2]
                .split_whitespace()
                .last()
                .and_then(|r| r.strip_prefix('+'))
                .ok_or_else(|| parse_error(line_no, format!("malformed hunk header: {line}")))?;
            let start = new_range.split(',').next().unwrap_or_default();
            let new_line = start
                .parse()
                .map_err(|_| parse_error(line_no, format!("malformed hunk header: {line}")))?;
            self.hunk = Some(Hunk::Combined { new_line, parents });
            return Ok(());
        }

        let caps = HUNK_RE
            .captures(line)
            .ok_or_else(|| parse_error(line_no, format!("malformed hunk header: {line}")))?;
        let number = |idx: usize| -> Result<u32> {
            match caps.get(idx) {
                None => Ok(1),
                Some(m) => m.as_str().parse().map_err(|_| {
                    parse_error(line_no, format!("line number out of range: {}", m.as_str()))
                }),
            }
        };
        self.hunk = Some(Hunk::Unified {
            old_left: number(2)?,
            new_line: number(3)?,
            new_left: number(4)?,
        });
        Ok(())
    }

    fn set_status(&mut self, status: FileStatus) {
        if let Some(section) = self.section.as_mut() {
            section.change.status = status;
        }
    }

    fn start_section(&mut self, path: Option<String>) {
        self.close_section();
        self.section = Some(Section::new(path));
    }

    fn close_section(&mut self) {
        self.hunk = None;
        if let Some(section) = self.section.take() {
            match section.path {
                Some(path) => self.result.insert(path, section.change),
                None => tracing::debug!("dropping diff section without a file path"),
            }
        }
    }

    fn finish(mut self, last_line: usize) -> Result<ChangedLines> {
        if let Some(Hunk::Unified {
            old_left, new_left, ..
        }) = &self.hunk
        {
            if *old_left > 0 || *new_left > 0 {
                return Err(parse_error(
                    last_line,
                    format!(
                        "diff ends inside a hunk ({old_left} old and {new_left} new lines missing)"
                    ),
                ));
            }
        }
        self.close_section();
        Ok(self.result)
    }
}

/// New path from `a/<old> b/<new>` in a `diff --git` line.
fn git_header_path(rest: &str) -> Option<String> {
    let rest = rest.trim_end();
    let raw = if rest.ends_with('"') {
        let start = rest[..rest.len() - 1].rfind('"')?;
        unquote_git_path(&rest[start..])
    } else {
        let start = rest.rfind(" b/")?;
        rest[start + 1..].to_string()
    };
    raw.strip_prefix("b/").map(str::to_string)
}

/// Path from a `+++` header; `None` for `/dev/null`.
fn header_path(rest: &str) -> Option<String> {
    // Plain `diff -u` appends a tab and a timestamp.
    let raw = rest.split('\t').next().unwrap_or(rest).trim_end();
    let path = unquote_git_path(raw);
    if path == "/dev/null" {
        return None;
    }
    Some(path.strip_prefix("b/").map(str::to_string).unwrap_or(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn added(result: &ChangedLines, path: &str) -> Vec<u32> {
        result
            .lines(path)
            .map(|l| l.iter().copied().collect())
            .unwrap_or_default()
    }

    const MODIFIED: &str = "\
diff --git a/src/main.rs b/src/main.rs
index 1234567..abcdefg 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -8,5 +8,7 @@ fn main() {
     let x = 1;
-    let y = 3;
+    let y = 2;
+    let z = x + y;
     println!(\"{x}\");
     println!(\"{y}\");
+    println!(\"{z}\");
 }
";

    #[test]
    fn test_parse_diff() {
        let result = parse_diff(MODIFIED).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(added(&result, "src/main.rs"), vec![9, 10, 13]);
        assert_eq!(result.get("src/main.rs").unwrap().status, FileStatus::Modified);
    }

    #[test]
    fn test_parse_diff_new_file() {
        let diff = "\
diff --git a/src/new.rs b/src/new.rs
new file mode 100644
index 0000000..1111111
--- /dev/null
+++ b/src/new.rs
@@ -0,0 +1,3 @@
+fn a() {}
+fn b() {}
+fn c() {}
";
        let result = parse_diff(diff).unwrap();
        assert_eq!(added(&result, "src/new.rs"), vec![1, 2, 3]);
        assert_eq!(result.get("src/new.rs").unwrap().status, FileStatus::Added);
    }

    #[test]
    fn test_parse_diff_deleted_file() {
        let diff = "\
diff --git a/old.rs b/old.rs
deleted file mode 100644
index 1111111..0000000
--- a/old.rs
+++ /dev/null
@@ -1,2 +0,0 @@
-fn a() {}
-fn b() {}
";
        let result = parse_diff(diff).unwrap();
        let change = result.get("old.rs").unwrap();
        assert_eq!(change.status, FileStatus::Deleted);
        assert!(change.added.is_empty());
        assert_eq!(result.in_scope_paths().count(), 0);
    }

    #[test]
    fn test_parse_diff_no_newline_at_eof() {
        let diff = "\
diff --git a/src/lib.rs b/src/lib.rs
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,2 +1,3 @@
 fn main() {
-}
\\ No newline at end of file
+    println!(\"world\");
+}
\\ No newline at end of file
";
        let result = parse_diff(diff).unwrap();
        assert_eq!(added(&result, "src/lib.rs"), vec![2, 3]);
    }

    #[test]
    fn test_parse_diff_multiple_files_and_hunks() {
        let diff = "\
diff --git a/a.rs b/a.rs
--- a/a.rs
+++ b/a.rs
@@ -2 +2 @@
-old
+new
@@ -10,0 +11,2 @@
+x
+y
diff --git a/b.rs b/b.rs
--- a/b.rs
+++ b/b.rs
@@ -1,0 +2 @@
+only
";
        let result = parse_diff(diff).unwrap();
        assert_eq!(added(&result, "a.rs"), vec![2, 11, 12]);
        assert_eq!(added(&result, "b.rs"), vec![2]);
        assert_eq!(result.num_changed_lines(), 4);
    }

    #[test]
    fn test_parse_diff_rename_only() {
        let diff = "\
diff --git a/old/name.py b/new/name.py
similarity index 100%
rename from old/name.py
rename to new/name.py
";
        let result = parse_diff(diff).unwrap();
        let change = result.get("new/name.py").unwrap();
        assert_eq!(change.status, FileStatus::Renamed);
        assert!(change.added.is_empty());
        assert!(result.get("old/name.py").is_none());
    }

    #[test]
    fn test_parse_diff_mode_change_and_binary() {
        let diff = "\
diff --git a/run.sh b/run.sh
old mode 100644
new mode 100755
diff --git a/logo.png b/logo.png
index 1111111..2222222 100644
Binary files a/logo.png and b/logo.png differ
";
        let result = parse_diff(diff).unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.lines("run.sh").unwrap().is_empty());
        assert_eq!(result.get("logo.png").unwrap().status, FileStatus::Binary);
        assert_eq!(result.in_scope_paths().collect::<Vec<_>>(), vec!["run.sh"]);
    }

    #[test]
    fn test_parse_diff_quoted_path() {
        let diff = "\
diff --git \"a/caf\\303\\251.py\" \"b/caf\\303\\251.py\"
--- \"a/caf\\303\\251.py\"
+++ \"b/caf\\303\\251.py\"
@@ -0,0 +1 @@
+print('hi')
";
        let result = parse_diff(diff).unwrap();
        assert_eq!(added(&result, "café.py"), vec![1]);
    }

    #[test]
    fn test_parse_diff_plain_unified() {
        let diff = "\
--- a.py\t2024-01-01 00:00:00
+++ a.py\t2024-01-02 00:00:00
@@ -1,1 +1,2 @@
 x
+y
";
        let result = parse_diff(diff).unwrap();
        assert_eq!(added(&result, "a.py"), vec![2]);
    }

    #[test]
    fn test_parse_diff_removed_sql_comment_is_not_a_header() {
        let diff = "\
diff --git a/q.sql b/q.sql
--- a/q.sql
+++ b/q.sql
@@ -1,2 +1,2 @@
--- old comment
+-- new comment
 select 1;
";
        let result = parse_diff(diff).unwrap();
        assert_eq!(added(&result, "q.sql"), vec![1]);
    }

    #[test]
    fn test_parse_diff_combined() {
        let diff = "\
diff --cc conflict.py
index 1111111,2222222..3333333
--- a/conflict.py
+++ b/conflict.py
@@@ -1,3 -1,3 +1,4 @@@
  same
- ours
 +theirs
++both
  tail
";
        let result = parse_diff(diff).unwrap();
        // Line 2 has a `-` column and is not part of the result.
        assert_eq!(added(&result, "conflict.py"), vec![2, 3]);
    }

    #[test]
    fn test_malformed_hunk_header() {
        let diff = "diff --git a/a.py b/a.py\n--- a/a.py\n+++ b/a.py\n@@ -1,x +1 @@\n+x\n";
        match parse_diff(diff) {
            Err(DiffCovError::DiffParse { line, .. }) => assert_eq!(line, 4),
            other => panic!("expected DiffParse, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_hunk() {
        let diff = "diff --git a/a.py b/a.py\n--- a/a.py\n+++ b/a.py\n@@ -1,0 +1,3 @@\n+x\n";
        let err = parse_diff(diff).unwrap_err();
        assert!(err.to_string().contains("ends inside a hunk"), "{err}");
    }

    #[test]
    fn test_overlong_hunk() {
        let diff = "diff --git a/a.py b/a.py\n--- a/a.py\n+++ b/a.py\n@@ -1,0 +1 @@\n+x\n+y\n";
        match parse_diff(diff) {
            Err(DiffCovError::DiffParse { line, .. }) => assert_eq!(line, 6),
            other => panic!("expected DiffParse, got {other:?}"),
        }
    }

    #[test]
    fn test_line_number_overflow() {
        let diff = "diff --git a/a.py b/a.py\n--- a/a.py\n+++ b/a.py\n@@ -1,0 +4294967295,2 @@\n+x\n+y\n";
        match parse_diff(diff) {
            Err(DiffCovError::DiffParse { line, message }) => {
                assert_eq!(line, 5);
                assert!(message.contains("out of range"), "{message}");
            }
            other => panic!("expected DiffParse, got {other:?}"),
        }

        let combined = "diff --cc a.py\n--- a/a.py\n+++ b/a.py\n@@@ -1,1 -1,1 +4294967295,2 @@@\n++x\n++y\n";
        assert!(parse_diff(combined).is_err());
    }

    #[test]
    fn test_hunk_before_file_header() {
        assert!(parse_diff("@@ -1 +1 @@\n+x\n").is_err());
    }

    #[test]
    fn test_layering_drops_deleted_and_adds() {
        let committed = parse_diff(
            "diff --git a/f.py b/f.py\n--- a/f.py\n+++ b/f.py\n@@ -0,0 +1,3 @@\n+a\n+b\n+c\n",
        )
        .unwrap();
        let unstaged = parse_diff(
            "diff --git a/f.py b/f.py\n--- a/f.py\n+++ b/f.py\n@@ -2 +1,0 @@\n-b\n@@ -9,0 +9 @@\n+z\n",
        )
        .unwrap();
        let combined = combine_layers(&[
            ParsedLayer {
                kind: LayerKind::Committed,
                changes: committed,
            },
            ParsedLayer {
                kind: LayerKind::Unstaged,
                changes: unstaged,
            },
        ]);
        assert_eq!(added(&combined, "f.py"), vec![2, 3, 9]);
    }

    #[test]
    fn test_layering_later_delete_wins() {
        let mut base = ChangedLines::new();
        base.add_whole_file("gone.py".to_string(), 3);
        let later = parse_diff(
            "diff --git a/gone.py b/gone.py\ndeleted file mode 100644\n--- a/gone.py\n+++ /dev/null\n@@ -1,3 +0,0 @@\n-a\n-b\n-c\n",
        )
        .unwrap();
        base.layer(&later);
        let change = base.get("gone.py").unwrap();
        assert_eq!(change.status, FileStatus::Deleted);
        assert!(change.added.is_empty());
    }

    #[test]
    fn test_add_whole_file() {
        let mut changes = ChangedLines::new();
        changes.add_whole_file("new.py".to_string(), 4);
        assert_eq!(added(&changes, "new.py"), vec![1, 2, 3, 4]);
        assert_eq!(changes.get("new.py").unwrap().status, FileStatus::Added);
    }
}
