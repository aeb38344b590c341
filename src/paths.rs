//! Path normalization shared by every adapter, so that paths recorded by
//! coverage tools and linters compare equal to the paths `git diff` prints.
use std::path::{Path, PathBuf};

/// Convert to forward slashes and collapse `.`, `..` and repeated separators.
///
/// A leading `/` is preserved; `..` that would climb above a relative path's
/// start is kept verbatim.
#[must_use]
pub fn to_unix_path(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    let absolute = replaced.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for component in replaced.split('/') {
        match component {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Strip `prefix` (a directory) from `path` when `path` lives under it.
/// Both are expected in unix form.
#[must_use]
pub fn strip_dir_prefix(path: &str, prefix: &str) -> Option<String> {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() && prefix.starts_with('/') {
        return path.strip_prefix('/').map(str::to_string);
    }
    let prefix = trimmed;
    if prefix.is_empty() || prefix == "." {
        return Some(path.to_string());
    }
    let rest = path.strip_prefix(prefix)?.strip_prefix('/')?;
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

/// Join a report-recorded source root with a file name. Absolute file names
/// win; an empty root leaves the name unchanged.
#[must_use]
pub fn join(root: &str, file: &str) -> String {
    let file_unix = file.replace('\\', "/");
    if file_unix.starts_with('/') || looks_like_drive(&file_unix) {
        return file_unix;
    }
    let root = root.trim().replace('\\', "/");
    let base = root.trim_end_matches('/');
    if base.is_empty() {
        file_unix
    } else {
        format!("{base}/{file_unix}")
    }
}

fn looks_like_drive(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/'
}

/// Undo git's C-style quoting of unusual file names (`core.quotePath`).
///
/// `"caf\303\251.py"` becomes `café.py`; unquoted input is returned as is.
#[must_use]
pub fn unquote_git_path(raw: &str) -> String {
    let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    else {
        return raw.to_string();
    };

    let mut bytes: Vec<u8> = Vec::with_capacity(inner.len());
    let mut chars = inner.bytes().peekable();
    while let Some(b) = chars.next() {
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        match chars.next() {
            Some(b'n') => bytes.push(b'\n'),
            Some(b't') => bytes.push(b'\t'),
            Some(b'r') => bytes.push(b'\r'),
            Some(b'a') => bytes.push(0x07),
            Some(b'b') => bytes.push(0x08),
            Some(b'f') => bytes.push(0x0c),
            Some(b'v') => bytes.push(0x0b),
            Some(d @ b'0'..=b'7') => {
                let mut value = u32::from(d - b'0');
                for _ in 0..2 {
                    match chars.peek() {
                        Some(&n @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(n - b'0');
                            chars.next();
                        }
                        _ => break,
                    }
                }
                bytes.push((value & 0xff) as u8);
            }
            Some(other) => bytes.push(other),
            None => bytes.push(b'\\'),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// The repository a run looks at and the directory it was started from.
///
/// Diff paths are relative to `root`; tools and reports written from a
/// subdirectory use paths relative to `root/prefix`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workspace {
    pub root: PathBuf,
    /// Working directory relative to `root`; empty at the top level.
    pub prefix: String,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, prefix: &str) -> Self {
        let prefix = to_unix_path(prefix);
        Self {
            root: root.into(),
            prefix: if prefix == "." { String::new() } else { prefix },
        }
    }

    /// Where a repository-relative path lives on disk.
    #[must_use]
    pub fn absolute(&self, repo_path: &str) -> PathBuf {
        self.root.join(repo_path)
    }
}

/// Maps report paths onto repository-relative paths.
#[derive(Debug, Clone, Default)]
pub struct PathNormalizer {
    root: Option<String>,
    prefix: Option<String>,
}

impl PathNormalizer {
    /// `root` is the repository root; absolute paths under it become relative.
    pub fn new(root: Option<&Path>) -> Self {
        Self {
            root: root.map(|r| to_unix_path(&r.to_string_lossy())),
            prefix: None,
        }
    }

    /// Absolute paths under the workspace root become relative to it, and
    /// relative paths are taken as relative to the working directory.
    pub fn for_workspace(workspace: Option<&Workspace>) -> Self {
        let Some(ws) = workspace else {
            return Self::default();
        };
        Self {
            prefix: (!ws.prefix.is_empty()).then(|| ws.prefix.clone()),
            ..Self::new(Some(&ws.root))
        }
    }

    #[must_use]
    pub fn normalize(&self, path: &str) -> String {
        let unix = to_unix_path(path);
        if let Some(root) = &self.root {
            if let Some(rest) = strip_dir_prefix(&unix, root) {
                return rest;
            }
        }
        match &self.prefix {
            Some(prefix) if !unix.starts_with('/') && !looks_like_drive(&unix) => {
                to_unix_path(&join(prefix, &unix))
            }
            _ => unix,
        }
    }
}
