/// Auto-detection of coverage report formats.
///
/// Detection looks only at content, never at the file name: XML reports are
/// told apart by their root element (and Clover by its `clover` attribute),
/// LCOV by its leading record tags.
use std::fmt;

/// Supported coverage formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Cobertura,
    Clover,
    Jacoco,
    Lcov,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Cobertura => "cobertura",
            Format::Clover => "clover",
            Format::Jacoco => "jacoco",
            Format::Lcov => "lcov",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Only this many leading bytes are inspected.
const SNIFF_LEN: usize = 8192;

/// Detect the coverage format from file content.
pub fn detect_format(content: &[u8]) -> Option<Format> {
    let head_len = content.len().min(SNIFF_LEN);
    let head = String::from_utf8_lossy(&content[..head_len]);
    let head = head.trim_start_matches('\u{feff}').trim_start();

    if head.starts_with('<') {
        let (name, tag) = root_element(head)?;
        return match name {
            "coverage" if tag.contains("clover=") => Some(Format::Clover),
            "coverage" => Some(Format::Cobertura),
            "report" => Some(Format::Jacoco),
            _ => None,
        };
    }

    // LCOV: the first meaningful record is one of the tracefile tags.
    let first = head.lines().map(str::trim).find(|l| !l.is_empty())?;
    let tag = first.split_once(':').map_or(first, |(tag, _)| tag);
    match tag {
        "TN" | "SF" | "VER" => Some(Format::Lcov),
        _ => None,
    }
}

/// Name and raw start tag of the document's root element, skipping the XML
/// declaration, processing instructions, comments and the DOCTYPE.
fn root_element(head: &str) -> Option<(&str, &str)> {
    let mut rest = head;
    loop {
        let start = rest.find('<')?;
        rest = &rest[start..];
        if let Some(after) = rest.strip_prefix("<!--") {
            let end = after.find("-->")?;
            rest = &after[end + 3..];
        } else if rest.starts_with("<?") || rest.starts_with("<!") {
            let end = rest.find('>')?;
            rest = &rest[end + 1..];
        } else {
            let end = rest.find('>').unwrap_or(rest.len());
            let tag = &rest[1..end];
            let name_end = tag
                .find(|c: char| c.is_whitespace() || c == '/')
                .unwrap_or(tag.len());
            return Some((&tag[..name_end], tag));
        }
    }
}
