/// Parser for the LCOV `.info` format.
///
/// Reference: https://ltp.sourceforge.net/coverage/lcov/geninfo.1.php
///
/// Key records:
///   TN:<test name>
///   SF:<absolute path to source file>
///   FN:<line>,<function name>
///   FNDA:<execution count>,<function name>
///   FNF:<number of functions found>
///   FNH:<number of functions hit>
///   DA:<line number>,<execution count>[,<checksum>]
///   BRDA:<line>,<block>,<branch>,<taken>   ("-" means 0)
///   BRF:<branches found>
///   BRH:<branches hit>
///   LF:<lines found>
///   LH:<lines hit>
///   end_of_record
///
/// Repeated `DA` records for one line are summed. A `DA` outside an `SF`
/// record, a malformed `DA`, or an unknown record tag is an error.
use std::collections::HashMap;

use super::CoverageParser;
use crate::detect::Format;
use crate::error::{DiffCovError, Result};
use crate::model::*;

/// LCOV format parser.
pub struct LcovParser;

impl CoverageParser for LcovParser {
    fn format(&self) -> Format {
        Format::Lcov
    }

    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        parse(input)
    }
}

/// Records that are valid but carry nothing we need.
const IGNORED_TAGS: &[&str] = &[
    "TN", "VER", "FN", "FNDA", "FNF", "FNH", "FNL", "FNA", "BRF", "BRH", "LF", "LH",
];

/// One `SF` record being accumulated.
struct Record {
    path: String,
    hits: HashMap<u32, u64>,
    branches: Vec<BranchCoverage>,
    branch_indices: HashMap<u32, u32>,
}

impl Record {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            hits: HashMap::new(),
            branches: Vec::new(),
            branch_indices: HashMap::new(),
        }
    }

    fn finish(self) -> FileCoverage {
        let mut file = FileCoverage::new(self.path);
        file.lines = self
            .hits
            .into_iter()
            .map(|(line_number, hit_count)| LineCoverage {
                line_number,
                hit_count,
            })
            .collect();
        file.lines.sort_by_key(|l| l.line_number);
        file.branches = self.branches;
        file
    }
}

/// Parse LCOV format coverage data from raw bytes.
pub fn parse(input: &[u8]) -> Result<CoverageData> {
    let text = std::str::from_utf8(input)
        .map_err(|e| DiffCovError::report(format!("invalid UTF-8 in LCOV data: {e}")))?;

    let mut data = CoverageData::new();
    let mut current: Option<Record> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let line_no = idx + 1;

        if line == "end_of_record" {
            if let Some(record) = current.take() {
                data.files.push(record.finish());
            }
            continue;
        }

        let (tag, value) = line.split_once(':').unwrap_or((line, ""));
        match tag {
            "SF" => {
                if let Some(record) = current.take() {
                    data.files.push(record.finish());
                }
                current = Some(Record::new(value));
            }
            "DA" => {
                // DA:<line_number>,<execution_count>[,<checksum>]
                let parts: Vec<&str> = value.split(',').collect();
                if parts.len() < 2 || parts.len() > 3 {
                    return Err(unknown_syntax(line_no, line));
                }
                let line_number: u32 = parts[0]
                    .trim()
                    .parse()
                    .map_err(|_| unknown_syntax(line_no, line))?;
                let count: i64 = parts[1]
                    .trim()
                    .parse()
                    .map_err(|_| unknown_syntax(line_no, line))?;
                let Some(record) = current.as_mut() else {
                    return Err(DiffCovError::report(format!(
                        "line {line_no}: no source file specified for line coverage: {line}"
                    )));
                };
                // Some instrumenters write -1 for non-instrumentable lines.
                if count >= 0 {
                    *record.hits.entry(line_number).or_insert(0) += count as u64;
                }
            }
            "BRDA" => {
                // BRDA:<line>,<block>,<branch>,<taken>
                if let Some(record) = current.as_mut() {
                    let parts: Vec<&str> = value.splitn(4, ',').collect();
                    if parts.len() == 4 {
                        if let Ok(line_number) = parts[0].parse::<u32>() {
                            let hit_count = if parts[3] == "-" {
                                0
                            } else {
                                parts[3].parse::<u64>().unwrap_or(0)
                            };
                            let idx = record.branch_indices.entry(line_number).or_insert(0);
                            record.branches.push(BranchCoverage {
                                line_number,
                                branch_index: *idx,
                                hit_count,
                            });
                            *idx += 1;
                        }
                    }
                }
            }
            t if IGNORED_TAGS.contains(&t) => {}
            _ => return Err(unknown_syntax(line_no, line)),
        }
    }

    // File ended without end_of_record
    if let Some(record) = current.take() {
        data.files.push(record.finish());
    }

    Ok(data)
}

fn unknown_syntax(line_no: usize, line: &str) -> DiffCovError {
    DiffCovError::report(format!("line {line_no}: unknown syntax in lcov report: {line}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"TN:unit
SF:/src/lib.rs
FN:1,main
FN:4,helper
FNDA:5,main
FNDA:0,helper
FNF:2
FNH:1
DA:1,5
DA:2,5
DA:3,0
DA:4,0
DA:5,5
BRDA:2,0,0,5
BRDA:2,0,1,-
BRF:2
BRH:1
LF:5
LH:3
end_of_record
SF:/src/util.rs
DA:1,1
DA:2,0
end_of_record
";

    #[test]
    fn test_parse_lcov() {
        let data = parse(SAMPLE).unwrap();
        assert_eq!(data.files.len(), 2);

        let lib = &data.files[0];
        assert_eq!(lib.path, "/src/lib.rs");
        assert_eq!(lib.lines.len(), 5);
        assert_eq!(lib.lines[0].line_number, 1);
        assert_eq!(lib.lines[0].hit_count, 5);
        assert_eq!(lib.lines[2].line_number, 3);
        assert_eq!(lib.lines[2].hit_count, 0);

        assert_eq!(lib.branches.len(), 2);
        assert_eq!(lib.branches[0].line_number, 2);
        assert_eq!(lib.branches[0].branch_index, 0);
        assert_eq!(lib.branches[0].hit_count, 5);
        assert_eq!(lib.branches[1].branch_index, 1);
        assert_eq!(lib.branches[1].hit_count, 0);

        let util = &data.files[1];
        assert_eq!(util.path, "/src/util.rs");
        assert_eq!(util.lines.len(), 2);
        assert!(util.branches.is_empty());
    }

    #[test]
    fn test_parse_lcov_sums_repeated_lines() {
        let input = b"SF:a.py\nDA:3,0\nDA:3,2\nDA:4,0\nend_of_record\n";
        let data = parse(input).unwrap();
        let lines: Vec<(u32, u64)> = data.files[0]
            .lines
            .iter()
            .map(|l| (l.line_number, l.hit_count))
            .collect();
        assert_eq!(lines, vec![(3, 2), (4, 0)]);
    }

    #[test]
    fn test_parse_lcov_no_end_of_record() {
        let data = parse(b"SF:/src/main.rs\nDA:1,1\nDA:2,0\n").unwrap();
        assert_eq!(data.files.len(), 1);
        assert_eq!(data.files[0].lines.len(), 2);
    }

    #[test]
    fn test_parse_lcov_negative_counts() {
        let input = b"SF:/src/a.rs\nDA:1,5\nDA:2,-1\nDA:3,0\nDA:4,3\nend_of_record\n";
        let data = parse(input).unwrap();
        let numbers: Vec<u32> = data.files[0].lines.iter().map(|l| l.line_number).collect();
        assert_eq!(numbers, vec![1, 3, 4]);
    }

    #[test]
    fn test_parse_lcov_empty() {
        let data = parse(b"TN:\n").unwrap();
        assert!(data.files.is_empty());
    }

    #[test]
    fn test_parse_lcov_da_before_sf() {
        let err = parse(b"TN:x\nDA:1,1\n").unwrap_err();
        assert!(err.to_string().contains("no source file"), "{err}");
    }

    #[test]
    fn test_parse_lcov_malformed_da() {
        assert!(parse(b"SF:a.py\nDA:1\n").is_err());
        assert!(parse(b"SF:a.py\nDA:x,1\n").is_err());
        assert!(parse(b"SF:a.py\nDA:1,2,abc,extra\n").is_err());
    }

    #[test]
    fn test_parse_lcov_unknown_tag() {
        let err = parse(b"SF:a.py\nBOGUS:1\n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }
}
