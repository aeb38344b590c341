/// Parser for Clover XML coverage reports.
///
/// Clover XML structure (as produced by OpenClover, Atlassian Clover, and
/// various plugins like `jest --coverageReporters=clover`, PHPUnit, etc.):
///
///   <coverage generated="..." clover="4.x.x">
///     <project timestamp="..." name="...">
///       <metrics .../>
///       <package name="...">
///         <file name="Foo.py" path="/absolute/path/to/Foo.py">
///           <class name="Foo"><metrics .../></class>
///           <line num="1" count="5" type="stmt"/>
///           <line num="3" count="2" type="method" signature="do_stuff()"/>
///           <line num="5" count="1" type="cond" truecount="1" falsecount="1"/>
///         </file>
///       </package>
///     </project>
///   </coverage>
///
/// Only `stmt` and `cond` lines are measured. `method` lines mark a
/// function's signature and say nothing about whether its body ran.
///
/// `<file>` has a `path` attribute with the absolute path and a `name`
/// attribute with just the filename. We prefer `path` when available.
use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};

use super::{get_attr, parse_attr, required_attr, CoverageParser};
use crate::detect::Format;
use crate::error::Result;
use crate::model::*;

/// Clover XML format parser.
pub struct CloverParser;

impl CoverageParser for CloverParser {
    fn format(&self) -> Format {
        Format::Clover
    }

    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        parse(input)
    }
}

/// Parse Clover XML coverage data from raw bytes.
pub fn parse(input: &[u8]) -> Result<CoverageData> {
    let mut xml = super::xml_reader(input);
    let mut data = CoverageData::new();
    let mut buf = Vec::new();

    let mut current_file: Option<FileCoverage> = None;
    let mut branch_indices: HashMap<u32, u32> = HashMap::new();

    loop {
        let event = xml.read_event_into(&mut buf);
        let is_empty_event = matches!(&event, Ok(Event::Empty(_)));
        match event {
            Err(e) => return Err(super::xml_err(e, &xml)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"file" => {
                    let file_path = get_attr(e, b"path")
                        .or_else(|| get_attr(e, b"name"))
                        .unwrap_or_default();
                    let file = FileCoverage::new(file_path);
                    if is_empty_event {
                        data.files.push(file);
                    } else {
                        current_file = Some(file);
                        branch_indices.clear();
                    }
                }
                b"line" => {
                    if let Some(file) = current_file.as_mut() {
                        record_line(file, e, &mut branch_indices)?;
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"file" {
                    if let Some(mut file) = current_file.take() {
                        file.lines.sort_by_key(|l| l.line_number);
                        data.files.push(file);
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    // Unclosed <file>
    if let Some(mut file) = current_file.take() {
        file.lines.sort_by_key(|l| l.line_number);
        data.files.push(file);
    }

    Ok(data)
}

fn record_line(
    file: &mut FileCoverage,
    e: &BytesStart,
    branch_indices: &mut HashMap<u32, u32>,
) -> Result<()> {
    let line_type = get_attr(e, b"type").unwrap_or_default();
    if line_type != "stmt" && line_type != "cond" {
        return Ok(());
    }

    let line_number: u32 = required_attr(e, b"num")?;
    let hit_count: u64 = parse_attr(e, b"count").unwrap_or(0);
    file.lines.push(LineCoverage {
        line_number,
        hit_count,
    });

    // A cond line has max(truecount, falsecount) conditions, each with a
    // true arm and a false arm.
    if line_type == "cond" {
        let tc: u32 = parse_attr(e, b"truecount").unwrap_or(0);
        let fc: u32 = parse_attr(e, b"falsecount").unwrap_or(0);
        let idx = branch_indices.entry(line_number).or_insert(0);
        for i in 0..tc.max(fc) {
            for taken in [i < tc, i < fc] {
                file.branches.push(BranchCoverage {
                    line_number,
                    branch_index: *idx,
                    hit_count: u64::from(taken),
                });
                *idx += 1;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<coverage generated="1700000000" clover="4.4.1">
  <project timestamp="1700000000" name="demo">
    <metrics statements="7" coveredstatements="5"/>
    <package name="src">
      <file name="main.py" path="/home/user/project/src/main.py">
        <class name="Main"><metrics statements="5"/></class>
        <line num="1" count="1" type="stmt"/>
        <line num="2" count="1" type="stmt"/>
        <line num="3" count="0" type="stmt"/>
        <line num="5" count="3" type="method" signature="do_stuff()"/>
        <line num="6" count="3" type="stmt"/>
        <line num="8" count="2" type="cond" truecount="1" falsecount="1"/>
      </file>
      <file name="util.py" path="/home/user/project/src/util.py">
        <line num="1" count="1" type="stmt"/>
        <line num="2" count="0" type="stmt"/>
      </file>
    </package>
  </project>
</coverage>"#;

    #[test]
    fn test_parse_clover() {
        let data = parse(SAMPLE).unwrap();
        assert_eq!(data.files.len(), 2);

        let main = &data.files[0];
        assert_eq!(main.path, "/home/user/project/src/main.py");
        // The method line is not measured.
        let numbers: Vec<u32> = main.lines.iter().map(|l| l.line_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 6, 8]);
        assert_eq!(main.lines[2].hit_count, 0);

        // 1 condition × 2 arms, both taken
        assert_eq!(main.branches.len(), 2);
        assert!(main.branches.iter().all(|b| b.line_number == 8 && b.hit_count == 1));

        let util = &data.files[1];
        assert_eq!(util.path, "/home/user/project/src/util.py");
        assert_eq!(util.lines.len(), 2);
        assert!(util.branches.is_empty());
    }

    #[test]
    fn test_parse_clover_empty() {
        let input = br#"<?xml version="1.0"?><coverage clover="4.4.1"><project name="x"/></coverage>"#;
        let data = parse(input).unwrap();
        assert!(data.files.is_empty());
    }

    #[test]
    fn test_parse_clover_malformed() {
        let input = br#"<coverage clover="4.4.1"><project><file name="a.py"></project>"#;
        let err = parse(input).unwrap_err();
        assert!(err.to_string().contains("position"), "{err}");
    }

    #[test]
    fn test_parse_clover_no_path_attr() {
        let input = br#"<coverage generated="123" clover="4.4.1">
  <project name="test">
    <package name="pkg">
      <file name="app.py">
        <line num="1" count="1" type="stmt"/>
      </file>
    </package>
  </project>
</coverage>"#;
        let data = parse(input).unwrap();
        assert_eq!(data.files.len(), 1);
        assert_eq!(data.files[0].path, "app.py");
    }

    #[test]
    fn test_parse_clover_branch_partially_covered() {
        let input = br#"<coverage clover="4.4.1"><project><package>
      <file name="branch.py" path="/src/branch.py">
        <line num="5" count="2" type="cond" truecount="1" falsecount="0"/>
      </file>
    </package></project></coverage>"#;
        let data = parse(input).unwrap();
        let file = &data.files[0];
        assert_eq!(file.lines[0].hit_count, 2);
        assert_eq!(file.branches.len(), 2);
        assert_eq!(file.branches[0].hit_count, 1);
        assert_eq!(file.branches[1].hit_count, 0);
    }

    #[test]
    fn test_parse_clover_bad_num() {
        let input = br#"<coverage clover="4"><project><file path="a.py">
            <line num="-1" count="0" type="stmt"/></file></project></coverage>"#;
        assert!(parse(input).is_err());
    }
}
