/// Parser for JaCoCo XML coverage reports.
///
/// JaCoCo XML structure:
///   <report name="...">
///     <sessioninfo id="..." start="..." dump="..."/>
///     <package name="com/example">
///       <class name="com/example/Foo" sourcefilename="Foo.java">
///         <method name="doStuff" desc="()V" line="10">...</method>
///       </class>
///       <sourcefile name="Foo.java">
///         <line nr="10" mi="0" ci="3" mb="0" cb="2"/>
///         <line nr="11" mi="0" ci="5" mb="1" cb="1"/>
///         <counter type="LINE" missed="1" covered="5"/>
///       </sourcefile>
///     </package>
///   </report>
///
/// Line-level data lives inside `<sourcefile>`. Each `<line>` has `nr`,
/// `mi`/`ci` (missed/covered instructions) and `mb`/`cb` (missed/covered
/// branches). A line is covered when `ci > 0`.
///
/// Paths are `package/sourcefile`, relative to a source root such as
/// `src/main/java`; `MergedCoverage` resolves them against the configured
/// roots.
use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};

use super::{get_attr, parse_attr, required_attr, CoverageParser};
use crate::detect::Format;
use crate::error::Result;
use crate::model::*;

/// JaCoCo XML format parser.
pub struct JacocoParser;

impl CoverageParser for JacocoParser {
    fn format(&self) -> Format {
        Format::Jacoco
    }

    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        parse(input)
    }
}

/// Parse JaCoCo XML coverage data from raw bytes.
pub fn parse(input: &[u8]) -> Result<CoverageData> {
    let mut xml = super::xml_reader(input);
    let mut data = CoverageData::new();
    let mut buf = Vec::new();

    let mut current_package: Option<String> = None;
    let mut current_sourcefile: Option<FileCoverage> = None;
    let mut branch_indices: HashMap<u32, u32> = HashMap::new();

    loop {
        let event = xml.read_event_into(&mut buf);
        let is_start_event = matches!(&event, Ok(Event::Start(_)));
        match event {
            Err(e) => return Err(super::xml_err(e, &xml)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"package" if is_start_event => {
                    current_package = get_attr(e, b"name");
                }
                b"sourcefile" => {
                    if let Some(name) = get_attr(e, b"name") {
                        let path = match current_package.as_deref() {
                            Some(pkg) if !pkg.is_empty() => format!("{pkg}/{name}"),
                            _ => name,
                        };
                        let file = FileCoverage::new(path);
                        if is_start_event {
                            current_sourcefile = Some(file);
                            branch_indices.clear();
                        } else {
                            data.files.push(file);
                        }
                    }
                }
                b"line" => {
                    if let Some(file) = current_sourcefile.as_mut() {
                        record_line(file, e, &mut branch_indices)?;
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"package" => {
                    current_package = None;
                }
                b"sourcefile" => {
                    if let Some(mut file) = current_sourcefile.take() {
                        file.lines.sort_by_key(|l| l.line_number);
                        data.files.push(file);
                    }
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    // Unclosed <sourcefile>
    if let Some(mut file) = current_sourcefile.take() {
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
    let line_number: u32 = required_attr(e, b"nr")?;
    let ci: u64 = parse_attr(e, b"ci").unwrap_or(0);
    let cb: u32 = parse_attr(e, b"cb").unwrap_or(0);
    let mb: u32 = parse_attr(e, b"mb").unwrap_or(0);

    file.lines.push(LineCoverage {
        line_number,
        hit_count: ci,
    });

    let idx = branch_indices.entry(line_number).or_insert(0);
    for i in 0..cb.saturating_add(mb) {
        file.branches.push(BranchCoverage {
            line_number,
            branch_index: *idx,
            hit_count: u64::from(i < cb),
        });
        *idx += 1;
    }
    Ok(())
}
