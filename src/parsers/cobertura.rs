/// Parser for Cobertura XML coverage reports (coverage.py, gcovr, istanbul's
/// cobertura reporter, ...).
///
/// Cobertura XML structure:
///   <coverage>
///     <sources><source>...</source></sources>
///     <packages>
///       <package name="...">
///         <classes>
///           <class name="..." filename="..." line-rate="..." branch-rate="...">
///             <methods>
///               <method name="..."><lines><line number="..." hits="..."/></lines></method>
///             </methods>
///             <lines>
///               <line number="..." hits="..." branch="true|false"
///                     condition-coverage="50% (1/2)" />
///             </lines>
///           </class>
///         </classes>
///       </package>
///     </packages>
///   </coverage>
use std::collections::HashMap;
use std::sync::LazyLock;

use quick_xml::events::Event;
use regex::Regex;

use super::{get_attr, parse_attr, required_attr, CoverageParser};
use crate::detect::Format;
use crate::error::Result;
use crate::model::*;
use crate::paths;

/// Condition-coverage attributes look like "75% (3/4)".
static BRANCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d+)/(\d+)\)").expect("static regex"));

pub struct CoberturaParser;

impl CoverageParser for CoberturaParser {
    fn format(&self) -> Format {
        Format::Cobertura
    }

    fn parse(&self, input: &[u8]) -> Result<CoverageData> {
        parse(input)
    }
}

/// Parse Cobertura XML coverage data from raw bytes.
pub fn parse(input: &[u8]) -> Result<CoverageData> {
    let mut reader = super::xml_reader(input);

    let mut data = CoverageData::new();
    let mut buf = Vec::new();

    let mut current_file: Option<FileCoverage> = None;
    let mut branch_lines: HashMap<u32, ()> = HashMap::new();
    let mut line_index_map: HashMap<u32, usize> = HashMap::new();

    let mut sources: Vec<String> = Vec::new();
    let mut in_source = false;

    loop {
        let event = reader.read_event_into(&mut buf);
        let is_start_event = matches!(&event, Ok(Event::Start(_)));
        match event {
            Err(e) => return Err(super::xml_err(e, &reader)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"source" => {
                    // A self-closing <source/> has no text and no End event.
                    in_source = is_start_event;
                }
                b"class" => {
                    if let Some(filename) = get_attr(e, b"filename") {
                        let file = FileCoverage::new(filename);
                        if is_start_event {
                            current_file = Some(file);
                            branch_lines.clear();
                            line_index_map.clear();
                        } else {
                            push_class(&mut data, file, &sources);
                        }
                    }
                }
                b"line" => {
                    if let Some(file) = current_file.as_mut() {
                        let line_number: u32 = required_attr(e, b"number")?;
                        let hit_count: u64 = parse_attr(e, b"hits").unwrap_or(0);

                        // Lines may appear under both <method><lines> and
                        // <class><lines>; keep one entry with the max hits.
                        if let Some(&idx) = line_index_map.get(&line_number) {
                            let existing = &mut file.lines[idx];
                            existing.hit_count = existing.hit_count.max(hit_count);
                        } else {
                            line_index_map.insert(line_number, file.lines.len());
                            file.lines.push(LineCoverage {
                                line_number,
                                hit_count,
                            });
                        }

                        let is_branch = get_attr(e, b"branch").is_some_and(|v| v == "true");
                        if is_branch && !branch_lines.contains_key(&line_number) {
                            if let Some((covered, total)) =
                                get_attr(e, b"condition-coverage").and_then(|c| condition(&c))
                            {
                                branch_lines.insert(line_number, ());
                                // Only the number of arms taken is known, so
                                // the first `covered` arms are marked hit.
                                for i in 0..total {
                                    file.branches.push(BranchCoverage {
                                        line_number,
                                        branch_index: i,
                                        hit_count: u64::from(i < covered),
                                    });
                                }
                            }
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_source {
                    if let Ok(text) = e.unescape() {
                        let text = text.trim();
                        if !text.is_empty() {
                            sources.push(text.to_string());
                        }
                    }
                    in_source = false;
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"source" => in_source = false,
                b"class" => {
                    if let Some(file) = current_file.take() {
                        push_class(&mut data, file, &sources);
                    }
                }
                _ => {}
            },
            _ => {}
        }
        buf.clear();
    }

    if let Some(file) = current_file.take() {
        push_class(&mut data, file, &sources);
    }

    Ok(data)
}

/// Record a finished `<class>` under every path its filename may refer to:
/// joined with each `<source>` root, and as written.
fn push_class(data: &mut CoverageData, mut file: FileCoverage, sources: &[String]) {
    file.lines.sort_by_key(|l| l.line_number);
    let filename = file.path.clone();
    let mut candidates: Vec<String> = sources
        .iter()
        .map(|source| paths::join(source, &filename))
        .collect();
    if !candidates.contains(&filename) {
        candidates.push(filename);
    }

    let last = candidates.len() - 1;
    for (i, path) in candidates.into_iter().enumerate() {
        if i == last {
            file.path = path;
            data.files.push(file);
            break;
        }
        let mut alias = file.clone();
        alias.path = path;
        data.files.push(alias);
    }
}

/// `(covered, total)` from a condition-coverage attribute.
fn condition(attr: &str) -> Option<(u32, u32)> {
    let caps = BRANCH_RE.captures(attr)?;
    let covered = caps[1].parse().ok()?;
    let total = caps[2].parse().ok()?;
    Some((covered, total))
}
