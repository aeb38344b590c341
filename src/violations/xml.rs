/// Drivers for Java tools that write XML reports: checkstyle, FindBugs and
/// PMD.
///
/// checkstyle:
///   <checkstyle><file name="..."><error line=".." severity=".." message=".."/></file></checkstyle>
///
/// FindBugs (every line from `start` to `end` of the bug's own SourceLine):
///   <BugCollection>
///     <BugInstance category="..">
///       <ShortMessage>..</ShortMessage>
///       <Class><SourceLine .../></Class>
///       <SourceLine start=".." end=".." sourcepath=".."/>
///     </BugInstance>
///   </BugCollection>
///
/// PMD:
///   <pmd><file name="..."><violation beginline=".." rule="..">text</violation></file></pmd>
///
/// FindBugs and PMD analyse build output, so they are never run live.
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use super::{QualityDriver, Violation, ViolationMap};
use crate::command::run_for_code;
use crate::error::Result;
use crate::parsers::{get_attr, parse_attr, required_attr, xml_err, xml_reader};
use crate::paths;

/// Longest line range a single FindBugs instance is expanded to.
const MAX_BUG_SPAN: u32 = 10_000;

const CHECKSTYLE_MAIN: &str = "com.puppycrawl.tools.checkstyle.Main";

pub struct CheckstyleXmlDriver;

impl QualityDriver for CheckstyleXmlDriver {
    fn name(&self) -> &str {
        "checkstylexml"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["java"]
    }

    fn command(&self) -> Vec<String> {
        ["java", CHECKSTYLE_MAIN, "-c", "/google_checks.xml", "-f", "xml"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn parse_reports(&self, reports: &[String]) -> Result<ViolationMap> {
        let mut out = ViolationMap::new();
        for report in reports {
            let mut reader = xml_reader(report.as_bytes());
            let mut buf = Vec::new();
            let mut current_file: Option<String> = None;
            loop {
                let event = reader.read_event_into(&mut buf);
                match event {
                    Err(e) => return Err(xml_err(e, &reader)),
                    Ok(Event::Eof) => break,
                    Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                        b"file" => {
                            current_file = get_attr(e, b"name").map(|n| paths::to_unix_path(&n));
                        }
                        b"error" => {
                            if let Some(file) = &current_file {
                                let line: u32 = required_attr(e, b"line")?;
                                let message = format!(
                                    "{}: {}",
                                    get_attr(e, b"severity").unwrap_or_default(),
                                    get_attr(e, b"message").unwrap_or_default()
                                );
                                out.entry(file.clone())
                                    .or_default()
                                    .push(Violation::new(line, message));
                            }
                        }
                        _ => {}
                    },
                    Ok(Event::End(ref e)) if e.name().as_ref() == b"file" => {
                        current_file = None;
                    }
                    _ => {}
                }
                buf.clear();
            }
        }
        Ok(out)
    }

    fn installed(&self) -> bool {
        run_for_code("java", &[CHECKSTYLE_MAIN, "-version"]) == Some(0)
    }
}

pub struct FindbugsDriver;

/// State for the `<BugInstance>` being read.
#[derive(Default)]
struct Bug {
    category: String,
    short_message: String,
    /// `(start, end, sourcepath)` of the first direct-child SourceLine.
    source: Option<(Option<u32>, Option<u32>, String)>,
    /// Element nesting below `<BugInstance>`.
    depth: usize,
    in_short_message: bool,
}

impl Bug {
    fn source_line(&mut self, e: &BytesStart) {
        if self.depth == 1 && self.source.is_none() {
            self.source = Some((
                parse_attr(e, b"start"),
                parse_attr(e, b"end"),
                get_attr(e, b"sourcepath").unwrap_or_default(),
            ));
        }
    }

    fn finish(self, out: &mut ViolationMap) {
        let Some((Some(start), Some(end), path)) = self.source else {
            return;
        };
        if end < start {
            debug!(%path, start, end, "skipping bug with an inverted line range");
            return;
        }
        let end = end.min(start.saturating_add(MAX_BUG_SPAN - 1));
        let message = format!("{}: {}", self.category, self.short_message);
        let record = out.entry(paths::to_unix_path(&path)).or_default();
        for line in start..=end {
            record.push(Violation::new(line, message.clone()));
        }
    }
}

impl QualityDriver for FindbugsDriver {
    fn name(&self) -> &str {
        "findbugs"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["java"]
    }

    fn command(&self) -> Vec<String> {
        vec!["false".to_string()]
    }

    fn parse_reports(&self, reports: &[String]) -> Result<ViolationMap> {
        let mut out = ViolationMap::new();
        for report in reports {
            let mut reader = xml_reader(report.as_bytes());
            let mut buf = Vec::new();
            let mut bug: Option<Bug> = None;
            loop {
                let event = reader.read_event_into(&mut buf);
                match event {
                    Err(e) => return Err(xml_err(e, &reader)),
                    Ok(Event::Eof) => break,
                    Ok(Event::Start(ref e)) => {
                        if let Some(b) = bug.as_mut() {
                            b.depth += 1;
                            match e.name().as_ref() {
                                b"ShortMessage" if b.depth == 1 => b.in_short_message = true,
                                b"SourceLine" => b.source_line(e),
                                _ => {}
                            }
                        } else if e.name().as_ref() == b"BugInstance" {
                            bug = Some(Bug {
                                category: get_attr(e, b"category").unwrap_or_default(),
                                ..Default::default()
                            });
                        }
                    }
                    Ok(Event::Empty(ref e)) => {
                        if let Some(b) = bug.as_mut() {
                            if e.name().as_ref() == b"SourceLine" {
                                b.depth += 1;
                                b.source_line(e);
                                b.depth -= 1;
                            }
                        }
                    }
                    Ok(Event::Text(ref t)) => {
                        if let Some(b) = bug.as_mut().filter(|b| b.in_short_message) {
                            if let Ok(text) = t.unescape() {
                                b.short_message.push_str(text.trim());
                            }
                        }
                    }
                    Ok(Event::End(ref e)) => {
                        if let Some(b) = bug.as_mut() {
                            if b.depth == 0 && e.name().as_ref() == b"BugInstance" {
                                if let Some(done) = bug.take() {
                                    done.finish(&mut out);
                                }
                            } else {
                                b.in_short_message = false;
                                b.depth = b.depth.saturating_sub(1);
                            }
                        }
                    }
                    _ => {}
                }
                buf.clear();
            }
        }
        Ok(out)
    }

    fn installed(&self) -> bool {
        false
    }
}

pub struct PmdDriver;

impl QualityDriver for PmdDriver {
    fn name(&self) -> &str {
        "pmd"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["java"]
    }

    fn command(&self) -> Vec<String> {
        Vec::new()
    }

    fn parse_reports(&self, reports: &[String]) -> Result<ViolationMap> {
        let mut out = ViolationMap::new();
        for report in reports {
            let mut reader = xml_reader(report.as_bytes());
            let mut buf = Vec::new();
            let mut current_file: Option<String> = None;
            // (beginline, rule, text) of the open <violation>
            let mut open: Option<(u32, String, String)> = None;
            loop {
                let event = reader.read_event_into(&mut buf);
                match event {
                    Err(e) => return Err(xml_err(e, &reader)),
                    Ok(Event::Eof) => break,
                    Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                        b"file" => {
                            current_file = get_attr(e, b"name").map(|n| paths::to_unix_path(&n));
                        }
                        b"violation" if current_file.is_some() => {
                            let line: u32 = required_attr(e, b"beginline")?;
                            open = Some((line, get_attr(e, b"rule").unwrap_or_default(), String::new()));
                        }
                        _ => {}
                    },
                    Ok(Event::Text(ref t)) => {
                        if let Some((_, _, text)) = open.as_mut() {
                            if let Ok(unescaped) = t.unescape() {
                                text.push_str(&unescaped);
                            }
                        }
                    }
                    Ok(Event::End(ref e)) => match e.name().as_ref() {
                        b"violation" => {
                            if let (Some(file), Some((line, rule, text))) = (&current_file, open.take()) {
                                out.entry(file.clone())
                                    .or_default()
                                    .push(Violation::new(line, format!("{rule}: {}", text.trim())));
                            }
                        }
                        b"file" => current_file = None,
                        _ => {}
                    },
                    _ => {}
                }
                buf.clear();
            }
            // A self-closing <violation/> never gets an End event.
            if let (Some(file), Some((line, rule, text))) = (&current_file, open.take()) {
                out.entry(file.clone())
                    .or_default()
                    .push(Violation::new(line, format!("{rule}: {}", text.trim())));
            }
        }
        Ok(out)
    }

    fn installed(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(map: &ViolationMap, path: &str) -> Vec<(u32, String)> {
        map[path]
            .iter()
            .map(|v| (v.line, v.message.clone().unwrap_or_default()))
            .collect()
    }

    #[test]
    fn test_checkstyle_xml() {
        let report = r#"<?xml version="1.0" encoding="UTF-8"?>
<checkstyle version="8.0">
  <file name="src/main/java/Foo.java">
    <error line="1" severity="error" message="Missing docstring" source="x"/>
    <error line="2" column="4" severity="warning" message="Unused &apos;x&apos;" source="y"/>
  </file>
  <file name="src/main/java/Empty.java"/>
</checkstyle>"#;
        let map = CheckstyleXmlDriver.parse_reports(&[report.to_string()]).unwrap();
        assert_eq!(
            messages(&map, "src/main/java/Foo.java"),
            vec![
                (1, "error: Missing docstring".to_string()),
                (2, "warning: Unused 'x'".to_string()),
            ]
        );
        assert!(!map.contains_key("src/main/java/Empty.java"));
    }

    #[test]
    fn test_checkstyle_xml_malformed() {
        let err = CheckstyleXmlDriver
            .parse_reports(&["<checkstyle><file name=\"a\"></checkstyle>".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("position"), "{err}");
    }

    #[test]
    fn test_findbugs() {
        let report = r#"<BugCollection>
  <BugInstance type="DM_DEFAULT_ENCODING" category="I18N" priority="1">
    <ShortMessage>Reliance on default encoding</ShortMessage>
    <LongMessage>Found reliance on default encoding</LongMessage>
    <Class classname="com.example.Foo">
      <SourceLine classname="com.example.Foo" start="1" end="40" sourcepath="com/example/Foo.java"/>
    </Class>
    <SourceLine classname="com.example.Foo" start="10" end="12" sourcepath="com/example/Foo.java"/>
  </BugInstance>
  <BugInstance category="STYLE">
    <ShortMessage>No lines</ShortMessage>
    <SourceLine classname="com.example.Bar" sourcepath="com/example/Bar.java"/>
  </BugInstance>
</BugCollection>"#;
        let map = FindbugsDriver.parse_reports(&[report.to_string()]).unwrap();
        let got = messages(&map, "com/example/Foo.java");
        assert_eq!(got.len(), 3);
        assert_eq!(got[0], (10, "I18N: Reliance on default encoding".to_string()));
        assert_eq!(got[2].0, 12);
        assert!(!map.contains_key("com/example/Bar.java"));
        assert!(!FindbugsDriver.installed());
    }

    #[test]
    fn test_findbugs_line_ranges_are_bounded() {
        let report = r#"<BugCollection>
  <BugInstance category="STYLE">
    <ShortMessage>Whole class</ShortMessage>
    <SourceLine start="1" end="4000000000" sourcepath="Big.java"/>
  </BugInstance>
  <BugInstance category="STYLE">
    <ShortMessage>Backwards</ShortMessage>
    <SourceLine start="9" end="3" sourcepath="Odd.java"/>
  </BugInstance>
</BugCollection>"#;
        let map = FindbugsDriver.parse_reports(&[report.to_string()]).unwrap();
        assert_eq!(map["Big.java"].len(), MAX_BUG_SPAN as usize);
        assert_eq!(map["Big.java"].lines().last(), Some(&MAX_BUG_SPAN));
        assert!(!map.contains_key("Odd.java"));
    }

    #[test]
    fn test_pmd() {
        let report = r#"<?xml version="1.0" encoding="UTF-8"?>
<pmd version="6.0">
  <file name="src/main/java/Foo.java">
    <violation beginline="3" endline="3" rule="UnusedLocalVariable" priority="3">
      Avoid unused local variables such as 'x'.
    </violation>
    <violation beginline="9" rule="EmptyCatchBlock">Avoid empty catch blocks</violation>
  </file>
</pmd>"#;
        let map = PmdDriver.parse_reports(&[report.to_string()]).unwrap();
        assert_eq!(
            messages(&map, "src/main/java/Foo.java"),
            vec![
                (
                    3,
                    "UnusedLocalVariable: Avoid unused local variables such as 'x'.".to_string()
                ),
                (9, "EmptyCatchBlock: Avoid empty catch blocks".to_string()),
            ]
        );
        assert!(!PmdDriver.installed());
    }
}
