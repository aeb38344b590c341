use diffcov::parsers::lcov::LcovParser;
use diffcov::parsers::CoverageParser;

#[test]
fn parse_fixture() {
    let data = LcovParser.parse(include_bytes!("fixtures/lcov.info")).unwrap();
    assert_eq!(data.files.len(), 1);

    let record = data.files[0].to_record();
    assert_eq!(data.files[0].path, "src/util.py");
    assert_eq!(record.measured.len(), 4);
    assert!(record.is_covered(2));
    assert!(!record.is_covered(3));
    // "-" means the arm was never taken.
    assert_eq!(record.branches[&3].total, 2);
    assert_eq!(record.branches[&3].covered, 1);
}

#[test]
fn repeated_da_lines_are_summed() {
    let lcov = b"SF:a.rs\nDA:1,0\nDA:1,2\nDA:2,0\nend_of_record\n";
    let data = LcovParser.parse(lcov).unwrap();
    let lines = &data.files[0].lines;
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].hit_count, 2);
    assert_eq!(lines[1].hit_count, 0);
}

#[test]
fn missing_end_of_record_keeps_last_file() {
    let lcov = b"SF:a.rs\nDA:1,1\nend_of_record\nSF:b.rs\nDA:3,1\n";
    let data = LcovParser.parse(lcov).unwrap();
    assert_eq!(data.files.len(), 2);
    assert_eq!(data.files[1].path, "b.rs");
}

#[test]
fn da_outside_record_is_an_error() {
    let err = LcovParser.parse(b"TN:x\nDA:1,1\n").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("line 2"), "{msg}");
    assert!(msg.contains("no source file"), "{msg}");
}

#[test]
fn unknown_tag_is_an_error() {
    let err = LcovParser
        .parse(b"SF:a.rs\nDA:1,1\nXYZ:oops\nend_of_record\n")
        .unwrap_err();
    assert!(err.to_string().contains("line 3"), "{err}");
}

#[test]
fn malformed_da_is_an_error() {
    assert!(LcovParser.parse(b"SF:a.rs\nDA:one,1\n").is_err());
    assert!(LcovParser.parse(b"SF:a.rs\nDA:1\n").is_err());
}
