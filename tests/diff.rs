mod common;

use diffcov::cli::cmd_cover;
use diffcov::diff::{parse_diff, DiffSource, FileStatus};
use diffcov::threshold::Outcome;

/// End-to-end: a diff adding lines 5-10 of src/a.py against a Cobertura
/// report where 8 and 10 were never executed.
#[test]
fn diff_coverage_end_to_end() {
    let source = common::diff_fixture("modified_file.diff");
    let report = common::fixture("coverage.xml");
    let result = cmd_cover(&common::config(), &source, &[report], None).unwrap();

    let a = &result.stats.src_stats["src/a.py"];
    assert_eq!(a.total_num_lines, 6);
    assert_eq!(a.violation_lines, vec![8, 10]);
    assert_eq!(format!("{:.1}", a.percent_covered), "66.7");

    let util = &result.stats.src_stats["src/util.py"];
    assert_eq!(util.total_num_lines, 2);
    assert!(util.violation_lines.is_empty());

    // 6 of 8 changed and measured lines were executed.
    assert_eq!(result.stats.totals.total_num_lines, 8);
    assert_eq!(result.stats.totals.total_num_violations, 2);
    assert!((result.stats.totals.total_percent_covered - 75.0).abs() < 1e-9);
    assert_eq!(result.outcome, Outcome::Pass);
}

#[test]
fn fail_under_80_with_75_percent_fails() {
    let source = common::diff_fixture("modified_file.diff");
    let report = common::fixture("coverage.xml");
    let mut config = common::config();
    config.fail_under = 80.0;
    let result = cmd_cover(&config, &source, &[report.clone()], None).unwrap();
    assert_eq!(result.outcome, Outcome::Fail);

    config.fail_under = 75.0;
    let result = cmd_cover(&config, &source, &[report], None).unwrap();
    assert_eq!(result.outcome, Outcome::Pass);
}

#[test]
fn rename_only_diff_is_excluded() {
    let source = common::diff_fixture("renamed_file.diff");
    let layers = source.fetch_layers().unwrap();
    let changed = parse_diff(&layers[0].text).unwrap();
    let change = changed.get("src/new_name.py").unwrap();
    assert_eq!(change.status, FileStatus::Renamed);
    assert!(change.added.is_empty());

    let (_dir, report) = common::temp_file(
        "lcov.info",
        "SF:src/new_name.py\nDA:1,0\nDA:2,0\nend_of_record\n",
    );
    let result = cmd_cover(&common::config(), &source, &[report], None).unwrap();
    assert!(result.stats.is_empty());
    assert_eq!(result.stats.totals.total_num_lines, 0);
    assert_eq!(result.stats.totals.total_percent_covered, 100.0);
    let text = result.render(&diffcov::report::TextFormatter, false);
    assert!(text.contains("No lines with coverage information in this diff."));
}

#[test]
fn deleted_file_is_out_of_scope() {
    let source = common::diff_fixture("deleted_file.diff");
    let layers = source.fetch_layers().unwrap();
    let changed = parse_diff(&layers[0].text).unwrap();
    assert_eq!(changed.get("src/gone.py").unwrap().status, FileStatus::Deleted);
    assert_eq!(changed.in_scope_paths().count(), 0);
    assert_eq!(changed.num_changed_lines(), 0);
}

#[test]
fn malformed_diff_names_the_line() {
    let (_dir, path) = common::temp_file(
        "bad.diff",
        "diff --git a/x.py b/x.py\n--- a/x.py\n+++ b/x.py\n@@ -1,1 +1,zz @@\n+x\n",
    );
    let source = diffcov::diff::DiffFile { path };
    let (_dir2, report) = common::temp_file("lcov.info", "SF:x.py\nDA:1,1\nend_of_record\n");
    let err = cmd_cover(&common::config(), &source, &[report], None).unwrap_err();
    assert!(err.to_string().contains("line 4"), "{err}");
}
