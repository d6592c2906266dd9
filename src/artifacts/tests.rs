use std::time::{Duration, SystemTime};

use super::*;
use crate::consistency::{EnvironmentFacts, validate_consistency};
use crate::fixtures::{
    baseline_lines, clean_baseline_summary, clean_session, session_document, set_age, write_file,
};
use crate::model::ExpectedRunConfig;

#[test]
fn collect_artifacts_picks_latest_by_modification_time() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let now = SystemTime::now();

    let mut older = clean_session();
    older.session_id = "older".to_string();
    let mut newer = clean_session();
    newer.session_id = "newer".to_string();

    // Lexical order disagrees with mtime order on purpose.
    let older_path = write_file(dir.path(), "session_report_b.md", &session_document(&older));
    let newer_path = write_file(dir.path(), "session_report_a.md", &session_document(&newer));
    set_age(&older_path, now, Duration::from_secs(7200));
    set_age(&newer_path, now, Duration::from_secs(60));

    let collection = collect_artifacts_at(dir.path(), now);
    let session = collection.session.expect("session should be collected");
    assert_eq!(session.artifact.session_id, "newer");
    assert!(session.source.age_hours < 0.1);
    assert!(session.source.sha256.is_some());
}

#[test]
fn equal_mtimes_resolve_to_lexically_greatest_path() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let now = SystemTime::now();

    let mut first = clean_session();
    first.session_id = "alpha".to_string();
    let mut second = clean_session();
    second.session_id = "omega".to_string();

    let first_path = write_file(dir.path(), "session_report_1.md", &session_document(&first));
    let second_path = write_file(dir.path(), "session_report_2.md", &session_document(&second));
    set_age(&first_path, now, Duration::from_secs(600));
    set_age(&second_path, now, Duration::from_secs(600));

    for _ in 0..3 {
        let collection = collect_artifacts_at(dir.path(), now);
        let session = collection.session_report().expect("session should be collected");
        assert_eq!(session.session_id, "omega");
    }
}

#[test]
fn unparsable_artifacts_become_absent() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    write_file(dir.path(), "session_report.md", "no fenced block here\n");
    write_file(dir.path(), "baseline_report.jsonl", "{broken\n");
    write_file(dir.path(), "panel_analysis.json", "[");

    let collection = collect_artifacts(dir.path());
    assert!(collection.session.is_none());
    assert!(collection.baseline.is_none());
    assert!(collection.panel.is_none());

    let kinds = collection
        .parse_errors
        .iter()
        .map(|failure| failure.kind.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(kinds, vec!["SESSION_REPORT", "BASELINE_REPORT", "PANEL_ANALYSIS"]);
}

#[test]
fn corrupt_side_artifacts_surface_as_consistency_issues() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    write_file(dir.path(), "session_report.md", &session_document(&clean_session()));
    write_file(dir.path(), "baseline_report.jsonl", "{not json");
    write_file(dir.path(), "panel_analysis.json", "[1, 2");

    let collection = collect_artifacts(dir.path());
    assert!(collection.session.is_some());
    assert_eq!(collection.parse_errors.len(), 2);

    let expected = ExpectedRunConfig {
        dry_run: true,
        mode: "online".to_string(),
        result: None,
        max_report_age_hours: 24.0,
        required_env: Vec::new(),
    };
    let environment = EnvironmentFacts {
        reports_root_exists: true,
        ..EnvironmentFacts::default()
    };
    let result = validate_consistency(&collection, &expected, &environment);

    assert!(result.passed);
    assert!(!result.baseline_exists && !result.panel_exists);
    let soft = result.non_fatal_issues().collect::<Vec<&String>>();
    assert_eq!(soft.len(), 2, "unexpected issues: {:?}", result.issues);
    assert!(soft[0].starts_with("BASELINE_REPORT unparsable"));
    assert!(soft[1].starts_with("PANEL_ANALYSIS unparsable"));
}

#[test]
fn missing_reports_root_yields_empty_collection() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let collection = collect_artifacts(&dir.path().join("does-not-exist"));
    assert!(collection.session.is_none());
    assert!(collection.baseline.is_none());
    assert!(collection.panel.is_none());
}

#[test]
fn each_kind_is_selected_independently() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    write_file(dir.path(), "session_report.md", &session_document(&clean_session()));
    write_file(
        dir.path(),
        "baseline_report_20261001.jsonl",
        &baseline_lines(&clean_baseline_summary(), 40),
    );
    write_file(dir.path(), "notes.md", "```\nSESSION_ID: decoy\n```\n");
    write_file(dir.path(), "archive/session_report.md", "ignored: nested\n");

    let collection = collect_artifacts(dir.path());
    assert_eq!(
        collection.session_report().map(|value| value.session_id.as_str()),
        Some("sess-001")
    );
    assert_eq!(collection.baseline_report().map(|value| value.total_items), Some(40));
    assert!(collection.panel.is_none());
}

#[test]
fn artifact_kind_patterns_require_prefix_and_extension() {
    assert!(ArtifactKind::Session.matches("session_report_2026.md"));
    assert!(!ArtifactKind::Session.matches("session_report.json"));
    assert!(ArtifactKind::Baseline.matches("baseline_report.jsonl"));
    assert!(!ArtifactKind::Baseline.matches("baseline_report.json"));
    assert!(ArtifactKind::Panel.matches("panel_analysis_v2.json"));
    assert!(!ArtifactKind::Panel.matches("panel_analysis.jsonl"));
}
