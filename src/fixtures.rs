use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::model::SessionReport;

pub fn clean_session() -> SessionReport {
    SessionReport {
        session_id: "sess-001".to_string(),
        run_id: "run-001".to_string(),
        target: "faq".to_string(),
        profile: "dev".to_string(),
        mode: "online".to_string(),
        dry_run: true,
        offline_mode: false,
        budget_usd: 10.0,
        cost_usd: 2.0,
        duration_ms: 60_000.0,
        p50_ms: 900.0,
        p95_ms: 2500.0,
        cases_total: 40,
        cases_passed: 38,
        pass_rate: 95.0,
        mean_score: 8.0,
        result: "PASS".to_string(),
        run_state: "COMPLETED".to_string(),
        timestamp: "2026-10-01T00:00:00Z".to_string(),
    }
}

pub fn session_document(report: &SessionReport) -> String {
    format!("# Session report\n\n{}\nGenerated for review.\n", report.to_block())
}

pub fn baseline_lines(summary: &serde_json::Value, items: usize) -> String {
    let mut out = summary.to_string();
    out.push('\n');
    for index in 1..items {
        out.push_str(&format!("{{\"id\":\"item-{index}\"}}\n"));
    }
    out
}

pub fn clean_baseline_summary() -> serde_json::Value {
    serde_json::json!({
        "duplication_metrics": {"duplication_rate": 0.02},
        "evidence_metrics": {"presence_rate": 0.95, "alignment_mean": 0.85},
        "hallucination_metrics": {"hallucination_rate": 0.01},
        "pii_license_metrics": {"pii_hits": 0, "license_violations": 0},
        "coverage_metrics": {"coverage_rate": 0.9}
    })
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("fixture directory should be created");
    }
    fs::write(&path, contents).expect("fixture should be written");
    path
}

pub fn set_age(path: &Path, now: SystemTime, age: Duration) {
    let file = File::options()
        .write(true)
        .open(path)
        .expect("fixture should reopen");
    file.set_modified(now - age)
        .expect("fixture mtime should be set");
}
