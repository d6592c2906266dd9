use std::path::Path;

use tracing::info;

use crate::failure_queue::{FailureQueueScan, scan_failure_queue};
use crate::model::{
    ArtifactCollection, CostLatencyMetrics, CoverageMetrics, DuplicationMetrics, EvidenceMetrics,
    FailureRetryMetrics, HallucinationMetrics, MetricsSnapshot, PiiLicenseMetrics,
};

pub fn synthesize_metrics(artifacts: &ArtifactCollection, failure_queue: &Path) -> MetricsSnapshot {
    let scan = scan_failure_queue(failure_queue);
    let snapshot = build_snapshot(artifacts, &scan);

    info!(
        cost_per_item = snapshot.cost_latency.cost_per_item,
        latency_p95_ms = snapshot.cost_latency.latency_p95_ms,
        failure_rate = snapshot.failure_retry.failure_rate,
        retries = snapshot.failure_retry.retry_count,
        "synthesized metrics snapshot"
    );
    snapshot
}

pub fn build_snapshot(artifacts: &ArtifactCollection, scan: &FailureQueueScan) -> MetricsSnapshot {
    let baseline = artifacts.baseline_report();
    let session = artifacts.session_report();
    let panel = artifacts.panel_analysis();

    let duplication = DuplicationMetrics {
        rate: baseline.map(|value| value.duplication_rate).unwrap_or(0.0),
    };
    // Older baselines have no coverage block; evidence presence is the closest proxy.
    let coverage = CoverageMetrics {
        rate: baseline
            .map(|value| value.coverage_rate.unwrap_or(value.evidence_presence_rate))
            .unwrap_or(0.0),
    };
    let evidence = EvidenceMetrics {
        presence_rate: baseline.map(|value| value.evidence_presence_rate).unwrap_or(0.0),
        alignment_mean: baseline.map(|value| value.evidence_alignment_mean).unwrap_or(0.0),
    };
    let hallucination = HallucinationMetrics {
        rate: baseline.map(|value| value.hallucination_rate).unwrap_or(0.0),
    };
    let pii_license = PiiLicenseMetrics {
        pii_hits: baseline.map(|value| value.pii_hits).unwrap_or(0),
        license_violations: baseline.map(|value| value.license_violations).unwrap_or(0),
    };

    let cost_usd = session
        .map(|value| value.cost_usd)
        .or_else(|| panel.map(|value| value.total_cost_usd))
        .unwrap_or(0.0);
    let budget_usd = session.map(|value| value.budget_usd).unwrap_or(0.0);
    let cost_per_item = match (session, panel) {
        (Some(session), _) => session.cost_per_item(),
        (None, Some(panel)) => panel.cost_per_case,
        (None, None) => 0.0,
    };
    let cost_latency = CostLatencyMetrics {
        cost_usd,
        budget_usd,
        cost_per_item,
        budget_utilization: (cost_usd / budget_usd.max(1.0)).min(1.0),
        latency_p50_ms: prefer_positive(
            session.map(|value| value.p50_ms),
            panel.map(|value| value.latency_p50_ms),
        ),
        latency_p95_ms: prefer_positive(
            session.map(|value| value.p95_ms),
            panel.map(|value| value.latency_p95_ms),
        ),
    };

    let failure_rate = match (session, panel) {
        (Some(session), _) => 1.0 - session.pass_ratio(),
        (None, Some(panel)) if panel.total_cases > 0 => {
            1.0 - panel.passed_cases as f64 / panel.total_cases as f64
        }
        _ => 0.0,
    };
    let failure_retry = FailureRetryMetrics {
        failure_rate: failure_rate.clamp(0.0, 1.0),
        dlq_entries_scanned: scan.entries_scanned,
        retry_count: scan.retry_count,
        error_classes: scan.error_classes.clone(),
    };

    MetricsSnapshot {
        duplication,
        coverage,
        evidence,
        hallucination,
        pii_license,
        cost_latency,
        failure_retry,
    }
}

fn prefer_positive(primary: Option<f64>, fallback: Option<f64>) -> f64 {
    primary
        .filter(|value| *value > 0.0)
        .or(fallback)
        .unwrap_or(0.0)
}
