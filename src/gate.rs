use tracing::info;

use crate::model::{ConsistencyResult, GateStatus, GateVerdict, MetricsSnapshot};
use crate::signals::{Anomaly, AnomalySeverity, Recommendation, RecommendationSeverity};
use crate::thresholds::{ThresholdSet, WarnFail};

const P1_FAIL_MARKER: &str = "P1 FAIL";
const P1_WARN_MARKER: &str = "P1 WARN";
const P2_FAIL_MARKER: &str = "P2 FAIL";
const P2_WARN_MARKER: &str = "P2 WARN";

const P1_FAIL_TOLERANCE: usize = 2;
const P1_WARN_TOLERANCE: usize = 3;
const P2_FAIL_TOLERANCE: usize = 1;
const P2_WARN_TOLERANCE: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct GateInputs<'a> {
    pub snapshot: &'a MetricsSnapshot,
    pub thresholds: &'a ThresholdSet,
    pub anomalies: &'a [Anomaly],
    pub recommendations: &'a [Recommendation],
    pub consistency: &'a ConsistencyResult,
}

pub fn evaluate_gate(inputs: GateInputs<'_>) -> GateVerdict {
    let p0_violations = collect_p0_violations(&inputs);
    let p1_warnings = collect_p1_warnings(&inputs);
    let p2_issues = collect_p2_issues(&inputs);

    let (status, reason) = decide(&inputs, &p0_violations, &p1_warnings, &p2_issues);
    let verdict = GateVerdict::new(status, p0_violations, p1_warnings, p2_issues, reason);

    info!(
        status = %verdict.status,
        p0 = verdict.p0_violations.len(),
        p1 = verdict.p1_warnings.len(),
        p2 = verdict.p2_issues.len(),
        can_proceed = verdict.can_proceed,
        reason = %verdict.reason,
        "gate verdict"
    );
    verdict
}

pub fn fail_safe_verdict(cause: &str) -> GateVerdict {
    GateVerdict::new(
        GateStatus::Fail,
        vec![format!("Threshold configuration unavailable: {cause}")],
        Vec::new(),
        Vec::new(),
        "Fail-safe FAIL: thresholds could not be loaded".to_string(),
    )
}

fn decide(
    inputs: &GateInputs<'_>,
    p0_violations: &[String],
    p1_warnings: &[String],
    p2_issues: &[String],
) -> (GateStatus, String) {
    if !p0_violations.is_empty() {
        let count = p0_violations.len();
        let noun = if count == 1 { "violation" } else { "violations" };
        return (
            GateStatus::Fail,
            format!("{count} P0 {noun} block the run"),
        );
    }

    if let Some(critical) = inputs
        .recommendations
        .iter()
        .find(|value| value.severity == RecommendationSeverity::Critical)
    {
        return (
            GateStatus::Fail,
            format!(
                "Critical recommendation: {} (trigger: {})",
                critical.action, critical.trigger
            ),
        );
    }

    let p1_fail = count_marker(p1_warnings, P1_FAIL_MARKER);
    let p1_warn = count_marker(p1_warnings, P1_WARN_MARKER);
    if p1_fail > P1_FAIL_TOLERANCE {
        return (
            GateStatus::Fail,
            format!("{p1_fail} P1 FAIL conditions exceed tolerance (max {P1_FAIL_TOLERANCE})"),
        );
    }
    if p1_fail > 0 || p1_warn > P1_WARN_TOLERANCE {
        return (
            GateStatus::Partial,
            format!(
                "{p1_fail} P1 FAIL and {p1_warn} P1 WARN conditions; proceed with a partial run"
            ),
        );
    }

    let p2_fail = count_marker(p2_issues, P2_FAIL_MARKER);
    let p2_warn = count_marker(p2_issues, P2_WARN_MARKER);
    if p2_fail > P2_FAIL_TOLERANCE || p2_warn > P2_WARN_TOLERANCE {
        return (
            GateStatus::Warn,
            format!("{p2_fail} P2 FAIL and {p2_warn} P2 WARN quality issues exceed tolerance"),
        );
    }

    if p1_warn > 0 || p2_warn > 0 {
        return (
            GateStatus::Warn,
            format!(
                "Minor issues, within tolerance: {p1_warn} P1 WARN, {p2_warn} P2 WARN"
            ),
        );
    }

    (GateStatus::Pass, "All gates passed".to_string())
}

fn count_marker(entries: &[String], marker: &str) -> usize {
    entries
        .iter()
        .filter(|entry| entry.starts_with(marker))
        .count()
}

fn collect_p0_violations(inputs: &GateInputs<'_>) -> Vec<String> {
    let p0 = &inputs.thresholds.p0;
    let snapshot = inputs.snapshot;
    let mut violations = Vec::new();

    if snapshot.pii_license.pii_hits > p0.pii_hits_max {
        violations.push(format!(
            "PII hits {} exceed max {}",
            snapshot.pii_license.pii_hits, p0.pii_hits_max
        ));
    }
    if snapshot.pii_license.license_violations > p0.license_violations_max {
        violations.push(format!(
            "License violations {} exceed max {}",
            snapshot.pii_license.license_violations, p0.license_violations_max
        ));
    }

    let evidence_missing = 1.0 - snapshot.evidence.presence_rate;
    if evidence_missing > p0.evidence_missing_rate_max {
        violations.push(format!(
            "Evidence missing rate {evidence_missing:.3} exceeds max {:.3}",
            p0.evidence_missing_rate_max
        ));
    }
    if snapshot.hallucination.rate > p0.hallucination_rate_max {
        violations.push(format!(
            "Hallucination rate {:.3} exceeds max {:.3}",
            snapshot.hallucination.rate, p0.hallucination_rate_max
        ));
    }

    for anomaly in inputs
        .anomalies
        .iter()
        .filter(|anomaly| anomaly.severity == AnomalySeverity::High)
    {
        violations.push(format!("High-severity anomaly: {}", anomaly.description));
    }

    if !inputs.consistency.session_exists {
        violations.push("Invalid run state: session report missing".to_string());
    } else if !inputs.consistency.valid {
        violations.push(format!(
            "Invalid run state: CASES_TOTAL={}",
            inputs.consistency.cases_total
        ));
    }

    violations
}

fn collect_p1_warnings(inputs: &GateInputs<'_>) -> Vec<String> {
    let p1 = &inputs.thresholds.p1;
    let snapshot = inputs.snapshot;
    let mut warnings = Vec::new();

    for (name, value, pair) in [
        ("cost_per_item", snapshot.cost_latency.cost_per_item, p1.cost_per_item),
        ("latency_p95_ms", snapshot.cost_latency.latency_p95_ms, p1.latency_p95_ms),
        ("failure_rate", snapshot.failure_retry.failure_rate, p1.failure_rate),
    ] {
        if let Some(entry) = grade_higher_is_worse("P1", name, value, pair) {
            warnings.push(entry);
        }
    }

    for anomaly in inputs
        .anomalies
        .iter()
        .filter(|anomaly| anomaly.severity != AnomalySeverity::High)
    {
        warnings.push(format!("{P1_WARN_MARKER}: {}", anomaly.description));
    }

    for issue in inputs.consistency.non_fatal_issues() {
        warnings.push(format!("{P1_WARN_MARKER}: consistency: {issue}"));
    }

    warnings
}

fn collect_p2_issues(inputs: &GateInputs<'_>) -> Vec<String> {
    let p2 = &inputs.thresholds.p2;
    let snapshot = inputs.snapshot;
    let mut issues = Vec::new();

    if let Some(entry) = grade_higher_is_worse(
        "P2",
        "duplication_rate",
        snapshot.duplication.rate,
        p2.duplication_rate,
    ) {
        issues.push(entry);
    }

    for (name, value, pair) in [
        ("coverage_rate", snapshot.coverage.rate, p2.coverage_rate),
        ("quality_score", snapshot.evidence.alignment_mean, p2.quality_score),
    ] {
        if let Some(entry) = grade_lower_is_worse("P2", name, value, pair) {
            issues.push(entry);
        }
    }

    issues
}

fn grade_higher_is_worse(tier: &str, name: &str, value: f64, pair: WarnFail) -> Option<String> {
    if value > pair.fail {
        Some(format!(
            "{tier} FAIL: {name} {} > fail threshold {}",
            fmt_metric(name, value),
            fmt_metric(name, pair.fail)
        ))
    } else if value > pair.warn {
        Some(format!(
            "{tier} WARN: {name} {} > warn threshold {}",
            fmt_metric(name, value),
            fmt_metric(name, pair.warn)
        ))
    } else {
        None
    }
}

fn grade_lower_is_worse(tier: &str, name: &str, value: f64, pair: WarnFail) -> Option<String> {
    if value < pair.fail {
        Some(format!(
            "{tier} FAIL: {name} {} < fail threshold {}",
            fmt_metric(name, value),
            fmt_metric(name, pair.fail)
        ))
    } else if value < pair.warn {
        Some(format!(
            "{tier} WARN: {name} {} < warn threshold {}",
            fmt_metric(name, value),
            fmt_metric(name, pair.warn)
        ))
    } else {
        None
    }
}

fn fmt_metric(name: &str, value: f64) -> String {
    if name.ends_with("_ms") {
        format!("{value:.0}ms")
    } else {
        format!("{value:.3}")
    }
}
