use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::artifacts::collect_artifacts;
use crate::calibration::propose_calibration;
use crate::cli::{GateArgs, archive_dir, failure_queue_dir};
use crate::consistency::{probe_environment, validate_consistency};
use crate::gate::{GateInputs, evaluate_gate, fail_safe_verdict};
use crate::history::load_history;
use crate::metrics::synthesize_metrics;
use crate::model::{
    ArtifactCollection, CalibrationProposal, ConsistencyResult, ExpectedRunConfig, GateStatus,
    GateVerdict, MetricsSnapshot,
};
use crate::signals::{
    ActionRecommender, Anomaly, AnomalyDetector, HistoryAnomalyDetector, Recommendation,
    RuleTableRecommender,
};
use crate::thresholds::{ProfileConfig, ThresholdSet, load_threshold_config, resolve_profile};
use crate::util::{now_utc_string, write_json_pretty};

const REPORT_FILE_NAME: &str = "gate_report.json";

#[derive(Debug, Serialize)]
struct GateReport {
    generated_at: String,
    profile: String,
    reports_root: PathBuf,
    artifacts: Option<ArtifactCollection>,
    consistency: Option<ConsistencyResult>,
    metrics: Option<MetricsSnapshot>,
    thresholds: Option<ThresholdSet>,
    anomalies: Vec<Anomaly>,
    recommendations: Vec<Recommendation>,
    calibration_proposals: Vec<CalibrationProposal>,
    verdict: GateVerdict,
}

pub fn run(args: GateArgs) -> Result<GateStatus> {
    let report_path = args
        .report_path
        .clone()
        .unwrap_or_else(|| args.reports_root.join(REPORT_FILE_NAME));

    info!(
        reports_root = %args.reports_root.display(),
        profile = %args.profile,
        "gate evaluation requested"
    );

    let profile = match load_threshold_config(args.config.as_deref())
        .and_then(|document| resolve_profile(&document, &args.profile))
    {
        Ok(profile) => profile,
        Err(err) => {
            let cause = format!("{err:#}");
            error!(error = %cause, "threshold configuration unavailable; failing safe");
            let report = GateReport {
                generated_at: now_utc_string(),
                profile: args.profile.clone(),
                reports_root: args.reports_root.clone(),
                artifacts: None,
                consistency: None,
                metrics: None,
                thresholds: None,
                anomalies: Vec::new(),
                recommendations: Vec::new(),
                calibration_proposals: Vec::new(),
                verdict: fail_safe_verdict(&cause),
            };
            return finish(&report_path, report);
        }
    };

    let report = evaluate_run(&args, profile);
    finish(&report_path, report)
}

fn evaluate_run(args: &GateArgs, profile: ProfileConfig) -> GateReport {
    let failure_queue = failure_queue_dir(&args.reports_root, args.failure_queue.as_ref());
    let archive = archive_dir(&args.reports_root, args.archive.as_ref());

    let artifacts = collect_artifacts(&args.reports_root);

    let expected = ExpectedRunConfig {
        dry_run: args.expect_dry_run,
        mode: args.expect_mode.clone(),
        result: args.expect_result.clone(),
        max_report_age_hours: args.max_age_hours,
        required_env: args.required_env.clone(),
    };
    let environment = probe_environment(
        &args.reports_root,
        &failure_queue,
        &args.required_env,
        |name| std::env::var(name).ok(),
    );
    let consistency = validate_consistency(&artifacts, &expected, &environment);
    let snapshot = synthesize_metrics(&artifacts, &failure_queue);

    let history = load_history(&archive, profile.autocalibration.lookback_runs);
    let calibration_proposals = if profile.autocalibration.enabled {
        propose_calibration(
            &history,
            &profile.thresholds,
            &profile.autocalibration,
            Some(args.profile.trim()),
        )
    } else {
        info!(profile = %args.profile, "autocalibration disabled for profile");
        Vec::new()
    };

    let detector = HistoryAnomalyDetector::new(history);
    let recommender = RuleTableRecommender::new(profile.thresholds.p0.clone());
    let (anomalies, recommendations) = gather_signals(&detector, &recommender, &snapshot);

    let verdict = evaluate_gate(GateInputs {
        snapshot: &snapshot,
        thresholds: &profile.thresholds,
        anomalies: &anomalies,
        recommendations: &recommendations,
        consistency: &consistency,
    });

    GateReport {
        generated_at: now_utc_string(),
        profile: args.profile.trim().to_string(),
        reports_root: args.reports_root.clone(),
        artifacts: Some(artifacts),
        consistency: Some(consistency),
        metrics: Some(snapshot),
        thresholds: Some(profile.thresholds),
        anomalies,
        recommendations,
        calibration_proposals,
        verdict,
    }
}

fn gather_signals(
    detector: &dyn AnomalyDetector,
    recommender: &dyn ActionRecommender,
    snapshot: &MetricsSnapshot,
) -> (Vec<Anomaly>, Vec<Recommendation>) {
    let anomalies = detector.detect(snapshot);
    let recommendations = recommender.recommend(snapshot, &anomalies);
    (anomalies, recommendations)
}

fn finish(report_path: &Path, report: GateReport) -> Result<GateStatus> {
    let verdict = &report.verdict;
    for violation in &verdict.p0_violations {
        error!(violation = %violation, "P0");
    }
    for warning in &verdict.p1_warnings {
        warn!(warning = %warning, "P1");
    }
    for issue in &verdict.p2_issues {
        info!(issue = %issue, "P2");
    }

    write_json_pretty(report_path, &report)?;
    info!(
        path = %report_path.display(),
        status = %verdict.status,
        can_proceed = verdict.can_proceed,
        reason = %verdict.reason,
        "wrote gate report"
    );
    Ok(verdict.status)
}
