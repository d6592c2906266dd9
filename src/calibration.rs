use serde::Serialize;
use tracing::{info, warn};

use crate::model::{CalibratedMetric, CalibrationProposal, HistoricalRunSample};
use crate::stats::{assess_drift, percentile};
use crate::thresholds::{AutoCalibrationConfig, ThresholdSet, WarnFail};
use crate::util::{EPSILON, round_to};

pub const MIN_TOTAL_SAMPLES: usize = 5;
pub const MIN_PROFILE_SAMPLES: usize = 3;
pub const MIN_METRIC_VALUES: usize = 3;

pub fn propose_calibration(
    samples: &[HistoricalRunSample],
    thresholds: &ThresholdSet,
    config: &AutoCalibrationConfig,
    profile: Option<&str>,
) -> Vec<CalibrationProposal> {
    if samples.len() < MIN_TOTAL_SAMPLES {
        info!(
            samples = samples.len(),
            required = MIN_TOTAL_SAMPLES,
            "insufficient history for calibration"
        );
        return Vec::new();
    }

    let profile = profile.map(str::trim).filter(|value| !value.is_empty());
    let matched = samples
        .iter()
        .filter(|sample| profile.is_none_or(|wanted| sample.profile.eq_ignore_ascii_case(wanted)))
        .collect::<Vec<&HistoricalRunSample>>();
    if matched.len() < MIN_PROFILE_SAMPLES {
        info!(
            profile = profile.unwrap_or("*"),
            matched = matched.len(),
            required = MIN_PROFILE_SAMPLES,
            "insufficient profile-matched history for calibration"
        );
        return Vec::new();
    }

    let mut proposals = Vec::new();
    for metric in CalibratedMetric::ALL {
        let values = matched
            .iter()
            .map(|sample| metric.sample_value(sample))
            .filter(|value| metric.is_usable(*value))
            .collect::<Vec<f64>>();
        if values.len() < MIN_METRIC_VALUES {
            info!(metric = metric.as_str(), values = values.len(), "skipping metric with too few values");
            continue;
        }

        if let Some(proposal) = propose_metric(metric, &values, thresholds.pair(metric), config) {
            proposals.push(proposal);
        }
    }

    info!(proposals = proposals.len(), "calibration proposals computed");
    proposals
}

fn propose_metric(
    metric: CalibratedMetric,
    values: &[f64],
    current: WarnFail,
    config: &AutoCalibrationConfig,
) -> Option<CalibrationProposal> {
    let (warn_p, fail_p) = if metric.lower_is_worse() {
        (100.0 - config.percentile_warn, 100.0 - config.percentile_fail)
    } else {
        (config.percentile_warn, config.percentile_fail)
    };

    let decimals = metric.decimals();
    let suggested_warn = round_to(percentile(values, warn_p)?, decimals);
    let suggested_fail = round_to(percentile(values, fail_p)?, decimals);

    let drift = assess_drift(values, current.warn, config.drift_guard_max_delta);
    let drift_detected = drift.is_some_and(|value| value.detected);
    let confidence = (values.len() as f64 / config.lookback_runs.max(1) as f64).min(1.0);

    let mut reason = format!(
        "p{warn_p:.0}/p{fail_p:.0} over {} runs: warn {} -> {}, fail {} -> {}",
        values.len(),
        format_value(current.warn, decimals),
        format_value(suggested_warn, decimals),
        format_value(current.fail, decimals),
        format_value(suggested_fail, decimals),
    );
    if let Some(drift) = drift.filter(|value| value.detected) {
        reason.push_str(&format!(
            "; drift detected (recent mean {}, older mean {}, change {:.1}%, {:.1}% from warn)",
            format_value(drift.recent_mean, decimals.max(3)),
            format_value(drift.older_mean, decimals.max(3)),
            drift.relative_change * 100.0,
            drift.threshold_change * 100.0
        ));
    }

    Some(CalibrationProposal {
        metric,
        current_warn: current.warn,
        current_fail: current.fail,
        suggested_warn,
        suggested_fail,
        confidence,
        sample_count: values.len(),
        drift_detected,
        reason,
    })
}

fn format_value(value: f64, decimals: u32) -> String {
    format!("{value:.prec$}", prec = decimals as usize)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationOutcome {
    pub thresholds: ThresholdSet,
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

pub fn apply_calibration(
    proposals: &[CalibrationProposal],
    thresholds: &ThresholdSet,
    max_delta: f64,
    drift_guard: bool,
) -> CalibrationOutcome {
    let mut updated = thresholds.clone();
    let mut applied = Vec::new();
    let mut skipped = Vec::new();

    for proposal in proposals {
        let metric = proposal.metric;
        let current = thresholds.pair(metric);
        let decimals = metric.decimals();

        if drift_guard && proposal.drift_detected {
            let delta = (proposal.suggested_warn - current.warn).abs() / current.warn.max(EPSILON);
            if delta > max_delta {
                warn!(
                    metric = metric.as_str(),
                    delta,
                    max_delta,
                    "drift guard rejected calibration"
                );
                skipped.push(format!(
                    "{metric}: drift guard kept warn {} (suggested {}, delta {:.1}% > {:.1}%)",
                    format_value(current.warn, decimals),
                    format_value(proposal.suggested_warn, decimals),
                    delta * 100.0,
                    max_delta * 100.0
                ));
                continue;
            }
        }

        updated.set_pair(
            metric,
            WarnFail {
                warn: proposal.suggested_warn,
                fail: proposal.suggested_fail,
            },
        );
        applied.push(format!(
            "{metric}: warn {} -> {}, fail {} -> {}",
            format_value(current.warn, decimals),
            format_value(proposal.suggested_warn, decimals),
            format_value(current.fail, decimals),
            format_value(proposal.suggested_fail, decimals),
        ));
    }

    info!(
        applied = applied.len(),
        skipped = skipped.len(),
        drift_guard,
        "calibration applied"
    );

    CalibrationOutcome {
        thresholds: updated,
        applied,
        skipped,
    }
}
