use crate::util::{EPSILON, mean};

pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|left, right| left.total_cmp(right));

    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        return Some(sorted[lower]);
    }

    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

pub const DRIFT_RECENT_WINDOW: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftAssessment {
    pub recent_mean: f64,
    pub older_mean: f64,
    pub relative_change: f64,
    pub threshold_change: f64,
    pub detected: bool,
}

/// `values` must be ordered most-recent-first.
pub fn assess_drift(values: &[f64], current_warn: f64, max_delta: f64) -> Option<DriftAssessment> {
    let split = DRIFT_RECENT_WINDOW.min(values.len());
    let (recent, older) = values.split_at(split);
    if older.is_empty() {
        return None;
    }

    let recent_mean = mean(recent);
    let older_mean = mean(older);
    let relative_change = (recent_mean - older_mean).abs() / older_mean.max(EPSILON);
    let threshold_change = (recent_mean - current_warn).abs() / current_warn.max(EPSILON);

    let windows_differ = recent != older;
    let detected = windows_differ
        && (relative_change > max_delta || threshold_change > 2.0 * max_delta);

    Some(DriftAssessment {
        recent_mean,
        older_mean,
        relative_change,
        threshold_change,
        detected,
    })
}
