use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::CalibratedMetric;
use crate::util::write_json_pretty;

pub const DEFAULT_PROFILE: &str = "dev";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct P0Thresholds {
    pub pii_hits_max: u64,
    pub license_violations_max: u64,
    pub evidence_missing_rate_max: f64,
    pub hallucination_rate_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarnFail {
    pub warn: f64,
    pub fail: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct P1Thresholds {
    pub cost_per_item: WarnFail,
    pub latency_p95_ms: WarnFail,
    pub failure_rate: WarnFail,
}

/// `coverage_rate` and `quality_score` are lower-is-worse: `warn` sits above `fail`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct P2Thresholds {
    pub duplication_rate: WarnFail,
    pub coverage_rate: WarnFail,
    pub quality_score: WarnFail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub p0: P0Thresholds,
    pub p1: P1Thresholds,
    pub p2: P2Thresholds,
}

impl ThresholdSet {
    pub fn pair(&self, metric: CalibratedMetric) -> WarnFail {
        match metric {
            CalibratedMetric::CostPerItem => self.p1.cost_per_item,
            CalibratedMetric::LatencyP95Ms => self.p1.latency_p95_ms,
            CalibratedMetric::FailureRate => self.p1.failure_rate,
            CalibratedMetric::DuplicationRate => self.p2.duplication_rate,
            CalibratedMetric::CoverageRate => self.p2.coverage_rate,
            CalibratedMetric::QualityScore => self.p2.quality_score,
        }
    }

    pub fn set_pair(&mut self, metric: CalibratedMetric, pair: WarnFail) {
        let slot = match metric {
            CalibratedMetric::CostPerItem => &mut self.p1.cost_per_item,
            CalibratedMetric::LatencyP95Ms => &mut self.p1.latency_p95_ms,
            CalibratedMetric::FailureRate => &mut self.p1.failure_rate,
            CalibratedMetric::DuplicationRate => &mut self.p2.duplication_rate,
            CalibratedMetric::CoverageRate => &mut self.p2.coverage_rate,
            CalibratedMetric::QualityScore => &mut self.p2.quality_score,
        };
        *slot = pair;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoCalibrationConfig {
    pub enabled: bool,
    pub lookback_runs: usize,
    pub percentile_warn: f64,
    pub percentile_fail: f64,
    pub drift_guard_max_delta: f64,
}

impl Default for AutoCalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lookback_runs: 20,
            percentile_warn: 75.0,
            percentile_fail: 95.0,
            drift_guard_max_delta: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub thresholds: ThresholdSet,
    #[serde(default)]
    pub autocalibration: AutoCalibrationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfigDocument {
    pub profiles: BTreeMap<String, ProfileConfig>,
}

impl Default for ThresholdConfigDocument {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        for name in ["dev", "stage", "prod"] {
            if let Some(profile) = builtin_profile(name) {
                profiles.insert(name.to_string(), profile);
            }
        }
        Self { profiles }
    }
}

pub fn builtin_profile(name: &str) -> Option<ProfileConfig> {
    let p0 = P0Thresholds {
        pii_hits_max: 0,
        license_violations_max: 0,
        evidence_missing_rate_max: 0.2,
        hallucination_rate_max: 0.1,
    };

    let thresholds = match name {
        "dev" => ThresholdSet {
            p0,
            p1: P1Thresholds {
                cost_per_item: WarnFail { warn: 0.08, fail: 0.15 },
                latency_p95_ms: WarnFail { warn: 8000.0, fail: 15000.0 },
                failure_rate: WarnFail { warn: 0.15, fail: 0.30 },
            },
            p2: P2Thresholds {
                duplication_rate: WarnFail { warn: 0.10, fail: 0.20 },
                coverage_rate: WarnFail { warn: 0.70, fail: 0.50 },
                quality_score: WarnFail { warn: 0.60, fail: 0.40 },
            },
        },
        "stage" => ThresholdSet {
            p0: P0Thresholds {
                evidence_missing_rate_max: 0.15,
                hallucination_rate_max: 0.08,
                ..p0
            },
            p1: P1Thresholds {
                cost_per_item: WarnFail { warn: 0.06, fail: 0.12 },
                latency_p95_ms: WarnFail { warn: 6000.0, fail: 12000.0 },
                failure_rate: WarnFail { warn: 0.10, fail: 0.20 },
            },
            p2: P2Thresholds {
                duplication_rate: WarnFail { warn: 0.08, fail: 0.15 },
                coverage_rate: WarnFail { warn: 0.75, fail: 0.60 },
                quality_score: WarnFail { warn: 0.65, fail: 0.50 },
            },
        },
        "prod" => ThresholdSet {
            p0: P0Thresholds {
                evidence_missing_rate_max: 0.10,
                hallucination_rate_max: 0.05,
                ..p0
            },
            p1: P1Thresholds {
                cost_per_item: WarnFail { warn: 0.05, fail: 0.10 },
                latency_p95_ms: WarnFail { warn: 5000.0, fail: 10000.0 },
                failure_rate: WarnFail { warn: 0.05, fail: 0.10 },
            },
            p2: P2Thresholds {
                duplication_rate: WarnFail { warn: 0.05, fail: 0.10 },
                coverage_rate: WarnFail { warn: 0.80, fail: 0.70 },
                quality_score: WarnFail { warn: 0.70, fail: 0.60 },
            },
        },
        _ => return None,
    };

    Some(ProfileConfig {
        thresholds,
        autocalibration: AutoCalibrationConfig::default(),
    })
}

pub fn load_threshold_config(path: Option<&Path>) -> Result<ThresholdConfigDocument> {
    let Some(path) = path else {
        return Ok(ThresholdConfigDocument::default());
    };

    if !path.exists() {
        warn!(path = %path.display(), "threshold config missing; using built-in profiles");
        return Ok(ThresholdConfigDocument::default());
    }

    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let document: ThresholdConfigDocument = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    info!(
        path = %path.display(),
        profiles = document.profiles.len(),
        "loaded threshold config"
    );
    Ok(document)
}

pub fn resolve_profile(document: &ThresholdConfigDocument, profile: &str) -> Result<ProfileConfig> {
    let profile = profile.trim();
    if let Some(config) = document.profiles.get(profile) {
        return Ok(config.clone());
    }
    if let Some(config) = builtin_profile(profile) {
        warn!(profile, "profile not in threshold config; using built-in defaults");
        return Ok(config);
    }
    bail!("unknown threshold profile: {profile}")
}

pub fn save_profile_thresholds(
    path: &Path,
    document: &ThresholdConfigDocument,
    profile: &str,
    thresholds: &ThresholdSet,
) -> Result<()> {
    let mut updated = document.clone();
    let entry = match updated.profiles.get_mut(profile) {
        Some(entry) => entry,
        None => {
            let fallback = builtin_profile(profile)
                .with_context(|| format!("unknown threshold profile: {profile}"))?;
            updated.profiles.entry(profile.to_string()).or_insert(fallback)
        }
    };
    entry.thresholds = thresholds.clone();

    write_json_pretty(path, &updated)?;
    info!(path = %path.display(), profile, "persisted calibrated thresholds");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profiles_cover_dev_stage_prod() {
        let document = ThresholdConfigDocument::default();
        let names = document.profiles.keys().cloned().collect::<Vec<String>>();
        assert_eq!(names, vec!["dev", "prod", "stage"]);
        assert!(builtin_profile("qa").is_none());
    }

    #[test]
    fn lower_is_worse_pairs_keep_warn_above_fail() {
        for name in ["dev", "stage", "prod"] {
            let profile = builtin_profile(name).expect("builtin profile should exist");
            let coverage = profile.thresholds.p2.coverage_rate;
            let quality = profile.thresholds.p2.quality_score;
            assert!(coverage.warn > coverage.fail, "{name} coverage pair inverted");
            assert!(quality.warn > quality.fail, "{name} quality pair inverted");
        }
    }

    #[test]
    fn set_pair_targets_only_the_named_metric() {
        let mut thresholds = builtin_profile("dev")
            .expect("dev profile should exist")
            .thresholds;
        let before = thresholds.clone();
        thresholds.set_pair(
            CalibratedMetric::LatencyP95Ms,
            WarnFail { warn: 1.0, fail: 2.0 },
        );

        assert_eq!(thresholds.p1.latency_p95_ms, WarnFail { warn: 1.0, fail: 2.0 });
        assert_eq!(thresholds.p1.cost_per_item, before.p1.cost_per_item);
        assert_eq!(thresholds.p2, before.p2);
        assert_eq!(thresholds.p0, before.p0);
    }

    #[test]
    fn missing_config_file_falls_back_to_builtins() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let document = load_threshold_config(Some(&dir.path().join("absent.json")))
            .expect("missing file should not error");
        assert_eq!(document, ThresholdConfigDocument::default());
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("thresholds.json");
        fs::write(&path, "{ not json").expect("fixture should be written");

        let error = load_threshold_config(Some(&path)).expect_err("malformed config should fail");
        assert!(error.to_string().contains("failed to parse"), "unexpected error: {error}");
    }

    #[test]
    fn save_profile_round_trips_through_load() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("thresholds.json");
        let document = ThresholdConfigDocument::default();
        let mut thresholds = resolve_profile(&document, "stage")
            .expect("stage profile should resolve")
            .thresholds;
        thresholds.p1.cost_per_item = WarnFail { warn: 0.07, fail: 0.11 };

        save_profile_thresholds(&path, &document, "stage", &thresholds)
            .expect("profile should persist");
        let reloaded = load_threshold_config(Some(&path)).expect("config should reload");

        assert_eq!(reloaded.profiles["stage"].thresholds, thresholds);
        assert_eq!(reloaded.profiles["dev"], document.profiles["dev"]);
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let document = ThresholdConfigDocument::default();
        assert!(resolve_profile(&document, "nightly").is_err());
    }
}
