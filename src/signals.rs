use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::model::{HistoricalRunSample, MetricsSnapshot};
use crate::thresholds::P0Thresholds;
use crate::util::mean;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpikeKind {
    Cost,
    Latency,
    FailureRate,
}

impl SpikeKind {
    pub const ALL: [SpikeKind; 3] = [Self::Cost, Self::Latency, Self::FailureRate];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cost => "cost",
            Self::Latency => "latency",
            Self::FailureRate => "failure_rate",
        }
    }

    fn observed(self, snapshot: &MetricsSnapshot) -> f64 {
        match self {
            Self::Cost => snapshot.cost_latency.cost_per_item,
            Self::Latency => snapshot.cost_latency.latency_p95_ms,
            Self::FailureRate => snapshot.failure_retry.failure_rate,
        }
    }

    fn historical(self, sample: &HistoricalRunSample) -> f64 {
        match self {
            Self::Cost => sample.cost_per_item,
            Self::Latency => sample.latency_p95_ms,
            Self::FailureRate => sample.failure_rate,
        }
    }
}

impl fmt::Display for SpikeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub kind: SpikeKind,
    pub severity: AnomalySeverity,
    pub observed: f64,
    pub baseline: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub severity: RecommendationSeverity,
    pub trigger: String,
    pub action: String,
}

pub trait AnomalyDetector {
    fn detect(&self, snapshot: &MetricsSnapshot) -> Vec<Anomaly>;
}

pub trait ActionRecommender {
    fn recommend(&self, snapshot: &MetricsSnapshot, anomalies: &[Anomaly]) -> Vec<Recommendation>;
}

#[derive(Debug, Clone)]
pub struct HistoryAnomalyDetector {
    history: Vec<HistoricalRunSample>,
    low_factor: f64,
    medium_factor: f64,
    high_factor: f64,
}

impl HistoryAnomalyDetector {
    pub fn new(history: Vec<HistoricalRunSample>) -> Self {
        Self {
            history,
            low_factor: 1.5,
            medium_factor: 2.0,
            high_factor: 3.0,
        }
    }

    fn classify(&self, ratio: f64) -> Option<AnomalySeverity> {
        if ratio > self.high_factor {
            Some(AnomalySeverity::High)
        } else if ratio > self.medium_factor {
            Some(AnomalySeverity::Medium)
        } else if ratio > self.low_factor {
            Some(AnomalySeverity::Low)
        } else {
            None
        }
    }
}

impl AnomalyDetector for HistoryAnomalyDetector {
    fn detect(&self, snapshot: &MetricsSnapshot) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();

        for kind in SpikeKind::ALL {
            let values = self
                .history
                .iter()
                .map(|sample| kind.historical(sample))
                .filter(|value| value.is_finite() && *value > 0.0)
                .collect::<Vec<f64>>();
            if values.is_empty() {
                continue;
            }

            let baseline = mean(&values);
            let observed = kind.observed(snapshot);
            let ratio = observed / baseline;
            let Some(severity) = self.classify(ratio) else {
                continue;
            };

            anomalies.push(Anomaly {
                kind,
                severity,
                observed,
                baseline,
                description: format!(
                    "{kind} spike: {observed:.3} vs historical mean {baseline:.3} ({ratio:.1}x)"
                ),
            });
        }

        debug!(anomalies = anomalies.len(), "anomaly detection complete");
        anomalies
    }
}

#[derive(Debug, Clone)]
pub struct RuleTableRecommender {
    p0: P0Thresholds,
}

impl RuleTableRecommender {
    pub fn new(p0: P0Thresholds) -> Self {
        Self { p0 }
    }
}

fn spike_rule(kind: SpikeKind, severity: AnomalySeverity) -> (RecommendationSeverity, &'static str) {
    use AnomalySeverity as A;
    use RecommendationSeverity as R;
    use SpikeKind as K;

    match (kind, severity) {
        (K::FailureRate, A::High) => (
            R::Critical,
            "halt the full run and triage the failure queue error classes",
        ),
        (K::FailureRate, A::Medium) => (R::High, "re-run failed items from the failure queue before proceeding"),
        (K::FailureRate, A::Low) => (R::Low, "spot-check recent failures for a common error class"),
        (K::Cost, A::High) => (R::High, "cap the batch size or switch to a cheaper model tier"),
        (K::Cost, A::Medium) => (R::Medium, "review prompt length and retry volume driving cost"),
        (K::Cost, A::Low) => (R::Low, "monitor cost per item on the next run"),
        (K::Latency, A::High) => (R::High, "reduce concurrency or raise provider timeouts"),
        (K::Latency, A::Medium) => (R::Medium, "check provider latency and queue depth"),
        (K::Latency, A::Low) => (R::Low, "monitor p95 latency on the next run"),
    }
}

impl ActionRecommender for RuleTableRecommender {
    fn recommend(&self, snapshot: &MetricsSnapshot, anomalies: &[Anomaly]) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        if snapshot.pii_license.pii_hits > self.p0.pii_hits_max {
            recommendations.push(Recommendation {
                severity: RecommendationSeverity::Critical,
                trigger: format!("pii_hits={}", snapshot.pii_license.pii_hits),
                action: "scrub PII from source documents and regenerate affected items".to_string(),
            });
        }
        if snapshot.pii_license.license_violations > self.p0.license_violations_max {
            recommendations.push(Recommendation {
                severity: RecommendationSeverity::Critical,
                trigger: format!(
                    "license_violations={}",
                    snapshot.pii_license.license_violations
                ),
                action: "remove unlicensed sources from the corpus".to_string(),
            });
        }

        for anomaly in anomalies {
            let (severity, action) = spike_rule(anomaly.kind, anomaly.severity);
            recommendations.push(Recommendation {
                severity,
                trigger: anomaly.description.clone(),
                action: action.to_string(),
            });
        }

        recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thresholds::builtin_profile;

    fn sample(cost: f64, latency: f64, failure: f64) -> HistoricalRunSample {
        HistoricalRunSample {
            run_name: "run".to_string(),
            profile: "dev".to_string(),
            timestamp: String::new(),
            cost_per_item: cost,
            latency_p95_ms: latency,
            failure_rate: failure,
            duplication_rate: 0.0,
            coverage_rate: 0.8,
            quality_score: 0.7,
        }
    }

    fn snapshot(cost: f64, latency: f64, failure: f64) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();
        snapshot.cost_latency.cost_per_item = cost;
        snapshot.cost_latency.latency_p95_ms = latency;
        snapshot.failure_retry.failure_rate = failure;
        snapshot
    }

    #[test]
    fn detector_grades_spikes_against_historical_mean() {
        let detector = HistoryAnomalyDetector::new(vec![
            sample(0.04, 2000.0, 0.05),
            sample(0.06, 2000.0, 0.05),
        ]);
        let anomalies = detector.detect(&snapshot(0.11, 3500.0, 0.2));

        assert_eq!(anomalies.len(), 3);
        assert_eq!(anomalies[0].kind, SpikeKind::Cost);
        assert_eq!(anomalies[0].severity, AnomalySeverity::Medium);
        assert_eq!(anomalies[1].kind, SpikeKind::Latency);
        assert_eq!(anomalies[1].severity, AnomalySeverity::Low);
        assert_eq!(anomalies[2].kind, SpikeKind::FailureRate);
        assert_eq!(anomalies[2].severity, AnomalySeverity::High);
        assert!(anomalies[2].description.starts_with("failure_rate spike"));
    }

    #[test]
    fn detector_without_history_reports_nothing() {
        let detector = HistoryAnomalyDetector::new(Vec::new());
        assert!(detector.detect(&snapshot(10.0, 1e6, 1.0)).is_empty());
    }

    #[test]
    fn rule_table_escalates_high_failure_spikes_to_critical() {
        let p0 = builtin_profile("dev")
            .expect("dev profile should exist")
            .thresholds
            .p0;
        let recommender = RuleTableRecommender::new(p0);
        let anomalies = vec![
            Anomaly {
                kind: SpikeKind::FailureRate,
                severity: AnomalySeverity::High,
                observed: 0.4,
                baseline: 0.05,
                description: "failure_rate spike".to_string(),
            },
            Anomaly {
                kind: SpikeKind::Cost,
                severity: AnomalySeverity::Low,
                observed: 0.08,
                baseline: 0.05,
                description: "cost spike".to_string(),
            },
        ];

        let recommendations = recommender.recommend(&MetricsSnapshot::default(), &anomalies);
        let severities = recommendations
            .iter()
            .map(|value| value.severity)
            .collect::<Vec<RecommendationSeverity>>();
        assert_eq!(
            severities,
            vec![RecommendationSeverity::Critical, RecommendationSeverity::Low]
        );
    }

    #[test]
    fn rule_table_flags_p0_breaches_as_critical() {
        let p0 = builtin_profile("dev")
            .expect("dev profile should exist")
            .thresholds
            .p0;
        let recommender = RuleTableRecommender::new(p0);
        let mut snapshot = MetricsSnapshot::default();
        snapshot.pii_license.pii_hits = 2;
        snapshot.pii_license.license_violations = 1;

        let recommendations = recommender.recommend(&snapshot, &[]);
        assert_eq!(recommendations.len(), 2);
        assert!(
            recommendations
                .iter()
                .all(|value| value.severity == RecommendationSeverity::Critical)
        );
        assert_eq!(recommendations[0].trigger, "pii_hits=2");
    }
}
