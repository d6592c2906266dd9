use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub run_id: String,
    pub target: String,
    pub profile: String,
    pub mode: String,
    pub dry_run: bool,
    pub offline_mode: bool,
    pub budget_usd: f64,
    pub cost_usd: f64,
    pub duration_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub cases_total: u64,
    pub cases_passed: u64,
    pub pass_rate: f64,
    pub mean_score: f64,
    pub result: String,
    pub run_state: String,
    pub timestamp: String,
}

impl SessionReport {
    pub fn pass_ratio(&self) -> f64 {
        (self.pass_rate / 100.0).clamp(0.0, 1.0)
    }

    pub fn cost_per_item(&self) -> f64 {
        self.cost_usd / self.cases_total.max(1) as f64
    }

    /// RESULT wins over RUN_STATE when both are present.
    pub fn effective_result(&self) -> &str {
        if self.result.trim().is_empty() {
            self.run_state.trim()
        } else {
            self.result.trim()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineReport {
    pub total_items: u64,
    pub duplication_rate: f64,
    pub evidence_presence_rate: f64,
    pub evidence_alignment_mean: f64,
    pub hallucination_rate: f64,
    pub pii_hits: u64,
    pub license_violations: u64,
    pub coverage_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelAnalysis {
    pub mean_score: f64,
    pub total_cases: u64,
    pub passed_cases: u64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub total_cost_usd: f64,
    pub cost_per_case: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactSource {
    pub path: PathBuf,
    pub modified_at: String,
    pub age_hours: f64,
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collected<T> {
    pub source: ArtifactSource,
    pub artifact: T,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactParseError {
    pub kind: String,
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ArtifactCollection {
    pub reports_root: PathBuf,
    pub session: Option<Collected<SessionReport>>,
    pub baseline: Option<Collected<BaselineReport>>,
    pub panel: Option<Collected<PanelAnalysis>>,
    pub parse_errors: Vec<ArtifactParseError>,
}

impl ArtifactCollection {
    pub fn session_report(&self) -> Option<&SessionReport> {
        self.session.as_ref().map(|value| &value.artifact)
    }

    pub fn baseline_report(&self) -> Option<&BaselineReport> {
        self.baseline.as_ref().map(|value| &value.artifact)
    }

    pub fn panel_analysis(&self) -> Option<&PanelAnalysis> {
        self.panel.as_ref().map(|value| &value.artifact)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpectedRunConfig {
    pub dry_run: bool,
    pub mode: String,
    pub result: Option<String>,
    pub max_report_age_hours: f64,
    pub required_env: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsistencyResult {
    pub passed: bool,
    pub valid: bool,
    pub issues: Vec<String>,
    pub session_exists: bool,
    pub baseline_exists: bool,
    pub panel_exists: bool,
    pub dry_run_match: bool,
    pub mode_match: bool,
    pub result_match: bool,
    pub cases_total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalRunSample {
    pub run_name: String,
    pub profile: String,
    pub timestamp: String,
    pub cost_per_item: f64,
    pub latency_p95_ms: f64,
    pub failure_rate: f64,
    pub duplication_rate: f64,
    pub coverage_rate: f64,
    pub quality_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibratedMetric {
    CostPerItem,
    LatencyP95Ms,
    FailureRate,
    DuplicationRate,
    CoverageRate,
    QualityScore,
}

impl CalibratedMetric {
    pub const ALL: [CalibratedMetric; 6] = [
        Self::CostPerItem,
        Self::LatencyP95Ms,
        Self::FailureRate,
        Self::DuplicationRate,
        Self::CoverageRate,
        Self::QualityScore,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CostPerItem => "cost_per_item",
            Self::LatencyP95Ms => "latency_p95_ms",
            Self::FailureRate => "failure_rate",
            Self::DuplicationRate => "duplication_rate",
            Self::CoverageRate => "coverage_rate",
            Self::QualityScore => "quality_score",
        }
    }

    pub fn lower_is_worse(self) -> bool {
        matches!(self, Self::CoverageRate | Self::QualityScore)
    }

    pub fn decimals(self) -> u32 {
        match self {
            Self::LatencyP95Ms => 0,
            _ => 3,
        }
    }

    pub fn sample_value(self, sample: &HistoricalRunSample) -> f64 {
        match self {
            Self::CostPerItem => sample.cost_per_item,
            Self::LatencyP95Ms => sample.latency_p95_ms,
            Self::FailureRate => sample.failure_rate,
            Self::DuplicationRate => sample.duplication_rate,
            Self::CoverageRate => sample.coverage_rate,
            Self::QualityScore => sample.quality_score,
        }
    }

    pub fn is_usable(self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match self {
            Self::FailureRate => value >= 0.0,
            _ => value > 0.0,
        }
    }
}

impl fmt::Display for CalibratedMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationProposal {
    pub metric: CalibratedMetric,
    pub current_warn: f64,
    pub current_fail: f64,
    pub suggested_warn: f64,
    pub suggested_fail: f64,
    pub confidence: f64,
    pub sample_count: usize,
    pub drift_detected: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DuplicationMetrics {
    pub rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageMetrics {
    pub rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvidenceMetrics {
    pub presence_rate: f64,
    pub alignment_mean: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HallucinationMetrics {
    pub rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PiiLicenseMetrics {
    pub pii_hits: u64,
    pub license_violations: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostLatencyMetrics {
    pub cost_usd: f64,
    pub budget_usd: f64,
    pub cost_per_item: f64,
    pub budget_utilization: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FailureRetryMetrics {
    pub failure_rate: f64,
    pub dlq_entries_scanned: usize,
    pub retry_count: usize,
    pub error_classes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub duplication: DuplicationMetrics,
    pub coverage: CoverageMetrics,
    pub evidence: EvidenceMetrics,
    pub hallucination: HallucinationMetrics,
    pub pii_license: PiiLicenseMetrics,
    pub cost_latency: CostLatencyMetrics,
    pub failure_retry: FailureRetryMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateStatus {
    Pass,
    Warn,
    Partial,
    Fail,
}

impl GateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Warn => "WARN",
            Self::Partial => "PARTIAL",
            Self::Fail => "FAIL",
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Self::Pass | Self::Warn => 0,
            Self::Partial => 2,
            Self::Fail => 3,
        }
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateVerdict {
    pub status: GateStatus,
    pub p0_violations: Vec<String>,
    pub p1_warnings: Vec<String>,
    pub p2_issues: Vec<String>,
    pub reason: String,
    pub can_proceed: bool,
}

impl GateVerdict {
    pub fn new(
        status: GateStatus,
        p0_violations: Vec<String>,
        p1_warnings: Vec<String>,
        p2_issues: Vec<String>,
        reason: String,
    ) -> Self {
        Self {
            status,
            p0_violations,
            p1_warnings,
            p2_issues,
            reason,
            can_proceed: status != GateStatus::Fail,
        }
    }
}
