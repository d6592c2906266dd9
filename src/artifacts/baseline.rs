use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::model::BaselineReport;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BaselineSummaryRecord {
    duplication_metrics: DuplicationRecord,
    evidence_metrics: EvidenceRecord,
    hallucination_metrics: HallucinationRecord,
    pii_license_metrics: PiiLicenseRecord,
    coverage_metrics: Option<CoverageRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DuplicationRecord {
    #[serde(alias = "rate")]
    duplication_rate: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EvidenceRecord {
    #[serde(alias = "evidence_presence_rate")]
    presence_rate: f64,
    #[serde(alias = "alignment_score_mean")]
    alignment_mean: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HallucinationRecord {
    #[serde(alias = "rate")]
    hallucination_rate: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PiiLicenseRecord {
    pii_hits: u64,
    #[serde(alias = "license_hits")]
    license_violations: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CoverageRecord {
    #[serde(alias = "rate")]
    coverage_rate: f64,
}

pub fn parse_baseline_records(raw: &str) -> Result<BaselineReport> {
    let mut lines = raw.lines().filter(|line| !line.trim().is_empty());
    let Some(first) = lines.next() else {
        bail!("baseline report is empty");
    };

    let summary: BaselineSummaryRecord =
        serde_json::from_str(first).context("failed to parse baseline summary record")?;
    let total_items = 1 + lines.count() as u64;

    Ok(BaselineReport {
        total_items,
        duplication_rate: summary.duplication_metrics.duplication_rate,
        evidence_presence_rate: summary.evidence_metrics.presence_rate,
        evidence_alignment_mean: summary.evidence_metrics.alignment_mean,
        hallucination_rate: summary.hallucination_metrics.hallucination_rate,
        pii_hits: summary.pii_license_metrics.pii_hits,
        license_violations: summary.pii_license_metrics.license_violations,
        coverage_rate: summary.coverage_metrics.map(|value| value.coverage_rate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_baseline_records_reads_nested_metrics_and_counts_lines() {
        let raw = concat!(
            r#"{"duplication_metrics":{"duplication_rate":0.04},"evidence_metrics":{"presence_rate":0.92,"alignment_mean":0.81},"hallucination_metrics":{"rate":0.02},"pii_license_metrics":{"pii_hits":1,"license_violations":0}}"#,
            "\n",
            r#"{"id":"q-2"}"#,
            "\n\n",
            r#"{"id":"q-3"}"#,
            "\n"
        );

        let report = parse_baseline_records(raw).expect("baseline should parse");
        assert_eq!(report.total_items, 3);
        assert_eq!(report.duplication_rate, 0.04);
        assert_eq!(report.evidence_presence_rate, 0.92);
        assert_eq!(report.evidence_alignment_mean, 0.81);
        assert_eq!(report.hallucination_rate, 0.02);
        assert_eq!(report.pii_hits, 1);
        assert!(report.coverage_rate.is_none());
    }

    #[test]
    fn missing_metric_objects_default_to_zero() {
        let report = parse_baseline_records("{}\n").expect("empty object should parse");
        assert_eq!(report, BaselineReport { total_items: 1, ..BaselineReport::default() });
    }

    #[test]
    fn empty_or_malformed_baseline_is_rejected() {
        assert!(parse_baseline_records("\n\n").is_err());
        assert!(parse_baseline_records("not json\n").is_err());
    }
}
