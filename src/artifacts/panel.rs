use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::PanelAnalysis;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PanelDocument {
    summary: PanelSummary,
    cost_metrics: Option<PanelCostMetrics>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PanelSummary {
    mean_score: f64,
    total_cases: u64,
    passed_cases: u64,
    #[serde(alias = "p50_ms")]
    latency_p50_ms: f64,
    #[serde(alias = "p95_ms")]
    latency_p95_ms: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PanelCostMetrics {
    total_cost_usd: f64,
    cost_per_case: f64,
}

pub fn parse_panel_analysis(raw: &str) -> Result<PanelAnalysis> {
    let document: PanelDocument =
        serde_json::from_str(raw).context("failed to parse panel analysis document")?;
    let cost = document.cost_metrics.unwrap_or_default();

    Ok(PanelAnalysis {
        mean_score: document.summary.mean_score,
        total_cases: document.summary.total_cases,
        passed_cases: document.summary.passed_cases,
        latency_p50_ms: document.summary.latency_p50_ms,
        latency_p95_ms: document.summary.latency_p95_ms,
        total_cost_usd: cost.total_cost_usd,
        cost_per_case: cost.cost_per_case,
    })
}
