use std::sync::OnceLock;

use anyhow::{Result, bail};
use regex::Regex;

use crate::model::SessionReport;

const FENCE: &str = "```";

fn key_value_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Z][A-Z0-9_]*)\s*:\s*(.*)$").expect("session key pattern is valid")
    })
}

pub fn parse_session_block(document: &str) -> Result<SessionReport> {
    let Some(lines) = first_fenced_block(document) else {
        bail!("session report has no fenced key/value block");
    };

    let mut report = SessionReport::default();
    let mut recognized = 0_usize;

    for line in lines {
        let Some(captures) = key_value_pattern().captures(line.trim()) else {
            continue;
        };
        let key = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let value = captures.get(2).map(|m| m.as_str().trim()).unwrap_or_default();

        let known = match key {
            "SESSION_ID" => set_text(&mut report.session_id, value),
            "RUN_ID" => set_text(&mut report.run_id, value),
            "TARGET" => set_text(&mut report.target, value),
            "PROFILE" => set_text(&mut report.profile, value),
            "MODE" => set_text(&mut report.mode, value),
            "DRY_RUN" => {
                report.dry_run = parse_flag(value);
                true
            }
            "OFFLINE_MODE" => {
                report.offline_mode = parse_flag(value);
                true
            }
            "BUDGET_USD" => set_number(&mut report.budget_usd, value),
            "COST_USD" => set_number(&mut report.cost_usd, value),
            "DURATION_MS" => set_number(&mut report.duration_ms, value),
            "P50_MS" => set_number(&mut report.p50_ms, value),
            "P95_MS" => set_number(&mut report.p95_ms, value),
            "CASES_TOTAL" => set_count(&mut report.cases_total, value),
            "CASES_PASSED" => set_count(&mut report.cases_passed, value),
            "PASS_RATE" => set_number(&mut report.pass_rate, value),
            "MEAN_SCORE" => set_number(&mut report.mean_score, value),
            "RESULT" => set_text(&mut report.result, value),
            "RUN_STATE" => set_text(&mut report.run_state, value),
            "TIMESTAMP" => set_text(&mut report.timestamp, value),
            _ => false,
        };
        if known {
            recognized += 1;
        }
    }

    if recognized == 0 {
        bail!("session report block has no recognized keys");
    }

    Ok(report)
}

#[cfg(test)]
impl SessionReport {
    pub fn to_block(&self) -> String {
        let rows: [(&str, String); 19] = [
            ("SESSION_ID", self.session_id.clone()),
            ("RUN_ID", self.run_id.clone()),
            ("TARGET", self.target.clone()),
            ("PROFILE", self.profile.clone()),
            ("MODE", self.mode.clone()),
            ("DRY_RUN", self.dry_run.to_string()),
            ("OFFLINE_MODE", self.offline_mode.to_string()),
            ("BUDGET_USD", self.budget_usd.to_string()),
            ("COST_USD", self.cost_usd.to_string()),
            ("DURATION_MS", self.duration_ms.to_string()),
            ("P50_MS", self.p50_ms.to_string()),
            ("P95_MS", self.p95_ms.to_string()),
            ("CASES_TOTAL", self.cases_total.to_string()),
            ("CASES_PASSED", self.cases_passed.to_string()),
            ("PASS_RATE", self.pass_rate.to_string()),
            ("MEAN_SCORE", self.mean_score.to_string()),
            ("RESULT", self.result.clone()),
            ("RUN_STATE", self.run_state.clone()),
            ("TIMESTAMP", self.timestamp.clone()),
        ];

        let mut out = String::from(FENCE);
        out.push('\n');
        for (key, value) in rows {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(&value);
            out.push('\n');
        }
        out.push_str(FENCE);
        out.push('\n');
        out
    }
}

fn first_fenced_block(document: &str) -> Option<Vec<&str>> {
    let mut inside = false;
    let mut lines = Vec::new();

    for line in document.lines() {
        if line.trim_start().starts_with(FENCE) {
            if inside {
                return Some(lines);
            }
            inside = true;
            continue;
        }
        if inside {
            lines.push(line);
        }
    }

    None
}

fn set_text(slot: &mut String, value: &str) -> bool {
    *slot = value.to_string();
    true
}

fn set_number(slot: &mut f64, value: &str) -> bool {
    *slot = parse_number(value);
    true
}

fn set_count(slot: &mut u64, value: &str) -> bool {
    let number = parse_number(value);
    *slot = if number.is_finite() && number > 0.0 {
        number.trunc() as u64
    } else {
        0
    };
    true
}

pub fn parse_number(value: &str) -> f64 {
    let cleaned = value
        .trim()
        .trim_start_matches('$')
        .trim_end_matches('%')
        .replace(',', "");
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .unwrap_or(0.0)
}

pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "1" | "on"
    )
}
