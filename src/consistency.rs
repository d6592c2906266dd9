use std::path::Path;

use tracing::{debug, info, warn};

use crate::failure_queue::count_entries;
use crate::model::{ArtifactCollection, ConsistencyResult, ExpectedRunConfig};

pub const MISSING_SESSION_ISSUE: &str = "SESSION_REPORT missing";
pub const INVALID_CASES_ISSUE: &str = "CASES_TOTAL is 0: invalid run state";

impl ConsistencyResult {
    pub fn non_fatal_issues(&self) -> impl Iterator<Item = &String> {
        self.issues.iter().filter(|issue| {
            !issue.starts_with(MISSING_SESSION_ISSUE) && issue.as_str() != INVALID_CASES_ISSUE
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentFacts {
    pub reports_root_exists: bool,
    pub missing_env: Vec<String>,
    pub failure_queue_entries: usize,
}

pub fn probe_environment<F>(
    reports_root: &Path,
    failure_queue: &Path,
    required_env: &[String],
    lookup: F,
) -> EnvironmentFacts
where
    F: Fn(&str) -> Option<String>,
{
    let missing_env = required_env
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .filter(|name| {
            lookup(*name)
                .map(|value| value.trim().is_empty())
                .unwrap_or(true)
        })
        .map(ToOwned::to_owned)
        .collect::<Vec<String>>();

    EnvironmentFacts {
        reports_root_exists: reports_root.is_dir(),
        missing_env,
        failure_queue_entries: count_entries(failure_queue),
    }
}

pub fn validate_consistency(
    artifacts: &ArtifactCollection,
    expected: &ExpectedRunConfig,
    environment: &EnvironmentFacts,
) -> ConsistencyResult {
    let mut result = ConsistencyResult {
        session_exists: artifacts.session.is_some(),
        baseline_exists: artifacts.baseline.is_some(),
        panel_exists: artifacts.panel.is_some(),
        ..ConsistencyResult::default()
    };

    if !environment.reports_root_exists {
        result.issues.push(format!(
            "reports root missing: {}",
            artifacts.reports_root.display()
        ));
    }

    for failure in &artifacts.parse_errors {
        result.issues.push(format!(
            "{} unparsable: {} ({})",
            failure.kind,
            failure.path.display(),
            failure.error
        ));
    }

    let Some(collected) = artifacts.session.as_ref() else {
        result.issues.push(format!(
            "{MISSING_SESSION_ISSUE}: no session_report*.md under {}",
            artifacts.reports_root.display()
        ));
        append_environment_issues(&mut result, expected, environment, None);
        warn!(issues = result.issues.len(), "consistency check failed: session report absent");
        return result;
    };
    let session = &collected.artifact;

    result.dry_run_match = session.dry_run == expected.dry_run;
    if !result.dry_run_match {
        result.issues.push(format!(
            "DRY_RUN mismatch: expected {}, found {}",
            expected.dry_run, session.dry_run
        ));
    }

    result.mode_match = session.mode.trim().eq_ignore_ascii_case(expected.mode.trim());
    if !result.mode_match {
        result.issues.push(format!(
            "MODE mismatch: expected '{}', found '{}'",
            expected.mode.trim(),
            session.mode.trim()
        ));
    }

    result.result_match = match expected.result.as_deref().map(str::trim) {
        Some(expected_result) if !expected_result.is_empty() => {
            let matches = session
                .effective_result()
                .eq_ignore_ascii_case(expected_result);
            if !matches {
                result.issues.push(format!(
                    "RESULT mismatch: expected '{}', found '{}'",
                    expected_result,
                    session.effective_result()
                ));
            }
            matches
        }
        _ => {
            debug!("no expected result supplied; skipping RESULT agreement check");
            true
        }
    };

    result.cases_total = session.cases_total;
    result.valid = session.cases_total > 0;
    if !result.valid {
        result.issues.push(INVALID_CASES_ISSUE.to_string());
    }

    if let Some(baseline) = artifacts.baseline_report()
        && baseline.total_items != session.cases_total
    {
        result.issues.push(format!(
            "BASELINE total_items ({}) != CASES_TOTAL ({})",
            baseline.total_items, session.cases_total
        ));
    }

    if let Some(panel) = artifacts.panel_analysis()
        && panel.total_cases != session.cases_total
    {
        result.issues.push(format!(
            "PANEL total_cases ({}) != CASES_TOTAL ({})",
            panel.total_cases, session.cases_total
        ));
    }

    if collected.source.age_hours > expected.max_report_age_hours {
        result.issues.push(format!(
            "SESSION_REPORT stale: {:.1}h old (max {:.0}h)",
            collected.source.age_hours, expected.max_report_age_hours
        ));
    }

    append_environment_issues(
        &mut result,
        expected,
        environment,
        Some(session.effective_result()),
    );

    result.passed = result.valid;
    info!(
        passed = result.passed,
        issues = result.issues.len(),
        cases_total = result.cases_total,
        "consistency check complete"
    );
    result
}

fn append_environment_issues(
    result: &mut ConsistencyResult,
    expected: &ExpectedRunConfig,
    environment: &EnvironmentFacts,
    session_result: Option<&str>,
) {
    for name in &environment.missing_env {
        if expected.required_env.iter().any(|required| required.trim() == name.as_str()) {
            result
                .issues
                .push(format!("required env var missing for mode '{}': {name}", expected.mode));
        }
    }

    if session_result.is_some_and(|value| value.eq_ignore_ascii_case("FAIL"))
        && environment.failure_queue_entries == 0
    {
        result
            .issues
            .push("RESULT is FAIL but failure queue has no entries".to_string());
    }
}
