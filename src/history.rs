use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::artifacts::{ArtifactKind, parse_baseline_records, parse_session_block};
use crate::model::{BaselineReport, HistoricalRunSample, SessionReport};

const FALLBACK_DUPLICATION_RATE: f64 = 0.0;
const FALLBACK_COVERAGE_RATE: f64 = 0.8;
const MEAN_SCORE_SCALE: f64 = 10.0;

pub fn load_history(archive_dir: &Path, lookback_runs: usize) -> Vec<HistoricalRunSample> {
    let snapshots = list_snapshot_dirs(archive_dir);
    let mut samples = Vec::with_capacity(lookback_runs.min(snapshots.len()));

    for snapshot_dir in snapshots.into_iter().take(lookback_runs) {
        match load_sample(&snapshot_dir) {
            Ok(sample) => samples.push(sample),
            Err(err) => warn!(
                path = %snapshot_dir.display(),
                error = %format!("{err:#}"),
                "skipping unreadable history snapshot"
            ),
        }
    }

    info!(
        archive = %archive_dir.display(),
        samples = samples.len(),
        lookback_runs,
        "loaded run history"
    );
    samples
}

pub fn count_snapshots(archive_dir: &Path) -> usize {
    list_snapshot_dirs(archive_dir).len()
}

fn list_snapshot_dirs(archive_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(archive_dir) else {
        warn!(path = %archive_dir.display(), "history archive missing");
        return Vec::new();
    };

    let mut dirs = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect::<Vec<PathBuf>>();
    dirs.sort_by(|left, right| right.file_name().cmp(&left.file_name()));
    dirs
}

fn find_artifact(snapshot_dir: &Path, kind: ArtifactKind) -> Result<Option<PathBuf>> {
    let mut matches = Vec::new();
    for entry in fs::read_dir(snapshot_dir)
        .with_context(|| format!("failed to read {}", snapshot_dir.display()))?
    {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", snapshot_dir.display()))?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        if kind.matches(&file_name) && entry.path().is_file() {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches.pop())
}

fn load_sample(snapshot_dir: &Path) -> Result<HistoricalRunSample> {
    let session_path = find_artifact(snapshot_dir, ArtifactKind::Session)?
        .with_context(|| format!("no session report in {}", snapshot_dir.display()))?;
    let raw = fs::read_to_string(&session_path)
        .with_context(|| format!("failed to read {}", session_path.display()))?;
    let session = parse_session_block(&raw)
        .with_context(|| format!("failed to parse {}", session_path.display()))?;

    let baseline = match find_artifact(snapshot_dir, ArtifactKind::Baseline)? {
        Some(path) => match fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))
            .and_then(|raw| parse_baseline_records(&raw))
        {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %format!("{err:#}"),
                    "colocated baseline unreadable; using fallbacks"
                );
                None
            }
        },
        None => None,
    };

    let run_name = snapshot_dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(derive_sample(&run_name, &session, baseline.as_ref()))
}

pub fn derive_sample(
    run_name: &str,
    session: &SessionReport,
    baseline: Option<&BaselineReport>,
) -> HistoricalRunSample {
    let timestamp = if session.timestamp.trim().is_empty() {
        run_name.to_string()
    } else {
        session.timestamp.trim().to_string()
    };

    HistoricalRunSample {
        run_name: run_name.to_string(),
        profile: session.profile.trim().to_string(),
        timestamp,
        cost_per_item: session.cost_per_item(),
        latency_p95_ms: session.p95_ms,
        failure_rate: 1.0 - session.pass_rate / 100.0,
        duplication_rate: baseline
            .map(|value| value.duplication_rate)
            .unwrap_or(FALLBACK_DUPLICATION_RATE),
        coverage_rate: baseline
            .map(|value| value.coverage_rate.unwrap_or(value.evidence_presence_rate))
            .unwrap_or(FALLBACK_COVERAGE_RATE),
        quality_score: baseline
            .map(|value| value.evidence_alignment_mean)
            .unwrap_or(session.mean_score / MEAN_SCORE_SCALE),
    }
}
