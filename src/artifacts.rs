use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::model::{ArtifactCollection, ArtifactParseError, ArtifactSource, Collected};
use crate::util::{sha256_file, system_time_string};

mod baseline;
mod panel;
mod session;

pub use self::baseline::parse_baseline_records;
pub use self::panel::parse_panel_analysis;
pub use self::session::parse_session_block;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Session,
    Baseline,
    Panel,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session_report",
            Self::Baseline => "baseline_report",
            Self::Panel => "panel_analysis",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Session => "SESSION_REPORT",
            Self::Baseline => "BASELINE_REPORT",
            Self::Panel => "PANEL_ANALYSIS",
        }
    }

    pub fn matches(self, file_name: &str) -> bool {
        let (prefix, extension) = match self {
            Self::Session => ("session_report", ".md"),
            Self::Baseline => ("baseline_report", ".jsonl"),
            Self::Panel => ("panel_analysis", ".json"),
        };
        file_name.starts_with(prefix) && file_name.ends_with(extension)
    }
}

pub fn collect_artifacts(reports_root: &Path) -> ArtifactCollection {
    collect_artifacts_at(reports_root, SystemTime::now())
}

pub fn collect_artifacts_at(reports_root: &Path, now: SystemTime) -> ArtifactCollection {
    let candidates = list_report_files(reports_root);
    let mut parse_errors = Vec::new();

    let session = load_latest(
        &candidates,
        ArtifactKind::Session,
        now,
        &mut parse_errors,
        parse_session_block,
    );
    let baseline = load_latest(
        &candidates,
        ArtifactKind::Baseline,
        now,
        &mut parse_errors,
        parse_baseline_records,
    );
    let panel = load_latest(
        &candidates,
        ArtifactKind::Panel,
        now,
        &mut parse_errors,
        parse_panel_analysis,
    );

    info!(
        reports_root = %reports_root.display(),
        session = session.is_some(),
        baseline = baseline.is_some(),
        panel = panel.is_some(),
        parse_errors = parse_errors.len(),
        "collected artifacts"
    );

    ArtifactCollection {
        reports_root: reports_root.to_path_buf(),
        session,
        baseline,
        panel,
        parse_errors,
    }
}

#[derive(Debug, Clone)]
struct ReportFile {
    path: PathBuf,
    file_name: String,
    modified: SystemTime,
}

fn list_report_files(reports_root: &Path) -> Vec<ReportFile> {
    let entries = match fs::read_dir(reports_root) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %reports_root.display(), error = %err, "reports root unreadable");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push(ReportFile {
            file_name: entry.file_name().to_string_lossy().to_string(),
            path,
            modified,
        });
    }
    files
}

/// Latest by mtime; equal mtimes resolve to the lexically greatest path.
fn select_latest(candidates: &[ReportFile], kind: ArtifactKind) -> Option<&ReportFile> {
    candidates
        .iter()
        .filter(|file| kind.matches(&file.file_name))
        .max_by(|left, right| {
            left.modified
                .cmp(&right.modified)
                .then_with(|| left.path.cmp(&right.path))
        })
}

fn load_latest<T, F>(
    candidates: &[ReportFile],
    kind: ArtifactKind,
    now: SystemTime,
    parse_errors: &mut Vec<ArtifactParseError>,
    parse: F,
) -> Option<Collected<T>>
where
    F: Fn(&str) -> Result<T>,
{
    let Some(file) = select_latest(candidates, kind) else {
        debug!(kind = kind.as_str(), "no artifact matched");
        return None;
    };

    match read_and_parse(&file.path, &parse) {
        Ok(artifact) => Some(Collected {
            source: ArtifactSource {
                path: file.path.clone(),
                modified_at: system_time_string(file.modified),
                age_hours: age_hours(file.modified, now),
                sha256: sha256_file(&file.path).ok(),
            },
            artifact,
        }),
        Err(err) => {
            let error = format!("{err:#}");
            warn!(
                kind = kind.as_str(),
                path = %file.path.display(),
                error = %error,
                "artifact unparsable; treating as absent"
            );
            parse_errors.push(ArtifactParseError {
                kind: kind.label().to_string(),
                path: file.path.clone(),
                error,
            });
            None
        }
    }
}

fn read_and_parse<T, F>(path: &Path, parse: &F) -> Result<T>
where
    F: Fn(&str) -> Result<T>,
{
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn age_hours(modified: SystemTime, now: SystemTime) -> f64 {
    now.duration_since(modified)
        .map(|elapsed| elapsed.as_secs_f64() / 3600.0)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests;
