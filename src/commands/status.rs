use anyhow::Result;
use tracing::{info, warn};

use crate::artifacts::collect_artifacts;
use crate::cli::{StatusArgs, archive_dir, failure_queue_dir};
use crate::failure_queue::count_entries;
use crate::history::count_snapshots;
use crate::model::{ArtifactSource, Collected};

pub fn run(args: StatusArgs) -> Result<()> {
    info!(reports_root = %args.reports_root.display(), "status requested");

    let artifacts = collect_artifacts(&args.reports_root);

    if let Some(session) = &artifacts.session {
        info!(
            session_id = %session.artifact.session_id,
            run_id = %session.artifact.run_id,
            profile = %session.artifact.profile,
            mode = %session.artifact.mode,
            dry_run = session.artifact.dry_run,
            cases_total = session.artifact.cases_total,
            result = %session.artifact.effective_result(),
            "loaded session report"
        );
    }
    log_source("session_report", artifacts.session.as_ref());
    log_source("baseline_report", artifacts.baseline.as_ref());
    log_source("panel_analysis", artifacts.panel.as_ref());

    let failure_queue = failure_queue_dir(&args.reports_root, args.failure_queue.as_ref());
    info!(
        path = %failure_queue.display(),
        entries = count_entries(&failure_queue),
        "failure queue"
    );

    let archive = archive_dir(&args.reports_root, args.archive.as_ref());
    info!(
        path = %archive.display(),
        runs = count_snapshots(&archive),
        "history archive"
    );

    Ok(())
}

fn log_source<T>(kind: &str, collected: Option<&Collected<T>>) {
    match collected.map(|value| &value.source) {
        Some(ArtifactSource {
            path,
            modified_at,
            age_hours,
            sha256,
        }) => info!(
            kind,
            path = %path.display(),
            modified_at = %modified_at,
            age_hours = %format!("{age_hours:.1}"),
            sha256 = %sha256.as_deref().unwrap_or_default(),
            "artifact found"
        ),
        None => warn!(kind, "artifact missing"),
    }
}
