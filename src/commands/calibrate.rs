use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::calibration::{apply_calibration, propose_calibration};
use crate::cli::{CalibrateArgs, archive_dir};
use crate::history::load_history;
use crate::thresholds::{load_threshold_config, resolve_profile, save_profile_thresholds};

pub fn run(args: CalibrateArgs) -> Result<()> {
    if args.apply && args.config.is_none() {
        bail!("--apply requires --config <file> to persist calibrated thresholds");
    }

    let profile_name = args.profile.trim();
    let document = load_threshold_config(args.config.as_deref())?;
    let profile = resolve_profile(&document, profile_name)?;
    if !profile.autocalibration.enabled {
        info!(
            profile = profile_name,
            "autocalibration disabled in config; proposing on explicit request"
        );
    }

    let archive = archive_dir(&args.reports_root, args.archive.as_ref());
    let history = load_history(&archive, profile.autocalibration.lookback_runs);
    let proposals = propose_calibration(
        &history,
        &profile.thresholds,
        &profile.autocalibration,
        Some(profile_name),
    );

    for proposal in &proposals {
        info!(
            metric = proposal.metric.as_str(),
            current_warn = proposal.current_warn,
            current_fail = proposal.current_fail,
            suggested_warn = proposal.suggested_warn,
            suggested_fail = proposal.suggested_fail,
            confidence = proposal.confidence,
            drift = proposal.drift_detected,
            reason = %proposal.reason,
            "calibration proposal"
        );
    }

    if proposals.is_empty() {
        info!(profile = profile_name, "no calibration proposals");
        return Ok(());
    }

    let Some(config_path) = args.config.as_deref().filter(|_| args.apply) else {
        info!(
            proposals = proposals.len(),
            "proposals only; pass --apply --config <file> to persist"
        );
        return Ok(());
    };

    let outcome = apply_calibration(
        &proposals,
        &profile.thresholds,
        profile.autocalibration.drift_guard_max_delta,
        !args.no_drift_guard,
    );
    for change in &outcome.applied {
        info!(change = %change, "threshold updated");
    }
    for skipped in &outcome.skipped {
        warn!(skipped = %skipped, "threshold kept");
    }

    if outcome.applied.is_empty() {
        warn!(profile = profile_name, "every proposal was rejected; config left unchanged");
        return Ok(());
    }

    save_profile_thresholds(config_path, &document, profile_name, &outcome.thresholds)
}
