use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::thresholds::DEFAULT_PROFILE;

#[derive(Parser, Debug)]
#[command(
    name = "qa-gate",
    version,
    about = "Pre-production quality gate for QA generation runs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Gate(GateArgs),
    Calibrate(CalibrateArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GateArgs {
    #[arg(long, default_value = "reports")]
    pub reports_root: PathBuf,

    #[arg(long, default_value = DEFAULT_PROFILE)]
    pub profile: String,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub expect_dry_run: bool,

    #[arg(long, default_value = "online")]
    pub expect_mode: String,

    #[arg(long)]
    pub expect_result: Option<String>,

    #[arg(long)]
    pub failure_queue: Option<PathBuf>,

    #[arg(long)]
    pub archive: Option<PathBuf>,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, default_value_t = 24.0)]
    pub max_age_hours: f64,

    #[arg(long = "require-env")]
    pub required_env: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CalibrateArgs {
    #[arg(long, default_value = "reports")]
    pub reports_root: PathBuf,

    #[arg(long, default_value = DEFAULT_PROFILE)]
    pub profile: String,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub archive: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub apply: bool,

    #[arg(long, default_value_t = false)]
    pub no_drift_guard: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "reports")]
    pub reports_root: PathBuf,

    #[arg(long)]
    pub failure_queue: Option<PathBuf>,

    #[arg(long)]
    pub archive: Option<PathBuf>,
}

pub fn failure_queue_dir(reports_root: &Path, explicit: Option<&PathBuf>) -> PathBuf {
    explicit
        .cloned()
        .unwrap_or_else(|| reports_root.join("dlq"))
}

pub fn archive_dir(reports_root: &Path, explicit: Option<&PathBuf>) -> PathBuf {
    explicit
        .cloned()
        .unwrap_or_else(|| reports_root.join("archive"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_flags_parse_with_defaults() {
        let cli = Cli::try_parse_from([
            "qa-gate",
            "gate",
            "--profile",
            "stage",
            "--expect-dry-run",
            "--require-env",
            "QA_API_KEY",
            "--require-env",
            "QA_MODEL",
        ])
        .expect("gate flags should parse");

        let Commands::Gate(args) = cli.command else {
            panic!("expected gate command");
        };
        assert_eq!(args.reports_root, PathBuf::from("reports"));
        assert_eq!(args.profile, "stage");
        assert!(args.expect_dry_run);
        assert_eq!(args.expect_mode, "online");
        assert_eq!(args.expect_result, None);
        assert_eq!(args.max_age_hours, 24.0);
        assert_eq!(args.required_env, vec!["QA_API_KEY", "QA_MODEL"]);
        assert_eq!(
            failure_queue_dir(&args.reports_root, args.failure_queue.as_ref()),
            PathBuf::from("reports/dlq")
        );
    }

    #[test]
    fn calibrate_flags_parse() {
        let cli = Cli::try_parse_from([
            "qa-gate",
            "calibrate",
            "--config",
            "thresholds.json",
            "--apply",
            "--no-drift-guard",
        ])
        .expect("calibrate flags should parse");

        let Commands::Calibrate(args) = cli.command else {
            panic!("expected calibrate command");
        };
        assert_eq!(args.profile, DEFAULT_PROFILE);
        assert!(args.apply);
        assert!(args.no_drift_guard);
        assert_eq!(
            archive_dir(&args.reports_root, args.archive.as_ref()),
            PathBuf::from("reports/archive")
        );
    }
}
