use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

pub const MAX_SCANNED_ENTRIES: usize = 10;
pub const MAX_ERROR_CLASSES: usize = 5;
const RETRY_MARKER: &str = "retry";
const STATE_HISTORY_NAMES: [&str; 2] = ["state_history", "state_history.log"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureQueueScan {
    pub entries_scanned: usize,
    pub retry_count: usize,
    pub error_classes: Vec<String>,
}

fn error_class_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\(([A-Za-z_][A-Za-z0-9_.:]*)\)\s*$").expect("error class pattern is valid")
    })
}

fn list_entries(queue_dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(queue_dir) else {
        debug!(path = %queue_dir.display(), "failure queue directory absent");
        return Vec::new();
    };

    let mut dirs = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect::<Vec<PathBuf>>();
    dirs.sort();
    dirs
}

pub fn count_entries(queue_dir: &Path) -> usize {
    list_entries(queue_dir).len()
}

pub fn scan_failure_queue(queue_dir: &Path) -> FailureQueueScan {
    let mut scan = FailureQueueScan::default();

    for entry in list_entries(queue_dir).into_iter().take(MAX_SCANNED_ENTRIES) {
        scan.entries_scanned += 1;

        let Some(history_path) = STATE_HISTORY_NAMES
            .iter()
            .map(|name| entry.join(name))
            .find(|path| path.is_file())
        else {
            continue;
        };

        let raw = match fs::read_to_string(&history_path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(path = %history_path.display(), error = %err, "failed to read state history");
                continue;
            }
        };

        for line in raw.lines() {
            if !line.to_ascii_lowercase().contains(RETRY_MARKER) {
                continue;
            }
            scan.retry_count += 1;

            if scan.error_classes.len() >= MAX_ERROR_CLASSES {
                continue;
            }
            if let Some(class) = error_class_pattern()
                .captures(line)
                .and_then(|captures| captures.get(1))
                .map(|m| m.as_str().to_string())
                && !scan.error_classes.contains(&class)
            {
                scan.error_classes.push(class);
            }
        }
    }

    debug!(
        entries = scan.entries_scanned,
        retries = scan.retry_count,
        classes = scan.error_classes.len(),
        "scanned failure queue"
    );
    scan
}
