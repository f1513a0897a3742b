use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};

use crate::config::LoggingConfig;
use crate::fs::log_dir;
use crate::targets::SUBSYSTEMS;

pub const MAX_LOG_BYTES: u64 = 200 * 1024 * 1024;

const COMPONENT_PREFIX: &str = "rustydump";

struct LogFile {
    path: PathBuf,
    modified: SystemTime,
    size: u64,
}

/// Summary of one retention pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetentionReport {
    pub expired: usize,
    pub over_cap: usize,
    pub remaining_bytes: u64,
}

pub fn run_retention(root: &Path, cfg: &LoggingConfig) -> Result<RetentionReport> {
    run_retention_at(root, cfg, SystemTime::now(), MAX_LOG_BYTES)
}

/// Deletes log files last modified before `now - keep_days`, then the oldest
/// remaining ones until the directory is under `cap` bytes.
pub fn run_retention_at(root: &Path, cfg: &LoggingConfig, now: SystemTime, cap: u64) -> Result<RetentionReport> {
    let mut entries = collect_log_files(&log_dir(root))?;
    let mut report = RetentionReport::default();

    let cutoff = now
        .checked_sub(Duration::from_secs(cfg.keep_days.saturating_mul(24 * 60 * 60)))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    entries.retain(|entry| {
        if entry.modified >= cutoff {
            return true;
        }
        match fs::remove_file(&entry.path) {
            Ok(()) => {
                report.expired += 1;
                false
            }
            Err(err) => {
                tracing::warn!(path = %entry.path.display(), error = %err, "log_remove_failed");
                true
            }
        }
    });

    let mut total: u64 = entries.iter().map(|e| e.size).sum();
    if total > cap {
        entries.sort_by_key(|e| e.modified);
        for entry in &entries {
            if total <= cap {
                break;
            }
            if let Err(err) = fs::remove_file(&entry.path) {
                tracing::warn!(path = %entry.path.display(), error = %err, "log_cap_remove_failed");
                continue;
            }
            report.over_cap += 1;
            total = total.saturating_sub(entry.size);
        }
    }

    report.remaining_bytes = total;
    Ok(report)
}

fn collect_log_files(dir: &Path) -> Result<Vec<LogFile>> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }

    let entries = fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("iterating {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if !is_log_name(name) {
            continue;
        }

        let metadata = fs::metadata(&path).with_context(|| format!("stat {}", path.display()))?;
        files.push(LogFile {
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            size: metadata.len(),
            path,
        });
    }
    Ok(files)
}

fn is_log_name(name: &str) -> bool {
    if name.starts_with(COMPONENT_PREFIX) && name.contains(".log") {
        return true;
    }
    SUBSYSTEMS.iter().any(|(_, file)| name.starts_with(file))
}
