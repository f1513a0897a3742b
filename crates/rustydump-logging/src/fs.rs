use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::LoggingConfig;

pub fn config_path(root: &Path) -> PathBuf {
    root.join("config").join("logging.json")
}

pub fn log_dir(root: &Path) -> PathBuf {
    root.join("logs")
}

/// Reads `<root>/config/logging.json`. A missing file is created with the
/// defaults; an unreadable or malformed one falls back to them.
pub fn read_config(root: &Path) -> LoggingConfig {
    let path = config_path(root);
    match fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "logging_config_invalid");
                LoggingConfig::default()
            }
        },
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let cfg = LoggingConfig::default();
            if let Err(err) = write_config_atomic(root, &cfg) {
                tracing::warn!(path = %path.display(), error = %err, "logging_config_seed_failed");
            }
            cfg
        }
        Err(_) => LoggingConfig::default(),
    }
}

pub fn write_config_atomic(root: &Path, cfg: &LoggingConfig) -> Result<()> {
    let path = config_path(root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating logging config dir {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(cfg).context("serializing logging config")?;

    let mut options = fs::OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(&tmp_path)
        .with_context(|| format!("opening {}", tmp_path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("writing {}", tmp_path.display()))?;
    file.sync_all()
        .with_context(|| format!("syncing {}", tmp_path.display()))?;

    fs::rename(&tmp_path, &path)
        .with_context(|| format!("renaming {} -> {}", tmp_path.display(), path.display()))?;
    Ok(())
}
