use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Which leftover extraction artifacts to sweep, and how hard to try.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CleanupConfig {
    /// Directory to sweep; the system temp directory when unset.
    pub dir: Option<PathBuf>,
    pub prefix: String,
    pub suffix: String,
    pub retries: u32,
    pub delay_ms: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            dir: None,
            prefix: "page-".to_string(),
            suffix: ".pdf".to_string(),
            retries: 3,
            delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub locked: Vec<PathBuf>,
}

/// Deletes files in `dir` whose names match the configured prefix and
/// suffix. Permission errors are retried; a file still locked after the
/// last attempt is reported and left alone.
pub fn cleanup_temp_artifacts(dir: &Path, config: &CleanupConfig) -> Result<CleanupReport> {
    let mut report = CleanupReport::default();
    if !dir.is_dir() {
        return Ok(report);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(&config.prefix) || !name.ends_with(&config.suffix) {
            continue;
        }
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if remove_with_retries(&path, config) {
            debug!(file = %path.display(), "removed temp artifact");
            report.removed.push(path);
        } else {
            report.locked.push(path);
        }
    }
    Ok(report)
}

impl CleanupConfig {
    pub fn target_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Sweeps [`CleanupConfig::target_dir`].
pub fn cleanup_configured(config: &CleanupConfig) -> Result<CleanupReport> {
    cleanup_temp_artifacts(&config.target_dir(), config)
}

fn remove_with_retries(path: &Path, config: &CleanupConfig) -> bool {
    let attempts = config.retries.max(1);
    for attempt in 1..=attempts {
        match fs::remove_file(path) {
            Ok(()) => return true,
            Err(err) if err.kind() == ErrorKind::NotFound => return true,
            Err(err) if err.kind() == ErrorKind::PermissionDenied && attempt < attempts => {
                thread::sleep(Duration::from_millis(config.delay_ms));
            }
            Err(err) => {
                warn!(
                    file = %path.display(),
                    attempts = attempt,
                    error = %err,
                    "could not delete temp artifact"
                );
                return false;
            }
        }
    }
    false
}
