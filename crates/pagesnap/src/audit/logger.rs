//! JSONL audit logger: one line per snapshot run.
//!
//! The log is append-only and rotates once it exceeds `MAX_LOG_SIZE`
//! (100 MB). Rotated files are named `.1`, `.2`, ... up to `MAX_ROTATIONS`.

use crate::snapshot::SnapshotOutcome;
use crate::types::Statistics;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Maximum audit log size before rotation (100 MB).
const MAX_LOG_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum number of rotated log files to keep.
const MAX_ROTATIONS: u32 = 5;

/// A single audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEvent {
    pub timestamp: String,
    pub url: String,
    pub output_dir: String,
    pub success: bool,
    pub statistics: Statistics,
    pub duration_ms: u64,
    pub message: String,
}

impl SnapshotEvent {
    /// Event for a finished run.
    pub fn from_outcome(url: &str, outcome: &SnapshotOutcome, duration_ms: u64) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            url: url.to_string(),
            output_dir: outcome.output_dir.display().to_string(),
            success: outcome.success,
            statistics: outcome.statistics,
            duration_ms,
            message: outcome.message.clone(),
        }
    }
}

/// Append-only JSONL audit logger with automatic rotation.
pub struct AuditLogger {
    file: File,
    path: PathBuf,
    /// Approximate current size (may drift slightly; re-checked on rotation).
    current_size: u64,
    max_size: u64,
}

impl AuditLogger {
    /// Open or create the audit log file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open audit log: {}", path.display()))?;

        let current_size = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            file,
            path: path.to_path_buf(),
            current_size,
            max_size: MAX_LOG_SIZE,
        })
    }

    /// Open the log at the configured location (see
    /// [`crate::config::resolve_audit_log_path`]).
    pub fn default_logger(explicit: Option<&Path>) -> Result<Self> {
        Self::open(&crate::config::resolve_audit_log_path(explicit))
    }

    /// Append one event.
    pub fn log(&mut self, event: &SnapshotEvent) -> Result<()> {
        if self.current_size >= self.max_size {
            self.rotate()?;
        }

        let json = serde_json::to_string(event)?;
        writeln!(self.file, "{json}")
            .with_context(|| format!("failed to write audit log: {}", self.path.display()))?;
        self.current_size += json.len() as u64 + 1;
        Ok(())
    }

    /// Rotate log files: audit.jsonl → audit.jsonl.1, .1 → .2, etc.
    fn rotate(&mut self) -> Result<()> {
        self.file.flush()?;

        let oldest = rotation_path(&self.path, MAX_ROTATIONS);
        if oldest.exists() {
            let _ = std::fs::remove_file(&oldest);
        }
        for i in (1..MAX_ROTATIONS).rev() {
            let from = rotation_path(&self.path, i);
            if from.exists() {
                let _ = std::fs::rename(&from, rotation_path(&self.path, i + 1));
            }
        }
        let _ = std::fs::rename(&self.path, rotation_path(&self.path, 1));

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("failed to reopen audit log after rotation")?;
        self.current_size = 0;

        Ok(())
    }
}

/// Build path for a rotated log file: `audit.jsonl.1`, `audit.jsonl.2`, etc.
fn rotation_path(base: &Path, index: u32) -> PathBuf {
    let name = format!(
        "{}.{index}",
        base.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audit.jsonl")
    );
    base.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(url: &str) -> SnapshotEvent {
        SnapshotEvent {
            timestamp: "2026-01-01T00:00:00+00:00".into(),
            url: url.into(),
            output_dir: "/tmp/out".into(),
            success: true,
            statistics: Statistics {
                total_assets: 3,
                downloaded_assets: 2,
                failed_assets: 1,
                processing_time_ms: 40,
            },
            duration_ms: 42,
            message: "ok".into(),
        }
    }

    #[test]
    fn test_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/audit.jsonl");
        {
            let mut logger = AuditLogger::open(&path).unwrap();
            logger.log(&event("https://a.test/")).unwrap();
        }
        let mut logger = AuditLogger::open(&path).unwrap();
        logger.log(&event("https://b.test/")).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<SnapshotEvent> = raw
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].url, "https://b.test/");
        assert_eq!(lines[0].statistics.failed_assets, 1);
    }

    #[test]
    fn test_rotation_keeps_bounded_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let mut logger = AuditLogger::open(&path).unwrap();
        logger.max_size = 1;

        for i in 0..(MAX_ROTATIONS + 3) {
            logger.log(&event(&format!("https://a.test/{i}"))).unwrap();
        }

        assert!(path.exists());
        for i in 1..=MAX_ROTATIONS {
            assert!(rotation_path(&path, i).exists(), "missing rotation {i}");
        }
        assert!(!rotation_path(&path, MAX_ROTATIONS + 1).exists());
        // Newest event is in the live file.
        let live = std::fs::read_to_string(&path).unwrap();
        assert!(live.contains(&format!("https://a.test/{}", MAX_ROTATIONS + 2)));
    }

    #[test]
    fn test_rotation_path() {
        let p = rotation_path(Path::new("/x/audit.jsonl"), 3);
        assert_eq!(p, PathBuf::from("/x/audit.jsonl.3"));
    }
}
