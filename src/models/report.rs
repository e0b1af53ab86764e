//! Outcome models for the individual maintenance steps and the whole run.

use crate::models::SizeReport;
use humansize::{DECIMAL, format_size};
use serde::Serialize;
use std::path::PathBuf;

/// A backup file written by the dump tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupArtifact {
    pub path: PathBuf,
    pub bytes_written: u64,
    /// Exit code of the dump tool. Recorded, not enforced.
    pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BackupOutcome {
    Written(BackupArtifact),
    Failed { reason: String },
}

impl BackupOutcome {
    pub fn artifact(&self) -> Option<&BackupArtifact> {
        match self {
            Self::Written(artifact) => Some(artifact),
            Self::Failed { .. } => None,
        }
    }
}

impl std::fmt::Display for BackupOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Written(artifact) => write!(
                f,
                "{} ({})",
                artifact.path.display(),
                format_size(artifact.bytes_written, DECIMAL)
            ),
            Self::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupOutcome {
    Cleared { rows: u64 },
    /// No connection could be opened; nothing was executed
    Skipped { reason: String },
    Failed { reason: String },
}

impl CleanupOutcome {
    pub fn rows(&self) -> Option<u64> {
        match self {
            Self::Cleared { rows } => Some(*rows),
            _ => None,
        }
    }
}

/// Everything a maintenance run observed, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub database: String,
    pub backup_before: BackupOutcome,
    pub size_before: SizeReport,
    pub cleanup: CleanupOutcome,
    pub size_after: SizeReport,
    pub backup_after: BackupOutcome,
    /// False when no step managed to open a connection
    pub database_reachable: bool,
}

impl RunReport {
    /// Console lines printed at the end of a run.
    pub fn render_text(&self) -> String {
        let mut lines = Vec::with_capacity(5);
        lines.push(backup_line(&self.backup_before));
        lines.push(format!("DB size before: {}", self.size_before));
        lines.push(match &self.cleanup {
            CleanupOutcome::Cleared { rows } => format!("Cleared Transients: {}", rows),
            CleanupOutcome::Skipped { reason } => {
                format!("Cleared Transients: skipped ({})", reason)
            }
            CleanupOutcome::Failed { reason } => format!("Cleared Transients: failed ({})", reason),
        });
        lines.push(format!("DB size after: {}", self.size_after));
        lines.push(backup_line(&self.backup_after));
        lines.join("\n")
    }
}

fn backup_line(outcome: &BackupOutcome) -> String {
    match outcome {
        BackupOutcome::Written(_) => format!("Backup: {}", outcome),
        BackupOutcome::Failed { reason } => format!("Backup failed: {}", reason),
    }
}
