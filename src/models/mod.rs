//! Data models for db-maintenance.
//!
//! This module re-exports all model types produced by a maintenance run.

pub mod report;
pub mod size;

// Re-export commonly used types
pub use report::{BackupArtifact, BackupOutcome, CleanupOutcome, RunReport};
pub use size::{SchemaSize, SizeReport};
