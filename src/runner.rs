//! The maintenance sequence.
//!
//! `backup → size before → clear transients → size after → backup`, then the
//! connection is closed. Each step reports its own outcome; none of them stops
//! the run. Steps that need the database open the connection on demand, so
//! when the server is unreachable every database step is skipped and both
//! backups are still attempted.

use crate::backup::DumpCommand;
use crate::config::MaintenanceSettings;
use crate::db::MaintenanceDb;
use crate::error::ConnectError;
use crate::models::{BackupOutcome, CleanupOutcome, RunReport, SizeReport};
use tracing::{error, info, warn};

pub struct MaintenanceRunner<D: MaintenanceDb> {
    db: D,
    dump: DumpCommand,
    database: String,
    reachable: bool,
}

impl<D: MaintenanceDb> MaintenanceRunner<D> {
    pub fn new(settings: &MaintenanceSettings, db: D) -> Self {
        Self {
            db,
            dump: DumpCommand::new(settings),
            database: settings.database.clone(),
            reachable: false,
        }
    }

    /// Execute the full sequence and close the connection.
    pub async fn run(&mut self) -> RunReport {
        info!(database = %self.database, "Starting maintenance run");

        let backup_before = self.backup().await;
        let size_before = self.get_db_size().await;
        let cleanup = self.clear_transients().await;
        let size_after = self.get_db_size().await;
        let backup_after = self.backup().await;

        if let Err(e) = self.db.close_connection().await {
            warn!(error = %e, "Failed to close connection");
        }

        info!(database = %self.database, reachable = self.reachable, "Maintenance run finished");

        RunReport {
            database: self.database.clone(),
            backup_before,
            size_before,
            cleanup,
            size_after,
            backup_after,
            database_reachable: self.reachable,
        }
    }

    /// Dump the database into a new backup file. Never fails the run.
    pub async fn backup(&self) -> BackupOutcome {
        info!(dir = %self.dump.backup_dir().display(), "Backup...");
        match self.dump.run().await {
            Ok(artifact) => BackupOutcome::Written(artifact),
            Err(e) => {
                error!(
                    program = %self.dump.program(),
                    error = %e,
                    source = ?std::error::Error::source(&e),
                    "Error, unable to backup"
                );
                BackupOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Measure the schema size, opening the connection if needed.
    pub async fn get_db_size(&mut self) -> SizeReport {
        if let Err(e) = self.ensure_open().await {
            return SizeReport::unavailable(e.to_string());
        }

        match self.db.schema_size().await {
            Ok(size) => {
                let report = SizeReport::from(size);
                info!(database = %self.database, size = %report, "Measured database size");
                report
            }
            Err(e) => {
                error!(error = %e, "Size query failed");
                if e.is_connection_failure() {
                    self.drop_connection().await;
                }
                SizeReport::unavailable(e.to_string())
            }
        }
    }

    /// Delete transient rows, opening the connection if needed.
    pub async fn clear_transients(&mut self) -> CleanupOutcome {
        info!("ClearTransients...");
        if let Err(e) = self.ensure_open().await {
            return CleanupOutcome::Skipped {
                reason: e.to_string(),
            };
        }

        match self.db.delete_transients().await {
            Ok(rows) => {
                info!(rows, "Cleared transients");
                CleanupOutcome::Cleared { rows }
            }
            Err(e) => {
                error!(error = %e, "Transient cleanup failed");
                if e.is_connection_failure() {
                    self.drop_connection().await;
                }
                CleanupOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Whether any step managed to open a connection so far.
    pub fn database_reachable(&self) -> bool {
        self.reachable
    }

    pub fn db(&self) -> &D {
        &self.db
    }

    pub fn into_db(self) -> D {
        self.db
    }

    async fn ensure_open(&mut self) -> Result<(), ConnectError> {
        if self.db.is_open() {
            return Ok(());
        }
        match self.db.open_connection().await {
            Ok(()) => {
                self.reachable = true;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, suggestion = e.suggestion(), "Cannot open connection");
                Err(e)
            }
        }
    }

    /// Discard a connection that failed mid-query so the next step reconnects.
    async fn drop_connection(&mut self) {
        if let Err(e) = self.db.close_connection().await {
            warn!(error = %e, "Failed to close broken connection");
        }
    }
}
