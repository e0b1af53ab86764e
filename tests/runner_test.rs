//! Integration tests for the maintenance sequence.
//!
//! The database is an in-memory stand-in implementing `MaintenanceDb`; the
//! dump tool is `sh -c` so no MySQL installation is needed.

use db_maintenance::config::Config;
use db_maintenance::db::MaintenanceDb;
use db_maintenance::error::{MaintenanceError, MaintenanceResult};
use db_maintenance::models::{BackupOutcome, CleanupOutcome, SchemaSize, SizeReport};
use db_maintenance::{ConnectError, MaintenanceRunner, MaintenanceSettings};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reachability {
    Ok,
    Unreachable,
    AuthRejected,
}

/// In-memory schema: per-table sizes in MB and the options table's option names.
struct FakeDb {
    reachability: Reachability,
    table_sizes_mb: Vec<f64>,
    option_names: Vec<String>,
    open: bool,
    opens: u32,
    queries_executed: u32,
}

impl FakeDb {
    fn new(table_sizes_mb: Vec<f64>, option_names: Vec<String>) -> Self {
        Self {
            reachability: Reachability::Ok,
            table_sizes_mb,
            option_names,
            open: false,
            opens: 0,
            queries_executed: 0,
        }
    }

    fn with_reachability(mut self, reachability: Reachability) -> Self {
        self.reachability = reachability;
        self
    }
}

impl MaintenanceDb for FakeDb {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn open_connection(&mut self) -> Result<(), ConnectError> {
        match self.reachability {
            Reachability::Ok => {
                self.open = true;
                self.opens += 1;
                Ok(())
            }
            Reachability::Unreachable => Err(ConnectError::unreachable("connection refused")),
            Reachability::AuthRejected => Err(ConnectError::auth_rejected(
                "Access denied for user 'backup'@'localhost'",
            )),
        }
    }

    async fn close_connection(&mut self) -> MaintenanceResult<()> {
        self.open = false;
        Ok(())
    }

    async fn schema_size(&mut self) -> MaintenanceResult<Option<SchemaSize>> {
        if !self.open {
            return Err(MaintenanceError::NotConnected);
        }
        self.queries_executed += 1;
        if self.table_sizes_mb.is_empty() {
            return Ok(None);
        }
        let total: f64 = self
            .table_sizes_mb
            .iter()
            .map(|mb| (mb * 100.0).round() / 100.0)
            .sum();
        Ok(Some(SchemaSize::from_megabytes(total)))
    }

    async fn delete_transients(&mut self) -> MaintenanceResult<u64> {
        if !self.open {
            return Err(MaintenanceError::NotConnected);
        }
        self.queries_executed += 1;
        let before = self.option_names.len();
        self.option_names
            .retain(|name| !name.contains("_transient_"));
        Ok((before - self.option_names.len()) as u64)
    }
}

/// 20 option rows, 5 of them transients.
fn wordpress_options() -> Vec<String> {
    let mut names: Vec<String> = [
        "_transient_timeout_feed_1",
        "_transient_feed_1",
        "_site_transient_update_core",
        "_site_transient_theme_roots",
        "_transient_doing_cron",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    names.push("transient_lookalike".to_string());
    names.push("mytransientcache".to_string());
    for i in 0..13 {
        names.push(format!("option_{}", i));
    }
    assert_eq!(names.len(), 20);
    names
}

fn settings(backup_dir: &Path, dump_program: &str) -> MaintenanceSettings {
    Config {
        server: Some("localhost".to_string()),
        database: Some("wordpress".to_string()),
        user: Some("backup".to_string()),
        password: Some("hunter2".to_string()),
        backup_dir: backup_dir.to_path_buf(),
        dump_program: dump_program.to_string(),
        dump_args: vec![
            "-c".to_string(),
            "echo '-- dump' \"$@\"".to_string(),
            "dump".to_string(),
        ],
        dump_timeout: 30,
        ..Config::default()
    }
    .settings()
    .unwrap()
}

#[cfg(unix)]
#[tokio::test]
async fn test_full_run_reports_sizes_and_cleared_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db = FakeDb::new(vec![1.00, 2.50, 0.50], wordpress_options());
    let mut runner = MaintenanceRunner::new(&settings(dir.path(), "sh"), db);

    let report = runner.run().await;

    assert_eq!(report.size_before.to_string(), "4.00 MB");
    assert_eq!(report.cleanup, CleanupOutcome::Cleared { rows: 5 });
    assert!(report.database_reachable);
    assert!(report.render_text().contains("Cleared Transients: 5"));
    assert!(report.render_text().contains("DB size before: 4.00 MB"));

    let db = runner.into_db();
    assert_eq!(db.option_names.len(), 15);
    assert!(db.option_names.contains(&"mytransientcache".to_string()));
    assert!(!db.open, "connection must be closed after the run");
    assert_eq!(db.opens, 1, "one connection per run");
}

#[cfg(unix)]
#[tokio::test]
async fn test_full_run_writes_two_backups() {
    let dir = tempfile::tempdir().unwrap();
    let db = FakeDb::new(vec![1.0], wordpress_options());
    let mut runner = MaintenanceRunner::new(&settings(dir.path(), "sh"), db);

    let report = runner.run().await;

    let before = report.backup_before.artifact().expect("first backup written");
    let after = report.backup_after.artifact().expect("second backup written");
    assert_ne!(before.path, after.path);
    for artifact in [before, after] {
        let name = artifact.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("wordpress"));
        assert!(name.ends_with(".sql"));
        let content = std::fs::read_to_string(&artifact.path).unwrap();
        assert_eq!(
            content,
            "-- dump -ubackup -phunter2 -hlocalhost --port 3306 wordpress\n"
        );
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[tokio::test]
async fn test_size_is_idempotent_and_cleanup_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let db = FakeDb::new(vec![1.00, 2.50, 0.50], wordpress_options());
    let mut runner = MaintenanceRunner::new(&settings(dir.path(), "sh"), db);

    let first = runner.get_db_size().await;
    let second = runner.get_db_size().await;
    assert_eq!(first, second);

    assert_eq!(runner.clear_transients().await.rows(), Some(5));
    assert_eq!(runner.clear_transients().await.rows(), Some(0));
    assert_eq!(runner.db().option_names.len(), 15);
}

#[tokio::test]
async fn test_empty_schema_reports_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let db = FakeDb::new(Vec::new(), Vec::new());
    let mut runner = MaintenanceRunner::new(&settings(dir.path(), "sh"), db);

    let size = runner.get_db_size().await;

    assert_eq!(size, SizeReport::NoData);
    assert!(size.to_string().starts_with("unknown"));
}

#[tokio::test]
async fn test_unreachable_server_skips_queries_but_still_backs_up() {
    let dir = tempfile::tempdir().unwrap();
    let db = FakeDb::new(vec![1.0], wordpress_options())
        .with_reachability(Reachability::Unreachable);
    let mut runner = MaintenanceRunner::new(
        &settings(dir.path(), "db-maintenance-no-such-dump-tool"),
        db,
    );

    let report = runner.run().await;

    assert!(matches!(report.size_before, SizeReport::Unavailable { .. }));
    assert!(matches!(report.size_after, SizeReport::Unavailable { .. }));
    assert!(report.size_before.to_string().contains("Cannot connect to server"));
    assert!(matches!(report.cleanup, CleanupOutcome::Skipped { .. }));
    assert!(matches!(report.backup_before, BackupOutcome::Failed { .. }));
    assert!(matches!(report.backup_after, BackupOutcome::Failed { .. }));
    assert!(!report.database_reachable);

    let db = runner.into_db();
    assert_eq!(db.queries_executed, 0);
    assert_eq!(db.option_names.len(), 20);
}

#[tokio::test]
async fn test_rejected_credentials_yield_unknown_size() {
    let dir = tempfile::tempdir().unwrap();
    let db = FakeDb::new(vec![1.0], wordpress_options())
        .with_reachability(Reachability::AuthRejected);
    let mut runner = MaintenanceRunner::new(&settings(dir.path(), "sh"), db);

    let size = runner.get_db_size().await;

    assert_eq!(size.size(), None);
    assert!(size.to_string().contains("Authentication rejected"));
    assert_eq!(runner.db().queries_executed, 0);
    assert!(!runner.database_reachable());
}

#[tokio::test]
async fn test_failed_dump_does_not_stop_cleanup() {
    let dir = tempfile::tempdir().unwrap();
    let db = FakeDb::new(vec![1.00, 2.50, 0.50], wordpress_options());
    let mut runner = MaintenanceRunner::new(
        &settings(dir.path(), "db-maintenance-no-such-dump-tool"),
        db,
    );

    let report = runner.run().await;

    match &report.backup_before {
        BackupOutcome::Failed { reason } => assert!(reason.contains("Cannot start")),
        other => panic!("expected failed backup, got {:?}", other),
    }
    assert_eq!(report.cleanup.rows(), Some(5));
    assert_eq!(report.size_before.to_string(), "4.00 MB");
    assert!(report.database_reachable);
}

#[tokio::test]
async fn test_json_report_shape() {
    let dir = tempfile::tempdir().unwrap();
    let db = FakeDb::new(vec![1.00, 2.50, 0.50], wordpress_options())
        .with_reachability(Reachability::Unreachable);
    let mut runner = MaintenanceRunner::new(
        &settings(dir.path(), "db-maintenance-no-such-dump-tool"),
        db,
    );

    let report = runner.run().await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["database"], "wordpress");
    assert_eq!(json["size_before"]["status"], "unavailable");
    assert_eq!(json["cleanup"]["status"], "skipped");
    assert_eq!(json["backup_before"]["status"], "failed");
    assert_eq!(json["database_reachable"], false);
}
