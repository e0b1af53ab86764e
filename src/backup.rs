//! Logical backups through an external dump tool.
//!
//! The dump tool (normally `mysqldump`) is started with the connection
//! arguments and its standard output is streamed into a new timestamped
//! `.sql` file. The file is created fresh for every call and never appended to.
//!
//! The dump tool's exit status is recorded but not treated as a failure.

use crate::config::MaintenanceSettings;
use crate::error::BackupError;
use crate::models::BackupArtifact;
use chrono::{DateTime, Local, TimeZone};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

const MASKED_PASSWORD: &str = "****";

/// Fresh timestamps tried when a backup file for the current millisecond already exists.
const NAME_COLLISION_RETRIES: u32 = 3;

/// Backup file name: `{database}{YYYY}-{MM}-{DD}-{HH}-{mm}-{ss}-{ms}.sql`.
/// Milliseconds are not zero-padded.
pub fn artifact_file_name<Tz: TimeZone>(database: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}{}-{}.sql",
        database,
        at.format("%Y-%m-%d-%H-%M-%S"),
        // Leap seconds report >= 1000
        at.timestamp_subsec_millis().min(999)
    )
}

/// Invocation of the external dump tool for one database.
#[derive(Clone)]
pub struct DumpCommand {
    program: String,
    extra_args: Vec<String>,
    server: String,
    port: u16,
    user: String,
    password: String,
    database: String,
    backup_dir: PathBuf,
    timeout: Option<Duration>,
}

impl DumpCommand {
    pub fn new(settings: &MaintenanceSettings) -> Self {
        Self {
            program: settings.dump_program.clone(),
            extra_args: settings.dump_args.clone(),
            server: settings.server.clone(),
            port: settings.port,
            user: settings.user.clone(),
            password: settings.password.clone(),
            database: settings.database.clone(),
            backup_dir: settings.backup_dir.clone(),
            timeout: settings.dump_timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Arguments passed to the dump tool:
    /// `[extra..] -u{user} -p{password} -h{server} --port {port} {database}`.
    pub fn arguments(&self) -> Vec<String> {
        self.render_arguments(&self.password)
    }

    /// Command line safe for logs.
    pub fn masked_command_line(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.render_arguments(MASKED_PASSWORD));
        parts.join(" ")
    }

    fn render_arguments(&self, password: &str) -> Vec<String> {
        let mut args = self.extra_args.clone();
        args.extend([
            format!("-u{}", self.user),
            format!("-p{}", password),
            format!("-h{}", self.server),
            "--port".to_string(),
            self.port.to_string(),
            self.database.clone(),
        ]);
        args
    }

    pub fn artifact_path<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> PathBuf
    where
        Tz::Offset: std::fmt::Display,
    {
        self.backup_dir.join(artifact_file_name(&self.database, at))
    }

    /// Run a backup stamped with the current local time.
    pub async fn run(&self) -> Result<BackupArtifact, BackupError> {
        let mut attempts = 0;
        loop {
            match self.run_at(&Local::now()).await {
                Err(BackupError::CreateFile { source, .. })
                    if source.kind() == std::io::ErrorKind::AlreadyExists
                        && attempts < NAME_COLLISION_RETRIES =>
                {
                    attempts += 1;
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                result => return result,
            }
        }
    }

    /// Run a backup into the file named after `at`.
    pub async fn run_at<Tz: TimeZone>(
        &self,
        at: &DateTime<Tz>,
    ) -> Result<BackupArtifact, BackupError>
    where
        Tz::Offset: std::fmt::Display,
    {
        tokio::fs::create_dir_all(&self.backup_dir)
            .await
            .map_err(|source| BackupError::CreateDir {
                path: self.backup_dir.clone(),
                source,
            })?;

        let path = self.artifact_path(at);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|source| BackupError::CreateFile {
                path: path.clone(),
                source,
            })?;

        info!(
            command = %self.masked_command_line(),
            path = %path.display(),
            "Starting backup"
        );

        let result = self.dump_into(&mut file, &path).await;
        drop(file);

        match result {
            Ok((bytes_written, status)) => {
                if !status.success() {
                    warn!(
                        program = %self.program,
                        status = %status,
                        "Dump tool exited unsuccessfully; the backup may be incomplete"
                    );
                }
                info!(path = %path.display(), bytes = bytes_written, "Backup written");
                Ok(BackupArtifact {
                    path,
                    bytes_written,
                    exit_code: status.code(),
                })
            }
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    debug!(
                        path = %path.display(),
                        error = %remove_err,
                        "Could not remove partial backup"
                    );
                }
                Err(e)
            }
        }
    }

    async fn dump_into(
        &self,
        file: &mut File,
        path: &Path,
    ) -> Result<(u64, ExitStatus), BackupError> {
        let mut child = Command::new(&self.program)
            .args(self.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BackupError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackupError::MissingStdout {
                program: self.program.clone(),
            })?;

        let Some(limit) = self.timeout else {
            return stream_and_wait(&mut child, &mut stdout, file, path, &self.program).await;
        };

        let bounded = timeout(
            limit,
            stream_and_wait(&mut child, &mut stdout, file, path, &self.program),
        )
        .await;

        match bounded {
            Ok(result) => result,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!(
                        program = %self.program,
                        error = %e,
                        "Failed to kill timed out dump tool"
                    );
                }
                Err(BackupError::Timeout {
                    program: self.program.clone(),
                    timeout_secs: limit.as_secs(),
                })
            }
        }
    }
}

impl std::fmt::Debug for DumpCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DumpCommand")
            .field("command", &self.masked_command_line())
            .field("backup_dir", &self.backup_dir)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Copy the child's stdout into `file` until EOF, then wait for the child to exit.
async fn stream_and_wait(
    child: &mut Child,
    stdout: &mut ChildStdout,
    file: &mut File,
    path: &Path,
    program: &str,
) -> Result<(u64, ExitStatus), BackupError> {
    let write_err = |source| BackupError::Write {
        path: path.to_path_buf(),
        source,
    };

    let bytes = tokio::io::copy(stdout, file).await.map_err(write_err)?;
    let status = child.wait().await.map_err(|source| BackupError::Wait {
        program: program.to_string(),
        source,
    })?;
    file.flush().await.map_err(write_err)?;

    Ok((bytes, status))
}
