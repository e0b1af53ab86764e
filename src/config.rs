//! Configuration handling for db-maintenance.
//!
//! Settings are read from CLI arguments with environment variable fallbacks,
//! then validated once into an immutable [`MaintenanceSettings`] value that is
//! handed to the runner.

use clap::{Parser, ValueEnum};
use sqlx::mysql::MySqlSslMode;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_BACKUP_DIR: &str = "db-backup";
pub const DEFAULT_OPTIONS_TABLE: &str = "wp_options";
pub const DEFAULT_DUMP_PROGRAM: &str = "mysqldump";
pub const DEFAULT_DUMP_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Errors found while validating settings. Always fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting '{0}'")]
    Missing(&'static str),

    #[error("Invalid setting '{name}': {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

/// TLS mode for the database connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SslMode {
    Disabled,
    #[default]
    Preferred,
    Required,
}

impl From<SslMode> for MySqlSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disabled => MySqlSslMode::Disabled,
            SslMode::Preferred => MySqlSslMode::Preferred,
            SslMode::Required => MySqlSslMode::Required,
        }
    }
}

/// Raw configuration for db-maintenance.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "db-maintenance",
    about = "Back up a MySQL database, clear transient cache rows and report its size",
    version,
    author
)]
pub struct Config {
    /// Database server host
    #[arg(long, env = "DBMAINT_SERVER")]
    pub server: Option<String>,

    /// Database (schema) name
    #[arg(long, env = "DBMAINT_DATABASE")]
    pub database: Option<String>,

    /// Database user
    #[arg(long, env = "DBMAINT_USER")]
    pub user: Option<String>,

    /// Database password (prefer the environment variable)
    #[arg(long, env = "DBMAINT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Database server port
    #[arg(
        long,
        default_value_t = DEFAULT_PORT,
        env = "DBMAINT_PORT",
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub port: u16,

    /// Directory where backup files are written (created if missing)
    #[arg(long, default_value = DEFAULT_BACKUP_DIR, env = "DBMAINT_BACKUP_DIR")]
    pub backup_dir: PathBuf,

    /// Table holding the transient rows
    #[arg(long, default_value = DEFAULT_OPTIONS_TABLE, env = "DBMAINT_OPTIONS_TABLE")]
    pub options_table: String,

    /// Dump program, looked up on PATH
    #[arg(long, default_value = DEFAULT_DUMP_PROGRAM, env = "DBMAINT_DUMP_PROGRAM")]
    pub dump_program: String,

    /// Extra arguments passed to the dump program before the connection arguments.
    /// Can be specified multiple times or as comma-separated values.
    #[arg(
        long = "dump-arg",
        value_name = "ARG",
        env = "DBMAINT_DUMP_ARGS",
        value_delimiter = ',',
        allow_hyphen_values = true
    )]
    pub dump_args: Vec<String>,

    /// Dump timeout in seconds (0 waits forever)
    #[arg(long, default_value_t = DEFAULT_DUMP_TIMEOUT_SECS, env = "DBMAINT_DUMP_TIMEOUT")]
    pub dump_timeout: u64,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, env = "DBMAINT_CONNECT_TIMEOUT")]
    pub connect_timeout: u64,

    /// Query timeout in seconds
    #[arg(long, default_value_t = DEFAULT_QUERY_TIMEOUT_SECS, env = "DBMAINT_QUERY_TIMEOUT")]
    pub query_timeout: u64,

    /// TLS mode for the database connection
    #[arg(long, value_enum, default_value = "preferred", env = "DBMAINT_SSL_MODE")]
    pub ssl_mode: SslMode,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DBMAINT_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DBMAINT_JSON_LOGS")]
    pub json_logs: bool,

    /// Print the run report as JSON instead of text
    #[arg(long = "json", env = "DBMAINT_JSON_REPORT")]
    pub json_report: bool,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            server: None,
            database: None,
            user: None,
            password: None,
            port: DEFAULT_PORT,
            backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            options_table: DEFAULT_OPTIONS_TABLE.to_string(),
            dump_program: DEFAULT_DUMP_PROGRAM.to_string(),
            dump_args: Vec::new(),
            dump_timeout: DEFAULT_DUMP_TIMEOUT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            ssl_mode: SslMode::Preferred,
            log_level: "info".to_string(),
            json_logs: false,
            json_report: false,
        }
    }

    /// Validate the raw values into settings for a run.
    pub fn settings(&self) -> Result<MaintenanceSettings, ConfigError> {
        let server = required("server", &self.server)?;
        let database = required("database", &self.database)?;
        let user = required("user", &self.user)?;
        // An empty password is a legitimate account setup; only absence is an error.
        let password = self
            .password
            .clone()
            .ok_or(ConfigError::Missing("password"))?;

        if self.port == 0 {
            return Err(ConfigError::invalid("port", "must be between 1 and 65535"));
        }
        if self.connect_timeout == 0 {
            return Err(ConfigError::invalid("connect_timeout", "must be at least 1 second"));
        }
        if self.query_timeout == 0 {
            return Err(ConfigError::invalid("query_timeout", "must be at least 1 second"));
        }
        if database.contains(['/', '\\', '\0']) || database == "." || database == ".." {
            return Err(ConfigError::invalid(
                "database",
                "must not contain path separators",
            ));
        }
        if !is_identifier(&self.options_table) {
            return Err(ConfigError::invalid(
                "options_table",
                format!(
                    "'{}' is not a plain table name (letters, digits, '_' or '$')",
                    self.options_table
                ),
            ));
        }
        if self.dump_program.trim().is_empty() {
            return Err(ConfigError::Missing("dump_program"));
        }
        if self.backup_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing("backup_dir"));
        }

        Ok(MaintenanceSettings {
            server,
            database,
            user,
            password,
            port: self.port,
            backup_dir: self.backup_dir.clone(),
            options_table: self.options_table.clone(),
            dump_program: self.dump_program.clone(),
            dump_args: self.dump_args.clone(),
            dump_timeout: (self.dump_timeout > 0).then(|| Duration::from_secs(self.dump_timeout)),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            query_timeout: Duration::from_secs(self.query_timeout),
            ssl_mode: self.ssl_mode,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

fn required(name: &'static str, value: &Option<String>) -> Result<String, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Validated, immutable settings for one maintenance run.
#[derive(Clone)]
pub struct MaintenanceSettings {
    pub server: String,
    pub database: String,
    pub user: String,
    /// Sensitive - never log
    pub password: String,
    pub port: u16,
    pub backup_dir: PathBuf,
    pub options_table: String,
    pub dump_program: String,
    pub dump_args: Vec<String>,
    /// None waits for the dump tool indefinitely
    pub dump_timeout: Option<Duration>,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
    pub ssl_mode: SslMode,
}

impl std::fmt::Debug for MaintenanceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceSettings")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"****")
            .field("port", &self.port)
            .field("backup_dir", &self.backup_dir)
            .field("options_table", &self.options_table)
            .field("dump_program", &self.dump_program)
            .field("dump_args", &self.dump_args)
            .field("dump_timeout", &self.dump_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("query_timeout", &self.query_timeout)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}
