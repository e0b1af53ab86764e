//! Error types for the maintenance run.
//!
//! All errors are `thiserror` enums. Connection failures are classified into
//! [`ConnectError`] so the runner can report "server unreachable" and
//! "credentials rejected" differently and decide whether to continue.

use sqlx::mysql::MySqlDatabaseError;
use std::path::PathBuf;
use thiserror::Error;

/// MySQL server error numbers that mean the credentials were refused.
/// 1044: access denied to database, 1045: access denied for user,
/// 1698: access denied by the auth plugin.
const AUTH_ERROR_NUMBERS: &[u16] = &[1044, 1045, 1698];

/// SQLSTATE class for invalid authorization specification.
const AUTH_SQLSTATE: &str = "28000";

/// Classified failure to open a database connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Cannot connect to server: {message}")]
    Unreachable { message: String },

    #[error("Authentication rejected: {message}")]
    AuthRejected { message: String },

    #[error("Connection failed: {0}")]
    Other(String),
}

impl ConnectError {
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }

    pub fn auth_rejected(message: impl Into<String>) -> Self {
        Self::AuthRejected {
            message: message.into(),
        }
    }

    /// Classify a driver error raised while connecting.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(io_err) => Self::unreachable(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => Self::unreachable(format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => Self::unreachable(format!("Protocol error: {}", msg)),
            sqlx::Error::PoolTimedOut => Self::unreachable("Timed out waiting for the server"),
            sqlx::Error::Database(db_err) => {
                let number = db_err
                    .try_downcast_ref::<MySqlDatabaseError>()
                    .map(|e| e.number());
                let code = db_err.code().map(|c| c.to_string());
                let message = db_err.message().to_string();
                if is_auth_failure(number, code.as_deref()) {
                    Self::auth_rejected(message)
                } else {
                    Self::Other(message)
                }
            }
            other => Self::Other(other.to_string()),
        }
    }

    /// Hint shown to the operator next to the error.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Unreachable { .. } => {
                "Check the server host and port, and that the database server is running"
            }
            Self::AuthRejected { .. } => {
                "Invalid username/password, check the configured credentials"
            }
            Self::Other(_) => "Check the database name and server logs",
        }
    }
}

/// True when a server error number or SQLSTATE means the login was refused.
pub fn is_auth_failure(number: Option<u16>, sql_state: Option<&str>) -> bool {
    number.is_some_and(|n| AUTH_ERROR_NUMBERS.contains(&n)) || sql_state == Some(AUTH_SQLSTATE)
}

/// Failure while producing a backup artifact.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Cannot create backup directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot create backup file {}: {source}", path.display())]
    CreateFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("'{program}' did not expose its standard output")]
    MissingStdout { program: String },

    #[error("Failed writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed waiting for '{program}': {source}")]
    Wait {
        program: String,
        source: std::io::Error,
    },

    #[error("'{program}' did not finish within {timeout_secs}s")]
    Timeout { program: String, timeout_secs: u64 },
}

/// Failure of a database step on an open (or expected to be open) connection.
#[derive(Error, Debug)]
pub enum MaintenanceError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Query failed: {message}")]
    Query {
        message: String,
        /// SQLSTATE reported by the server, if any
        code: Option<String>,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Connection is not open")]
    NotConnected,
}

impl MaintenanceError {
    pub fn query(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Query {
            message: message.into(),
            code,
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// True if the error means the server could not be used at all.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::NotConnected)
    }
}

/// Convert sqlx errors raised by queries on an already open connection.
impl From<sqlx::Error> for MaintenanceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                MaintenanceError::query(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => MaintenanceError::query("No rows returned", None),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut => {
                MaintenanceError::Connect(ConnectError::from_sqlx(err))
            }
            other => MaintenanceError::query(other.to_string(), None),
        }
    }
}

/// Result type alias for maintenance operations.
pub type MaintenanceResult<T> = Result<T, MaintenanceError>;
