//! Single-connection MySQL client.
//!
//! A maintenance run needs exactly one connection, so this wraps a plain
//! `MySqlConnection` instead of a pool. Every query is bounded by the
//! configured query timeout.

use crate::config::MaintenanceSettings;
use crate::db::MaintenanceDb;
use crate::error::{ConnectError, MaintenanceError, MaintenanceResult};
use crate::models::SchemaSize;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::{Connection, MySqlConnection, Row};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// LIKE pattern matching transient option names. `!_` is a literal underscore,
/// so `_transient_x` and `_site_transient_x` match but `mytransientx` does not.
pub const TRANSIENT_PATTERN: &str = "%!_transient!_%";

/// Escape character declared on the LIKE clause. Explicit so the pattern holds
/// under `NO_BACKSLASH_ESCAPES`.
const LIKE_ESCAPE: char = '!';

/// Sum of per-table data + index size in MB, rounded per table to 2 decimals.
/// Cast to text so the DECIMAL result decodes without a decimal crate.
const SCHEMA_SIZE_SQL: &str = r#"
    SELECT CAST(SUM(ROUND(((data_length + index_length) / 1024 / 1024), 2)) AS CHAR) AS size_mb
    FROM information_schema.TABLES
    WHERE table_schema = ?
    "#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
        }
    }
}

pub struct DatabaseClient {
    options: MySqlConnectOptions,
    schema: String,
    options_table: String,
    connect_timeout: Duration,
    query_timeout: Duration,
    connection: Option<MySqlConnection>,
}

impl DatabaseClient {
    /// Create a client for the configured schema. No connection is opened yet.
    pub fn new(settings: &MaintenanceSettings) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&settings.server)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .database(&settings.database)
            .ssl_mode(settings.ssl_mode.into());

        Self {
            options,
            schema: settings.database.clone(),
            options_table: settings.options_table.clone(),
            connect_timeout: settings.connect_timeout,
            query_timeout: settings.query_timeout,
            connection: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.connection.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }
}

/// DELETE statement for the given options table. The table name is validated
/// as a plain identifier when settings are loaded.
pub(crate) fn delete_transients_sql(options_table: &str) -> String {
    format!(
        "DELETE FROM `{}` WHERE option_name LIKE ? ESCAPE '{}'",
        options_table, LIKE_ESCAPE
    )
}

impl std::fmt::Debug for DatabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseClient")
            .field("schema", &self.schema)
            .field("options_table", &self.options_table)
            .field("state", &format_args!("{}", self.state()))
            .finish()
    }
}

impl MaintenanceDb for DatabaseClient {
    fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    async fn open_connection(&mut self) -> Result<(), ConnectError> {
        if self.connection.is_some() {
            return Ok(());
        }

        debug!(schema = %self.schema, "Opening database connection");

        match timeout(
            self.connect_timeout,
            MySqlConnection::connect_with(&self.options),
        )
        .await
        {
            Ok(Ok(conn)) => {
                info!(schema = %self.schema, "Connected to database");
                self.connection = Some(conn);
                Ok(())
            }
            Ok(Err(e)) => {
                let err = ConnectError::from_sqlx(e);
                warn!(schema = %self.schema, error = %err, "Failed to open connection");
                Err(err)
            }
            Err(_) => {
                let err = ConnectError::unreachable(format!(
                    "no response within {}s",
                    self.connect_timeout.as_secs()
                ));
                warn!(schema = %self.schema, error = %err, "Failed to open connection");
                Err(err)
            }
        }
    }

    async fn close_connection(&mut self) -> MaintenanceResult<()> {
        match self.connection.take() {
            Some(conn) => {
                conn.close().await?;
                debug!(schema = %self.schema, "Connection closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn schema_size(&mut self) -> MaintenanceResult<Option<SchemaSize>> {
        let conn = self
            .connection
            .as_mut()
            .ok_or(MaintenanceError::NotConnected)?;

        debug!(schema = %self.schema, "Measuring schema size");

        let query = sqlx::query(SCHEMA_SIZE_SQL)
            .bind(self.schema.as_str())
            .fetch_one(&mut *conn);
        let row = match timeout(self.query_timeout, query).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(MaintenanceError::timeout(
                    "size query",
                    self.query_timeout.as_secs(),
                ));
            }
        };

        let value: Option<String> = row.try_get("size_mb")?;
        match value {
            Some(text) => SchemaSize::parse(&text).map(Some).ok_or_else(|| {
                MaintenanceError::query(format!("Unexpected size value '{}'", text), None)
            }),
            None => Ok(None),
        }
    }

    async fn delete_transients(&mut self) -> MaintenanceResult<u64> {
        let sql = delete_transients_sql(&self.options_table);
        let conn = self
            .connection
            .as_mut()
            .ok_or(MaintenanceError::NotConnected)?;

        debug!(sql = %sql, pattern = TRANSIENT_PATTERN, "Deleting transients");

        let statement = sqlx::query(&sql).bind(TRANSIENT_PATTERN).execute(&mut *conn);
        match timeout(self.query_timeout, statement).await {
            Ok(Ok(result)) => Ok(result.rows_affected()),
            Ok(Err(e)) => Err(MaintenanceError::from(e)),
            Err(_) => Err(MaintenanceError::timeout(
                "transient cleanup",
                self.query_timeout.as_secs(),
            )),
        }
    }
}
