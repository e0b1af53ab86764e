//! Database access layer.
//!
//! This module provides the single-connection MySQL client used by a
//! maintenance run, and the [`MaintenanceDb`] trait the runner is written
//! against.

pub mod client;

pub use client::{ConnectionState, DatabaseClient, TRANSIENT_PATTERN};

use crate::error::{ConnectError, MaintenanceResult};
use crate::models::SchemaSize;

/// Database operations needed by a maintenance run.
///
/// Implementations hold at most one connection. Queries require an open
/// connection and fail with `MaintenanceError::NotConnected` otherwise.
#[allow(async_fn_in_trait)]
pub trait MaintenanceDb {
    fn is_open(&self) -> bool;

    /// Open the connection. Does nothing if it is already open.
    async fn open_connection(&mut self) -> Result<(), ConnectError>;

    /// Close the connection. Does nothing if it is already closed.
    async fn close_connection(&mut self) -> MaintenanceResult<()>;

    /// Data + index size of the configured schema. `None` if it has no tables.
    async fn schema_size(&mut self) -> MaintenanceResult<Option<SchemaSize>>;

    /// Delete transient rows from the options table, returning the affected row count.
    async fn delete_transients(&mut self) -> MaintenanceResult<u64>;
}
