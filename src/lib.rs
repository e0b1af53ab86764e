//! DB Maintenance Library
//!
//! Backs up a MySQL database with an external dump tool, deletes transient
//! cache rows from the options table and reports the schema size before and
//! after the cleanup.

pub mod backup;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod runner;

pub use config::{Config, MaintenanceSettings};
pub use error::{ConnectError, MaintenanceError};
pub use runner::MaintenanceRunner;
