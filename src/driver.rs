//! Pluggable driver interface.
//!
//! The [`ConnectionManager`](crate::ConnectionManager) only ever talks to a
//! [`Driver`]; the SQL Server implementation lives in [`crate::mssql`] and
//! tests substitute scripted doubles.

use async_trait::async_trait;

use crate::config::ConnectionConfig;
use crate::error::MssqlConnectionError;
use crate::results::ResultSet;

/// Opens connections for a [`ConnectionConfig`].
#[async_trait]
pub trait Driver: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Open a new live connection using the config's credentials.
    ///
    /// The manager applies `config.timeout` around this call, so
    /// implementations need not enforce it themselves.
    ///
    /// # Errors
    /// Any failure to reach or authenticate against the server.
    async fn establish(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn DriverConnection>, MssqlConnectionError>;
}

/// One live connection handle.
#[async_trait]
pub trait DriverConnection: Send {
    /// Run a read query and materialize every row.
    ///
    /// # Errors
    /// Returns an error the manager classifies with
    /// [`MssqlConnectionError::is_transport_loss`].
    async fn query(&mut self, sql: &str) -> Result<ResultSet, MssqlConnectionError>;

    /// Run a write or DDL statement and return the affected-row count.
    ///
    /// # Errors
    /// As for [`query`](Self::query).
    async fn execute(&mut self, sql: &str) -> Result<u64, MssqlConnectionError>;

    /// Close the handle.
    ///
    /// # Errors
    /// Returns an error if the server or transport rejects the close.
    async fn close(&mut self) -> Result<(), MssqlConnectionError>;

    /// Whether the handle is known to be unusable.
    fn is_closed(&self) -> bool;
}
