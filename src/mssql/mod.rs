// MSSQL module - SQL Server driver built on tiberius
//
// - client: TCP + TDS login for a `ConnectionConfig`
// - query: result-set materialization and DML execution
// - connection: the `Driver` / `DriverConnection` implementations

pub mod client;
pub mod connection;
pub mod query;

pub use client::{MssqlClient, create_mssql_client};
pub use connection::{TiberiusConnection, TiberiusDriver};
pub use query::{build_result_set, execute_dml};

use crate::error::{
    MssqlConnectionError, is_transport_io_kind, is_transport_native_code,
};

/// Whether a tiberius failure means the session is gone.
#[must_use]
pub fn is_transport_error(err: &tiberius::error::Error) -> bool {
    match err {
        tiberius::error::Error::Io { kind, .. } => is_transport_io_kind(*kind),
        tiberius::error::Error::Server(token) => is_transport_native_code(token.code()),
        _ => false,
    }
}

/// Sort a tiberius failure into the crate's error taxonomy.
pub(crate) fn classify_error(err: tiberius::error::Error) -> MssqlConnectionError {
    if is_transport_error(&err) {
        return MssqlConnectionError::TransportLoss {
            sql_state: Some("08S01".to_string()),
            message: err.to_string(),
        };
    }
    match err {
        tiberius::error::Error::Server(token) => MssqlConnectionError::ExecutionError {
            sql_state: None,
            code: Some(token.code()),
            message: token.message().to_string(),
        },
        other => MssqlConnectionError::MssqlError(other),
    }
}
