use std::time::Duration;

use thiserror::Error;

#[cfg(feature = "mssql")]
use tiberius;

/// Category label reported across the bridge for every failure kind.
pub const DATABASE_ERROR: &str = "DATABASE_ERROR";

/// SQLSTATE values that mean the session itself is gone.
///
/// `08S01` communication link failure, `08003` connection does not exist,
/// `08007` connection failure during transaction, `HY010` function sequence
/// error raised by drivers on a dead handle.
pub const TRANSPORT_SQL_STATES: [&str; 4] = ["08S01", "08003", "08007", "HY010"];

/// SQL Server native error numbers reported when the server drops the session.
pub const TRANSPORT_NATIVE_CODES: [u32; 5] = [64, 233, 10053, 10054, 10058];

#[derive(Debug, Error)]
pub enum MssqlConnectionError {
    #[cfg(feature = "mssql")]
    #[error(transparent)]
    MssqlError(#[from] tiberius::error::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Connection lost: {message}")]
    TransportLoss {
        sql_state: Option<String>,
        message: String,
    },

    #[error("SQL execution error: {message}")]
    ExecutionError {
        sql_state: Option<String>,
        code: Option<u32>,
        message: String,
    },

    #[error("Query timed out after {0:?}")]
    QueryTimeout(Duration),

    #[error("Disconnect error: {0}")]
    DisconnectError(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl MssqlConnectionError {
    /// Shorthand for an execution failure that carries only a message.
    pub fn execution(message: impl Into<String>) -> Self {
        MssqlConnectionError::ExecutionError {
            sql_state: None,
            code: None,
            message: message.into(),
        }
    }

    /// Build an error from a SQLSTATE, routing transport states to `TransportLoss`.
    pub fn from_sql_state(sql_state: &str, message: impl Into<String>) -> Self {
        if is_transport_sql_state(sql_state) {
            MssqlConnectionError::TransportLoss {
                sql_state: Some(sql_state.to_string()),
                message: message.into(),
            }
        } else {
            MssqlConnectionError::ExecutionError {
                sql_state: Some(sql_state.to_string()),
                code: None,
                message: message.into(),
            }
        }
    }

    /// Whether this failure may be recovered by reconnecting and retrying once.
    #[must_use]
    pub fn is_transport_loss(&self) -> bool {
        match self {
            MssqlConnectionError::TransportLoss { .. } => true,
            MssqlConnectionError::ExecutionError {
                sql_state, code, ..
            } => {
                sql_state.as_deref().is_some_and(is_transport_sql_state)
                    || code.is_some_and(is_transport_native_code)
            }
            #[cfg(feature = "mssql")]
            MssqlConnectionError::MssqlError(err) => crate::mssql::is_transport_error(err),
            _ => false,
        }
    }

    /// The SQLSTATE attached to this error, if the driver reported one.
    #[must_use]
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            MssqlConnectionError::TransportLoss { sql_state, .. }
            | MssqlConnectionError::ExecutionError { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// Bridge-facing category. Every variant shares one label.
    #[must_use]
    pub fn category(&self) -> &'static str {
        DATABASE_ERROR
    }
}

#[must_use]
pub fn is_transport_sql_state(sql_state: &str) -> bool {
    TRANSPORT_SQL_STATES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(sql_state))
}

#[must_use]
pub fn is_transport_native_code(code: u32) -> bool {
    TRANSPORT_NATIVE_CODES.contains(&code)
}

#[must_use]
pub(crate) fn is_transport_io_kind(kind: std::io::ErrorKind) -> bool {
    use std::io::ErrorKind;
    matches!(
        kind,
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof
    )
}

impl From<std::io::Error> for MssqlConnectionError {
    fn from(err: std::io::Error) -> Self {
        if is_transport_io_kind(err.kind()) {
            MssqlConnectionError::TransportLoss {
                sql_state: Some("08S01".to_string()),
                message: err.to_string(),
            }
        } else {
            MssqlConnectionError::ConnectionError(err.to_string())
        }
    }
}
