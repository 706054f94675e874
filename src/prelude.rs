//! Convenient imports for common functionality.

pub use crate::config::{ConnectionConfig, ConnectionConfigBuilder};
pub use crate::dispatch::{Dispatcher, MethodCall, Response};
pub use crate::driver::{Driver, DriverConnection};
pub use crate::error::{DATABASE_ERROR, MssqlConnectionError};
pub use crate::manager::{ConnectionManager, ConnectionState};
pub use crate::results::{CustomDbRow, ResultSet, UpdateResult};
pub use crate::types::RowValues;

#[cfg(feature = "mssql")]
pub use crate::mssql::{MssqlClient, TiberiusDriver, create_mssql_client};
