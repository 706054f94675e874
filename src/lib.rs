//! Single-connection SQL Server client with transparent reconnect.
//!
//! [`ConnectionManager`] holds one lazily-established connection. Every
//! [`query`](ConnectionManager::query) and
//! [`execute`](ConnectionManager::execute) first makes sure the connection is
//! usable, and if the operation fails because the transport dropped, the
//! manager reconnects and retries that operation exactly once. Any other
//! failure (bad SQL, constraint or permission errors, query timeouts) is
//! returned immediately.
//!
//! The [`dispatch`] module exposes the same operations through the JSON
//! method-call contract used by host bridges.

pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod manager;
#[cfg(feature = "mssql")]
pub mod mssql;
pub mod prelude;
pub mod results;
pub mod types;

pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use dispatch::{Dispatcher, MethodCall, Response};
pub use driver::{Driver, DriverConnection};
pub use error::MssqlConnectionError;
pub use manager::{ConnectionManager, ConnectionState};
pub use results::{CustomDbRow, ResultSet, UpdateResult};
pub use types::RowValues;
