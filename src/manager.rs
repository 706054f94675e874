//! Single-connection manager with reconnect-and-retry-once semantics.
//!
//! The manager owns at most one live [`DriverConnection`]. Every data
//! operation runs inside one critical section that checks the connection,
//! re-establishes it if needed, executes, and on a transport loss
//! reconnects and executes exactly once more.
//!
//! Concurrency contract: `connect`, `ensure_connected`, `query`, `execute`
//! and `disconnect` are mutually exclusive. The manager is `Send + Sync` and
//! can be shared behind an `Arc`; concurrent callers queue on the internal
//! lock rather than racing on the handle.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::ConnectionConfig;
use crate::driver::{Driver, DriverConnection};
use crate::error::MssqlConnectionError;
use crate::results::{ResultSet, UpdateResult};

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// `connect` has never been called; there is no config to connect with.
    Uninitialized,
    /// A config is stored but no usable handle exists.
    Disconnected,
    /// A handle is open.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Uninitialized => "uninitialized",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
        };
        f.write_str(label)
    }
}

enum Slot {
    Uninitialized,
    Disconnected,
    Connected(Box<dyn DriverConnection>),
}

struct Inner {
    config: Option<ConnectionConfig>,
    slot: Slot,
}

impl Inner {
    fn state(&self) -> ConnectionState {
        match self.slot {
            Slot::Uninitialized => ConnectionState::Uninitialized,
            Slot::Disconnected => ConnectionState::Disconnected,
            Slot::Connected(_) => ConnectionState::Connected,
        }
    }

    // Drops a handle known to be broken; it is not closed gracefully.
    fn mark_disconnected(&mut self) {
        if matches!(self.slot, Slot::Connected(_)) {
            self.slot = Slot::Disconnected;
        }
    }

    async fn establish(&mut self, driver: &dyn Driver) -> Result<(), MssqlConnectionError> {
        let Some(config) = &self.config else {
            return Err(MssqlConnectionError::ConfigError(
                "no connection configured; call connect first".to_string(),
            ));
        };

        self.slot = Slot::Disconnected;
        tracing::debug!(
            driver = driver.name(),
            endpoint = %config.endpoint(),
            timeout = ?config.timeout,
            "establishing connection"
        );

        let attempt = driver.establish(config);
        let result = if config.timeout.is_zero() {
            attempt.await
        } else {
            match tokio::time::timeout(config.timeout, attempt).await {
                Ok(result) => result,
                Err(_) => Err(MssqlConnectionError::ConnectionError(format!(
                    "timed out after {:?} connecting to {}",
                    config.timeout,
                    config.endpoint()
                ))),
            }
        };

        match result {
            Ok(conn) => {
                tracing::debug!(endpoint = %config.endpoint(), "connection established");
                self.slot = Slot::Connected(conn);
                Ok(())
            }
            Err(err) => {
                tracing::error!(endpoint = %config.endpoint(), error = %err, "failed to establish connection");
                Err(connection_failure(err))
            }
        }
    }

    async fn ensure_connected(
        &mut self,
        driver: &dyn Driver,
    ) -> Result<&mut Box<dyn DriverConnection>, MssqlConnectionError> {
        let usable = matches!(&self.slot, Slot::Connected(conn) if !conn.is_closed());
        if !usable {
            self.establish(driver).await?;
        }
        match &mut self.slot {
            Slot::Connected(conn) => Ok(conn),
            _ => Err(MssqlConnectionError::ConnectionError(
                "connection unavailable after establishment".to_string(),
            )),
        }
    }
}

// Establishment failures all surface as connection failures, keeping the message.
fn connection_failure(err: MssqlConnectionError) -> MssqlConnectionError {
    match err {
        MssqlConnectionError::ConfigError(_) | MssqlConnectionError::ConnectionError(_) => err,
        other => MssqlConnectionError::ConnectionError(other.to_string()),
    }
}

#[async_trait]
trait Operation: Sync {
    type Output: Send;

    fn label(&self) -> &'static str;

    async fn run(
        &self,
        conn: &mut Box<dyn DriverConnection>,
    ) -> Result<Self::Output, MssqlConnectionError>;
}

struct Select<'a>(&'a str);

#[async_trait]
impl<'a> Operation for Select<'a> {
    type Output = ResultSet;

    fn label(&self) -> &'static str {
        "query"
    }

    async fn run(
        &self,
        conn: &mut Box<dyn DriverConnection>,
    ) -> Result<ResultSet, MssqlConnectionError> {
        conn.query(self.0).await
    }
}

struct Dml<'a>(&'a str);

#[async_trait]
impl<'a> Operation for Dml<'a> {
    type Output = UpdateResult;

    fn label(&self) -> &'static str {
        "execute"
    }

    async fn run(
        &self,
        conn: &mut Box<dyn DriverConnection>,
    ) -> Result<UpdateResult, MssqlConnectionError> {
        conn.execute(self.0).await.map(UpdateResult::new)
    }
}

async fn run_step<O: Operation>(
    op: &O,
    conn: &mut Box<dyn DriverConnection>,
    query_timeout: Option<Duration>,
) -> Result<O::Output, MssqlConnectionError> {
    match query_timeout {
        Some(limit) => tokio::time::timeout(limit, op.run(conn))
            .await
            .map_err(|_| MssqlConnectionError::QueryTimeout(limit))?,
        None => op.run(conn).await,
    }
}

/// Owns one logical SQL Server connection.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use mssql_connection::{ConnectionConfig, ConnectionManager, MssqlConnectionError};
///
/// # async fn demo() -> Result<(), MssqlConnectionError> {
/// let manager = ConnectionManager::mssql();
/// let config = ConnectionConfig::from_url(
///     "jdbc:jtds:sqlserver://localhost:1433/master",
///     "sa",
///     "secret",
///     Duration::from_secs(10),
/// )?;
/// manager.connect(config).await?;
/// let rows = manager.query("SELECT name FROM sys.databases").await?;
/// println!("{}", rows.to_json());
/// manager.disconnect().await?;
/// # Ok(()) }
/// ```
pub struct ConnectionManager {
    driver: Box<dyn Driver>,
    inner: Mutex<Inner>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("driver", &self.driver.name())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    #[must_use]
    pub fn new(driver: impl Driver + 'static) -> Self {
        Self {
            driver: Box::new(driver),
            inner: Mutex::new(Inner {
                config: None,
                slot: Slot::Uninitialized,
            }),
        }
    }

    /// Manager backed by the tiberius SQL Server driver.
    #[cfg(feature = "mssql")]
    #[must_use]
    pub fn mssql() -> Self {
        Self::new(crate::mssql::TiberiusDriver)
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state()
    }

    /// Store `config` and open a fresh connection with it.
    ///
    /// An existing handle is closed first. On failure no handle is kept but
    /// the config stays stored for later reconnects.
    ///
    /// # Errors
    /// Returns `MssqlConnectionError::ConnectionError` if the connection
    /// cannot be established within `config.timeout`.
    pub async fn connect(&self, config: ConnectionConfig) -> Result<(), MssqlConnectionError> {
        let mut inner = self.inner.lock().await;
        if let Slot::Connected(mut old) =
            std::mem::replace(&mut inner.slot, Slot::Disconnected)
        {
            if let Err(err) = old.close().await {
                tracing::warn!(error = %err, "failed to close previous connection before reconnecting");
            }
        }
        inner.config = Some(config);
        inner.establish(self.driver.as_ref()).await
    }

    /// Re-establish the connection if it is absent or reports closed.
    ///
    /// # Errors
    /// `ConfigError` before any `connect`; `ConnectionError` if establishment fails.
    pub async fn ensure_connected(&self) -> Result<(), MssqlConnectionError> {
        let mut inner = self.inner.lock().await;
        inner.ensure_connected(self.driver.as_ref()).await?;
        Ok(())
    }

    /// Run a read query and return every row.
    ///
    /// # Errors
    /// Returns the driver's error if the query fails, or if it fails again
    /// after a single reconnect-and-retry on transport loss.
    pub async fn query(&self, sql: &str) -> Result<ResultSet, MssqlConnectionError> {
        self.run(Select(sql)).await
    }

    /// Run a write or DDL statement and return the affected-row count.
    ///
    /// # Errors
    /// As for [`query`](Self::query).
    pub async fn execute(&self, sql: &str) -> Result<UpdateResult, MssqlConnectionError> {
        self.run(Dml(sql)).await
    }

    /// Close the connection if one is open. Idempotent.
    ///
    /// # Errors
    /// Returns `MssqlConnectionError::DisconnectError` if closing fails. The
    /// manager is disconnected afterwards either way.
    pub async fn disconnect(&self) -> Result<(), MssqlConnectionError> {
        let mut inner = self.inner.lock().await;
        let Slot::Connected(mut conn) = std::mem::replace(&mut inner.slot, Slot::Disconnected)
        else {
            if inner.config.is_none() {
                inner.slot = Slot::Uninitialized;
            }
            return Ok(());
        };

        conn.close().await.map_err(|err| {
            tracing::error!(error = %err, "error while disconnecting");
            MssqlConnectionError::DisconnectError(err.to_string())
        })?;
        tracing::debug!("disconnected");
        Ok(())
    }

    async fn run<O: Operation>(&self, op: O) -> Result<O::Output, MssqlConnectionError> {
        let mut inner = self.inner.lock().await;
        let driver = self.driver.as_ref();
        let query_timeout = inner.config.as_ref().and_then(|c| c.query_timeout);

        let first = {
            let conn = inner.ensure_connected(driver).await?;
            run_step(&op, conn, query_timeout).await
        };
        let err = match first {
            Ok(output) => return Ok(output),
            Err(err) => err,
        };

        if !err.is_transport_loss() {
            if matches!(err, MssqlConnectionError::QueryTimeout(_)) {
                // the abandoned request leaves the stream mid-response
                inner.mark_disconnected();
            }
            tracing::error!(operation = op.label(), error = %err, "operation failed");
            return Err(err);
        }

        tracing::warn!(
            operation = op.label(),
            error = %err,
            "connection lost; reconnecting and retrying once"
        );
        inner.mark_disconnected();

        let conn = inner.ensure_connected(driver).await?;
        match run_step(&op, conn, query_timeout).await {
            Ok(output) => {
                tracing::info!(operation = op.label(), "retry after reconnect succeeded");
                Ok(output)
            }
            Err(err) => {
                if err.is_transport_loss() || matches!(err, MssqlConnectionError::QueryTimeout(_))
                {
                    inner.mark_disconnected();
                }
                tracing::error!(operation = op.label(), error = %err, "retry after reconnect failed");
                Err(err)
            }
        }
    }
}
