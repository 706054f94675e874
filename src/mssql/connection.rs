use async_trait::async_trait;

use super::client::{MssqlClient, create_mssql_client};
use super::query::{build_result_set, execute_dml};
use crate::config::ConnectionConfig;
use crate::driver::{Driver, DriverConnection};
use crate::error::MssqlConnectionError;
use crate::results::ResultSet;

/// SQL Server driver over tiberius.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiberiusDriver;

#[async_trait]
impl Driver for TiberiusDriver {
    fn name(&self) -> &'static str {
        "tiberius"
    }

    async fn establish(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Box<dyn DriverConnection>, MssqlConnectionError> {
        let client = create_mssql_client(config).await?;
        Ok(Box::new(TiberiusConnection::new(client)))
    }
}

/// A live tiberius client that remembers when its transport broke.
pub struct TiberiusConnection {
    client: Option<MssqlClient>,
    broken: bool,
}

impl std::fmt::Debug for TiberiusConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TiberiusConnection")
            .field("open", &self.client.is_some())
            .field("broken", &self.broken)
            .finish()
    }
}

impl TiberiusConnection {
    #[must_use]
    pub fn new(client: MssqlClient) -> Self {
        Self {
            client: Some(client),
            broken: false,
        }
    }

    fn client_mut(&mut self) -> Result<&mut MssqlClient, MssqlConnectionError> {
        if self.broken {
            return Err(closed_error());
        }
        self.client.as_mut().ok_or_else(closed_error)
    }

    fn observe<T>(
        &mut self,
        result: Result<T, MssqlConnectionError>,
    ) -> Result<T, MssqlConnectionError> {
        if let Err(err) = &result {
            if err.is_transport_loss() {
                self.broken = true;
            }
        }
        result
    }
}

fn closed_error() -> MssqlConnectionError {
    MssqlConnectionError::TransportLoss {
        sql_state: Some("08003".to_string()),
        message: "connection is closed".to_string(),
    }
}

#[async_trait]
impl DriverConnection for TiberiusConnection {
    async fn query(&mut self, sql: &str) -> Result<ResultSet, MssqlConnectionError> {
        let client = self.client_mut()?;
        let result = build_result_set(client, sql).await;
        self.observe(result)
    }

    async fn execute(&mut self, sql: &str) -> Result<u64, MssqlConnectionError> {
        let client = self.client_mut()?;
        let result = execute_dml(client, sql).await;
        self.observe(result)
    }

    async fn close(&mut self) -> Result<(), MssqlConnectionError> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        if self.broken {
            // nothing to say goodbye to
            return Ok(());
        }
        client
            .close()
            .await
            .map_err(|e| MssqlConnectionError::DisconnectError(e.to_string()))
    }

    fn is_closed(&self) -> bool {
        self.broken || self.client.is_none()
    }
}
