use tiberius::{AuthMethod, Client, Config as TiberiusConfig, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::config::ConnectionConfig;
use crate::error::MssqlConnectionError;

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

pub(crate) fn build_tiberius_config(config: &ConnectionConfig) -> TiberiusConfig {
    let mut tiberius_config = TiberiusConfig::new();
    tiberius_config.host(&config.host);
    tiberius_config.port(config.port);
    if let Some(database) = &config.database {
        tiberius_config.database(database);
    }
    if let Some(instance) = &config.instance_name {
        tiberius_config.instance_name(instance);
    }
    tiberius_config.authentication(AuthMethod::sql_server(&config.username, &config.password));
    if config.trust_cert {
        tiberius_config.trust_cert();
    }
    tiberius_config
}

async fn open_tcp(
    tiberius_config: &TiberiusConfig,
    named_instance: bool,
) -> Result<TcpStream, MssqlConnectionError> {
    let tcp = if named_instance {
        // SQL Browser resolves the instance's port
        TcpStream::connect_named(tiberius_config)
            .await
            .map_err(|e| MssqlConnectionError::ConnectionError(format!("SQL Browser lookup failed: {e}")))?
    } else {
        TcpStream::connect(tiberius_config.get_addr())
            .await
            .map_err(|e| MssqlConnectionError::ConnectionError(format!("TCP connection error: {e}")))?
    };
    tcp.set_nodelay(true)
        .map_err(|e| MssqlConnectionError::ConnectionError(format!("TCP configuration error: {e}")))?;
    Ok(tcp)
}

/// Open a new client: TCP, compat layer, then the TDS login.
///
/// A single login redirect (Azure SQL gateway routing) is followed.
///
/// # Errors
/// Returns `MssqlConnectionError::ConnectionError` if the server cannot be
/// reached or rejects the login.
#[tracing::instrument(skip_all, fields(endpoint = %config.endpoint()))]
pub async fn create_mssql_client(
    config: &ConnectionConfig,
) -> Result<MssqlClient, MssqlConnectionError> {
    let tiberius_config = build_tiberius_config(config);
    let tcp = open_tcp(&tiberius_config, config.instance_name.is_some()).await?;

    match Client::connect(tiberius_config, tcp.compat_write()).await {
        Ok(client) => Ok(client),
        Err(tiberius::error::Error::Routing { host, port }) => {
            tracing::debug!(%host, port, "login redirected");
            let redirected = ConnectionConfig {
                host,
                port,
                instance_name: None,
                ..config.clone()
            };
            let tiberius_config = build_tiberius_config(&redirected);
            let tcp = open_tcp(&tiberius_config, false).await?;
            Client::connect(tiberius_config, tcp.compat_write())
                .await
                .map_err(login_error)
        }
        Err(e) => Err(login_error(e)),
    }
}

fn login_error(e: tiberius::error::Error) -> MssqlConnectionError {
    MssqlConnectionError::ConnectionError(format!("SQL Server connection error: {e}"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn tiberius_config_targets_configured_endpoint() {
        let config = ConnectionConfig::builder("db.internal", "app", "pw")
            .port(1444)
            .database("orders")
            .timeout(Duration::from_secs(3))
            .finish();
        let tiberius_config = build_tiberius_config(&config);
        assert_eq!(tiberius_config.get_addr(), "db.internal:1444");
    }
}
