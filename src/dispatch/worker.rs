use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc::Receiver;

use super::channel::Command;
use super::wire::{ConnectArgs, MethodCall, QueryArgs, Response};
use crate::config::ConnectionConfig;
use crate::error::MssqlConnectionError;
use crate::manager::ConnectionManager;

pub(super) async fn run_worker(manager: ConnectionManager, mut receiver: Receiver<Command>) {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Call { call, respond_to } => {
                let response = handle_call(&manager, call).await;
                let _ = respond_to.send(response);
            }
            Command::Shutdown { respond_to } => {
                detach(&manager).await;
                let _ = respond_to.send(());
                return;
            }
        }
    }
    // every sender dropped without an explicit shutdown
    detach(&manager).await;
}

/// Teardown: disconnect failures are logged and dropped.
async fn detach(manager: &ConnectionManager) {
    if let Err(err) = manager.disconnect().await {
        tracing::warn!(error = %err, "ignoring disconnect failure during teardown");
    }
}

/// Route one bridge call to the manager and shape the result for the wire.
pub async fn handle_call(manager: &ConnectionManager, call: MethodCall) -> Response {
    tracing::debug!(method = %call.method, "handling bridge call");
    let outcome = match call.method.as_str() {
        "connect" => connect(manager, call.arguments).await,
        "getData" => match parse_args::<QueryArgs>(call.arguments) {
            Ok(args) => manager.query(&args.query).await.map(|rows| rows.to_json()),
            Err(err) => Err(err),
        },
        "writeData" => match parse_args::<QueryArgs>(call.arguments) {
            Ok(args) => manager.execute(&args.query).await.and_then(|update| {
                serde_json::to_value(update)
                    .map_err(|e| MssqlConnectionError::Other(format!("cannot encode result: {e}")))
            }),
            Err(err) => Err(err),
        },
        "disconnect" => manager.disconnect().await.map(|()| JsonValue::Bool(true)),
        other => {
            tracing::debug!(method = other, "unknown bridge method");
            return Response::NotImplemented;
        }
    };

    match outcome {
        Ok(result) => Response::success(result),
        Err(err) => {
            tracing::error!(method = %call.method, error = %err, "bridge call failed");
            Response::from(err)
        }
    }
}

async fn connect(
    manager: &ConnectionManager,
    arguments: JsonValue,
) -> Result<JsonValue, MssqlConnectionError> {
    let args: ConnectArgs = parse_args(arguments)?;
    let mut config = ConnectionConfig::from_url(
        &args.url,
        args.username,
        args.password,
        Duration::from_secs(args.timeout_in_seconds),
    )?;
    if args.database.is_some() {
        config.database = args.database;
    }
    manager.connect(config).await?;
    Ok(JsonValue::Bool(true))
}

fn parse_args<T: DeserializeOwned>(arguments: JsonValue) -> Result<T, MssqlConnectionError> {
    serde_json::from_value(arguments)
        .map_err(|e| MssqlConnectionError::ConfigError(format!("invalid arguments: {e}")))
}
