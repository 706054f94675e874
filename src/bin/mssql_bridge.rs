//! Line-oriented bridge: one JSON method call per stdin line, one JSON
//! response per stdout line. Logs go to stderr.

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use mssql_connection::error::DATABASE_ERROR;
use mssql_connection::{ConnectionManager, Dispatcher, MethodCall, Response};

#[derive(Parser, Debug)]
#[command(author, version, about = "JSON-lines bridge to a single SQL Server connection")]
struct Args {
    /// Log filter, e.g. `info` or `mssql_connection=debug`
    #[arg(long, env = "MSSQL_BRIDGE_LOG", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|err| {
        eprintln!("invalid log filter '{}': {err}; falling back to info", args.log_level);
        EnvFilter::new("info")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let dispatcher = Dispatcher::spawn(ConnectionManager::mssql());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<MethodCall>(&line) {
            Ok(call) => dispatcher.call(call).await,
            Err(err) => Response::Error {
                code: DATABASE_ERROR.to_string(),
                message: format!("invalid request: {err}"),
            },
        };
        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }

    tracing::info!("stdin closed; shutting down");
    dispatcher.shutdown().await;
    Ok(())
}
