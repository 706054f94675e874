//! Request dispatcher for the host bridge.
//!
//! Calls arrive as [`MethodCall`]s (`connect`, `getData`, `writeData`,
//! `disconnect`) and are processed strictly in order by one worker task that
//! owns the [`ConnectionManager`].

mod channel;
mod wire;
mod worker;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::manager::ConnectionManager;

use channel::Command;
pub use wire::{MethodCall, Response};
pub use worker::handle_call;

const QUEUE_DEPTH: usize = 64;

/// Handle to the single worker that serializes bridge calls.
#[derive(Debug)]
pub struct Dispatcher {
    sender: mpsc::Sender<Command>,
    worker: JoinHandle<()>,
}

impl Dispatcher {
    /// Spawn the worker on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(manager: ConnectionManager) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_DEPTH);
        let worker = tokio::spawn(worker::run_worker(manager, receiver));
        Self { sender, worker }
    }

    /// Queue a call and wait for its response.
    pub async fn call(&self, call: MethodCall) -> Response {
        let (respond_to, response) = oneshot::channel();
        if self
            .sender
            .send(Command::Call { call, respond_to })
            .await
            .is_err()
        {
            return worker_gone();
        }
        response.await.unwrap_or_else(|_| worker_gone())
    }

    /// Disconnect (ignoring failures) and stop the worker.
    pub async fn shutdown(self) {
        let (respond_to, done) = oneshot::channel();
        if self
            .sender
            .send(Command::Shutdown { respond_to })
            .await
            .is_ok()
        {
            let _ = done.await;
        }
        drop(self.sender);
        if let Err(err) = self.worker.await {
            tracing::warn!(error = %err, "dispatcher worker ended abnormally");
        }
    }
}

fn worker_gone() -> Response {
    Response::Error {
        code: crate::error::DATABASE_ERROR.to_string(),
        message: "dispatcher worker is not running".to_string(),
    }
}
