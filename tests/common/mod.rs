#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mssql_connection::prelude::*;

/// What the next query/execute on a scripted connection does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Succeed; `execute` reports this many affected rows.
    Rows(u64),
    /// Fail with a communication-link error (SQLSTATE 08S01).
    LinkFailure,
    /// Fail with a syntax error (SQLSTATE 42000).
    SyntaxError,
    /// Never finish.
    Hang,
}

/// Shared script and counters behind [`ScriptedDriver`].
#[derive(Default)]
pub struct Script {
    pub establishes: AtomicUsize,
    pub operations: AtomicUsize,
    pub closes: AtomicUsize,
    generation: AtomicUsize,
    steps: Mutex<VecDeque<Step>>,
    failed_establishes: Mutex<VecDeque<bool>>,
    establish_delay: Mutex<Option<Duration>>,
    fail_close: Mutex<bool>,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue outcomes for the next operations, across reconnects.
    pub fn then(&self, steps: &[Step]) {
        self.steps.lock().unwrap().extend(steps.iter().copied());
    }

    /// Queue outcomes for the next establish attempts; `true` fails it.
    pub fn establish_outcomes(&self, failures: &[bool]) {
        self.failed_establishes
            .lock()
            .unwrap()
            .extend(failures.iter().copied());
    }

    pub fn delay_establish(&self, delay: Duration) {
        *self.establish_delay.lock().unwrap() = Some(delay);
    }

    /// Make every handle opened so far report closed, without any failing call.
    pub fn sever_open_connections(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn fail_close(&self) {
        *self.fail_close.lock().unwrap() = true;
    }

    pub fn establish_count(&self) -> usize {
        self.establishes.load(Ordering::SeqCst)
    }

    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        self.operations.fetch_add(1, Ordering::SeqCst);
        self.steps.lock().unwrap().pop_front().unwrap_or(Step::Rows(0))
    }
}

pub struct ScriptedDriver {
    pub script: Arc<Script>,
}

impl ScriptedDriver {
    pub fn new(script: &Arc<Script>) -> Self {
        Self {
            script: Arc::clone(script),
        }
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn establish(
        &self,
        _config: &ConnectionConfig,
    ) -> Result<Box<dyn DriverConnection>, MssqlConnectionError> {
        self.script.establishes.fetch_add(1, Ordering::SeqCst);
        let delay = *self.script.establish_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let fail = self
            .script
            .failed_establishes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(false);
        if fail {
            return Err(MssqlConnectionError::ConnectionError(
                "Login failed for user 'app'".to_string(),
            ));
        }
        Ok(Box::new(ScriptedConnection {
            script: Arc::clone(&self.script),
            generation: self.script.generation.load(Ordering::SeqCst),
            closed: false,
        }))
    }
}

pub struct ScriptedConnection {
    script: Arc<Script>,
    generation: usize,
    closed: bool,
}

impl ScriptedConnection {
    async fn play(&mut self) -> Result<u64, MssqlConnectionError> {
        match self.script.next_step() {
            Step::Rows(n) => Ok(n),
            Step::LinkFailure => {
                self.closed = true;
                Err(MssqlConnectionError::from_sql_state(
                    "08S01",
                    "Communication link failure",
                ))
            }
            Step::SyntaxError => Err(MssqlConnectionError::from_sql_state(
                "42000",
                "Incorrect syntax near 'FORM'",
            )),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(0)
            }
        }
    }
}

#[async_trait]
impl DriverConnection for ScriptedConnection {
    async fn query(&mut self, _sql: &str) -> Result<ResultSet, MssqlConnectionError> {
        self.play().await?;
        Ok(id_name_fixture())
    }

    async fn execute(&mut self, _sql: &str) -> Result<u64, MssqlConnectionError> {
        self.play().await
    }

    async fn close(&mut self) -> Result<(), MssqlConnectionError> {
        self.script.closes.fetch_add(1, Ordering::SeqCst);
        self.closed = true;
        if *self.script.fail_close.lock().unwrap() {
            return Err(MssqlConnectionError::Other("socket already shut".to_string()));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed || self.generation != self.script.generation.load(Ordering::SeqCst)
    }
}

/// Two rows: `{id: 1, name: "alice"}` and `{id: 2, name: "bob"}`.
pub fn id_name_fixture() -> ResultSet {
    ResultSet::from_rows(
        vec!["id".to_string(), "name".to_string()],
        vec![
            vec![RowValues::Int(1), RowValues::Text("alice".to_string())],
            vec![RowValues::Int(2), RowValues::Text("bob".to_string())],
        ],
    )
}

pub fn test_config() -> ConnectionConfig {
    ConnectionConfig::builder("db.internal", "app", "secret")
        .database("inventory")
        .timeout(Duration::from_secs(5))
        .finish()
}

pub fn scripted_manager() -> (ConnectionManager, Arc<Script>) {
    let script = Script::new();
    (ConnectionManager::new(ScriptedDriver::new(&script)), script)
}
