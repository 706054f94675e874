use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::MssqlConnectionError;

/// One inbound bridge call: `{ "method": "...", "arguments": { ... } }`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: JsonValue,
}

impl MethodCall {
    #[must_use]
    pub fn new(method: impl Into<String>, arguments: JsonValue) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

// Arguments can carry a password, so only the method is printed.
impl fmt::Debug for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCall")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConnectArgs {
    pub url: String,
    pub username: String,
    pub password: String,
    pub timeout_in_seconds: u64,
    #[serde(default)]
    pub database: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct QueryArgs {
    pub query: String,
}

/// Outbound bridge result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Response {
    Success { result: JsonValue },
    Error { code: String, message: String },
    NotImplemented,
}

impl Response {
    #[must_use]
    pub fn success(result: impl Into<JsonValue>) -> Self {
        Response::Success {
            result: result.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }
}

impl From<MssqlConnectionError> for Response {
    fn from(err: MssqlConnectionError) -> Self {
        Response::Error {
            code: err.category().to_string(),
            message: err.to_string(),
        }
    }
}
