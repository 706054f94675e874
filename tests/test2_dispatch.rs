mod common;

use common::{ScriptedDriver, Script, Step};
use mssql_connection::prelude::*;
use serde_json::json;

fn connect_call() -> MethodCall {
    MethodCall::new(
        "connect",
        json!({
            "url": "jdbc:jtds:sqlserver://db.internal:1433/inventory",
            "username": "app",
            "password": "secret",
            "timeoutInSeconds": 5
        }),
    )
}

fn scripted_dispatcher() -> (Dispatcher, std::sync::Arc<Script>) {
    let script = Script::new();
    let manager = ConnectionManager::new(ScriptedDriver::new(&script));
    (Dispatcher::spawn(manager), script)
}

#[tokio::test]
async fn bridge_round_trip() {
    let (dispatcher, script) = scripted_dispatcher();
    script.then(&[Step::Rows(0), Step::Rows(2)]);

    assert_eq!(dispatcher.call(connect_call()).await, Response::success(true));

    let rows = dispatcher
        .call(MethodCall::new(
            "getData",
            json!({ "query": "SELECT id, name FROM users" }),
        ))
        .await;
    assert_eq!(
        rows,
        Response::success(json!([
            { "id": 1, "name": "alice" },
            { "id": 2, "name": "bob" }
        ]))
    );

    let written = dispatcher
        .call(MethodCall::new(
            "writeData",
            json!({ "query": "UPDATE users SET active = 1" }),
        ))
        .await;
    assert_eq!(written, Response::success(json!({ "affectedRows": 2 })));

    let closed = dispatcher
        .call(MethodCall::new("disconnect", json!({})))
        .await;
    assert_eq!(closed, Response::success(true));

    dispatcher.shutdown().await;
    assert_eq!(script.establish_count(), 1);
    assert_eq!(script.close_count(), 1);
}

#[tokio::test]
async fn failures_carry_database_error() {
    let (dispatcher, script) = scripted_dispatcher();
    script.then(&[Step::SyntaxError]);
    dispatcher.call(connect_call()).await;

    let response = dispatcher
        .call(MethodCall::new("getData", json!({ "query": "SELECT * FORM t" })))
        .await;

    match response {
        Response::Error { code, message } => {
            assert_eq!(code, DATABASE_ERROR);
            assert!(message.contains("Incorrect syntax"), "{message}");
        }
        other => panic!("expected an error response, got {other:?}"),
    }
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn data_calls_before_connect_fail() {
    let (dispatcher, script) = scripted_dispatcher();

    let response = dispatcher
        .call(MethodCall::new("writeData", json!({ "query": "DELETE FROM t" })))
        .await;

    assert!(matches!(response, Response::Error { ref code, .. } if code == DATABASE_ERROR));
    assert_eq!(script.establish_count(), 0);
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn malformed_arguments_are_rejected() {
    let (dispatcher, _script) = scripted_dispatcher();

    let missing_query = dispatcher
        .call(MethodCall::new("getData", json!({ "sql": "SELECT 1" })))
        .await;
    let bad_url = dispatcher
        .call(MethodCall::new(
            "connect",
            json!({
                "url": "jdbc:jtds:sqlserver://db.internal:99999",
                "username": "app",
                "password": "secret",
                "timeoutInSeconds": 5
            }),
        ))
        .await;

    assert!(!missing_query.is_success());
    assert!(!bad_url.is_success());
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn unknown_methods_are_not_implemented() {
    let (dispatcher, _script) = scripted_dispatcher();

    let response = dispatcher
        .call(MethodCall::new("beginTransaction", json!({})))
        .await;

    assert_eq!(response, Response::NotImplemented);
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({ "status": "notImplemented" })
    );
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_the_open_connection() {
    let (dispatcher, script) = scripted_dispatcher();
    dispatcher.call(connect_call()).await;

    dispatcher.shutdown().await;

    assert_eq!(script.close_count(), 1);
}

#[tokio::test]
async fn shutdown_ignores_close_failures() {
    let (dispatcher, script) = scripted_dispatcher();
    script.fail_close();
    dispatcher.call(connect_call()).await;

    dispatcher.shutdown().await;

    assert_eq!(script.close_count(), 1);
}

#[tokio::test]
async fn handle_call_works_without_a_worker() {
    let script = Script::new();
    let manager = ConnectionManager::new(ScriptedDriver::new(&script));

    let response = mssql_connection::dispatch::handle_call(&manager, connect_call()).await;

    assert!(response.is_success());
    assert_eq!(manager.state().await, ConnectionState::Connected);
}

#[test]
fn wire_format_matches_bridge_contract() {
    let call: MethodCall =
        serde_json::from_str(r#"{"method":"getData","arguments":{"query":"SELECT 1"}}"#).unwrap();
    assert_eq!(call.method, "getData");
    assert_eq!(call.arguments["query"], "SELECT 1");

    let bare: MethodCall = serde_json::from_str(r#"{"method":"disconnect"}"#).unwrap();
    assert!(bare.arguments.is_null());

    let err = Response::Error {
        code: DATABASE_ERROR.to_string(),
        message: "boom".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&err).unwrap(),
        json!({ "status": "error", "code": "DATABASE_ERROR", "message": "boom" })
    );
    assert_eq!(
        serde_json::to_value(Response::success(true)).unwrap(),
        json!({ "status": "success", "result": true })
    );
}
