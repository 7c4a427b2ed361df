// tests/integration/shutdown_test.rs

use super::test_helpers::TestServer;
use sigmadb::config::LogFsync;
use sigmadb::core::engine;
use sigmadb::core::instance::Instance;
use sigmadb::core::query::parse_statement;
use sigmadb::{QueryResult, SigmaError};
use std::time::Duration;

#[tokio::test]
async fn test_shutdown_notifies_open_sessions_and_closes_instance() {
    let mut server = TestServer::start_with(|config| {
        config.log_file = Some(config.socket_path.with_file_name("sigma.log"));
    })
    .await;
    let log_path = server.socket_path.with_file_name("sigma.log");

    let mut writer = server.connect().await;
    writer.query("CREATE TABLE t (x INT);").await;
    writer.query("INSERT INTO t VALUES (1), (2);").await;

    let mut idle = Vec::new();
    for _ in 0..3 {
        idle.push(server.connect().await);
    }
    server.wait_for_sessions(4).await;

    server.shutdown().await.unwrap();

    for client in idle.iter_mut().chain(std::iter::once(&mut writer)) {
        assert_eq!(
            client.read_response().await,
            "ERROR: server is shutting down\n"
        );
        assert_eq!(client.read_to_end().await, "");
    }
    assert_eq!(server.state.session_count(), 0);
    assert!(server.with_instance(|i| i.is_closed()).await);
    assert!(!server.socket_path.exists());

    let reopened = Instance::open(&log_path, LogFsync::Always).await.unwrap();
    assert_eq!(reopened.relation("t").unwrap().len(), 2);
}

#[tokio::test]
async fn test_shutdown_lets_in_flight_statement_finish() {
    let mut server = TestServer::start().await;
    let mut client = server.connect().await;
    client.query("CREATE TABLE t (x INT);").await;

    let permit = server.state.gate.acquire().await;
    client.send("INSERT INTO t VALUES (7);").await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while server.state.gate.waiting() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("statement never reached the gate");

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        permit.release();
    });
    server.shutdown().await.unwrap();

    assert_eq!(client.read_response().await, "OK INSERT 1\n");
    assert_eq!(
        client.read_response().await,
        "ERROR: server is shutting down\n"
    );
    assert_eq!(client.read_to_end().await, "");
    assert!(server.with_instance(|i| i.is_closed()).await);
}

#[tokio::test]
async fn test_sessions_past_grace_period_are_aborted() {
    let mut server = TestServer::start_with(|config| {
        config.shutdown.grace_period = Duration::from_millis(200);
    })
    .await;
    let mut client = server.connect().await;
    client.query("CREATE TABLE t (x INT);").await;

    let permit = server.state.gate.acquire().await;
    client.send("INSERT INTO t VALUES (1);").await;
    tokio::time::timeout(Duration::from_secs(5), async {
        while server.state.gate.waiting() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("statement never reached the gate");

    let rows = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let rows = permit.relation("t").map(|r| r.len()).unwrap_or_default();
        permit.release();
        rows
    });
    server.shutdown().await.unwrap();

    // The session was aborted before it got the gate, so no answer came back.
    assert_eq!(client.read_to_end().await, "");
    assert_eq!(rows.await.unwrap(), 0);
    assert_eq!(server.state.session_count(), 0);
    assert!(server.with_instance(|i| i.is_closed()).await);
}

#[tokio::test]
async fn test_shutdown_times_out_when_gate_is_never_released() {
    let mut server = TestServer::start_with(|config| {
        config.shutdown.close_timeout = Duration::from_millis(100);
    })
    .await;

    let permit = server.state.gate.acquire().await;
    let err = server.shutdown().await.unwrap_err();
    assert!(err.to_string().contains("timed out"), "{err}");
    assert!(!permit.is_closed());
    permit.release();
}

#[tokio::test]
async fn test_statements_after_close_are_rejected() {
    let mut server = TestServer::start().await;
    server.shutdown().await.unwrap();

    let mut instance = server.state.gate.acquire().await;
    let statement = parse_statement("CREATE TABLE t (x INT);").unwrap();
    let result = engine::evaluate(statement, &mut instance).await;
    assert_eq!(result, QueryResult::Error("instance is closed".to_string()));
    assert!(matches!(
        instance.relations().map(|r| r.count()),
        Err(SigmaError::InstanceClosed)
    ));
}
