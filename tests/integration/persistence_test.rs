// tests/integration/persistence_test.rs

use super::test_helpers::{TestServer, test_config};
use std::path::PathBuf;

fn log_path(server: &TestServer) -> PathBuf {
    server.dir.path().join("sigma.log")
}

#[tokio::test]
async fn test_state_survives_restart() {
    let mut server = TestServer::start_with(|config| {
        config.log_file = Some(config.socket_path.with_file_name("sigma.log"));
    })
    .await;
    let mut client = server.connect().await;
    client.query("CREATE TABLE users (id INT, name TEXT);").await;
    client
        .query("INSERT INTO users VALUES (1, 'a'), (2, 'b'), (3, 'c');")
        .await;
    client.query("DELETE FROM users WHERE id = 2;").await;
    client.query("CREATE TABLE scratch (x BOOL);").await;
    client.query("DROP TABLE scratch;").await;
    drop(client);
    server.shutdown().await.unwrap();

    let mut config = test_config(&server.dir);
    config.log_file = Some(log_path(&server));
    let mut restarted = TestServer::start_in(server.dir, config).await;
    let mut client = restarted.connect().await;
    assert_eq!(
        client.query("SELECT * FROM users;").await,
        " id | name\n----+------\n 1  | a\n 3  | c\n(2 rows)\n"
    );
    let tables = client.query("SHOW TABLES;").await;
    assert!(!tables.contains("scratch"), "{tables}");

    drop(client);
    restarted.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_statements_are_not_logged() {
    let mut server = TestServer::start_with(|config| {
        config.log_file = Some(config.socket_path.with_file_name("sigma.log"));
    })
    .await;
    let mut client = server.connect().await;
    client.query("CREATE TABLE t (x INT);").await;
    let before = std::fs::read_to_string(log_path(&server)).unwrap();

    assert!(client.query("CREATE TABLE t (y INT);").await.starts_with("ERROR"));
    assert!(client.query("INSERT INTO t VALUES ('text');").await.starts_with("ERROR"));
    assert!(client.query("INSERT INTO missing VALUES (1);").await.starts_with("ERROR"));
    assert!(client.query("SELECT * FROM t;").await.ends_with("(0 rows)\n"));

    assert_eq!(std::fs::read_to_string(log_path(&server)).unwrap(), before);
    assert_eq!(before.lines().count(), 1);

    drop(client);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_corrupt_log_prevents_startup() {
    super::test_helpers::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    let log = dir.path().join("sigma.log");
    std::fs::write(&log, "this is not a log record\n{\"also\": \"wrong\"}\n").unwrap();
    config.log_file = Some(log);

    let socket_path = config.socket_path.clone();
    let err = match sigmadb::server::setup(config).await {
        Ok(_) => panic!("a corrupt log must not be served"),
        Err(e) => e,
    };
    assert!(
        format!("{err:#}").contains("corrupt log"),
        "unexpected error: {err:#}"
    );
    // The socket bound before the failure is cleaned up.
    assert!(!socket_path.exists());
}
