// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests

use sigmadb::config::Config;
use sigmadb::core::instance::Instance;
use sigmadb::core::state::ServerState;
use sigmadb::server;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Upper bound for any single wait in a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_test_writer()
        .try_init();
}

/// A running server on a socket in a private temporary directory.
pub struct TestServer {
    pub state: Arc<ServerState>,
    pub socket_path: PathBuf,
    pub dir: TempDir,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<anyhow::Result<()>>>,
}

/// Builds the default test configuration inside `dir`.
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.socket_path = dir.path().join("sigma.sock");
    config.shutdown.grace_period = Duration::from_secs(2);
    config.shutdown.close_timeout = Duration::from_secs(5);
    config
}

impl TestServer {
    /// Starts a server with an in-memory instance.
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Starts a server after letting the caller adjust the configuration.
    pub async fn start_with(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = test_config(&dir);
        adjust(&mut config);
        Self::start_in(dir, config).await
    }

    pub async fn start_in(dir: TempDir, config: Config) -> Self {
        init_tracing();
        let socket_path = config.socket_path.clone();
        let ctx = server::setup(config).await.expect("Failed to set up server");
        let state = ctx.state.clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(server::serve(ctx, async {
            let _ = shutdown_rx.await;
        }));
        Self {
            state,
            socket_path,
            dir,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub async fn connect(&self) -> TestClient {
        TestClient::connect(&self.socket_path).await
    }

    /// Triggers a graceful shutdown and waits for the server to finish.
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let handle = self.handle.take().expect("server already shut down");
        tokio::time::timeout(TEST_TIMEOUT, handle)
            .await
            .expect("server did not shut down in time")
            .expect("server task panicked")
    }

    /// Waits until the registry holds exactly `n` sessions.
    pub async fn wait_for_sessions(&self, n: usize) {
        tokio::time::timeout(TEST_TIMEOUT, async {
            while self.state.session_count() != n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {n} sessions, found {}",
                self.state.session_count()
            )
        });
    }

    /// Runs `f` against the instance while holding the gate.
    pub async fn with_instance<T>(&self, f: impl FnOnce(&Instance) -> T) -> T {
        let permit = self.state.gate.acquire().await;
        f(&permit)
    }
}

/// A raw connection that speaks the text protocol.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub async fn connect(path: &std::path::Path) -> Self {
        let stream = UnixStream::connect(path)
            .await
            .expect("Failed to connect to test server");
        let (rd, wr) = stream.into_split();
        Self {
            reader: BufReader::new(rd),
            writer: wr,
        }
    }

    pub async fn send(&mut self, text: &str) {
        self.send_bytes(text.as_bytes()).await;
    }

    pub async fn send_bytes(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("write failed");
        self.writer.flush().await.expect("flush failed");
    }

    /// Reads one response: every line up to the blank line that ends it.
    /// Returns an empty string if the server closed the connection first.
    pub async fn read_response(&mut self) -> String {
        tokio::time::timeout(TEST_TIMEOUT, async {
            let mut response = String::new();
            loop {
                let mut line = String::new();
                let n = self.reader.read_line(&mut line).await.expect("read failed");
                if n == 0 || line == "\n" {
                    return response;
                }
                response.push_str(&line);
            }
        })
        .await
        .expect("timed out waiting for a response")
    }

    pub async fn query(&mut self, text: &str) -> String {
        self.send(text).await;
        self.read_response().await
    }

    /// Half-closes the connection; the server sees end of input.
    pub async fn finish(&mut self) {
        self.writer.shutdown().await.expect("shutdown failed");
    }

    /// Reads until the server closes the connection.
    pub async fn read_to_end(&mut self) -> String {
        let mut rest = String::new();
        tokio::time::timeout(TEST_TIMEOUT, self.reader.read_to_string(&mut rest))
            .await
            .expect("timed out waiting for the server to close")
            .expect("read failed");
        rest
    }
}
