// src/connection/handler.rs

//! Defines the `SessionHandler` which manages the full lifecycle of a client
//! session.

use super::guard::SessionGuard;
use super::is_normal_disconnect;
use crate::core::SigmaError;
use crate::core::engine;
use crate::core::protocol::{QueryCodec, QueryResult};
use crate::core::query::Statement;
use crate::core::state::{ServerState, SessionInfo};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Sent to every session still open when the server shuts down.
pub const SHUTDOWN_NOTICE: &str = "server is shutting down";

/// What the read side of the session produced.
enum Incoming {
    Statement(Statement),
    ParseError(SigmaError),
    Closed,
    IdleTimeout,
    Failed(SigmaError),
}

/// Whether the main loop keeps going after a statement.
enum Flow {
    Continue,
    Stop,
}

/// Drives one connection: decode, evaluate through the gate, respond, in
/// lock-step.
pub struct SessionHandler<S> {
    framed: Framed<S, QueryCodec>,
    state: Arc<ServerState>,
    session_id: u64,
    info: Arc<Mutex<SessionInfo>>,
    shutdown_rx: broadcast::Receiver<()>,
    global_shutdown_rx: broadcast::Receiver<()>,
    _guard: SessionGuard,
}

impl<S> SessionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Creates a handler and registers the session as live. The session
    /// leaves the registry when the handler is dropped, even if it never ran.
    pub fn new(
        stream: S,
        state: Arc<ServerState>,
        session_id: u64,
        global_shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        let codec = QueryCodec::new(state.config.limits.max_buffered_bytes);
        let (info, shutdown_rx) = state.register_session(session_id);
        let guard = SessionGuard::new(state.clone(), session_id);
        Self {
            framed: Framed::new(stream, codec),
            state,
            session_id,
            info,
            shutdown_rx,
            global_shutdown_rx,
            _guard: guard,
        }
    }

    /// The main event loop for the session.
    pub async fn run(mut self) -> Result<(), SigmaError> {
        let result = self.run_loop().await;
        let _ = self.framed.get_mut().shutdown().await;
        result
    }

    async fn run_loop(&mut self) -> Result<(), SigmaError> {
        let idle_timeout = self.state.config.limits.idle_timeout;
        loop {
            tokio::select! {
                biased;
                _ = self.global_shutdown_rx.recv() => {
                    info!("Session {} received global shutdown signal.", self.session_id);
                    let _ = self.respond(QueryResult::Error(SHUTDOWN_NOTICE.to_string())).await;
                    return Ok(());
                }
                _ = self.shutdown_rx.recv() => {
                    info!("Session {} received kill signal.", self.session_id);
                    return Ok(());
                }
                incoming = next_incoming(&mut self.framed, idle_timeout) => match incoming {
                    Incoming::Statement(statement) => {
                        self.info.lock().touch();
                        if let Flow::Stop = self.process_statement(statement).await? {
                            return Ok(());
                        }
                    }
                    Incoming::ParseError(e) => {
                        self.info.lock().touch();
                        self.state.stats.increment_parse_errors();
                        debug!("Session {}: {}", self.session_id, e);
                        self.respond(e.into()).await?;
                    }
                    Incoming::Closed => {
                        debug!("Session {} closed by peer.", self.session_id);
                        return Ok(());
                    }
                    Incoming::IdleTimeout => {
                        let idle = self.info.lock().last_activity.elapsed();
                        info!("Session {} idle for {:?}, closing.", self.session_id, idle);
                        return Ok(());
                    }
                    Incoming::Failed(e @ SigmaError::BufferLimitExceeded(_)) => {
                        self.state.stats.increment_rejected_sessions();
                        warn!("Session {}: {}", self.session_id, e);
                        let _ = self.respond(e.into()).await;
                        return Ok(());
                    }
                    Incoming::Failed(e) => {
                        if is_normal_disconnect(&e) {
                            debug!("Session {} closed by peer: {}", self.session_id, e);
                        } else {
                            warn!("Session {} transport error: {}", self.session_id, e);
                        }
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Waits for the gate, evaluates the statement in its own task and
    /// writes the result.
    async fn process_statement(&mut self, statement: Statement) -> Result<Flow, SigmaError> {
        let name = statement.name();
        debug!("Session {}: received {}", self.session_id, name);

        let waiting_since = Instant::now();
        let permit = tokio::select! {
            biased;
            _ = self.shutdown_rx.recv() => {
                info!("Session {} killed while waiting for the gate.", self.session_id);
                return Ok(Flow::Stop);
            }
            permit = self.state.gate.acquire() => permit,
        };
        debug!(
            "Session {}: gate acquired after {:?}",
            self.session_id,
            waiting_since.elapsed()
        );

        // The evaluation owns the permit, so it commits or rolls back fully
        // even if this session is aborted while awaiting it.
        let evaluation = tokio::spawn(async move {
            let mut permit = permit;
            let result = engine::evaluate(statement, &mut *permit).await;
            permit.release();
            result
        });
        let result = evaluation
            .await
            .map_err(|e| SigmaError::Internal(format!("evaluation task failed: {e}")))?;
        self.state.stats.increment_total_statements();

        debug!(
            "Session {}: {} finished{}",
            self.session_id,
            name,
            if result.is_error() { " with an error" } else { "" }
        );
        self.respond(result).await?;
        Ok(Flow::Continue)
    }

    /// Writes one result, bounded by the configured write timeout.
    async fn respond(&mut self, result: QueryResult) -> Result<(), SigmaError> {
        let write_timeout = self.state.config.limits.write_timeout;
        match timeout(write_timeout, self.framed.send(result)).await {
            Ok(sent) => sent,
            Err(_) => Err(SigmaError::Io(Arc::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("writing a response took longer than {write_timeout:?}"),
            )))),
        }
    }
}

/// Reads until the next decoded item, end of stream or idle timeout.
async fn next_incoming<S>(
    framed: &mut Framed<S, QueryCodec>,
    idle_timeout: Option<Duration>,
) -> Incoming
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let next = match idle_timeout {
        Some(idle) => match timeout(idle, framed.next()).await {
            Ok(next) => next,
            Err(_) => return Incoming::IdleTimeout,
        },
        None => framed.next().await,
    };
    match next {
        Some(Ok(Ok(statement))) => Incoming::Statement(statement),
        Some(Ok(Err(e))) => Incoming::ParseError(e),
        Some(Err(e)) => Incoming::Failed(e),
        None => Incoming::Closed,
    }
}
