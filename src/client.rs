// src/client.rs

//! Client mode: relays bytes between local input/output and a server
//! connection without interpreting them.

use crate::core::SigmaError;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, info};

/// Connects to the server at `socket_path` and relays stdin and stdout
/// until the server closes the connection.
pub async fn run(socket_path: &Path) -> Result<()> {
    let stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("Failed to connect to '{}'", socket_path.display()))?;
    info!("Connected to {}", socket_path.display());

    relay(tokio::io::stdin(), tokio::io::stdout(), stream)
        .await
        .context("Relay failed")?;
    Ok(())
}

/// Copies `input` to `remote` and `remote` to `output` concurrently.
///
/// When `input` ends, the write side of `remote` is shut down and the relay
/// keeps copying until `remote` ends. A remote that stops reading is treated
/// the same way. The relay finishes when `remote` ends
/// or either direction fails; `output` is shut down in every case.
pub async fn relay<I, O, R>(mut input: I, mut output: O, remote: R) -> Result<(), SigmaError>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
    R: AsyncRead + AsyncWrite + Unpin,
{
    let (mut remote_rd, mut remote_wr) = tokio::io::split(remote);

    let result = {
        let upstream = async {
            let n = tokio::io::copy(&mut input, &mut remote_wr).await?;
            remote_wr.shutdown().await?;
            Ok::<_, std::io::Error>(n)
        };
        let downstream = async {
            let n = tokio::io::copy(&mut remote_rd, &mut output).await?;
            output.flush().await?;
            Ok::<_, std::io::Error>(n)
        };
        tokio::pin!(upstream, downstream);

        let mut input_done = false;
        loop {
            tokio::select! {
                biased;
                res = &mut downstream => {
                    if let Ok(n) = &res {
                        debug!("Server closed the connection after {} bytes.", n);
                    }
                    break res.map(|_| ());
                }
                res = &mut upstream, if !input_done => match res {
                    Ok(n) => {
                        debug!("Local input ended after {} bytes; waiting for the server.", n);
                        input_done = true;
                    }
                    // The server stopped reading; what it already sent still
                    // has to reach the output.
                    Err(e) if is_peer_gone(&e) => {
                        debug!("Server stopped reading: {}", e);
                        input_done = true;
                    }
                    Err(e) => break Err(e),
                },
            }
        }
    };

    let _ = output.shutdown().await;
    result.map_err(SigmaError::from)
}

fn is_peer_gone(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
    )
}
