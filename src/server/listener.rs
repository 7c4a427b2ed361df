// src/server/listener.rs

//! Binds the server's Unix domain socket.

use crate::core::SigmaError;
use std::io::ErrorKind;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, warn};

/// Binds a listener at `path`.
///
/// A socket file left behind by a server that is no longer running (a
/// connection attempt is refused) is replaced. A socket that may still have a
/// listener, or any other kind of file, is left alone and reported as a bind
/// error.
pub async fn bind_socket(path: &Path) -> Result<UnixListener, SigmaError> {
    let bind_error = |reason: String| SigmaError::Bind {
        path: path.to_path_buf(),
        reason,
    };

    match std::fs::symlink_metadata(path) {
        Ok(meta) if !meta.file_type().is_socket() => {
            return Err(bind_error("path exists and is not a socket".to_string()));
        }
        Ok(_) => match UnixStream::connect(path).await {
            Ok(_) => {
                return Err(bind_error(
                    "address already in use by a running server".to_string(),
                ));
            }
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => {
                warn!(
                    "Removing stale socket file '{}' ({}).",
                    path.display(),
                    e
                );
                std::fs::remove_file(path)
                    .map_err(|e| bind_error(format!("cannot remove stale socket file: {e}")))?;
            }
            // A full backlog or a permission problem does not prove the
            // socket is dead.
            Err(e) => return Err(bind_error(format!("cannot check existing socket: {e}"))),
        },
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(bind_error(e.to_string())),
    }

    UnixListener::bind(path).map_err(|e| bind_error(e.to_string()))
}

/// Removes the socket file if it is still there.
pub fn remove_socket_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed socket file '{}'.", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove socket file '{}': {}", path.display(), e),
    }
}
