// src/connection/mod.rs

//! Manages the lifecycle of a single client session: decoding statements,
//! passing them through the serialization gate, and writing results back.

mod guard;
mod handler;

pub use guard::SessionGuard;
pub use handler::SessionHandler;

use crate::core::SigmaError;

/// True for transport errors that just mean the peer went away.
pub fn is_normal_disconnect(e: &SigmaError) -> bool {
    matches!(e, SigmaError::Io(arc_err) if matches!(
        arc_err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionAborted
    ))
}
