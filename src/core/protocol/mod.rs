// src/core/protocol/mod.rs

pub mod codec;
pub mod result;
pub use codec::{DEFAULT_MAX_BUFFERED_BYTES, QueryCodec};
pub use result::QueryResult;
