// src/core/mod.rs

//! The central module containing the core logic and data structures of SigmaDB.

pub mod engine;
pub mod errors;
pub mod format;
pub mod gate;
pub mod instance;
pub mod protocol;
pub mod query;
pub mod state;

pub use errors::SigmaError;
pub use protocol::QueryResult;
pub use query::Statement;
