//! FerrumGate - a Redis-compatible gateway over relational databases and
//! message streams
//!
//! Keys are mapped onto backend records through declarative key patterns:
//! - `pattern`, `query` and `record` turn keys into parameterised statements
//!   and backend rows into values
//! - `store` holds the backends, `proxy` and `multistore` compose them
//! - `protocol`, `commands`, `dispatch` and `server` speak RESP, `web`
//!   mirrors the same store over HTTP

pub mod cache;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod multistore;
pub mod pattern;
pub mod protocol;
pub mod proxy;
pub mod pubsub;
pub mod query;
pub mod record;
pub mod server;
pub mod store;
pub mod web;

#[cfg(test)]
mod testing;

/// Re-export commonly used types
pub use error::{Result, StoreError};
pub use protocol::{RespError, RespValue};
pub use store::{BindConfig, Store};
pub use commands::{Command, CommandContext};
