//! REST mirror
//!
//! Exposes the same store as the RESP server over HTTP, with JSON and CSV
//! renderings for listings.

mod format;
mod handlers;
mod server;

pub use format::ListFormat;
pub use server::{router, run_web_server};
