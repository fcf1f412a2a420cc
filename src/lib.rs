//! Server-Sent Events for HTTP servers.
//!
//! [`streaming::EventWriter`] encodes single events into the SSE line
//! format and [`streaming::StreamSession`] negotiates the streaming response
//! and writes events to it, flushing each one. The rest of the crate is the
//! plumbing around them: response transports, a diagnostic event log and a
//! small axum server streaming demo events.

pub mod config;
pub mod error;
pub mod eventlog;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod streaming;

pub use config::Config;
pub use error::{Result, ServerError, SinkError, StreamError};
