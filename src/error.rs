//! Error types for SSE streaming and the server around it.

use std::io;
use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors from the demo server and its startup.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Bind error: {0}")]
    Bind(String),
}

/// Errors from a [`StreamSession`](crate::streaming::StreamSession).
#[derive(Error, Debug)]
pub enum StreamError {
    /// The initial header flush failed, or the response cannot be flushed at all.
    #[error("initial header flush: {0}")]
    Open(#[source] io::Error),

    /// Writing an event to the client failed (usually a disconnect).
    #[error("write event to wire: {0}")]
    Write(#[source] io::Error),

    /// The diagnostic tee rejected the bytes. The client was not written to.
    #[error("write sse event to log pipe: {0}")]
    Tee(#[source] io::Error),
}

impl StreamError {
    /// The underlying I/O error.
    pub fn io_error(&self) -> &io::Error {
        match self {
            StreamError::Open(e) | StreamError::Write(e) | StreamError::Tee(e) => e,
        }
    }
}

/// Errors from [`ResponseSink::write`](crate::streaming::ResponseSink::write).
#[derive(Error, Debug)]
pub enum SinkError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("tee write failed: {0}")]
    Tee(#[source] io::Error),
}

impl From<SinkError> for StreamError {
    fn from(err: SinkError) -> Self {
        match err {
            SinkError::Io(e) => StreamError::Write(e),
            SinkError::Tee(e) => StreamError::Tee(e),
        }
    }
}
