//! The response capability a stream session writes through.

use std::io;

use async_trait::async_trait;
use http::HeaderMap;

use crate::error::SinkError;

/// A writable, flushable HTTP response.
///
/// Headers can be changed until the first flush or write commits them.
#[async_trait]
pub trait ResponseSink: Send {
    /// Response headers.
    fn headers(&self) -> &HeaderMap;

    /// Mutable response headers. Changes after the head is committed are ignored.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Write body bytes. Commits the head first if needed.
    async fn write(&mut self, data: &[u8]) -> Result<(), SinkError>;

    /// Push everything written so far onto the network.
    ///
    /// Responses that cannot stream incrementally keep the default, which
    /// fails with [`io::ErrorKind::Unsupported`].
    async fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "response does not support flushing",
        ))
    }
}

#[async_trait]
impl<S: ResponseSink + ?Sized> ResponseSink for Box<S> {
    fn headers(&self) -> &HeaderMap {
        (**self).headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        (**self).headers_mut()
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), SinkError> {
        (**self).write(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        (**self).flush().await
    }
}
