//! Diagnostic tee for outbound SSE bytes.

use std::io;

use async_trait::async_trait;
use http::{header, HeaderMap};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::event::CONTENT_TYPE;
use super::sink::ResponseSink;
use crate::error::SinkError;

/// Response wrapper that copies body bytes to a side channel.
///
/// Bytes are copied only while the wrapped response's `Content-Type` is
/// `text/event-stream`; other responses pass through untouched. The copy is
/// raw: reassembling events is up to the reader of `tee`.
#[derive(Debug)]
pub struct TeeResponse<S, W> {
    inner: S,
    tee: W,
}

impl<S, W> TeeResponse<S, W> {
    pub fn new(inner: S, tee: W) -> Self {
        Self { inner, tee }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> (S, W) {
        (self.inner, self.tee)
    }
}

fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .is_some_and(|value| value.as_bytes() == CONTENT_TYPE.as_bytes())
}

#[async_trait]
impl<S, W> ResponseSink for TeeResponse<S, W>
where
    S: ResponseSink,
    W: AsyncWrite + Unpin + Send,
{
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    /// Copy to the tee, then write to the client. A tee failure is returned
    /// as [`SinkError::Tee`] and skips the client write.
    async fn write(&mut self, data: &[u8]) -> Result<(), SinkError> {
        if is_event_stream(self.inner.headers()) {
            self.tee.write_all(data).await.map_err(SinkError::Tee)?;
        }
        self.inner.write(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().await
    }
}
