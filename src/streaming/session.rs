//! One SSE stream over one HTTP response.

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Request, Version};

use super::event::{Event, CONTENT_TYPE};
use super::sink::ResponseSink;
use crate::error::StreamError;
use crate::metrics::{self, ErrorReason};

/// A live SSE response.
///
/// A session has a single writer. [`write_event`](Self::write_event) takes
/// `&mut self` and the session does no locking of its own, so concurrent
/// writers must be serialized by the caller; a shared reference cannot write:
///
/// ```compile_fail
/// use sseserver::streaming::{IoResponse, StreamSession};
///
/// async fn shared(session: &StreamSession<IoResponse<tokio::io::Sink>>) {
///     session.write_event(None).await.unwrap();
/// }
/// ```
///
/// There is no close operation. The stream ends when the caller stops
/// writing and the surrounding server closes the connection.
#[derive(Debug)]
pub struct StreamSession<S> {
    sink: S,
    version: Version,
}

impl<S: ResponseSink> StreamSession<S> {
    /// Set the SSE response headers and flush them to the client.
    ///
    /// `Connection: keep-alive` is only set for HTTP/1.x requests; HTTP/2 and
    /// HTTP/3 forbid connection-specific headers. Fails if the sink cannot be
    /// flushed, in which case no session is returned.
    pub async fn open<B>(mut sink: S, request: &Request<B>) -> Result<Self, StreamError> {
        let version = request.version();

        let headers = sink.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        if is_http1(version) {
            headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        }

        if let Err(e) = sink.flush().await {
            metrics::record_session_open_error();
            return Err(StreamError::Open(e));
        }
        metrics::record_session_opened();

        Ok(Self { sink, version })
    }

    /// Write a finished event and flush it.
    ///
    /// `None` writes nothing. Flush failures are ignored: the bytes are
    /// already written and a broken connection shows up on the next write.
    pub async fn write_event(&mut self, event: Option<Bytes>) -> Result<(), StreamError> {
        let Some(event) = event else {
            return Ok(());
        };

        if let Err(e) = self.sink.write(&event).await {
            let err = StreamError::from(e);
            metrics::record_write_error(ErrorReason::from_stream_error(&err));
            return Err(err);
        }
        let _ = self.sink.flush().await;

        metrics::record_event_sent(event.len() as u64);
        Ok(())
    }

    /// Encode and write an [`Event`].
    pub async fn send(&mut self, event: &Event) -> Result<(), StreamError> {
        self.write_event(Some(event.encode())).await
    }

    /// Protocol version of the request that opened the stream.
    pub fn version(&self) -> Version {
        self.version
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Give back the underlying response.
    pub fn into_inner(self) -> S {
        self.sink
    }
}

fn is_http1(version: Version) -> bool {
    version == Version::HTTP_09 || version == Version::HTTP_10 || version == Version::HTTP_11
}
