//! Channel-backed response for axum/hyper handlers.
//!
//! The handler returns the response produced by [`PendingResponse`] while a
//! separate task drives the [`StreamSession`](super::StreamSession) over the
//! [`BodyResponse`]. Each write becomes one body frame, for HTTP/1.1 and
//! HTTP/2 alike. A flush waits until the connection has taken every queued
//! frame, so a client that stops reading stalls the writer.

use std::convert::Infallible;
use std::io;

use async_trait::async_trait;
use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use futures::stream;
use http::{HeaderMap, StatusCode};
use tokio::sync::{mpsc, oneshot};

use super::sink::ResponseSink;
use crate::error::SinkError;

/// Create a response whose body is fed by the returned [`BodyResponse`].
///
/// `capacity` is the number of frames that may be queued ahead of the
/// connection before writes start waiting.
pub fn channel(capacity: usize) -> (BodyResponse, PendingResponse) {
    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(capacity.max(1));
    let response = BodyResponse {
        status: StatusCode::OK,
        headers: HeaderMap::new(),
        head_tx: Some(head_tx),
        body_rx: Some(body_rx),
        body_tx,
    };
    (response, PendingResponse { head_rx })
}

/// Writing half of a streamed axum response.
#[derive(Debug)]
pub struct BodyResponse {
    status: StatusCode,
    headers: HeaderMap,
    head_tx: Option<oneshot::Sender<Response>>,
    body_rx: Option<mpsc::Receiver<Bytes>>,
    body_tx: mpsc::Sender<Bytes>,
}

impl BodyResponse {
    /// Hand the status, headers and body stream to the waiting handler.
    fn commit(&mut self) -> io::Result<()> {
        let (Some(head_tx), Some(body_rx)) = (self.head_tx.take(), self.body_rx.take()) else {
            return Ok(());
        };

        let frames = stream::unfold(body_rx, |mut rx| async move {
            rx.recv().await.map(|frame| (Ok::<Bytes, Infallible>(frame), rx))
        });
        let mut response = Response::new(Body::from_stream(frames));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();

        head_tx
            .send(response)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response handler is gone"))
    }
}

#[async_trait]
impl ResponseSink for BodyResponse {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), SinkError> {
        self.commit()?;
        self.body_tx
            .send(Bytes::copy_from_slice(data))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))?;
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.commit()?;
        // All permits free means the body stream has pulled every frame.
        let permits = self
            .body_tx
            .reserve_many(self.body_tx.max_capacity())
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))?;
        drop(permits);
        Ok(())
    }
}

/// The response a handler returns once the stream's head is committed.
#[derive(Debug)]
pub struct PendingResponse {
    head_rx: oneshot::Receiver<Response>,
}

impl PendingResponse {
    /// Wait for the head. `None` if the writer was dropped without
    /// committing, e.g. because opening the stream failed.
    pub async fn wait(self) -> Option<Response> {
        self.head_rx.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use futures::StreamExt;
    use std::time::Duration;
    use http::{header, HeaderValue};

    #[tokio::test]
    async fn test_flush_commits_headers() {
        let (mut sink, pending) = channel(4);
        sink.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/event-stream"),
        );
        sink.flush().await.unwrap();

        let response = pending.wait().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    }

    #[tokio::test]
    async fn test_body_carries_writes_in_order() {
        let (mut sink, pending) = channel(4);
        sink.flush().await.unwrap();
        sink.write(b"data: 1\n\n").await.unwrap();
        sink.write(b"data: 2\n\n").await.unwrap();
        drop(sink);

        let response = pending.wait().await.unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"data: 1\n\ndata: 2\n\n");
    }

    #[tokio::test]
    async fn test_flush_waits_for_body_to_be_read() {
        let (mut sink, pending) = channel(4);
        sink.flush().await.unwrap();
        let response = pending.wait().await.unwrap();

        sink.write(b"data: 1\n\n").await.unwrap();
        let stalled = tokio::time::timeout(Duration::from_millis(100), sink.flush()).await;
        assert!(stalled.is_err(), "flush returned with a frame still queued");

        let mut body = response.into_body().into_data_stream();
        let frame = body.next().await.unwrap().unwrap();
        assert_eq!(&frame[..], b"data: 1\n\n");
        tokio::time::timeout(Duration::from_secs(1), sink.flush())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_writer_yields_no_response() {
        let (sink, pending) = channel(1);
        drop(sink);
        assert!(pending.wait().await.is_none());
    }

    #[tokio::test]
    async fn test_write_after_client_gone_fails() {
        let (mut sink, pending) = channel(1);
        sink.flush().await.unwrap();
        drop(pending.wait().await.unwrap());

        assert!(sink.flush().await.is_err());
        let err = sink.write(b"data: x\n\n").await.unwrap_err();
        assert!(matches!(err, SinkError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    #[tokio::test]
    async fn test_commit_fails_when_handler_is_gone() {
        let (mut sink, pending) = channel(1);
        drop(pending);
        let err = sink.flush().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
