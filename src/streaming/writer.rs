//! HTTP/1.x response written directly to an async byte stream.
//!
//! Used when the server owns the raw connection (a TCP socket handed over
//! by another process, a test pipe). The status line and headers go out on
//! the first flush or write; body bytes are chunk-framed for HTTP/1.1 and
//! close-delimited for HTTP/1.0, which is always sent `Connection: close`.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use http::{header, HeaderMap, HeaderValue, StatusCode, Version};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use super::sink::ResponseSink;
use crate::error::SinkError;

/// Buffered HTTP/1.x response with a per-operation timeout.
///
/// Writes are buffered until [`flush`](ResponseSink::flush); every write and
/// flush fails with [`io::ErrorKind::TimedOut`] if the client does not
/// accept the bytes within `write_timeout`.
#[derive(Debug)]
pub struct IoResponse<W> {
    stream: BufWriter<W>,
    version: Version,
    status: StatusCode,
    headers: HeaderMap,
    head_written: bool,
    chunked: bool,
    write_timeout: Duration,
    bytes_written: u64,
}

impl<W: AsyncWrite + Unpin + Send> IoResponse<W> {
    /// Create a `200 OK` response. Versions other than HTTP/1.0 are written
    /// as HTTP/1.1.
    pub fn new(stream: W, version: Version, write_timeout: Duration) -> Self {
        let version = if version == Version::HTTP_10 {
            Version::HTTP_10
        } else {
            Version::HTTP_11
        };
        Self {
            stream: BufWriter::new(stream),
            version,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            head_written: false,
            chunked: false,
            write_timeout,
            bytes_written: 0,
        }
    }

    /// Body bytes written so far, excluding the head and chunk framing.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn get_ref(&self) -> &W {
        self.stream.get_ref()
    }

    /// Terminate the body and shut down the write side.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.write_head().await?;
        if self.chunked {
            self.timed(b"0\r\n\r\n").await?;
        }
        tokio::time::timeout(self.write_timeout, self.stream.shutdown())
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "Shutdown timeout"))?
    }

    async fn write_head(&mut self) -> io::Result<()> {
        if self.head_written {
            return Ok(());
        }
        self.head_written = true;

        if self.version == Version::HTTP_11 && !self.headers.contains_key(header::CONTENT_LENGTH)
        {
            self.headers.insert(
                header::TRANSFER_ENCODING,
                HeaderValue::from_static("chunked"),
            );
            self.chunked = true;
        }

        // An HTTP/1.0 body ends when the connection closes, so it cannot be kept alive.
        if self.version == Version::HTTP_10 {
            self.headers
                .insert(header::CONNECTION, HeaderValue::from_static("close"));
        }

        let head = encode_head(self.version, self.status, &self.headers);
        self.timed(&head).await
    }

    async fn timed(&mut self, data: &[u8]) -> io::Result<()> {
        tokio::time::timeout(self.write_timeout, self.stream.write_all(data))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "Write timeout"))?
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ResponseSink for IoResponse<W> {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), SinkError> {
        self.write_head().await?;
        if data.is_empty() {
            return Ok(());
        }
        if self.chunked {
            let size = format!("{:x}\r\n", data.len());
            self.timed(size.as_bytes()).await?;
            self.timed(data).await?;
            self.timed(b"\r\n").await?;
        } else {
            self.timed(data).await?;
        }
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.write_head().await?;
        tokio::time::timeout(self.write_timeout, self.stream.flush())
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "Flush timeout"))?
    }
}

fn encode_head(version: Version, status: StatusCode, headers: &HeaderMap) -> BytesMut {
    let mut head = BytesMut::with_capacity(256);
    let reason = status.canonical_reason().unwrap_or("");
    head.put_slice(format!("{:?} {} {}\r\n", version, status.as_u16(), reason).as_bytes());
    for (name, value) in headers {
        head.put_slice(name.as_str().as_bytes());
        head.put_slice(b": ");
        head.put_slice(value.as_bytes());
        head.put_slice(b"\r\n");
    }
    head.put_slice(b"\r\n");
    head
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_flush_commits_head_and_chunks_body() {
        let (client, server) = tokio::io::duplex(4096);
        let mut response = IoResponse::new(server, Version::HTTP_11, TIMEOUT);
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/event-stream"),
        );
        response.flush().await.unwrap();
        response.write(b"data: x\n\n").await.unwrap();
        response.shutdown().await.unwrap();
        assert_eq!(response.bytes_written(), 9);
        drop(response);

        let mut out = String::new();
        let mut client = client;
        client.read_to_string(&mut out).await.unwrap();
        assert_eq!(
            out,
            "HTTP/1.1 200 OK\r\n\
             content-type: text/event-stream\r\n\
             transfer-encoding: chunked\r\n\
             \r\n\
             9\r\ndata: x\n\n\r\n\
             0\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn test_http10_body_is_not_chunked() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut response = IoResponse::new(server, Version::HTTP_10, TIMEOUT);
        response.write(b"data: x\n\n").await.unwrap();
        response.shutdown().await.unwrap();
        drop(response);

        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "HTTP/1.0 200 OK\r\nconnection: close\r\n\r\ndata: x\n\n");
    }

    #[tokio::test]
    async fn test_http10_stream_closes_connection() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut response = IoResponse::new(server, Version::HTTP_10, TIMEOUT);
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        response.write(b"data: x\n\n").await.unwrap();
        response.shutdown().await.unwrap();
        drop(response);

        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "HTTP/1.0 200 OK\r\nconnection: close\r\n\r\ndata: x\n\n");
    }

    #[tokio::test]
    async fn test_headers_after_commit_are_not_sent() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut response = IoResponse::new(server, Version::HTTP_10, TIMEOUT);
        response.flush().await.unwrap();
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        response.shutdown().await.unwrap();
        drop(response);

        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "HTTP/1.0 200 OK\r\nconnection: close\r\n\r\n");
    }

    #[tokio::test]
    async fn test_flush_times_out_on_stalled_client() {
        // Pipe smaller than the head and nobody reading.
        let (_client, server) = tokio::io::duplex(8);
        let mut response = IoResponse::new(server, Version::HTTP_11, Duration::from_millis(50));
        let err = response.flush().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_write_to_closed_peer_fails() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        let mut response = IoResponse::new(server, Version::HTTP_11, TIMEOUT);
        let payload = vec![b'x'; 1024];
        let result = async {
            response.write(&payload).await?;
            response.flush().await?;
            Ok::<(), SinkError>(())
        }
        .await;
        assert!(matches!(result, Err(SinkError::Io(_))));
    }
}
