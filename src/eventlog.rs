//! Event log for tee'd SSE bytes.
//!
//! Reads the raw byte stream a [`TeeResponse`](crate::streaming::TeeResponse)
//! copies out, cuts it into events at the `\n\n` terminator and hands each
//! event's lines to a printer. Events may arrive split across any number of
//! writes.

use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::task::JoinHandle;

const EVENT_TERMINATOR: &[u8] = b"\n\n";
const PIPE_CAPACITY: usize = 64 * 1024;

/// Start a reader task and return the pipe to tee into.
///
/// The task ends when the returned writer is dropped. A final fragment with
/// no terminator is delivered at that point.
pub fn spawn<F>(mut print_lines: F) -> (DuplexStream, JoinHandle<()>)
where
    F: FnMut(Vec<String>) + Send + 'static,
{
    let (writer, mut reader) = tokio::io::duplex(PIPE_CAPACITY);

    let task = tokio::spawn(async move {
        let mut buf = BytesMut::with_capacity(4096);
        let mut scanned = 0;
        loop {
            match reader.read_buf(&mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    while let Some(event) = next_event(&mut buf, &mut scanned) {
                        print_lines(event_lines(&event));
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Event log pipe read failed");
                    return;
                }
            }
        }
        if !buf.is_empty() {
            print_lines(event_lines(&buf));
        }
    });

    (writer, task)
}

/// Shared printer, for handing one printer to every stream.
pub type Printer = Arc<dyn Fn(Vec<String>) + Send + Sync>;

/// Printer that emits each event as a debug record.
pub fn trace_lines(lines: Vec<String>) {
    tracing::debug!(target: "sseserver::events", ?lines, "SSE event");
}

/// Remove the next complete event from `buf`, without its terminator.
///
/// `scanned` is how much of `buf` is known not to hold a terminator; the
/// search resumes just before it so a terminator split across reads is found.
fn next_event(buf: &mut BytesMut, scanned: &mut usize) -> Option<Bytes> {
    let start = scanned.saturating_sub(EVENT_TERMINATOR.len() - 1);
    let found = buf[start..]
        .windows(EVENT_TERMINATOR.len())
        .position(|window| window == EVENT_TERMINATOR);

    let Some(pos) = found else {
        *scanned = buf.len();
        return None;
    };
    let event = buf.split_to(start + pos).freeze();
    buf.advance(EVENT_TERMINATOR.len());
    *scanned = 0;
    Some(event)
}

fn event_lines(event: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(event)
        .split('\n')
        .map(str::to_string)
        .collect()
}
