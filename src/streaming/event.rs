//! SSE event encoding.
//!
//! Field lines are written into the buffer as soon as they are known, so an
//! event is produced in one pass with no reordering:
//!
//! ```text
//! id: <id>
//! retry: <milliseconds>
//! event: <name>
//! data: <line>
//! data: <line>
//!
//! ```

use std::fmt::{self, Write as _};
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

/// Media type of an SSE response body.
pub const CONTENT_TYPE: &str = "text/event-stream";

/// Incremental writer for a single SSE event.
///
/// Values are not validated or escaped. `id`, `name` and data lines must not
/// contain `\n`; a newline corrupts the event framing. Multi-line payloads
/// have to be split into one data line per line, see [`Event::from_text`].
///
/// [`finish`](Self::finish) consumes the writer, so an event cannot be
/// finished twice or appended to afterwards:
///
/// ```compile_fail
/// use std::time::Duration;
/// use bytes::BytesMut;
/// use sseserver::streaming::EventWriter;
///
/// let mut event = EventWriter::new(BytesMut::new(), "", "", Duration::ZERO);
/// event.data("x");
/// let first = event.finish();
/// let second = event.finish();
/// ```
#[derive(Debug)]
pub struct EventWriter {
    buf: BytesMut,
}

impl EventWriter {
    /// Start an event in `buf`, writing the `id`, `retry` and `event` lines
    /// that are present. Empty strings and a zero retry are omitted.
    pub fn new(mut buf: BytesMut, name: &str, id: &str, retry: Duration) -> Self {
        if !id.is_empty() {
            put_field(&mut buf, "id", id);
        }
        if !retry.is_zero() {
            // fmt::Write for BytesMut never fails
            let _ = writeln!(buf, "retry: {}", retry.as_millis());
        }
        if !name.is_empty() {
            put_field(&mut buf, "event", name);
        }
        Self { buf }
    }

    /// Append one `data:` line built from format arguments.
    ///
    /// ```
    /// # use std::time::Duration;
    /// # use bytes::BytesMut;
    /// # use sseserver::streaming::EventWriter;
    /// let mut event = EventWriter::new(BytesMut::new(), "", "", Duration::ZERO);
    /// event.data_fmt(format_args!("{} of {}", 1, 3));
    /// assert_eq!(&event.finish()[..], b"data: 1 of 3\n\n");
    /// ```
    pub fn data_fmt(&mut self, args: fmt::Arguments<'_>) {
        self.buf.put_slice(b"data: ");
        let _ = self.buf.write_fmt(args);
        self.buf.put_u8(b'\n');
    }

    /// Append one `data:` line verbatim.
    pub fn data(&mut self, line: &str) {
        put_field(&mut self.buf, "data", line);
    }

    /// Write the terminating blank line and return the finished event.
    pub fn finish(mut self) -> Bytes {
        self.buf.put_u8(b'\n');
        self.buf.freeze()
    }
}

fn put_field(buf: &mut BytesMut, field: &str, value: &str) {
    buf.reserve(field.len() + value.len() + 3);
    buf.put_slice(field.as_bytes());
    buf.put_slice(b": ");
    buf.put_slice(value.as_bytes());
    buf.put_u8(b'\n');
}

/// An owned SSE event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    pub id: String,
    pub name: String,
    /// Reconnection delay hint. Zero means unset.
    pub retry: Duration,
    /// Payload lines, one `data:` line each.
    pub data: Vec<String>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event whose payload is `text` split into lines.
    pub fn from_text(text: &str) -> Self {
        Self {
            data: text
                .split('\n')
                .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
                .collect(),
            ..Self::default()
        }
    }

    /// Event with `value` serialized as a single JSON data line.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            data: vec![serde_json::to_string(value)?],
            ..Self::default()
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_data(mut self, line: impl Into<String>) -> Self {
        self.data.push(line.into());
        self
    }

    /// Encode to wire bytes.
    pub fn encode(&self) -> Bytes {
        let mut writer = EventWriter::new(
            BytesMut::with_capacity(self.encoded_len_hint()),
            &self.name,
            &self.id,
            self.retry,
        );
        for line in &self.data {
            writer.data(line);
        }
        writer.finish()
    }

    fn encoded_len_hint(&self) -> usize {
        let fields = self.id.len() + self.name.len() + 32;
        let data: usize = self.data.iter().map(|line| line.len() + 7).sum();
        fields + data + 1
    }
}
