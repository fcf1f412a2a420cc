//! Demo event source for the `/events` endpoint.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{Bytes, BytesMut};
use serde_json::json;

use crate::config::StreamConfig;
use crate::streaming::EventWriter;

/// Builds numbered tick events.
#[derive(Debug, Clone)]
pub struct Ticker {
    name: String,
    retry: Duration,
}

impl Ticker {
    pub fn new(name: impl Into<String>, retry: Duration) -> Self {
        Self {
            name: name.into(),
            retry,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(config.event_name.clone(), config.retry())
    }

    /// Event number `seq`, stamped with the current time.
    pub fn event(&self, seq: u64) -> Bytes {
        let ts_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        self.event_at(seq, ts_ms)
    }

    fn event_at(&self, seq: u64, ts_ms: u64) -> Bytes {
        let mut event = EventWriter::new(
            BytesMut::with_capacity(96),
            &self.name,
            &seq.to_string(),
            self.retry,
        );
        event.data_fmt(format_args!("{}", json!({ "seq": seq, "ts_ms": ts_ms })));
        event.finish()
    }
}
