//! Transport framing for the search event stream.
//!
//! Each event travels as one self-contained record: a fixed `data: ` marker,
//! the event's compact JSON, and a blank-line separator. The encoder emits a
//! record as a single string so partial records can only come from the
//! transport splitting writes, never from the encoder. The decoder is the
//! client-side contract: buffer across reads, parse only complete records,
//! and skip anything malformed without killing the stream.

use super::merger::SearchEvent;
use crate::error::Result;

/// Marker prefixing every record's payload
pub const RECORD_PREFIX: &str = "data: ";

/// Record separator; payloads are compact JSON and never contain raw newlines
const RECORD_SEPARATOR: &[u8] = b"\n\n";

/// Encode one event as a complete wire record
pub fn encode_event(event: &SearchEvent) -> Result<String> {
    let payload = serde_json::to_string(event)?;
    Ok(format!("{RECORD_PREFIX}{payload}\n\n"))
}

/// Incremental decoder for the search event stream.
///
/// Network reads may split a record anywhere, including inside a multi-byte
/// UTF-8 sequence, so the buffer holds raw bytes and records are only
/// interpreted once a full separator has arrived.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of transport data, returning every event completed by it.
    ///
    /// Records that are not valid UTF-8, lack the record marker, or fail to
    /// parse as an event are logged and skipped; decoding continues with the
    /// next record.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SearchEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = find_separator(&self.buf) {
            let record: Vec<u8> = self.buf.drain(..pos + RECORD_SEPARATOR.len()).collect();
            if let Some(event) = parse_record(&record[..pos]) {
                events.push(event);
            }
        }
        events
    }

    /// Bytes buffered while waiting for the rest of a record
    pub fn pending_bytes(&self) -> usize {
        self.buf.len()
    }
}

fn find_separator(buf: &[u8]) -> Option<usize> {
    buf.windows(RECORD_SEPARATOR.len())
        .position(|window| window == RECORD_SEPARATOR)
}

fn parse_record(record: &[u8]) -> Option<SearchEvent> {
    let text = match std::str::from_utf8(record) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping non-UTF-8 record");
            return None;
        }
    };

    let Some(payload) = text.strip_prefix(RECORD_PREFIX) else {
        tracing::warn!("Skipping record without event marker");
        return None;
    };

    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping malformed record");
            None
        }
    }
}
