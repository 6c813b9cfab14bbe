//! Incremental framing of the upstream event-stream wire format.
//!
//! The upstream emits records of the form
//!
//! ```text
//! event: TaskAnalyzerAgent
//! data: <payload>
//!
//! ```
//!
//! separated by a blank line. Network reads split these records at arbitrary
//! byte boundaries, so the decoder buffers raw bytes and only decodes a
//! record once its terminating double newline has arrived — a UTF-8 sequence
//! split across chunks is never corrupted. This layer knows nothing about
//! event semantics; it only frames records.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::bridge::AgentEvent;
use crate::error::BridgeError;

/// Incremental decoder from raw byte chunks to framed events.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, draining every record completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<AgentEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(end) = find_double_newline(&self.buffer) {
            let record: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = parse_record(&record[..end]) {
                events.push(event);
            }
        }
        events
    }

    /// Flush at end-of-stream. A trailing record the upstream never
    /// terminated with a blank line is still parsed and emitted rather than
    /// dropped.
    pub fn finish(&mut self) -> Option<AgentEvent> {
        if self.buffer.iter().all(|b| b.is_ascii_whitespace()) {
            self.buffer.clear();
            return None;
        }
        let record = std::mem::take(&mut self.buffer);
        parse_record(&record)
    }
}

fn find_double_newline(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|pair| pair == b"\n\n")
}

/// Parse one complete record. The name is the first `event:` line and the
/// payload the first `data:` line, each with the prefix and at most one
/// following space removed. A record without an `event:` line frames
/// nothing — malformed framing is tolerated, not fatal.
fn parse_record(record: &[u8]) -> Option<AgentEvent> {
    let text = String::from_utf8_lossy(record);

    let mut name = None;
    let mut payload = None;
    for line in text.lines() {
        if name.is_none() {
            if let Some(rest) = line.strip_prefix("event:") {
                name = Some(strip_one_space(rest));
                continue;
            }
        }
        if payload.is_none() {
            if let Some(rest) = line.strip_prefix("data:") {
                payload = Some(strip_one_space(rest));
            }
        }
    }

    match name {
        Some(name) => Some(AgentEvent::new(name, payload.unwrap_or(""))),
        None => {
            debug!("Dropping record with no event line ({} bytes)", record.len());
            None
        }
    }
}

fn strip_one_space(s: &str) -> &str {
    s.strip_prefix(' ').unwrap_or(s)
}

/// Lift an HTTP response body into a stream of framed events.
///
/// A mid-stream transport error surfaces as one `TransportInterrupted` item
/// and ends the stream; dropping the returned stream drops the body read.
pub fn event_stream(
    response: reqwest::Response,
) -> impl Stream<Item = Result<AgentEvent, BridgeError>> {
    async_stream::stream! {
        let mut decoder = FrameDecoder::new();
        let mut chunks = response.bytes_stream();

        while let Some(next) = chunks.next().await {
            let chunk: Bytes = match next {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(BridgeError::TransportInterrupted(e.to_string()));
                    return;
                }
            };
            for event in decoder.feed(&chunk) {
                yield Ok(event);
            }
        }

        if let Some(event) = decoder.finish() {
            yield Ok(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::EventTag;

    fn drain(decoder: &mut FrameDecoder, input: &[u8]) -> Vec<AgentEvent> {
        let mut events = decoder.feed(input);
        events.extend(decoder.finish());
        events
    }

    #[test]
    fn parses_complete_records() {
        let wire = b"event: TaskAnalyzerAgent\ndata: thinking hard\n\nevent: Answer\ndata: done\n\n";
        let mut decoder = FrameDecoder::new();
        let events = drain(&mut decoder, wire);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].tag, EventTag::TaskAnalyzer);
        assert_eq!(events[0].payload, "thinking hard");
        assert_eq!(events[1].tag, EventTag::Answer);
        assert_eq!(events[1].payload, "done");
    }

    #[test]
    fn reassembles_records_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"event: Ans").is_empty());
        assert!(decoder.feed(b"wer\ndata: par").is_empty());
        let events = decoder.feed(b"tial then whole\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tag, EventTag::Answer);
        assert_eq!(events[0].payload, "partial then whole");
    }

    #[test]
    fn any_chunking_matches_whole_input() {
        let wire = "event: TaskDecompositionAgent\ndata: {\"subtasks\":[]}\n\n\
                    event: PlanControllerAgent\ndata: {\"current_subtask_id\":\"s1\"}\n\n\
                    event: Answer\ndata: d\u{00e9}j\u{00e0} done\n\n"
            .as_bytes();

        let mut reference = FrameDecoder::new();
        let expected = drain(&mut reference, wire);
        assert_eq!(expected.len(), 3);

        for chunk_size in 1..=wire.len() {
            let mut decoder = FrameDecoder::new();
            let mut events = Vec::new();
            for chunk in wire.chunks(chunk_size) {
                events.extend(decoder.feed(chunk));
            }
            events.extend(decoder.finish());
            assert_eq!(events, expected, "chunk size {} diverged", chunk_size);
        }
    }

    #[test]
    fn utf8_split_across_chunk_boundary_survives() {
        let wire = "event: Answer\ndata: caf\u{00e9}\n\n".as_bytes();
        // Split in the middle of the two-byte é sequence.
        let split = wire.len() - 3;
        let mut decoder = FrameDecoder::new();
        let mut events = decoder.feed(&wire[..split]);
        events.extend(decoder.feed(&wire[split..]));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload, "caf\u{00e9}");
    }

    #[test]
    fn trailing_partial_record_is_emitted_at_end() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"event: Answer\ndata: no trailing blank line").is_empty());
        let last = decoder.finish().unwrap();
        assert_eq!(last.tag, EventTag::Answer);
        assert_eq!(last.payload, "no trailing blank line");
    }

    #[test]
    fn trailing_whitespace_is_not_a_record() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(b"event: Answer\ndata: done\n\n");
        assert!(decoder.feed(b"\n  \n").is_empty());
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn record_without_event_line_is_dropped() {
        let wire = b"data: orphaned payload\n\nevent: Answer\ndata: kept\n\n";
        let mut decoder = FrameDecoder::new();
        let events = drain(&mut decoder, wire);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload, "kept");
    }

    #[test]
    fn record_without_data_line_gets_empty_payload() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"event: stopped\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tag, EventTag::Stopped);
        assert_eq!(events[0].payload, "");
    }

    #[test]
    fn only_first_event_and_data_lines_count() {
        let wire = b"event: Answer\ndata: first\nevent: ignored\ndata: also ignored\n\n";
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(wire);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tag, EventTag::Answer);
        assert_eq!(events[0].payload, "first");
    }

    #[test]
    fn exactly_one_prefix_space_is_trimmed() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"event: Answer\ndata:  two spaces\n\n");
        assert_eq!(events[0].payload, " two spaces");

        let events = decoder.feed(b"event: Answer\ndata:none\n\n");
        assert_eq!(events[0].payload, "none");
    }

    #[test]
    fn data_line_before_event_line_still_frames() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"data: payload first\nevent: Answer\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tag, EventTag::Answer);
        assert_eq!(events[0].payload, "payload first");
    }
}
