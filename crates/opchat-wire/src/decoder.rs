//! Incremental frame decoder for the response stream
//!
//! The stream is a sequence of text lines. Lines starting with the data
//! prefix carry one self-contained JSON event each; everything else
//! (keep-alive comments, blank lines) is ignored. Chunk boundaries fall
//! anywhere, so the decoder carries the trailing partial line between
//! calls — that carry-over is its only state.

use crate::event::StreamEvent;

/// Prefix marking a data-bearing line.
pub const DATA_PREFIX: &str = "data:";

/// Splits raw stream chunks into typed events.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    carry: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw chunk, returning every event completed by it.
    ///
    /// Malformed lines are logged and skipped; they never abort the stream.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.carry.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.carry.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.carry.drain(..=newline).collect();
            if let Some(event) = decode_line(&line[..newline]) {
                events.push(event);
            }
        }
        events
    }

    /// Drain a trailing line that never got its newline (end of stream).
    pub fn finish(&mut self) -> Option<StreamEvent> {
        let line = std::mem::take(&mut self.carry);
        decode_line(&line)
    }
}

fn decode_line(line: &[u8]) -> Option<StreamEvent> {
    let line = match std::str::from_utf8(line) {
        Ok(s) => s.trim(),
        Err(e) => {
            tracing::warn!("dropping non-UTF-8 line in stream: {e}");
            return None;
        }
    };

    let payload = line.strip_prefix(DATA_PREFIX)?.trim_start();
    if payload.is_empty() {
        return None;
    }

    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!("skipping malformed frame: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_chunk_multiple_lines() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(
            b"data: {\"type\":\"thread\",\"threadId\":\"t1\"}\ndata: {\"type\":\"done\"}\n",
        );
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], StreamEvent::Thread { .. }));
        assert_eq!(events[1], StreamEvent::Done);
    }

    #[test]
    fn test_partial_line_carried_across_chunks() {
        let mut decoder = FrameDecoder::new();

        let events = decoder.feed(b"data: {\"type\":\"thread.message.delta\",");
        assert!(events.is_empty());

        let events = decoder.feed(b"\"delta\":{\"text\":\"Hel\"}}\n");
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::MessageDelta { payload } => {
                assert_eq!(crate::delta_fragment(payload), Some("Hel"));
            }
            other => panic!("expected delta, got {:?}", other),
        }
    }

    #[test]
    fn test_non_data_lines_ignored() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b": keep-alive\n\nevent: ping\ndata: {\"type\":\"done\"}\n");
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[test]
    fn test_malformed_json_skipped_without_aborting() {
        let mut decoder = FrameDecoder::new();
        let events =
            decoder.feed(b"data: {not json\ndata: {\"type\":\"session\",\"userId\":\"u1\"}\n");
        assert_eq!(
            events,
            vec![StreamEvent::Session {
                user_id: Some("u1".into())
            }]
        );
    }

    #[test]
    fn test_unknown_event_type_skipped() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"data: {\"type\":\"thread.run.step.completed\"}\n");
        assert!(events.is_empty());
    }

    #[test]
    fn test_spacing_variants_after_prefix() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"data:{\"type\":\"done\"}\ndata:   {\"type\":\"done\"}\n");
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.feed(b"data: {\"type\":\"done\"}\r\n");
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"data: {\"type\":\"done\"}").is_empty());
        assert_eq!(decoder.finish(), Some(StreamEvent::Done));
        // A second flush has nothing left.
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_byte_at_a_time_feed() {
        let frame = b"data: {\"type\":\"thread\",\"threadId\":\"t9\"}\n";
        let mut decoder = FrameDecoder::new();
        let mut events = Vec::new();
        for byte in frame {
            events.extend(decoder.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(
            events,
            vec![StreamEvent::Thread {
                thread_id: "t9".into(),
                user_id: None
            }]
        );
    }
}
