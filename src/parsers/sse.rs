//! Incremental Server-Sent-Events decoder

/// Largest line or event body the decoder will buffer
pub const MAX_EVENT_LEN: usize = 64 * 1024;

/// One decoded item from the push stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Payload of a completed event (`data:` lines joined by `\n`)
    Data(Vec<u8>),
    /// A line or event outgrew `MAX_EVENT_LEN` and was dropped
    Oversized,
}

/// Splits a push-stream body into event payloads.
///
/// Bytes may arrive in arbitrary chunks; incomplete lines are held until the
/// next `feed`. Only `data:` fields contribute to a payload, and a blank
/// line terminates the event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    data: Vec<u8>,
    has_data: bool,
    /// Dropping the rest of an oversized line
    skipping: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of body bytes, returning every event completed by it
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            if let Some(event) = self.push_line_bytes(&rest[..pos]) {
                events.push(event);
            }
            if self.skipping {
                self.skipping = false;
            } else if let Some(event) = self.take_line() {
                events.push(event);
            }
            rest = &rest[pos + 1..];
        }
        // Hold the unterminated tail for the next chunk
        if let Some(event) = self.push_line_bytes(rest) {
            events.push(event);
        }
        events
    }

    /// End of stream. An event without its closing blank line is discarded;
    /// returns true if anything was pending.
    pub fn finish(&mut self) -> bool {
        let pending = !self.line.is_empty() || self.has_data;
        self.discard();
        self.skipping = false;
        pending
    }

    fn push_line_bytes(&mut self, bytes: &[u8]) -> Option<SseEvent> {
        if self.skipping || bytes.is_empty() {
            return None;
        }
        if self.line.len() + bytes.len() > MAX_EVENT_LEN {
            self.discard();
            self.skipping = true;
            return Some(SseEvent::Oversized);
        }
        self.line.extend_from_slice(bytes);
        None
    }

    fn take_line(&mut self) -> Option<SseEvent> {
        let mut line = std::mem::take(&mut self.line);
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        if line.is_empty() {
            return self.dispatch();
        }
        // Comment line
        if line[0] == b':' {
            return None;
        }

        let (field, value) = match line.iter().position(|&b| b == b':') {
            Some(pos) => {
                let value = &line[pos + 1..];
                let value = value.strip_prefix(b" ").unwrap_or(value);
                (&line[..pos], value)
            }
            None => (&line[..], &[][..]),
        };

        if field == b"data" {
            if self.data.len() + value.len() + 1 > MAX_EVENT_LEN {
                self.discard();
                return Some(SseEvent::Oversized);
            }
            if self.has_data {
                self.data.push(b'\n');
            }
            self.data.extend_from_slice(value);
            self.has_data = true;
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(SseEvent::Data(std::mem::take(&mut self.data)))
    }

    fn discard(&mut self) {
        self.line = Vec::new();
        self.data = Vec::new();
        self.has_data = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_strings(events: Vec<SseEvent>) -> Vec<String> {
        events
            .into_iter()
            .map(|e| match e {
                SseEvent::Data(data) => String::from_utf8(data).unwrap(),
                SseEvent::Oversized => panic!("unexpected oversized event"),
            })
            .collect()
    }

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"time\":\"t1\",\"USD\":1.0}\n\n");
        assert_eq!(as_strings(events), vec!["{\"time\":\"t1\",\"USD\":1.0}"]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"ti").is_empty());
        assert!(decoder.feed(b"me\":\"t1\"}\n").is_empty());
        let events = decoder.feed(b"\n");
        assert_eq!(as_strings(events), vec!["{\"time\":\"t1\"}"]);
    }

    #[test]
    fn test_crlf_and_multiple_events() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: a\r\n\r\ndata: b\r\n\r\n");
        assert_eq!(as_strings(events), vec!["a", "b"]);
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: first\ndata: second\n\n");
        assert_eq!(as_strings(events), vec!["first\nsecond"]);
    }

    #[test]
    fn test_ignores_comments_and_other_fields() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keepalive\n\nevent: price\nid: 7\nretry: 100\ndata: x\n\n");
        assert_eq!(as_strings(events), vec!["x"]);
    }

    #[test]
    fn test_blank_lines_without_data_emit_nothing() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"\n\n\n").is_empty());
    }

    #[test]
    fn test_finish_discards_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: tail").is_empty());
        assert!(decoder.finish());
        assert!(!decoder.finish());

        // Data line complete but no blank line yet
        assert!(decoder.feed(b"data: half\n").is_empty());
        assert!(decoder.finish());
        assert!(decoder.feed(b"\n").is_empty());
    }

    #[test]
    fn test_long_line_without_newline_is_dropped() {
        let mut decoder = SseDecoder::new();
        let mut oversized = 0;
        let chunk = vec![b'x'; 16 * 1024];
        for _ in 0..8 {
            for event in decoder.feed(&chunk) {
                assert_eq!(event, SseEvent::Oversized);
                oversized += 1;
            }
        }
        assert_eq!(oversized, 1);
        assert!(decoder.line.len() <= MAX_EVENT_LEN);

        // The stream recovers after the next newline
        let events = decoder.feed(b"yyy\ndata: ok\n\n");
        assert_eq!(as_strings(events), vec!["ok"]);
    }

    #[test]
    fn test_event_growing_past_limit_is_dropped() {
        let mut decoder = SseDecoder::new();
        let mut line = b"data: ".to_vec();
        line.extend(std::iter::repeat_n(b'a', 40 * 1024));
        line.push(b'\n');

        assert!(decoder.feed(&line).is_empty());
        assert_eq!(decoder.feed(&line), vec![SseEvent::Oversized]);
        // The blank line no longer has a payload to dispatch
        assert!(decoder.feed(b"\n").is_empty());
        assert_eq!(as_strings(decoder.feed(b"data: next\n\n")), vec!["next"]);
    }
}
