//! Server-sent event decoding for streamed chat completions
//!
//! Response bodies arrive in arbitrary byte chunks; a chunk may end in the
//! middle of a line or of a UTF-8 sequence. Complete lines are decoded as
//! they become available and the remainder is carried to the next chunk.

use serde::Deserialize;

/// Marker closing an `OpenAI`-style stream
const DONE_MARKER: &str = "[DONE]";

/// Decoded stream event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A content fragment
    Delta(String),
    /// The explicit end-of-stream marker
    Done,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Incremental `data:` line decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a body chunk, returning the events completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(event) = decode_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Decode whatever is left once the connection closes
    pub fn finish(&mut self) -> Option<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line)
    }
}

/// Decode one line; anything that is not a usable event yields `None`
fn decode_line(line: &[u8]) -> Option<SseEvent> {
    let Ok(line) = std::str::from_utf8(line) else {
        tracing::trace!("skipping non-UTF-8 stream line");
        return None;
    };

    let data = line.trim().strip_prefix("data:")?.trim();
    if data == DONE_MARKER {
        return Some(SseEvent::Done);
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .map(SseEvent::Delta),
        Err(e) => {
            tracing::trace!(error = %e, "skipping malformed stream event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    #[test]
    fn test_decodes_deltas_and_done() {
        let mut decoder = SseDecoder::new();
        let body = format!("{}{}data: [DONE]\n\n", delta("Moien"), delta(". "));

        assert_eq!(
            decoder.push(body.as_bytes()),
            vec![
                SseEvent::Delta("Moien".to_string()),
                SseEvent::Delta(". ".to_string()),
                SseEvent::Done,
            ]
        );
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let body = delta("Wéi geet et?");
        let bytes = body.as_bytes();
        // Split inside the multi-byte 'é'
        let cut = body.find('é').unwrap() + 1;

        assert!(decoder.push(&bytes[..cut]).is_empty());
        assert_eq!(
            decoder.push(&bytes[cut..]),
            vec![SseEvent::Delta("Wéi geet et?".to_string())]
        );
    }

    #[test]
    fn test_malformed_and_empty_events_are_skipped() {
        let mut decoder = SseDecoder::new();
        let body = format!(
            ": keep-alive\ndata: {{not json\ndata: {}\n{}",
            serde_json::json!({"choices": [{"delta": {"role": "assistant"}}]}),
            delta("Jo")
        );

        assert_eq!(
            decoder.push(body.as_bytes()),
            vec![SseEvent::Delta("Jo".to_string())]
        );
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        let body = delta("Äddi");
        let unterminated = body.trim_end();

        assert!(decoder.push(unterminated.as_bytes()).is_empty());
        assert_eq!(decoder.finish(), Some(SseEvent::Delta("Äddi".to_string())));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_crlf_lines() {
        let mut decoder = SseDecoder::new();

        assert_eq!(decoder.push(b"data: [DONE]\r\n"), vec![SseEvent::Done]);
    }
}
