//! Incremental parser for server-sent-event framed completion streams.
//!
//! Provider streaming endpoints deliver `data:` framed events over a chunked
//! HTTP body. Network chunks do not align with event boundaries (an event, or
//! even a multi-byte character inside one, can be split across chunks), so
//! the parser buffers raw bytes and only yields the payload of events that
//! have been fully received.

use futures::StreamExt;

use crate::types::{AppError, AppResult, ChunkStream};

#[derive(Debug, Default)]
pub struct SseParser {
    buf: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes; returns the `data` payload of every event
    /// completed by this chunk, in arrival order. Multi-line `data` fields
    /// are joined with newlines as the event-stream format requires;
    /// non-`data` fields are ignored.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(end) = find_event_end(&self.buf) {
            let block: Vec<u8> = self.buf.drain(..end).collect();
            let text = String::from_utf8_lossy(&block);

            let mut data_lines = Vec::new();
            for line in text.lines() {
                if let Some(rest) = line.strip_prefix("data:") {
                    data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
                }
            }
            if !data_lines.is_empty() {
                payloads.push(data_lines.join("\n"));
            }
        }
        payloads
    }
}

/// Index one past the blank line that terminates the first complete event,
/// tolerating CRLF framing.
fn find_event_end(buf: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'\n' {
            let mut j = i + 1;
            if j < buf.len() && buf[j] == b'\r' {
                j += 1;
            }
            if j < buf.len() && buf[j] == b'\n' {
                return Some(j + 1);
            }
        }
        i += 1;
    }
    None
}

/// Turn a streaming HTTP response into a text-fragment stream.
///
/// `extract` maps one event payload to either a fragment (`Some(Ok)`), a
/// stream error (`Some(Err)`), or nothing (`None`, e.g. keep-alives and end
/// sentinels).
pub fn delta_stream<F>(response: reqwest::Response, mut extract: F) -> ChunkStream
where
    F: FnMut(&str) -> Option<AppResult<String>> + Send + 'static,
{
    let mut parser = SseParser::new();
    let stream = response
        .bytes_stream()
        .map(move |chunk| match chunk {
            Ok(bytes) => parser
                .push(&bytes)
                .iter()
                .filter_map(|payload| extract(payload.as_str()))
                .collect::<Vec<_>>(),
            Err(e) => vec![Err(AppError::LlmApi(format!("stream error: {}", e)))],
        })
        .flat_map(futures::stream::iter);

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let payloads = parser.push(b"data: hello\n\n");
        assert_eq!(payloads, vec!["hello".to_string()]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: hel").is_empty());
        assert!(parser.push(b"lo\n").is_empty());
        let payloads = parser.push(b"\ndata: world\n\n");
        assert_eq!(payloads, vec!["hello".to_string(), "world".to_string()]);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let mut parser = SseParser::new();
        let event = "data: 한국어\n\n".as_bytes();
        // split inside the first Hangul syllable
        assert!(parser.push(&event[..8]).is_empty());
        let payloads = parser.push(&event[8..]);
        assert_eq!(payloads, vec!["한국어".to_string()]);
    }

    #[test]
    fn test_crlf_framing() {
        let mut parser = SseParser::new();
        let payloads = parser.push(b"data: a\r\n\r\ndata: b\r\n\r\n");
        assert_eq!(payloads, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_ignores_non_data_fields() {
        let mut parser = SseParser::new();
        let payloads = parser.push(b"event: delta\nid: 7\ndata: x\n\n: comment\n\n");
        assert_eq!(payloads, vec!["x".to_string()]);
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut parser = SseParser::new();
        let payloads = parser.push(b"data: line1\ndata: line2\n\n");
        assert_eq!(payloads, vec!["line1\nline2".to_string()]);
    }
}
