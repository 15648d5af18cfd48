// SSE (Server-Sent Events) parsing for chat-completion streams
//
// OpenAI-compatible endpoints stream replies as `text/event-stream`:
// ```
// data: {"choices":[{"delta":{"content":"Olá"}}]}
//
// data: {"choices":[],"usage":{"completion_tokens":42,...}}
//
// data: [DONE]
// ```
//
// Network chunks do not respect line boundaries, so bytes go through a
// LineBuffer first; complete lines are then parsed one at a time.

use serde_json::Value;

/// Check if a response is SSE based on content-type header
pub fn is_sse_response(headers: &reqwest::header::HeaderMap) -> bool {
    headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("text/event-stream"))
        .unwrap_or(false)
}

/// Accumulates raw bytes and yields complete lines
///
/// Works on bytes so multi-byte UTF-8 sequences split across network
/// chunks are reassembled before decoding.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete line (without `\r\n`/`\n`)
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop(); // '\n'
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Remaining bytes once the stream has ended (a final unterminated line)
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string())
    }
}

/// What a single SSE line contributed to the reply
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub delta: Option<String>,
    pub usage: Option<u32>,
    pub done: bool,
    /// Error message sent in-band by the provider
    pub error: Option<String>,
}

fn data_payload(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest).trim_end())
}

/// Parse one complete SSE line from a chat-completions stream
///
/// Returns None for non-data lines (comments, `event:`, blank separators)
/// and for payloads that aren't valid JSON.
pub fn parse_line(line: &str) -> Option<ParsedLine> {
    let payload = data_payload(line)?;
    if payload == "[DONE]" {
        return Some(ParsedLine {
            done: true,
            ..Default::default()
        });
    }

    let data: Value = serde_json::from_str(payload).ok()?;

    Some(ParsedLine {
        delta: extract_delta(&data),
        usage: extract_usage(&data),
        done: false,
        error: extract_error(&data),
    })
}

/// Extract incremental text from `choices[0].delta.content`
pub fn extract_delta(data: &Value) -> Option<String> {
    let content = data
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()?;
    if content.is_empty() {
        return None;
    }
    Some(content.to_string())
}

/// Extract reply token usage
///
/// Prefers `completion_tokens` (the reply itself); falls back to
/// `total_tokens` for providers that only report the total.
pub fn extract_usage(data: &Value) -> Option<u32> {
    let usage = data.get("usage")?;
    usage
        .get("completion_tokens")
        .and_then(|v| v.as_u64())
        .or_else(|| usage.get("total_tokens").and_then(|v| v.as_u64()))
        .map(|n| n as u32)
}

/// Extract an in-band error (`{"error": {"message": ...}}`)
pub fn extract_error(data: &Value) -> Option<String> {
    let error = data.get("error")?;
    error
        .get("message")
        .and_then(|m| m.as_str())
        .map(String::from)
        .or_else(|| error.as_str().map(String::from))
        .or_else(|| Some(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_buffer_reassembles_split_lines() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        let lines = buf.push(b":1}\r\n\r\ndata: [DO");
        assert_eq!(lines, vec!["data: {\"a\":1}".to_string(), String::new()]);
        assert!(buf.push(b"NE]").is_empty());
        assert_eq!(buf.finish().as_deref(), Some("data: [DONE]"));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn line_buffer_handles_split_utf8() {
        let mut buf = LineBuffer::new();
        let text = "data: apólice\n".as_bytes();
        // split inside the two-byte 'ó'
        let split = text.iter().position(|&b| b == 0xC3).unwrap() + 1;
        assert!(buf.push(&text[..split]).is_empty());
        assert_eq!(buf.push(&text[split..]), vec!["data: apólice".to_string()]);
    }

    #[test]
    fn parses_delta_usage_and_done() {
        let line = r#"data: {"choices":[{"index":0,"delta":{"content":"Olá"}}]}"#;
        let parsed = parse_line(line).unwrap();
        assert_eq!(parsed.delta.as_deref(), Some("Olá"));
        assert_eq!(parsed.usage, None);
        assert!(!parsed.done);

        let line = r#"data: {"choices":[],"usage":{"prompt_tokens":90,"completion_tokens":42,"total_tokens":132}}"#;
        assert_eq!(parse_line(line).unwrap().usage, Some(42));

        let line = r#"data: {"usage":{"total_tokens":7}}"#;
        assert_eq!(parse_line(line).unwrap().usage, Some(7));

        assert!(parse_line("data: [DONE]").unwrap().done);
    }

    #[test]
    fn ignores_non_data_lines() {
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line(": keep-alive"), None);
        assert_eq!(parse_line("event: message"), None);
        assert_eq!(parse_line("data: not-json"), None);
    }

    #[test]
    fn empty_delta_is_not_text() {
        let line = r#"data: {"choices":[{"delta":{"role":"assistant","content":""}}]}"#;
        assert_eq!(parse_line(line).unwrap().delta, None);
    }

    #[test]
    fn extracts_in_band_errors() {
        let line = r#"data: {"error":{"message":"Rate limit exceeded","type":"rate_limit"}}"#;
        assert_eq!(
            parse_line(line).unwrap().error.as_deref(),
            Some("Rate limit exceeded")
        );
    }
}
