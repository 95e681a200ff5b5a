//! Streaming response decoder.
//!
//! Turns a chat-completions response body into printed text and at most one
//! accumulated [`ToolCall`]. The body is a sequence of lines:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//! data: [DONE]
//! ```
//!
//! Reads from the network split this text anywhere: mid-line, mid-JSON, even
//! inside a multi-byte character. Decoding therefore happens in three layers:
//!
//! ```text
//! bytes ──Utf8Carry──▶ text ──LineDecoder──▶ lines ──classify_line──▶ DecodedEvent
//! ```
//!
//! Text deltas are written to the sink (and flushed) the moment their line is
//! complete. Nothing is held back beyond the one unterminated line.

use crate::accumulator::{ToolCallFragment, ToolCallState, accumulate};
use crate::cancel::CancellationToken;
use crate::types::{StreamChunk, ToolCall};
use crate::{Error, Result};
use futures::stream::{Stream, StreamExt};
use std::io::Write;

/// Prefix of every event line
pub const DATA_PREFIX: &str = "data: ";

/// The end-of-stream line. Its payload is not JSON and is never parsed.
pub const DONE_LINE: &str = "data: [DONE]";

/// One event decoded from a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    /// Text to show the user
    TextDelta(String),
    /// A piece of the tool call the model is making
    ToolCallDelta(ToolCallFragment),
    /// The `[DONE]` sentinel
    StreamEnd,
}

/// Carries incomplete UTF-8 sequences from one read to the next.
#[derive(Debug, Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    /// Decodes as much of `pending + bytes` as possible into `out`.
    ///
    /// A truncated sequence at the end is kept for the next read. Bytes that can
    /// never form a character become U+FFFD.
    fn push(&mut self, bytes: &[u8], out: &mut String) {
        self.pending.extend_from_slice(bytes);

        let mut start = 0;
        loop {
            let rest = &self.pending[start..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    start = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start += valid + len;
                        }
                        None => {
                            start += valid;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..start);
    }

    /// Flushes whatever is left at end of stream.
    fn finish(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            out.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
    }
}

/// Splits an arbitrarily-chunked byte stream into lines.
///
/// ```rust
/// use search_chat::LineDecoder;
///
/// let mut lines = LineDecoder::new();
/// assert!(lines.feed(b"data: {\"a\"").is_empty());
/// assert_eq!(lines.feed(b":1}\ndata: [DO"), vec!["data: {\"a\":1}".to_string()]);
/// assert_eq!(lines.finish(), Some("data: [DO".to_string()));
/// ```
#[derive(Debug, Default)]
pub struct LineDecoder {
    utf8: Utf8Carry,
    buffer: String,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one read and returns every line it completed, without terminators.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.utf8.push(bytes, &mut self.buffer);

        let mut lines = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].find('\n') {
            let end = consumed + offset;
            lines.push(trim_line_end(&self.buffer[consumed..end]).to_string());
            consumed = end + 1;
        }
        self.buffer.drain(..consumed);

        lines
    }

    /// Returns the unterminated remainder once the stream is exhausted.
    pub fn finish(&mut self) -> Option<String> {
        self.utf8.finish(&mut self.buffer);
        let rest = std::mem::take(&mut self.buffer);
        let rest = trim_line_end(&rest);
        (!rest.is_empty()).then(|| rest.to_string())
    }
}

fn trim_line_end(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

/// Classifies one complete line.
///
/// Returns no events for blank lines, SSE comments, and anything without the
/// `data: ` prefix. A `data: ` line whose payload is not a JSON frame yields
/// [`Error::MalformedFrame`]; callers log it and move on.
pub fn classify_line(line: &str) -> Result<Vec<DecodedEvent>> {
    if line == DONE_LINE {
        return Ok(vec![DecodedEvent::StreamEnd]);
    }

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(Vec::new());
    };

    let chunk: StreamChunk = serde_json::from_str(payload)
        .map_err(|e| Error::malformed_frame(format!("{}: {}", e, payload)))?;

    let mut events = Vec::new();
    if let Some(choice) = chunk.choices.into_iter().next() {
        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            events.push(DecodedEvent::TextDelta(content));
        }

        if let Some(delta) = choice
            .delta
            .tool_calls
            .and_then(|calls| calls.into_iter().next())
        {
            events.push(DecodedEvent::ToolCallDelta(delta.into()));
        }
    }

    Ok(events)
}

/// Applies one line to the in-progress tool call, writing any text to `sink`.
fn apply_line<W>(mut state: ToolCallState, line: &str, sink: &mut W) -> Result<ToolCallState>
where
    W: Write + ?Sized,
{
    let events = match classify_line(line) {
        Ok(events) => events,
        Err(e) => {
            log::warn!("skipping frame: {}", e);
            return Ok(state);
        }
    };

    for event in events {
        match event {
            DecodedEvent::TextDelta(text) => {
                sink.write_all(text.as_bytes())?;
                sink.flush()?;
            }
            DecodedEvent::ToolCallDelta(fragment) => {
                state = accumulate(state, fragment);
            }
            DecodedEvent::StreamEnd => log::debug!("received [DONE]"),
        }
    }

    Ok(state)
}

/// Decodes a whole response body.
///
/// Writes text deltas to `sink` as they arrive and returns the accumulated tool
/// call, which is [`ToolCall::pending`] (empty id) when the model made none.
///
/// The token is checked before every read and also interrupts a read that is
/// still waiting; either way the result is [`Error::Cancelled`] and nothing more
/// is written. The body stream is owned here and dropped on every return path.
///
/// # Errors
///
/// - [`Error::Cancelled`] when the token is signalled
/// - the stream's own error if a read fails
/// - [`Error::Io`] if writing to the sink fails
pub async fn decode<S, B, E, W>(
    body: S,
    token: &CancellationToken,
    sink: &mut W,
) -> Result<ToolCall>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<Error>,
    W: Write + ?Sized,
{
    let mut body = std::pin::pin!(body);
    let mut lines = LineDecoder::new();
    let mut state = ToolCallState::new();

    loop {
        if token.is_signaled() {
            log::debug!("turn {} cancelled between reads", token.generation());
            return Err(Error::Cancelled);
        }

        let read = tokio::select! {
            biased;
            _ = token.cancelled() => {
                log::debug!("turn {} cancelled during a read", token.generation());
                return Err(Error::Cancelled);
            }
            read = body.next() => read,
        };

        let Some(read) = read else { break };
        let bytes = read.map_err(Into::into)?;

        for line in lines.feed(bytes.as_ref()) {
            state = apply_line(state, &line, sink)?;
        }
    }

    if let Some(rest) = lines.finish() {
        state = apply_line(state, &rest, sink)?;
    }

    Ok(state.into_call())
}
