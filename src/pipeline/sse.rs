//! Decoding of the chat-completion `text/event-stream` body.
//!
//! OpenAI-compatible services send one JSON chunk per `data:` line and end
//! with `data: [DONE]`:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"# Back"},"finish_reason":null}]}
//!
//! data: {"choices":[{"delta":{},"finish_reason":"stop"}]}
//!
//! data: [DONE]
//! ```
//!
//! Network chunks do not respect line boundaries, so raw bytes are buffered
//! and only complete lines are decoded; a multi-byte character split
//! across two chunks is reassembled before it is read as UTF-8. Comment
//! lines (`:`) and the `event:`/`id:`/`retry:` fields are ignored. Any
//! other non-empty line means the body is not an event stream at all (a
//! plain JSON error, an HTML proxy page) and is reported as malformed.

use crate::error::StreamError;
use crate::pipeline::assemble::{Fragment, FragmentStream};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use tracing::trace;

const DONE_SENTINEL: &str = "[DONE]";

/// Event-stream field names. Only `data` carries anything for us.
const KNOWN_FIELDS: [&str; 4] = ["data", "event", "id", "retry"];

#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Line-buffering decoder for one response body.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `data: [DONE]` has been seen. Later input is ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one network chunk, pushing a fragment for every complete
    /// `data:` line. Fragments decoded before an error are kept in `out`.
    pub fn feed(&mut self, chunk: &[u8], out: &mut VecDeque<Fragment>) -> Result<(), StreamError> {
        if self.done {
            return Ok(());
        }
        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(fragment) = self.decode_line(&line[..pos])? {
                out.push_back(fragment);
            }
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        Ok(())
    }

    /// Decode whatever is left once the body ends without a final newline.
    pub fn finish(&mut self, out: &mut VecDeque<Fragment>) -> Result<(), StreamError> {
        if self.done || self.buffer.is_empty() {
            return Ok(());
        }
        let line = std::mem::take(&mut self.buffer);
        if let Some(fragment) = self.decode_line(&line)? {
            out.push_back(fragment);
        }
        Ok(())
    }

    fn decode_line(&mut self, line: &[u8]) -> Result<Option<Fragment>, StreamError> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() || line[0] == b':' {
            return Ok(None);
        }
        let line = std::str::from_utf8(line).map_err(|e| StreamError::MalformedFragment {
            detail: format!("invalid UTF-8 in event: {}", e),
        })?;
        let Some(data) = line.strip_prefix("data:") else {
            let field = line.split(':').next().unwrap_or(line);
            if KNOWN_FIELDS.contains(&field) {
                return Ok(None);
            }
            return Err(StreamError::MalformedFragment {
                detail: format!("not an event-stream line: {}", preview(line)),
            });
        };
        let data = data.strip_prefix(' ').unwrap_or(data);
        if data.trim() == DONE_SENTINEL {
            trace!("Stream sentinel received");
            self.done = true;
            return Ok(None);
        }
        parse_chunk(data).map(Some)
    }
}

fn parse_chunk(data: &str) -> Result<Fragment, StreamError> {
    let chunk: ChatCompletionChunk =
        serde_json::from_str(data).map_err(|e| StreamError::MalformedFragment {
            detail: format!("{}: {}", e, preview(data)),
        })?;
    if let Some(error) = chunk.error {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(StreamError::Remote(message));
    }
    Ok(match chunk.choices.into_iter().next() {
        Some(choice) => Fragment {
            content: choice.delta.and_then(|d| d.content),
            finish_reason: choice.finish_reason,
        },
        None => Fragment::default(),
    })
}

fn preview(data: &str) -> String {
    const MAX: usize = 120;
    match data.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &data[..idx]),
        None => data.to_string(),
    }
}

struct DecodeState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<Fragment>,
    error: Option<StreamError>,
    finished: bool,
}

/// Decode a streamed response body into fragments.
///
/// Transport errors surface as [`StreamError::Interrupted`]. After the
/// first error, or after `[DONE]`, the stream ends. A body that closes
/// without `[DONE]` ends normally.
pub fn fragment_stream<S, B, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        error: None,
        finished: false,
    };
    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if let Some(fragment) = st.pending.pop_front() {
                return Some((Ok(fragment), st));
            }
            if let Some(error) = st.error.take() {
                st.finished = true;
                return Some((Err(error), st));
            }
            if st.finished || st.decoder.is_done() {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => {
                    if let Err(e) = st.decoder.feed(chunk.as_ref(), &mut st.pending) {
                        st.error = Some(e);
                    }
                }
                Some(Err(e)) => st.error = Some(StreamError::Interrupted(e.to_string())),
                None => {
                    if let Err(e) = st.decoder.finish(&mut st.pending) {
                        st.error = Some(e);
                    }
                    st.finished = true;
                }
            }
        }
    }))
}
