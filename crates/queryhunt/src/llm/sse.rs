use std::collections::VecDeque;

use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use super::{GenerativeError, TextStream};

/// Decoded server-sent event relevant to text generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Text(String),
    Stop,
    Error(String),
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    #[serde(rename = "type")]
    kind: String,

    #[serde(default)]
    delta: Option<DeltaPayload>,

    #[serde(default)]
    error: Option<ErrorPayload>,
}

#[derive(Debug, Deserialize)]
struct DeltaPayload {
    #[serde(rename = "type")]
    kind: String,

    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: String,
}

/// Incremental decoder; chunks may split events and UTF-8 sequences anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<StreamFrame>, GenerativeError> {
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = find_event_boundary(&self.buffer) {
            let event = self.buffer.drain(..end + 2).collect::<Vec<u8>>();
            let event = std::str::from_utf8(&event[..end])
                .map_err(|error| GenerativeError::Decode(format!("event is not UTF-8: {error}")))?;
            if let Some(frame) = decode_event(event)? {
                frames.push(frame);
            }
        }
        Ok(frames)
    }
}

fn find_event_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|window| window == b"\n\n")
}

fn decode_event(event: &str) -> Result<Option<StreamFrame>, GenerativeError> {
    let data = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n");
    if data.is_empty() {
        return Ok(None);
    }

    let payload = serde_json::from_str::<EventPayload>(&data)
        .map_err(|error| GenerativeError::Decode(format!("invalid event payload: {error}")))?;

    let frame = match payload.kind.as_str() {
        "content_block_delta" => payload
            .delta
            .filter(|delta| delta.kind == "text_delta")
            .and_then(|delta| delta.text)
            .map(StreamFrame::Text),
        "message_stop" => Some(StreamFrame::Stop),
        "error" => Some(StreamFrame::Error(
            payload
                .error
                .map(|error| error.message)
                .unwrap_or_else(|| "unknown stream error".to_string()),
        )),
        _ => None,
    };
    Ok(frame)
}

struct DecodeState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

/// Turns a raw event-stream body into text fragments, ending at `message_stop`.
pub fn decode_text_stream<S, B>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<B, GenerativeError>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = DecodeState {
        bytes,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.done {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => match state.decoder.push(chunk.as_ref()) {
                    Ok(frames) => {
                        for frame in frames {
                            match frame {
                                StreamFrame::Text(text) => state.pending.push_back(text),
                                StreamFrame::Stop => {
                                    state.done = true;
                                    break;
                                }
                                StreamFrame::Error(message) => {
                                    state.done = true;
                                    state.pending.clear();
                                    return Some((Err(GenerativeError::Transport(message)), state));
                                }
                            }
                        }
                    }
                    Err(error) => {
                        state.done = true;
                        return Some((Err(error), state));
                    }
                },
                Some(Err(error)) => {
                    state.done = true;
                    return Some((Err(error), state));
                }
                None => state.done = true,
            }
        }
    })
    .boxed()
}
