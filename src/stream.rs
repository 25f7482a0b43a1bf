//! Incremental decoder for `data:`-framed chat-completion streams.
//!
//! The endpoint sends newline-delimited events:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//! data: [DONE]
//! ```
//!
//! Network reads do not line up with event boundaries (or even with UTF-8
//! character boundaries), so [`StreamDecoder`] keeps the unterminated tail of
//! the body between reads. [`decode_stream`] drives it from any byte stream.

use std::collections::VecDeque;

use futures_util::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ChatError, Result};
use crate::providers::StreamChunk;

const DATA_PREFIX: &str = "data:";
const DONE_LINE: &str = "data: [DONE]";
const DONE_PAYLOAD: &str = "[DONE]";

/// One decoded unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStep {
    /// `choices[0].delta.content` of one event, `""` when absent.
    Fragment(String),
    /// The `[DONE]` sentinel. Nothing after it is decoded.
    Done,
}

/// Line-buffering decoder state for one response body.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
    done: bool,
    decode_failures: usize,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk and return every step it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DecodeStep> {
        let mut steps = Vec::new();
        if self.done {
            return steps;
        }
        self.append_bytes(chunk);

        while let Some(line_end) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=line_end).collect();
            if let Some(step) = self.decode_line(&line) {
                let finished = step == DecodeStep::Done;
                steps.push(step);
                if finished {
                    self.done = true;
                    self.buffer.clear();
                    self.pending.clear();
                    break;
                }
            }
        }
        steps
    }

    /// Signal the end of the body. Any unterminated line is discarded.
    pub fn finish(&mut self) {
        if !self.buffer.trim().is_empty() || !self.pending.is_empty() {
            debug!(
                residual_bytes = self.buffer.len() + self.pending.len(),
                "discarding unterminated stream line"
            );
        }
        self.buffer.clear();
        self.pending.clear();
    }

    /// True once the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of `data:` events dropped because their payload was not valid JSON.
    pub fn decode_failures(&self) -> usize {
        self.decode_failures
    }

    fn append_bytes(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        let bytes = std::mem::take(&mut self.pending);
        let mut rest = &bytes[..];

        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    self.buffer.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        // Sequence cut by the chunk boundary: wait for the next read.
                        None => {
                            self.pending = tail.to_vec();
                            break;
                        }
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[bad..];
                        }
                    }
                }
            }
        }
    }

    fn decode_line(&mut self, raw: &str) -> Option<DecodeStep> {
        let line = raw.trim();
        if line == DONE_LINE {
            return Some(DecodeStep::Done);
        }
        let payload = line.strip_prefix(DATA_PREFIX)?.trim();
        if payload == DONE_PAYLOAD {
            return Some(DecodeStep::Done);
        }
        match serde_json::from_str::<StreamChunk>(payload) {
            Ok(chunk) => Some(DecodeStep::Fragment(chunk.delta_text().to_string())),
            Err(e) => {
                self.decode_failures += 1;
                warn!(error = %e, payload, "dropping malformed stream event");
                None
            }
        }
    }
}

struct DecodeState<S> {
    source: S,
    decoder: StreamDecoder,
    ready: VecDeque<String>,
    exhausted: bool,
}

/// Decode a byte stream into text fragments.
///
/// The returned stream ends after `[DONE]` or when `source` ends. A source
/// error is yielded once as `Err` and ends the stream; fragments decoded
/// before it are still delivered first.
pub fn decode_stream<S, B, E>(source: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<ChatError>,
{
    let state = DecodeState {
        source,
        decoder: StreamDecoder::new(),
        ready: VecDeque::new(),
        exhausted: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(fragment) = st.ready.pop_front() {
                return Some((Ok(fragment), st));
            }
            if st.exhausted {
                return None;
            }
            match st.source.next().await {
                Some(Ok(chunk)) => {
                    for step in st.decoder.push(chunk.as_ref()) {
                        match step {
                            DecodeStep::Fragment(text) => st.ready.push_back(text),
                            DecodeStep::Done => st.exhausted = true,
                        }
                    }
                }
                Some(Err(e)) => {
                    st.exhausted = true;
                    return Some((Err(e.into()), st));
                }
                None => {
                    st.decoder.finish();
                    st.exhausted = true;
                    if st.decoder.decode_failures() > 0 {
                        warn!(
                            failures = st.decoder.decode_failures(),
                            "stream ended without [DONE] after malformed events"
                        );
                    }
                }
            }
        }
    })
}

/// Race every item of `source` against `cancel`.
///
/// Once the token fires, a single `Err(ChatError::Cancelled)` is yielded and
/// the stream ends. The pending read is dropped.
pub fn until_cancelled<S, T>(source: S, cancel: CancellationToken) -> impl Stream<Item = Result<T>>
where
    S: Stream<Item = Result<T>> + Unpin,
{
    stream::unfold((source, cancel, false), |(mut source, cancel, stopped)| async move {
        if stopped {
            return None;
        }
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            item = source.next() => Some(item),
        };
        match next {
            None => Some((Err(ChatError::Cancelled), (source, cancel, true))),
            Some(item) => item.map(|item| (item, (source, cancel, false))),
        }
    })
}
