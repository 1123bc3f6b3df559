//! Server-sent-event framing and the owned channel handle.

use std::collections::VecDeque;
use std::pin::Pin;

use futures_util::stream::{self, Stream};
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::error::NavError;
use crate::types::StreamEvent;

/// A decoded event stream, boxed so the channel handle can own any source.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, NavError>> + Send>>;

/// Incremental `text/event-stream` decoder.
///
/// Feed raw body chunks to [`push`](Self::push); it returns the `data`
/// payload of every event completed by that chunk. Lines are split on bytes,
/// so a multi-byte character cut across two chunks survives intact.
///
/// Only unnamed events and events named `message` are returned.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw[..line_end]);
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line.is_empty() {
                let event = self.event.take();
                if self.data.is_empty() {
                    continue;
                }
                match event.as_deref() {
                    None | Some("message") => out.push(self.data.join("\n")),
                    Some(name) => debug!(event = %name, "skipping named stream event"),
                }
                self.data.clear();
                continue;
            }
            // Comment / keep-alive line.
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.find(':') {
                Some(i) => {
                    let value = &line[i + 1..];
                    (&line[..i], value.strip_prefix(' ').unwrap_or(value))
                }
                None => (line, ""),
            };
            match field {
                "data" => self.data.push(value.to_string()),
                "event" => self.event = Some(value.to_string()),
                _ => {}
            }
        }

        out
    }
}

/// Parse one `data` payload. Malformed payloads are logged and skipped.
pub fn parse_event(payload: &str) -> Option<StreamEvent> {
    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(ev) => Some(ev),
        Err(e) => {
            warn!(error = %e, payload = %payload, "skipping unparseable stream event");
            None
        }
    }
}

struct DecodeState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

/// Turn a byte-chunk body into a stream of typed events.
///
/// A body error is yielded once and ends the stream.
pub fn decode_events<S, B, E>(body: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<NavError> + Send + 'static,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if let Some(payload) = st.pending.pop_front() {
                if let Some(ev) = parse_event(&payload) {
                    return Some((Ok(ev), st));
                }
                continue;
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => {
                    let events = st.decoder.push(chunk.as_ref());
                    st.pending.extend(events);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e.into()), st));
                }
                None => st.finished = true,
            }
        }
    }))
}

/// Owner of the one open streaming channel.
///
/// [`close`](Self::close) releases the underlying connection and reports
/// whether this call was the one that did it; later calls are no-ops.
/// Dropping the handle closes it too.
pub struct ChannelHandle {
    stream: Option<EventStream>,
}

impl ChannelHandle {
    pub fn new(stream: EventStream) -> Self {
        debug!("stream channel opened");
        Self { stream: Some(stream) }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Next event, or `None` once closed or exhausted.
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent, NavError>> {
        match self.stream.as_mut() {
            Some(s) => s.next().await,
            None => None,
        }
    }

    pub fn close(&mut self) -> bool {
        match self.stream.take() {
            Some(s) => {
                drop(s);
                debug!("stream channel closed");
                true
            }
            None => false,
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle").field("open", &self.is_open()).finish()
    }
}
