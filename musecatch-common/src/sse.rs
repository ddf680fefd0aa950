//! Server-Sent Events (SSE) client-side framing
//!
//! Incremental decoder for `text/event-stream` bodies. Chunks arrive at
//! arbitrary byte boundaries; complete frames are returned as soon as their
//! terminating blank line has been seen.
//!
//! Supported fields: `event`, `data` (multi-line, joined with `\n`), `id`.
//! Comment lines (`:heartbeat`) and unknown fields (`retry`, ...) are
//! ignored. Lines end with LF or CRLF.

use tracing::trace;

/// Event name the backend uses for task progress frames
pub const PROGRESS_EVENT: &str = "progress";

/// Event name implied when a frame carries no `event:` field
pub const DEFAULT_EVENT: &str = "message";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// One dispatched SSE frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// `event:` field, `None` for unnamed frames
    pub event: Option<String>,
    /// Concatenated `data:` lines
    pub data: String,
    /// Last `id:` field seen in this frame
    pub id: Option<String>,
}

impl SseFrame {
    /// Event name with the SSE default applied
    pub fn event_name(&self) -> &str {
        self.event.as_deref().unwrap_or(DEFAULT_EVENT)
    }

    /// Whether the frame carries a task progress payload
    ///
    /// The named `progress` kind and the unnamed/default kind are equivalent.
    pub fn is_progress(&self) -> bool {
        matches!(self.event_name(), PROGRESS_EVENT | DEFAULT_EVENT)
    }
}

/// Incremental `text/event-stream` decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    seen_first_line: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every frame completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !self.seen_first_line {
                self.seen_first_line = true;
                if line.starts_with(UTF8_BOM) {
                    line.drain(..UTF8_BOM.len());
                }
            }
            if let Some(frame) = self.process_line(&String::from_utf8_lossy(&line)) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Bytes buffered for an incomplete line
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }

    /// Whether a frame has been started but not yet dispatched
    pub fn has_partial_frame(&self) -> bool {
        !self.pending.is_empty() || !self.data.is_empty() || self.event.is_some()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            trace!("SSE comment: {}", &line[1..]);
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => {
                self.event = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "data" => self.data.push(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.id = Some(value.to_string());
                }
            }
            other => trace!("Ignoring SSE field: {}", other),
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data, id })
    }
}
