//! Server-push progress subscription for one task
//!
//! Wraps `GET /tasks/{task_id}/progress` and delivers normalized
//! [`ProgressEvent`]s to a caller-supplied sink in arrival order.
//!
//! Guarantees:
//! - named `progress` frames and unnamed frames are equivalent payloads
//! - a malformed payload is logged and dropped; the subscription stays open
//! - after a `complete = true` event is delivered the stream closes itself
//!   and nothing else is delivered
//! - a transport failure (connect error, body error, or end of body without
//!   a terminal event) fires `on_error` once and closes the stream
//! - `close()` is idempotent; once it returns no callback fires again
//!
//! Callbacks run on the reader task while the delivery gate is held, so a
//! callback must not call `close()` on its own stream. Forwarding into a
//! channel (as the coordinator does) is the intended use.

use crate::api::QueueBackend;
use crate::error::Error;
use futures::StreamExt;
use musecatch_common::api::ProgressEvent;
use musecatch_common::sse::{SseDecoder, SseFrame};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type EventSink = Box<dyn FnMut(ProgressEvent) + Send>;
type ErrorSink = Box<dyn FnMut(Error) + Send>;

struct Sinks {
    on_event: EventSink,
    on_error: ErrorSink,
}

/// Sinks are dropped when the stream closes; `None` means closed
type Gate = Arc<Mutex<Option<Sinks>>>;

fn lock(gate: &Gate) -> MutexGuard<'_, Option<Sinks>> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Flow {
    Continue,
    Done,
}

/// Handle to an open progress subscription
///
/// Dropping the handle closes the subscription.
pub struct ProgressStream {
    task_id: String,
    gate: Gate,
    cancel: CancellationToken,
}

impl ProgressStream {
    /// Subscribe to progress for `task_id`
    ///
    /// Must be called from within a Tokio runtime; the subscription is read
    /// on a spawned task.
    pub fn open<F, E>(
        backend: Arc<dyn QueueBackend>,
        task_id: impl Into<String>,
        on_event: F,
        on_error: E,
    ) -> Self
    where
        F: FnMut(ProgressEvent) + Send + 'static,
        E: FnMut(Error) + Send + 'static,
    {
        let task_id = task_id.into();
        let gate: Gate = Arc::new(Mutex::new(Some(Sinks {
            on_event: Box::new(on_event),
            on_error: Box::new(on_error),
        })));
        let cancel = CancellationToken::new();

        info!(task_id = %task_id, "Opening progress stream");
        tokio::spawn(read_stream(
            backend,
            task_id.clone(),
            Arc::clone(&gate),
            cancel.clone(),
        ));

        Self {
            task_id,
            gate,
            cancel,
        }
    }

    /// Whether the stream has closed (terminal event, error, or `close()`)
    pub fn is_closed(&self) -> bool {
        lock(&self.gate).is_none()
    }

    /// Close the subscription; safe to call any number of times
    pub fn close(&self) {
        self.cancel.cancel();
        if lock(&self.gate).take().is_some() {
            debug!(task_id = %self.task_id, "Progress stream closed by owner");
        }
    }
}

impl Drop for ProgressStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ProgressStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStream")
            .field("task_id", &self.task_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn read_stream(
    backend: Arc<dyn QueueBackend>,
    task_id: String,
    gate: Gate,
    cancel: CancellationToken,
) {
    let opened = tokio::select! {
        _ = cancel.cancelled() => return,
        opened = backend.open_progress(&task_id) => opened,
    };
    let mut body = match opened {
        Ok(body) => body,
        Err(e) => {
            fail(&gate, &task_id, e);
            return;
        }
    };

    let mut decoder = SseDecoder::new();
    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return,
            chunk = body.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                for frame in decoder.push(&bytes) {
                    if let Flow::Done = deliver(&gate, &task_id, &frame) {
                        cancel.cancel();
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                fail(&gate, &task_id, Error::Transport(e.to_string()));
                return;
            }
            None => {
                fail(
                    &gate,
                    &task_id,
                    Error::Transport("stream ended before completion".to_string()),
                );
                return;
            }
        }
    }
}

fn deliver(gate: &Gate, task_id: &str, frame: &SseFrame) -> Flow {
    if !frame.is_progress() {
        debug!(task_id = %task_id, event = %frame.event_name(), "Ignoring non-progress frame");
        return Flow::Continue;
    }

    let event = match serde_json::from_str::<ProgressEvent>(&frame.data) {
        Ok(event) => event.normalized(),
        Err(e) => {
            warn!(task_id = %task_id, error = %e, "Dropping malformed progress payload");
            return Flow::Continue;
        }
    };

    let mut guard = lock(gate);
    let Some(sinks) = guard.as_mut() else {
        return Flow::Done;
    };

    let complete = event.complete;
    (sinks.on_event)(event);

    if complete {
        guard.take();
        info!(task_id = %task_id, "Terminal progress event delivered, stream closed");
        Flow::Done
    } else {
        Flow::Continue
    }
}

fn fail(gate: &Gate, task_id: &str, error: Error) {
    let mut guard = lock(gate);
    if let Some(mut sinks) = guard.take() {
        warn!(task_id = %task_id, error = %error, "Progress stream failed");
        (sinks.on_error)(error);
    }
}
