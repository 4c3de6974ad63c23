//! Ordered event delivery for the streaming entry point.
//!
//! A [`StreamEmitter`] is the single producer side of one invocation's event
//! channel and an [`InvocationStream`] the single consumer side. The emitter
//! enforces the sequence contract: one `Routing` event first, at most one
//! `Metadata` event, exactly one terminal event last, nothing afterward.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use rmm_core::{StreamEvent, ToolStatus};

use crate::pipeline::ProgressReporter;

/// Message carried by the terminal event of a cancelled invocation.
pub const CANCELLED_MESSAGE: &str = "invocation cancelled";

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct SequenceState {
    routed: bool,
    metadata_sent: bool,
    terminated: bool,
}

impl SequenceState {
    /// Whether `event` may be emitted next; updates the state if so.
    fn admit(&mut self, event: &StreamEvent) -> Result<(), &'static str> {
        if self.terminated {
            return Err("stream already terminated");
        }
        match event {
            StreamEvent::Routing { .. } if self.routed => return Err("routing already emitted"),
            StreamEvent::Routing { .. } => self.routed = true,
            _ if !self.routed => return Err("routing must come first"),
            StreamEvent::Metadata { .. } if self.metadata_sent => return Err("metadata already emitted"),
            StreamEvent::Metadata { .. } => self.metadata_sent = true,
            StreamEvent::Complete { .. } | StreamEvent::Error { .. } => self.terminated = true,
            _ => {}
        }
        Ok(())
    }
}

/// Producer side of an invocation's event channel.
pub struct StreamEmitter {
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
    state: Mutex<SequenceState>,
}

impl StreamEmitter {
    /// Create a connected emitter and stream.
    ///
    /// Both sides share a child of `parent`: cancelling the parent stops
    /// this invocation, while dropping or cancelling the stream never
    /// reaches the parent or its other children.
    pub fn channel(parent: CancellationToken) -> (Self, InvocationStream) {
        let cancel = parent.child_token();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let emitter = Self {
            tx,
            cancel: cancel.clone(),
            state: Mutex::new(SequenceState::default()),
        };
        let stream = InvocationStream {
            inner: ReceiverStream::new(rx),
            _guard: cancel.clone().drop_guard(),
            cancel,
        };
        (emitter, stream)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminated
    }

    /// Deliver an event.
    ///
    /// Returns `false` when the event was rejected by the sequence contract or
    /// the consumer is gone. A vanished consumer cancels the invocation.
    pub async fn emit(&self, event: StreamEvent) -> bool {
        let admitted = self.state.lock().admit(&event);
        if let Err(reason) = admitted {
            debug!(kind = event.kind(), "Dropping stream event: {}", reason);
            return false;
        }

        if self.tx.send(event).await.is_err() {
            warn!("Stream consumer dropped, cancelling invocation");
            self.cancel.cancel();
            return false;
        }
        true
    }

    pub async fn complete(&self, stop_reason: &str) -> bool {
        self.emit(StreamEvent::complete(stop_reason)).await
    }

    pub async fn fail(&self, message: impl Into<String>) -> bool {
        self.emit(StreamEvent::error(message)).await
    }

    pub async fn cancelled(&self) -> bool {
        self.fail(CANCELLED_MESSAGE).await
    }
}

#[async_trait]
impl ProgressReporter for StreamEmitter {
    async fn report(&self, name: &str, status: ToolStatus) {
        self.emit(StreamEvent::tool(name, status)).await;
    }
}

/// Consumer side of an invocation's event channel.
///
/// Dropping the stream cancels the producing invocation.
pub struct InvocationStream {
    inner: ReceiverStream<StreamEvent>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl InvocationStream {
    /// Ask the producer to stop. The stream still ends with a terminal event.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Stream for InvocationStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl std::fmt::Debug for InvocationStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
