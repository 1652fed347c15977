//! Stream transport
//!
//! A [`Transport`] opens one real-time stream and hands back an owned
//! [`StreamHandle`]. Everything the stream observes is delivered to the
//! connection manager as a [`StreamEvent`] tagged with the generation it was
//! opened under, so events from a stream that has since been replaced can be
//! recognised and dropped.

use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ProtocolError;

/// Capacity of the event channel from stream tasks to the manager.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct StreamEvent {
    pub generation: u64,
    pub kind: StreamEventKind,
}

#[derive(Debug)]
pub enum StreamEventKind {
    /// The transport confirmed the stream is open.
    Opened,
    /// One inbound text frame, undecoded.
    Frame(String),
    /// Connect failure or stream error. The stream is gone.
    Failed(ProtocolError),
    /// The peer closed the stream.
    Closed,
}

/// Owned handle to one open (or opening) stream.
///
/// Releasing the handle, explicitly via [`StreamHandle::close`] or by
/// dropping it, cancels the stream task. Ownership guarantees this happens
/// exactly once.
#[derive(Debug)]
pub struct StreamHandle {
    generation: u64,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl StreamHandle {
    pub fn new(
        generation: u64,
        outbound: mpsc::UnboundedSender<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            generation,
            outbound,
            cancel,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue a raw text frame for the stream task to write.
    pub fn send(&self, text: String) -> Result<(), ProtocolError> {
        self.outbound
            .send(text)
            .map_err(|_| ProtocolError::Transport("stream task has exited".to_string()))
    }

    pub fn close(self) {}
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        debug!(generation = self.generation, "stream handle released");
    }
}

/// Opens streams. Must not block: the connection happens in the background
/// and is reported through `events`.
pub trait Transport: Send + Sync {
    fn open(
        &self,
        url: Url,
        generation: u64,
        events: mpsc::Sender<StreamEvent>,
    ) -> StreamHandle;
}

/// Production transport: one WebSocket per stream, driven by a tokio task.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl Transport for WebSocketTransport {
    fn open(
        &self,
        url: Url,
        generation: u64,
        events: mpsc::Sender<StreamEvent>,
    ) -> StreamHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(run_websocket(
            url,
            generation,
            events,
            outbound_rx,
            cancel.clone(),
        ));
        StreamHandle::new(generation, outbound_tx, cancel)
    }
}

/// Deliver `event` unless the stream is cancelled first. Returns `false` when
/// the task should stop (cancelled, or the manager is gone).
async fn deliver(
    events: &mpsc::Sender<StreamEvent>,
    cancel: &CancellationToken,
    event: StreamEvent,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = events.send(event) => sent.is_ok(),
    }
}

/// Drive one WebSocket until it fails, the peer closes it, or it is cancelled.
async fn run_websocket(
    url: Url,
    generation: u64,
    events: mpsc::Sender<StreamEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    let emit = |kind| StreamEvent { generation, kind };
    let failed = |e| emit(StreamEventKind::Failed(ProtocolError::from_tungstenite(e)));

    let connected = tokio::select! {
        _ = cancel.cancelled() => {
            debug!(generation, "stream cancelled before connect completed");
            return;
        }
        result = tokio_tungstenite::connect_async(url.as_str()) => result,
    };

    let ws = match connected {
        Ok((ws, _)) => ws,
        Err(e) => {
            warn!(generation, url = %url, error = %e, "stream connect failed");
            deliver(&events, &cancel, failed(e)).await;
            return;
        }
    };

    info!(generation, url = %url, "stream connected");
    let (mut ws_write, mut ws_read) = ws.split();

    if deliver(&events, &cancel, emit(StreamEventKind::Opened)).await {
        loop {
            let keep_going = tokio::select! {
                biased;

                _ = cancel.cancelled() => false,

                Some(text) = outbound.recv() => {
                    match ws_write.send(tungstenite::Message::Text(text.into())).await {
                        Ok(()) => true,
                        Err(e) => {
                            deliver(&events, &cancel, failed(e)).await;
                            false
                        }
                    }
                }

                frame = ws_read.next() => match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        let event = emit(StreamEventKind::Frame(text.as_str().to_owned()));
                        deliver(&events, &cancel, event).await
                    }
                    Some(Ok(tungstenite::Message::Close(_))) | None => {
                        debug!(generation, "stream closed by peer");
                        deliver(&events, &cancel, emit(StreamEventKind::Closed)).await;
                        false
                    }
                    // Binary, ping and pong frames carry no chat messages
                    Some(Ok(_)) => true,
                    Some(Err(e)) => {
                        deliver(&events, &cancel, failed(e)).await;
                        false
                    }
                },
            };
            if !keep_going {
                break;
            }
        }
    }

    if cancel.is_cancelled() {
        debug!(generation, "stream cancelled, closing socket");
        let _ = ws_write.send(tungstenite::Message::Close(None)).await;
    }
}
