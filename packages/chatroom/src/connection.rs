//! Connection Manager
//!
//! Reconciles "which session is selected" with "which stream is open".
//! Holds at most one [`StreamHandle`]; every transition that leaves a live
//! state releases it, and every new selection releases the old handle before
//! the next one is opened. Each stream is opened under a fresh generation
//! number and events carrying any other generation are discarded, so a
//! superseded transport can never touch the state or the buffer.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::buffer::MessageBuffer;
use crate::endpoint::ServiceEndpoint;
use crate::error::{ClientError, ProtocolError};
use crate::reporter::ErrorReporter;
use crate::transport::{
    EVENT_CHANNEL_CAPACITY, StreamEvent, StreamEventKind, StreamHandle, Transport,
    WebSocketTransport,
};
use crate::types::{ConnectionState, Message, Session, UserIdentity};

pub struct ConnectionManager<T: Transport = WebSocketTransport> {
    transport: T,
    endpoint: ServiceEndpoint,
    identity: UserIdentity,
    reporter: ErrorReporter,
    state: ConnectionState,
    session: Option<Session>,
    stream: Option<StreamHandle>,
    generation: u64,
    buffer: MessageBuffer,
    events_tx: mpsc::Sender<StreamEvent>,
    events_rx: mpsc::Receiver<StreamEvent>,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(
        transport: T,
        endpoint: ServiceEndpoint,
        identity: UserIdentity,
        reporter: ErrorReporter,
        buffer: MessageBuffer,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            transport,
            endpoint,
            identity,
            reporter,
            state: ConnectionState::Idle,
            session: None,
            stream: None,
            generation: 0,
            buffer,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The most recently selected session, kept after close or error so the
    /// user can reselect it.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn messages(&self) -> &MessageBuffer {
        &self.buffer
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Tear down any current stream, then start connecting to `session`.
    /// Reselecting the current session reconnects it.
    pub fn select_session(&mut self, session: Session) {
        self.release_stream();

        self.generation += 1;
        self.buffer.reset();
        self.state = ConnectionState::Connecting;

        let url = self.endpoint.stream_url(&session.session_id, &self.identity);
        info!(
            session_id = %session.session_id,
            generation = self.generation,
            "connecting to session"
        );
        let handle = self
            .transport
            .open(url, self.generation, self.events_tx.clone());
        self.stream = Some(handle);
        self.session = Some(session);
    }

    /// Send raw text on the open stream. Outside `Open` this reports
    /// `NotConnected` and returns it; the buffer is never touched.
    pub fn send(&self, text: &str) -> Result<(), Arc<ClientError>> {
        let stream = match (&self.stream, self.state) {
            (Some(stream), ConnectionState::Open) => stream,
            (_, state) => {
                debug!(%state, "send rejected: not connected");
                return Err(self.reporter.report(ClientError::NotConnected { state }));
            }
        };

        stream
            .send(text.to_string())
            .map_err(|e| self.reporter.report(e.into()))
    }

    /// Explicit disconnect. No-op unless a stream is live.
    pub fn close(&mut self) {
        if !self.state.is_live() {
            return;
        }
        self.release_stream();
        self.state = ConnectionState::Closed;
        info!(generation = self.generation, "connection closed");
    }

    /// Wait for the next event from the transport. Cancel-safe.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events_rx.recv().await
    }

    /// Apply one transport event. Returns `false` if the event came from a
    /// superseded or already released stream and was ignored.
    pub fn handle_event(&mut self, event: StreamEvent) -> bool {
        if event.generation != self.generation || self.stream.is_none() {
            debug!(
                event_generation = event.generation,
                current = self.generation,
                "discarding event from superseded stream"
            );
            return false;
        }

        match event.kind {
            StreamEventKind::Opened => {
                if self.state == ConnectionState::Connecting {
                    self.state = ConnectionState::Open;
                    info!(generation = self.generation, "stream open");
                }
            }
            StreamEventKind::Frame(raw) => self.handle_frame(&raw),
            StreamEventKind::Failed(err) => {
                warn!(generation = self.generation, error = %err, "stream failed");
                self.release_stream();
                self.state = ConnectionState::Errored;
                self.reporter.report(err.into());
            }
            StreamEventKind::Closed => {
                info!(generation = self.generation, "stream closed by server");
                self.release_stream();
                self.state = ConnectionState::Closed;
            }
        }
        true
    }

    /// Wait for and apply the next event.
    pub async fn pump(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => self.handle_event(event),
            None => false,
        }
    }

    /// Malformed frames are reported and skipped; the stream stays open.
    fn handle_frame(&mut self, raw: &str) {
        match serde_json::from_str::<Message>(raw) {
            Ok(message) => self.buffer.append(message),
            Err(e) => {
                warn!(generation = self.generation, "skipping malformed frame");
                self.reporter.report(ProtocolError::MalformedFrame(e).into());
            }
        }
    }

    fn release_stream(&mut self) {
        if let Some(handle) = self.stream.take() {
            debug!(generation = handle.generation(), "releasing stream");
            handle.close();
        }
    }
}
