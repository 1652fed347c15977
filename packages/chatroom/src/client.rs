use std::sync::Arc;

use crate::buffer::MessageBuffer;
use crate::config::ClientConfig;
use crate::connection::ConnectionManager;
use crate::directory::DirectoryClient;
use crate::endpoint::ServiceEndpoint;
use crate::error::{ClientError, DirectoryError};
use crate::reporter::ErrorReporter;
use crate::transport::{StreamEvent, Transport, WebSocketTransport};
use crate::types::{ConnectionState, Session, UserIdentity};

/// Client-lifetime state container: the directory client, the one
/// connection manager, the last fetched session list and the shared error
/// slot. Constructed at startup; dropping it releases any live stream.
pub struct ChatClient<T: Transport = WebSocketTransport> {
    directory: DirectoryClient,
    connection: ConnectionManager<T>,
    reporter: ErrorReporter,
    sessions: Vec<Session>,
}

impl ChatClient<WebSocketTransport> {
    pub fn new(config: &ClientConfig) -> Result<Self, DirectoryError> {
        Self::with_transport(config, WebSocketTransport)
    }
}

impl<T: Transport> ChatClient<T> {
    pub fn with_transport(config: &ClientConfig, transport: T) -> Result<Self, DirectoryError> {
        let endpoint = ServiceEndpoint::parse(&config.base_url)?;
        let identity = match &config.user_id {
            Some(id) => UserIdentity::from(id.clone()),
            None => UserIdentity::generate(),
        };
        let reporter = ErrorReporter::new();
        let connection = ConnectionManager::new(
            transport,
            endpoint.clone(),
            identity,
            reporter.clone(),
            MessageBuffer::with_max_messages(config.max_messages),
        );
        Ok(Self {
            directory: DirectoryClient::new(endpoint),
            connection,
            reporter,
            sessions: Vec::new(),
        })
    }

    // -- directory --

    /// Fetch the session list, replacing the previous snapshot wholesale.
    /// On failure the old snapshot is kept and the error is reported.
    pub async fn refresh_sessions(&mut self) -> Result<&[Session], Arc<ClientError>> {
        match self.directory.list_sessions().await {
            Ok(sessions) => {
                self.sessions = sessions;
                Ok(&self.sessions)
            }
            Err(e) => Err(self.reporter.report(ClientError::ListSessions(e))),
        }
    }

    /// Create a session. Does not refresh the cached list. `None` means the
    /// server only confirmed the create; refresh to see the new entry.
    pub async fn create_session(&self, name: &str) -> Result<Option<Session>, Arc<ClientError>> {
        self.directory
            .create_session(name)
            .await
            .map_err(|e| self.reporter.report(ClientError::CreateSession(e)))
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    // -- connection --

    pub fn select_session(&mut self, session: Session) {
        self.connection.select_session(session);
    }

    pub fn send(&self, text: &str) -> Result<(), Arc<ClientError>> {
        self.connection.send(text)
    }

    pub fn close(&mut self) {
        self.connection.close();
    }

    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.connection.next_event().await
    }

    pub fn handle_event(&mut self, event: StreamEvent) -> bool {
        self.connection.handle_event(event)
    }

    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn identity(&self) -> &UserIdentity {
        self.connection.identity()
    }

    // -- errors --

    pub fn current_error(&self) -> Option<Arc<ClientError>> {
        self.reporter.current()
    }

    /// User dismissal of the current error.
    pub fn dismiss_error(&self) {
        self.reporter.clear();
    }

    pub fn reporter(&self) -> &ErrorReporter {
        &self.reporter
    }
}
