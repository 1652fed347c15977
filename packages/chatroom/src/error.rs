use tokio_tungstenite::tungstenite;

use crate::types::ConnectionState;

/// Failures talking to the session directory.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("server is unavailable")]
    Unavailable,

    #[error("HTTP error! status: {status}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error("invalid base URL '{0}'")]
    InvalidUrl(String),
}

impl DirectoryError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unavailable
        } else {
            Self::Request(err)
        }
    }
}

/// Failures on the live stream.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// An inbound frame did not decode as a message. The stream stays open.
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    /// The stream server refused the connection.
    #[error("WebSocket connection error: server is unavailable")]
    Unavailable,

    /// Connect or read/write failure on the stream.
    #[error("WebSocket connection error: {0}")]
    Transport(String),
}

impl ProtocolError {
    pub fn from_tungstenite(err: tungstenite::Error) -> Self {
        let is_connect = match &err {
            tungstenite::Error::Io(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        };
        if is_connect {
            Self::Unavailable
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Anything that can land in the error reporter's slot.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to fetch sessions: {0}")]
    ListSessions(#[source] DirectoryError),

    #[error("Failed to create session: {0}")]
    CreateSession(#[source] DirectoryError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("WebSocket is not connected")]
    NotConnected { state: ConnectionState },
}

impl ClientError {
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::ListSessions(_) | Self::CreateSession(_))
    }
}
