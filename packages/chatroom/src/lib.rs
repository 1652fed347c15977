//! Client for a multi-session chat service.
//!
//! The service exposes a small HTTP directory (list and create sessions) and
//! a per-session WebSocket stream. A [`ChatClient`] keeps at most one stream
//! live at a time: selecting a session releases the previous stream before
//! opening the next, and events from superseded streams are dropped by
//! generation number before they can touch the message buffer.

pub mod buffer;
pub mod client;
pub mod config;
pub mod connection;
pub mod directory;
pub mod endpoint;
pub mod error;
pub mod reporter;
pub mod transport;
pub mod types;

#[cfg(test)]
mod test_helpers;

pub use buffer::MessageBuffer;
pub use client::ChatClient;
pub use config::ClientConfig;
pub use connection::ConnectionManager;
pub use directory::{DirectoryClient, MatchError, match_session};
pub use endpoint::ServiceEndpoint;
pub use error::{ClientError, DirectoryError, ProtocolError};
pub use reporter::ErrorReporter;
pub use transport::{StreamEvent, StreamEventKind, StreamHandle, Transport, WebSocketTransport};
pub use types::{ConnectionState, Message, Session, UserIdentity};
