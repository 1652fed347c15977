use serde::{Deserialize, Serialize};
use std::fmt;

/// A chat room tracked by the directory service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub name: String,
    #[serde(default)]
    pub active_users: u64,
}

/// One chat utterance as carried by an inbound stream frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender_id: String,
    pub message: String,
}

impl Message {
    /// Whether this message was authored by `identity`.
    pub fn is_from(&self, identity: &UserIdentity) -> bool {
        self.sender_id == identity.as_str()
    }
}

/// The client's own identifier, fixed for the lifetime of the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserIdentity(String);

impl UserIdentity {
    /// Generate a fresh `user-xxxxxxxxx` identity.
    pub fn generate() -> Self {
        let raw = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("user-{}", &raw[..9]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UserIdentity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of the single live stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
    Errored,
}

impl ConnectionState {
    /// `Connecting` and `Open` are the states in which a stream is held.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Errored => "errored",
        };
        f.write_str(s)
    }
}
