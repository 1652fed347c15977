use serde::Deserialize;
use tracing::{debug, info};

use crate::endpoint::ServiceEndpoint;
use crate::error::DirectoryError;
use crate::types::Session;

#[derive(Deserialize)]
struct SessionList {
    sessions: Vec<Session>,
}

/// A create response that describes the new session. Servers may instead
/// answer with a bare confirmation, which does not decode into this.
#[derive(Deserialize)]
struct CreateSessionResponse {
    session_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    active_users: u64,
}

/// REST client for the session directory. Stateless apart from the
/// connection pool; it never caches or refreshes on its own.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    endpoint: ServiceEndpoint,
}

impl DirectoryClient {
    pub fn new(endpoint: ServiceEndpoint) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// Sessions in server response order.
    pub async fn list_sessions(&self) -> Result<Vec<Session>, DirectoryError> {
        let url = self.endpoint.list_url();
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(DirectoryError::from_reqwest)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DirectoryError::Status { status, body });
        }

        let list: SessionList = resp.json().await.map_err(DirectoryError::from_reqwest)?;
        debug!(count = list.sessions.len(), "fetched sessions");
        Ok(list.sessions)
    }

    /// Ask the directory to create a session. The caller refreshes the list
    /// afterwards if it wants to observe the new entry.
    ///
    /// Returns `None` when the server confirms creation without describing
    /// the session (no `session_id` in the body).
    pub async fn create_session(&self, name: &str) -> Result<Option<Session>, DirectoryError> {
        let url = self.endpoint.create_url();
        let body = serde_json::json!({ "name": name });

        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(DirectoryError::from_reqwest)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(DirectoryError::Status { status, body: text });
        }

        let body: serde_json::Value = resp.json().await.map_err(DirectoryError::from_reqwest)?;
        let Ok(created) = serde_json::from_value::<CreateSessionResponse>(body) else {
            info!(name, "session created (confirmation only)");
            return Ok(None);
        };
        info!(session_id = %created.session_id, name, "session created");
        Ok(Some(Session {
            session_id: created.session_id,
            name: created.name.unwrap_or_else(|| name.to_string()),
            active_users: created.active_users,
        }))
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("No sessions available. Create one with `chatroom create <name>`.")]
    Empty,

    #[error("No session found matching '{0}'")]
    NotFound(String),

    #[error("Ambiguous: '{target}' matches {count} sessions. Be more specific.")]
    Ambiguous { target: String, count: usize },
}

/// Resolve a user-typed target against a fetched session list.
/// Tries exact ID match, then name match, then ID prefix match. A blank
/// target never prefix-matches.
pub fn match_session<'a>(
    sessions: &'a [Session],
    target: &str,
) -> Result<&'a Session, MatchError> {
    if sessions.is_empty() {
        return Err(MatchError::Empty);
    }

    if let Some(s) = sessions.iter().find(|s| s.session_id == target) {
        return Ok(s);
    }
    if let Some(s) = sessions.iter().find(|s| s.name == target) {
        return Ok(s);
    }
    if target.trim().is_empty() {
        return Err(MatchError::NotFound(target.to_string()));
    }

    let prefix_matches: Vec<_> = sessions
        .iter()
        .filter(|s| s.session_id.starts_with(target))
        .collect();
    match prefix_matches.as_slice() {
        [] => Err(MatchError::NotFound(target.to_string())),
        [only] => Ok(only),
        many => Err(MatchError::Ambiguous {
            target: target.to_string(),
            count: many.len(),
        }),
    }
}
