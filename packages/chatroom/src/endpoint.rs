use reqwest::Url;

use crate::error::DirectoryError;
use crate::types::UserIdentity;

/// Base URL of the directory/streaming service and the routes derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    base: Url,
}

impl ServiceEndpoint {
    /// Accepts `http://` and `https://` base URLs, with or without a path prefix.
    pub fn parse(base_url: &str) -> Result<Self, DirectoryError> {
        let base =
            Url::parse(base_url).map_err(|_| DirectoryError::InvalidUrl(base_url.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(DirectoryError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn list_url(&self) -> Url {
        join(&self.base, &["session", "list"])
    }

    pub fn create_url(&self) -> Url {
        join(&self.base, &["session", "create"])
    }

    /// `ws(s)://…/session/connect/{session_id}/{user_id}`
    pub fn stream_url(&self, session_id: &str, user: &UserIdentity) -> Url {
        let mut url = join(
            &self.base,
            &["session", "connect", session_id, user.as_str()],
        );
        let scheme = if self.base.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        // http→ws and https→wss are both special-to-special, which Url permits.
        let _ = url.set_scheme(scheme);
        url
    }
}

fn join(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
