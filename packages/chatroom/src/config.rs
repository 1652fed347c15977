use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =============================================================================
// File config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   config.toml:     [server]
//                    base_url = "http://chat.local:8000"
//
//   env var:         CHATROOM_SERVER__BASE_URL=http://chat.local:8000
//                    (double underscore = nesting)
//
//   CLI flag:        --base-url http://chat.local:8000  (wins over both)

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub identity: IdentityFileConfig,
    #[serde(default)]
    pub buffer: BufferFileConfig,
}

/// Where the directory and streaming service lives (`[server]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// `[identity]`: pin the user id instead of generating one per run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdentityFileConfig {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// `[buffer]`: optional retention cap for the message buffer.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BufferFileConfig {
    #[serde(default)]
    pub max_messages: Option<usize>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Default location of `config.toml`: `~/.chatroom/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".chatroom").join("config.toml"))
}

/// Build a figment that layers: defaults → config.toml → CHATROOM_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `CHATROOM_SERVER__BASE_URL=…`  →  `server.base_url = …`
///   `CHATROOM_BUFFER__MAX_MESSAGES=500`  →  `buffer.max_messages = 500`
pub fn load_config(config_path: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let mut figment = Figment::from(Serialized::defaults(FileConfig::default()));
    if let Some(path) = config_path {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed("CHATROOM_").split("__"))
}

// =============================================================================
// Runtime config (resolved once at startup, immutable afterwards)
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_id: Option<String>,
    pub max_messages: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_file(&FileConfig::default())
    }
}

impl ClientConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        Self {
            base_url: fc.server.base_url.clone(),
            user_id: fc.identity.user_id.clone().filter(|id| !id.is_empty()),
            max_messages: fc.buffer.max_messages,
        }
    }

    /// Apply a `--base-url` style override.
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url {
            self.base_url = url;
        }
        self
    }
}
