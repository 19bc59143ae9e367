use serde::Deserialize;

use crate::remote::RemoteConfig;

/// Configuration for one voice session controller
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier
    #[serde(default = "default_session_id")]
    pub session_id: String,

    /// Remote endpoint settings (transport URL, voice, system prompt)
    pub remote: RemoteConfig,
}

fn default_session_id() -> String {
    format!("voice-{}", uuid::Uuid::new_v4())
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: default_session_id(),
            remote: RemoteConfig::default(),
        }
    }
}
