use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of the voice session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session; `start()` is accepted
    Disconnected,
    /// Microphone and remote session are being set up
    Connecting,
    /// Audio is flowing in both directions
    Connected,
    /// Reserved for unrecoverable faults; error outcomes land in
    /// `Disconnected` with the error message recorded
    Error,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

/// Point-in-time view of the session for callers (UI, HTTP handlers)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,

    pub state: SessionState,

    /// Whether synthesized agent audio is currently queued or playing
    pub agent_speaking: bool,

    /// Message of the most recent error, if any
    pub last_error: Option<String>,

    /// When the current or most recent session connected
    pub started_at: Option<DateTime<Utc>>,

    /// Number of finalized transcript entries
    pub transcript_len: usize,
}
