//! Transcript assembly from streamed transcription fragments
//!
//! The remote session delivers transcription as partial text fragments for
//! both directions of the conversation. Fragments accumulate in a per-turn
//! buffer and become immutable transcript entries when the turn-complete
//! signal arrives.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Agent,
}

/// A finalized line of the conversation transcript
///
/// Immutable once created; insertion order is display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Accumulates streamed fragments for the current turn.
#[derive(Debug, Default)]
pub struct TranscriptAssembler {
    user_text: String,
    agent_text: String,
}

impl TranscriptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment of the user's speech transcription.
    pub fn append_user(&mut self, fragment: &str) {
        self.user_text.push_str(fragment);
    }

    /// Append a fragment of the agent's speech transcription.
    pub fn append_agent(&mut self, fragment: &str) {
        self.agent_text.push_str(fragment);
    }

    /// Finalize the current turn.
    ///
    /// Produces one entry per speaker whose trimmed text is non-empty and
    /// resets the turn buffer either way. The agent entry is stamped one
    /// millisecond after the user entry so a timestamp sort keeps the user
    /// line first.
    pub fn flush_turn(&mut self) -> Vec<TranscriptEntry> {
        let now = Utc::now();
        let mut entries = Vec::new();

        let user = std::mem::take(&mut self.user_text);
        let agent = std::mem::take(&mut self.agent_text);

        let user = user.trim();
        if !user.is_empty() {
            entries.push(TranscriptEntry {
                speaker: Speaker::User,
                text: user.to_string(),
                created_at: now,
            });
        }

        let agent = agent.trim();
        if !agent.is_empty() {
            entries.push(TranscriptEntry {
                speaker: Speaker::Agent,
                text: agent.to_string(),
                created_at: now + Duration::milliseconds(1),
            });
        }

        entries
    }
}
