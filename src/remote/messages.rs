use base64::Engine;
use serde::{Deserialize, Serialize};

/// Session-open envelope published when a conversation starts
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionOpenRequest {
    pub session_id: String,
    /// Always "audio": replies are synthesized speech only
    pub response_modality: String,
    pub input_transcription: bool,
    pub output_transcription: bool,
    pub voice: String,
    pub system_prompt: String,
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
}

/// One captured audio frame sent to the remote session
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub session_id: String,
    pub sequence: u32,
    pub pcm: String, // Base64-encoded 16-bit LE PCM
    pub sample_rate: u32,
    pub channels: u16,
    pub timestamp: String, // RFC3339 timestamp
}

impl AudioFrameMessage {
    pub fn new(session_id: &str, sequence: u32, pcm_bytes: &[u8], sample_rate: u32) -> Self {
        Self {
            session_id: session_id.to_string(),
            sequence,
            pcm: base64::engine::general_purpose::STANDARD.encode(pcm_bytes),
            sample_rate,
            channels: 1,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Inbound event from the remote session.
///
/// A single envelope may carry any subset of these fields; the controller
/// handles every present field. Absent fields are omitted on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerEvent {
    /// Base64-encoded PCM chunk of synthesized agent speech
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,

    /// The user started talking over the agent; stop playback now
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<bool>,

    /// Partial transcription of the user's speech
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_fragment: Option<String>,

    /// Partial transcription of the agent's reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_fragment: Option<String>,

    /// The current conversational turn is finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_complete: Option<bool>,

    /// Fatal session error from the endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The endpoint closed the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<bool>,
}

impl ServerEvent {
    /// Decode the base64 audio payload, if present.
    pub fn audio_bytes(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        self.audio
            .as_ref()
            .map(|b64| base64::engine::general_purpose::STANDARD.decode(b64))
    }
}
