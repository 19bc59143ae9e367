//! Remote conversational session transport
//!
//! The speech/LLM endpoint is consumed as an opaque capability: a connector
//! opens a session with a fixed configuration and hands back a send handle
//! plus a channel of inbound server events. A NATS-backed implementation is
//! provided; tests substitute their own connector.

pub mod messages;
pub mod nats;

use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tokio::sync::mpsc;

pub use messages::{AudioFrameMessage, ServerEvent, SessionOpenRequest};
pub use nats::NatsConnector;

/// Fixed configuration for opening a remote session
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Transport URL (e.g. "nats://localhost:4222")
    pub url: String,
    /// Voice identifier for synthesized replies
    pub voice: String,
    /// System prompt applied to the conversation
    pub system_prompt: String,
    /// Sample rate of audio we send (Hz)
    pub input_sample_rate: u32,
    /// Sample rate of audio the endpoint sends back (Hz)
    pub output_sample_rate: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            voice: "aoede".to_string(),
            system_prompt: "You are a friendly and helpful voice assistant. Keep your answers \
                            concise and conversational."
                .to_string(),
            input_sample_rate: 16000,
            output_sample_rate: 24000,
        }
    }
}

/// An open remote session: accepts outbound audio, can be closed.
///
/// Sending takes `&self` so the outbound pump can share the handle with the
/// controller that eventually closes it.
#[async_trait::async_trait]
pub trait RemoteSession: Send + Sync {
    /// Send one captured audio frame
    async fn send_audio(&self, frame: AudioFrameMessage) -> Result<()>;

    /// Close the session; further events may still drain from the receiver
    async fn close(&self) -> Result<()>;
}

/// Opens remote sessions.
#[async_trait::async_trait]
pub trait RemoteConnector: Send + Sync {
    /// Open a session; returns the send handle and the inbound event stream
    async fn open(
        &self,
        config: &RemoteConfig,
        session_id: &str,
    ) -> Result<(Arc<dyn RemoteSession>, mpsc::Receiver<ServerEvent>)>;
}
