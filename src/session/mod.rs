//! Voice session lifecycle
//!
//! This module provides the `VoiceSession` controller that manages:
//! - Microphone capture and outbound frame delivery
//! - Inbound event dispatch (audio, transcription, interruption, turn ends)
//! - Playback sequencing of synthesized replies
//! - Transcript accumulation and session state for the UI surface

mod config;
mod controller;
mod state;

pub use config::SessionConfig;
pub use controller::VoiceSession;
pub use state::{SessionSnapshot, SessionState};
