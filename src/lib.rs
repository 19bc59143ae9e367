pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod remote;
pub mod session;
pub mod transcript;

pub use audio::{
    AudioFrame, CaptureBackend, CaptureConfig, OutputBackend, PacedCapture, PcmBuffer,
    PlaybackSequencer, TimerOutput,
};
pub use config::Config;
pub use error::VoiceError;
pub use http::{create_router, AppState};
pub use remote::{AudioFrameMessage, NatsConnector, RemoteConfig, RemoteConnector, RemoteSession, ServerEvent};
pub use session::{SessionConfig, SessionSnapshot, SessionState, VoiceSession};
pub use transcript::{Speaker, TranscriptAssembler, TranscriptEntry};
