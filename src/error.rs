use thiserror::Error;

/// Errors surfaced to callers of the voice session.
///
/// Everything that can go wrong mid-session is recorded as the session's
/// last error and collapses the state machine back to `Disconnected`;
/// these kinds exist so callers can distinguish user-fixable problems
/// (microphone permission) from transport ones.
#[derive(Debug, Error)]
pub enum VoiceError {
    /// Microphone access was refused or the capture backend failed to start.
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    /// Opening the remote session or the transport itself failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// An inbound audio payload could not be decoded.
    #[error("could not decode audio payload: {0}")]
    Decode(String),

    /// `start()` was called while a session is already connecting/connected.
    #[error("a voice session is already active")]
    AlreadyActive,
}
