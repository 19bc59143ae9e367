use std::sync::Arc;

use crate::session::VoiceSession;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single voice session controller this process serves
    pub session: Arc<VoiceSession>,
}

impl AppState {
    pub fn new(session: Arc<VoiceSession>) -> Self {
        Self { session }
    }
}
