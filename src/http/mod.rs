//! HTTP API server for external control (the voice-chat UI)
//!
//! This module provides a REST API mirroring the UI surface:
//! - POST /session/start - Start the voice session
//! - POST /session/stop - Stop the voice session
//! - GET /session/status - Session state, speaking flag, last error
//! - GET /session/transcript - Ordered transcript entries
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
