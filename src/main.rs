use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use voicelink::{
    create_router, AppState, CaptureConfig, Config, NatsConnector, PacedCapture, SessionConfig,
    TimerOutput, VoiceSession,
};

#[derive(Parser)]
#[command(name = "voicelink", about = "Real-time voice chat session service")]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/voicelink")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("voicelink v0.1.0");
    info!("Loaded config: {}", cfg.service.name);

    let capture = Box::new(PacedCapture::new(CaptureConfig {
        sample_rate: cfg.audio.input_sample_rate,
        channels: 1,
        frame_samples: cfg.audio.frame_samples,
    }));
    let (output, completions) = TimerOutput::new();

    let session = Arc::new(VoiceSession::new(
        SessionConfig {
            remote: cfg.remote,
            ..SessionConfig::default()
        },
        Arc::new(NatsConnector),
        capture,
        Box::new(output),
        completions,
    ));

    let router = create_router(AppState::new(Arc::clone(&session)));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown(session))
        .await?;

    Ok(())
}

/// Wait for ctrl-c, then release the session exactly once.
async fn shutdown(session: Arc<VoiceSession>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutting down");
    session.stop().await;
}
