use std::sync::Arc;

use anyhow::{Context, Result};
use async_nats::Client;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::messages::{AudioFrameMessage, ServerEvent, SessionOpenRequest};
use super::{RemoteConfig, RemoteConnector, RemoteSession};

/// Opens voice sessions over NATS.
///
/// Subjects:
/// - `voice.session.open` carries the session-open envelope
/// - `voice.session.close.<session_id>` signals client hangup
/// - `voice.audio.<session_id>` carries outbound audio frames
/// - `voice.event.<session_id>` delivers inbound server events
pub struct NatsConnector;

#[async_trait::async_trait]
impl RemoteConnector for NatsConnector {
    async fn open(
        &self,
        config: &RemoteConfig,
        session_id: &str,
    ) -> Result<(Arc<dyn RemoteSession>, mpsc::Receiver<ServerEvent>)> {
        info!("Connecting to NATS at {}", config.url);

        let client = async_nats::connect(&config.url)
            .await
            .context("Failed to connect to NATS")?;

        let event_subject = format!("voice.event.{}", session_id);
        let mut subscriber = client
            .subscribe(event_subject.clone())
            .await
            .context("Failed to subscribe to session events")?;

        info!("Subscribed to {}", event_subject);

        let open = SessionOpenRequest {
            session_id: session_id.to_string(),
            response_modality: "audio".to_string(),
            input_transcription: true,
            output_transcription: true,
            voice: config.voice.clone(),
            system_prompt: config.system_prompt.clone(),
            input_sample_rate: config.input_sample_rate,
            output_sample_rate: config.output_sample_rate,
        };

        client
            .publish("voice.session.open".to_string(), serde_json::to_vec(&open)?.into())
            .await
            .context("Failed to publish session open")?;

        // Forward deserialized events until the subscription or receiver ends.
        let (tx, rx) = mpsc::channel(64);
        let forwarder = tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<ServerEvent>(&msg.payload) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse server event: {}", e);
                    }
                }
            }
        });

        let session = NatsRemoteSession {
            client,
            session_id: session_id.to_string(),
            audio_subject: format!("voice.audio.{}", session_id),
            forwarder: std::sync::Mutex::new(Some(forwarder)),
        };

        Ok((Arc::new(session), rx))
    }
}

struct NatsRemoteSession {
    client: Client,
    session_id: String,
    audio_subject: String,
    forwarder: std::sync::Mutex<Option<JoinHandle<()>>>,
}

#[async_trait::async_trait]
impl RemoteSession for NatsRemoteSession {
    async fn send_audio(&self, frame: AudioFrameMessage) -> Result<()> {
        let payload = serde_json::to_vec(&frame)?;

        self.client
            .publish(self.audio_subject.clone(), payload.into())
            .await
            .context("Failed to publish audio frame")?;

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        info!("Closing remote session {}", self.session_id);

        let subject = format!("voice.session.close.{}", self.session_id);
        if let Err(e) = self.client.publish(subject, "".into()).await {
            warn!("Failed to publish session close: {}", e);
        }

        let task = {
            let mut guard = match self.forwarder.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.take()
        };
        if let Some(task) = task {
            task.abort();
        }

        Ok(())
    }
}
