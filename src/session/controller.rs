use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::SessionConfig;
use super::state::{SessionSnapshot, SessionState};
use crate::audio::{pcm, CaptureBackend, OutputBackend, PlaybackSequencer};
use crate::error::VoiceError;
use crate::remote::{AudioFrameMessage, RemoteConnector, RemoteSession, ServerEvent};
use crate::transcript::{TranscriptAssembler, TranscriptEntry};

/// State shared between the controller and its spawned tasks.
struct Shared {
    state: Mutex<SessionState>,
    running: AtomicBool,
    agent_speaking: AtomicBool,
    last_error: Mutex<Option<String>>,
    transcript: Mutex<Vec<TranscriptEntry>>,
    assembler: Mutex<TranscriptAssembler>,
    sequencer: Mutex<PlaybackSequencer>,
    remote: Mutex<Option<Arc<dyn RemoteSession>>>,
    capture: Mutex<Box<dyn CaptureBackend>>,
    started_at: Mutex<Option<DateTime<Utc>>>,
    output_sample_rate: u32,
}

impl Shared {
    /// Dispatch one inbound server event.
    ///
    /// Returns false when the event ended the session and the dispatcher
    /// should exit. Events run to completion one at a time, so all state
    /// mutation here is free of interleaving hazards.
    async fn handle_event(&self, event: ServerEvent) -> bool {
        if let Some(decoded) = event.audio_bytes() {
            // A bad payload is skipped; the session keeps going.
            let buffer = decoded
                .map_err(|e| VoiceError::Decode(e.to_string()))
                .and_then(|bytes| pcm::decode_to_buffer(&bytes, self.output_sample_rate, 1));

            match buffer {
                Ok(buffer) => {
                    self.sequencer.lock().await.enqueue(buffer);
                    self.agent_speaking.store(true, Ordering::SeqCst);
                }
                Err(e) => {
                    warn!("Skipping audio payload: {}", e);
                }
            }
        }

        if event.interrupted.unwrap_or(false) {
            self.sequencer.lock().await.interrupt();
            self.agent_speaking.store(false, Ordering::SeqCst);
        }

        if let Some(fragment) = &event.user_fragment {
            self.assembler.lock().await.append_user(fragment);
        }

        if let Some(fragment) = &event.agent_fragment {
            self.assembler.lock().await.append_agent(fragment);
        }

        if event.turn_complete.unwrap_or(false) {
            let entries = self.assembler.lock().await.flush_turn();
            if !entries.is_empty() {
                self.transcript.lock().await.extend(entries);
            }
        }

        if let Some(message) = &event.error {
            error!("Remote session error: {}", message);
            *self.last_error.lock().await = Some(message.clone());
            self.teardown(SessionState::Disconnected).await;
            return false;
        }

        if event.closed.unwrap_or(false) {
            info!("Remote session closed");
            self.teardown(SessionState::Disconnected).await;
            return false;
        }

        true
    }

    /// Release the session's resources and land in `final_state`.
    ///
    /// Safe to call repeatedly and from any state; every step tolerates the
    /// resource already being gone.
    async fn teardown(&self, final_state: SessionState) {
        self.running.store(false, Ordering::SeqCst);

        let remote = self.remote.lock().await.take();
        if let Some(remote) = remote {
            if let Err(e) = remote.close().await {
                warn!("Failed to close remote session: {}", e);
            }
        }

        self.sequencer.lock().await.shutdown();
        self.agent_speaking.store(false, Ordering::SeqCst);

        if let Err(e) = self.capture.lock().await.stop().await {
            warn!("Failed to stop capture: {}", e);
        }

        *self.state.lock().await = final_state;
    }
}

/// A single-session voice-chat controller.
///
/// Owns the microphone capture backend, the playback sequencer, the
/// transcript, and the remote session handle. One instance manages at most
/// one live session at a time; construct additional instances for
/// independent sessions (tests do exactly that).
pub struct VoiceSession {
    config: SessionConfig,
    connector: Arc<dyn RemoteConnector>,
    shared: Arc<Shared>,
    pump_task: Mutex<Option<JoinHandle<()>>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
    completion_task: JoinHandle<()>,
}

impl VoiceSession {
    /// Create a controller.
    ///
    /// `completions` is the output backend's buffer-completion channel; it
    /// is consumed for the lifetime of the controller so "agent finished
    /// speaking" is tracked even between sessions.
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn RemoteConnector>,
        capture: Box<dyn CaptureBackend>,
        output: Box<dyn OutputBackend>,
        mut completions: mpsc::Receiver<u64>,
    ) -> Self {
        let output_sample_rate = config.remote.output_sample_rate;

        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState::Disconnected),
            running: AtomicBool::new(false),
            agent_speaking: AtomicBool::new(false),
            last_error: Mutex::new(None),
            transcript: Mutex::new(Vec::new()),
            assembler: Mutex::new(TranscriptAssembler::new()),
            sequencer: Mutex::new(PlaybackSequencer::new(output)),
            remote: Mutex::new(None),
            capture: Mutex::new(capture),
            started_at: Mutex::new(None),
            output_sample_rate,
        });

        // Natural end-of-buffer completions drain the active set; when the
        // last buffer finishes the agent has stopped speaking.
        let completion_task = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                while let Some(id) = completions.recv().await {
                    let drained = shared.sequencer.lock().await.complete(id);
                    if drained {
                        shared.agent_speaking.store(false, Ordering::SeqCst);
                    }
                }
            })
        };

        Self {
            config,
            connector,
            shared,
            pump_task: Mutex::new(None),
            event_task: Mutex::new(None),
            completion_task,
        }
    }

    /// Start a session: acquire the microphone, open the remote session,
    /// and begin streaming in both directions.
    ///
    /// Fails with `AlreadyActive` if a session is connecting or connected.
    /// Any other failure records the error, tears everything down, and
    /// lands back in `Disconnected` so a fresh `start()` is accepted.
    pub async fn start(&self) -> Result<(), VoiceError> {
        {
            let mut state = self.shared.state.lock().await;
            match *state {
                SessionState::Disconnected | SessionState::Error => {}
                SessionState::Connecting | SessionState::Connected => {
                    return Err(VoiceError::AlreadyActive);
                }
            }
            *state = SessionState::Connecting;
        }

        info!("Starting voice session {}", self.config.session_id);

        self.shared.last_error.lock().await.take();
        self.shared.transcript.lock().await.clear();
        // Discard any partial turn left over from a previous session.
        self.shared.assembler.lock().await.flush_turn();

        // Microphone first; a refusal is the most common start failure.
        // The guard is scoped so teardown can re-take the lock on failure.
        let capture_result = {
            let mut capture = self.shared.capture.lock().await;
            capture.start().await
        };
        let frames = match capture_result {
            Ok(rx) => rx,
            Err(e) => {
                return self
                    .fail_start(VoiceError::PermissionDenied(e.to_string()))
                    .await;
            }
        };

        let opened = self
            .connector
            .open(&self.config.remote, &self.config.session_id)
            .await;

        let (remote, events) = match opened {
            Ok(pair) => pair,
            Err(e) => {
                return self.fail_start(VoiceError::Connection(e.to_string())).await;
            }
        };

        // A stop() that raced in while the remote was opening already tore
        // the session down; commit only if we are still the one connecting.
        {
            let mut state = self.shared.state.lock().await;
            if *state != SessionState::Connecting {
                drop(state);
                warn!("Session stopped while connecting; releasing resources");
                if let Err(e) = remote.close().await {
                    warn!("Failed to close remote session: {}", e);
                }
                if let Err(e) = self.shared.capture.lock().await.stop().await {
                    warn!("Failed to stop capture: {}", e);
                }
                return Err(VoiceError::Connection(
                    "session stopped while connecting".to_string(),
                ));
            }

            *self.shared.remote.lock().await = Some(Arc::clone(&remote));
            *self.shared.started_at.lock().await = Some(Utc::now());
            self.shared.running.store(true, Ordering::SeqCst);
            *state = SessionState::Connected;
        }

        self.spawn_pump(frames, remote).await;
        self.spawn_dispatcher(events).await;

        info!("Voice session {} connected", self.config.session_id);

        Ok(())
    }

    /// Stop the session. Idempotent: a no-op when nothing is active.
    pub async fn stop(&self) {
        info!("Stopping voice session {}", self.config.session_id);

        self.shared.teardown(SessionState::Disconnected).await;

        // The pump exits when capture stops and the dispatcher when the
        // remote closes, but neither is guaranteed for every backend;
        // aborting a finished task is harmless.
        if let Some(task) = self.pump_task.lock().await.take() {
            task.abort();
        }
        if let Some(task) = self.event_task.lock().await.take() {
            task.abort();
        }
    }

    /// Current state, speaking flag, last error, and transcript length.
    pub async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.config.session_id.clone(),
            state: *self.shared.state.lock().await,
            agent_speaking: self.shared.agent_speaking.load(Ordering::SeqCst),
            last_error: self.shared.last_error.lock().await.clone(),
            started_at: *self.shared.started_at.lock().await,
            transcript_len: self.shared.transcript.lock().await.len(),
        }
    }

    /// The full ordered transcript accumulated so far.
    pub async fn transcript(&self) -> Vec<TranscriptEntry> {
        self.shared.transcript.lock().await.clone()
    }

    /// Whether any agent audio is scheduled or playing.
    pub async fn is_playing(&self) -> bool {
        self.shared.sequencer.lock().await.is_playing()
    }

    async fn fail_start(&self, err: VoiceError) -> Result<(), VoiceError> {
        error!("Session start failed: {}", err);
        *self.shared.last_error.lock().await = Some(err.to_string());
        self.shared.teardown(SessionState::Disconnected).await;
        Err(err)
    }

    /// Outbound pump: captured frames → PCM encode → remote session.
    ///
    /// Sends are awaited one at a time, which serializes frame delivery; a
    /// failed send drops that frame and keeps pumping.
    async fn spawn_pump(
        &self,
        mut frames: mpsc::Receiver<crate::audio::AudioFrame>,
        remote: Arc<dyn RemoteSession>,
    ) {
        let shared = Arc::clone(&self.shared);
        let session_id = self.config.session_id.clone();

        let task = tokio::spawn(async move {
            info!("Outbound audio pump started");
            let mut sequence = 0u32;

            while let Some(frame) = frames.recv().await {
                if !shared.running.load(Ordering::SeqCst) {
                    break;
                }

                let bytes = pcm::encode(&frame.samples);
                let message =
                    AudioFrameMessage::new(&session_id, sequence, &bytes, frame.sample_rate);
                sequence += 1;

                if let Err(e) = remote.send_audio(message).await {
                    warn!("Failed to send audio frame: {}", e);
                }
            }

            info!("Outbound audio pump stopped");
        });

        *self.pump_task.lock().await = Some(task);
    }

    /// Inbound dispatcher: remote events handled strictly in arrival order.
    async fn spawn_dispatcher(&self, mut events: mpsc::Receiver<ServerEvent>) {
        let shared = Arc::clone(&self.shared);

        let task = tokio::spawn(async move {
            info!("Event dispatcher started");

            while let Some(event) = events.recv().await {
                if !shared.running.load(Ordering::SeqCst) {
                    break;
                }
                if !shared.handle_event(event).await {
                    break;
                }
            }

            info!("Event dispatcher stopped");
        });

        *self.event_task.lock().await = Some(task);
    }
}

impl Drop for VoiceSession {
    fn drop(&mut self) {
        // Last-resort cleanup; orderly teardown is `stop()`.
        self.completion_task.abort();
        if let Ok(mut guard) = self.pump_task.try_lock() {
            if let Some(task) = guard.take() {
                task.abort();
            }
        }
        if let Ok(mut guard) = self.event_task.try_lock() {
            if let Some(task) = guard.take() {
                task.abort();
            }
        }
    }
}
