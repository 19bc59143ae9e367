// Integration tests for the voice session controller.
//
// All device and network seams are mocked: capture frames come from a test
// channel, scheduled playback is recorded instead of rendered, and the
// remote session is an in-memory connector the tests drive directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use base64::Engine;
use tokio::sync::{mpsc, Notify};
use voicelink::{
    AudioFrameMessage, CaptureBackend, OutputBackend, PcmBuffer, RemoteConfig, RemoteConnector,
    RemoteSession, ServerEvent, SessionConfig, SessionState, Speaker, VoiceError, VoiceSession,
};

// ============================================================================
// Mocks
// ============================================================================

type FrameSender = Arc<Mutex<Option<mpsc::Sender<voicelink::AudioFrame>>>>;

struct MockCapture {
    fail: bool,
    capturing: bool,
    // Shared with the harness so tests can feed frames in.
    tx_slot: FrameSender,
}

impl MockCapture {
    fn new() -> Self {
        Self {
            fail: false,
            capturing: false,
            tx_slot: Arc::new(Mutex::new(None)),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MockCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<voicelink::AudioFrame>> {
        if self.fail {
            bail!("Permission denied by user");
        }
        let (tx, rx) = mpsc::channel(16);
        *self.tx_slot.lock().unwrap() = Some(tx);
        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.tx_slot.lock().unwrap().take();
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockOutput {
    next_id: u64,
    scheduled: Arc<Mutex<Vec<(u64, f64)>>>,
    stopped: Arc<Mutex<Vec<u64>>>,
}

impl OutputBackend for MockOutput {
    fn clock(&self) -> f64 {
        0.0
    }

    fn schedule(&mut self, _buffer: PcmBuffer, when: f64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.scheduled.lock().unwrap().push((id, when));
        id
    }

    fn stop(&mut self, id: u64) {
        self.stopped.lock().unwrap().push(id);
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockRemote {
    sent: Arc<Mutex<Vec<AudioFrameMessage>>>,
    closed: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl RemoteSession for MockRemote {
    async fn send_audio(&self, frame: AudioFrameMessage) -> Result<()> {
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MockConnector {
    fail: bool,
    // When set, `open` parks until notified; `opening` flips once it parks.
    gate: Option<Arc<Notify>>,
    opening: Arc<AtomicBool>,
    events_tx: Mutex<Option<mpsc::Sender<ServerEvent>>>,
    sent: Arc<Mutex<Vec<AudioFrameMessage>>>,
    closed: Arc<AtomicBool>,
}

impl MockConnector {
    fn new() -> Self {
        Self {
            fail: false,
            gate: None,
            opening: Arc::new(AtomicBool::new(false)),
            events_tx: Mutex::new(None),
            sent: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    /// Inject an inbound server event, as if the endpoint sent it.
    async fn emit(&self, event: ServerEvent) {
        let tx = self
            .events_tx
            .lock()
            .unwrap()
            .clone()
            .expect("session not open");
        tx.send(event).await.expect("dispatcher gone");
    }
}

#[async_trait::async_trait]
impl RemoteConnector for MockConnector {
    async fn open(
        &self,
        _config: &RemoteConfig,
        _session_id: &str,
    ) -> Result<(Arc<dyn RemoteSession>, mpsc::Receiver<ServerEvent>)> {
        if self.fail {
            bail!("connection refused");
        }

        if let Some(gate) = &self.gate {
            self.opening.store(true, Ordering::SeqCst);
            gate.notified().await;
        }

        let (tx, rx) = mpsc::channel(64);
        *self.events_tx.lock().unwrap() = Some(tx);

        let remote = MockRemote {
            sent: Arc::clone(&self.sent),
            closed: Arc::clone(&self.closed),
        };
        Ok((Arc::new(remote), rx))
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    session: Arc<VoiceSession>,
    connector: Arc<MockConnector>,
    scheduled: Arc<Mutex<Vec<(u64, f64)>>>,
    completions_tx: mpsc::Sender<u64>,
    frames_tx: FrameSender,
}

fn harness_with(capture: MockCapture, connector: MockConnector) -> Harness {
    let connector = Arc::new(connector);
    let scheduled = Arc::new(Mutex::new(Vec::new()));
    let frames_tx = Arc::clone(&capture.tx_slot);
    let output = MockOutput {
        next_id: 0,
        scheduled: Arc::clone(&scheduled),
        stopped: Arc::new(Mutex::new(Vec::new())),
    };
    let (completions_tx, completions_rx) = mpsc::channel(16);

    let session = VoiceSession::new(
        SessionConfig::default(),
        connector.clone(),
        Box::new(capture),
        Box::new(output),
        completions_rx,
    );

    Harness {
        session: Arc::new(session),
        connector,
        scheduled,
        completions_tx,
        frames_tx,
    }
}

fn harness() -> Harness {
    harness_with(MockCapture::new(), MockConnector::new())
}

/// Poll until `check` passes or a short deadline expires.
async fn wait_for<F, Fut>(check: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within deadline");
}

fn audio_event(samples: &[f32]) -> ServerEvent {
    let pcm = voicelink::audio::pcm::encode(samples);
    ServerEvent {
        audio: Some(base64::engine::general_purpose::STANDARD.encode(pcm)),
        ..Default::default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_stop_while_disconnected_is_noop() {
    let h = harness();

    h.session.stop().await;
    h.session.stop().await;

    let snapshot = h.session.snapshot().await;
    assert_eq!(snapshot.state, SessionState::Disconnected);
    assert!(snapshot.last_error.is_none());
}

#[tokio::test]
async fn test_start_while_connected_fails_already_active() {
    let h = harness();

    h.session.start().await.unwrap();
    let result = h.session.start().await;

    assert!(matches!(result, Err(VoiceError::AlreadyActive)));
    assert_eq!(h.session.snapshot().await.state, SessionState::Connected);

    h.session.stop().await;
}

#[tokio::test]
async fn test_capture_failure_maps_to_permission_denied() {
    let h = harness_with(MockCapture::failing(), MockConnector::new());

    let result = h.session.start().await;

    assert!(matches!(result, Err(VoiceError::PermissionDenied(_))));
    let snapshot = h.session.snapshot().await;
    assert_eq!(snapshot.state, SessionState::Disconnected);
    assert!(snapshot.last_error.unwrap().contains("Permission denied"));
}

#[tokio::test]
async fn test_connection_failure_is_recorded_and_restartable() {
    let h = harness_with(MockCapture::new(), MockConnector::failing());

    let result = h.session.start().await;

    assert!(matches!(result, Err(VoiceError::Connection(_))));
    // No half-connected state: a failed start lands back in Disconnected
    // with the error message recorded.
    let snapshot = h.session.snapshot().await;
    assert_eq!(snapshot.state, SessionState::Disconnected);
    assert!(snapshot.last_error.unwrap().contains("connection refused"));

    // A failed start must not wedge the controller.
    let result = h.session.start().await;
    assert!(matches!(result, Err(VoiceError::Connection(_))));
}

#[tokio::test]
async fn test_stop_during_connect_discards_opened_session() {
    let gate = Arc::new(Notify::new());
    let connector = MockConnector::gated(Arc::clone(&gate));
    let opening = Arc::clone(&connector.opening);
    let h = harness_with(MockCapture::new(), connector);

    let session = Arc::clone(&h.session);
    let starter = tokio::spawn(async move { session.start().await });

    // Let start() park inside the connector, then stop out from under it.
    wait_for(|| async { opening.load(Ordering::SeqCst) }).await;
    h.session.stop().await;
    gate.notify_one();

    let result = starter.await.unwrap();
    assert!(matches!(result, Err(VoiceError::Connection(_))));
    assert_eq!(h.session.snapshot().await.state, SessionState::Disconnected);
    // The remote handle the late open produced must be released, not kept.
    assert!(h.connector.closed.load(Ordering::SeqCst));

    // The lost race must not wedge the controller.
    gate.notify_one();
    h.session.start().await.unwrap();
    assert_eq!(h.session.snapshot().await.state, SessionState::Connected);
    h.session.stop().await;
}

#[tokio::test]
async fn test_end_to_end_turn_produces_ordered_transcript() {
    let h = harness();
    h.session.start().await.unwrap();

    h.connector
        .emit(ServerEvent {
            user_fragment: Some("Hi".to_string()),
            ..Default::default()
        })
        .await;
    h.connector
        .emit(ServerEvent {
            agent_fragment: Some("Hello!".to_string()),
            ..Default::default()
        })
        .await;
    h.connector
        .emit(ServerEvent {
            turn_complete: Some(true),
            ..Default::default()
        })
        .await;

    wait_for(|| async { h.session.snapshot().await.transcript_len == 2 }).await;

    let transcript = h.session.transcript().await;
    assert_eq!(transcript[0].speaker, Speaker::User);
    assert_eq!(transcript[0].text, "Hi");
    assert_eq!(transcript[1].speaker, Speaker::Agent);
    assert_eq!(transcript[1].text, "Hello!");

    h.session.stop().await;

    let snapshot = h.session.snapshot().await;
    assert_eq!(snapshot.state, SessionState::Disconnected);
    assert!(!h.session.is_playing().await, "queue must drain on stop");
    assert!(h.connector.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_audio_payload_schedules_playback_and_marks_speaking() {
    let h = harness();
    h.session.start().await.unwrap();

    h.connector.emit(audio_event(&[0.1; 2400])).await;
    h.connector.emit(audio_event(&[0.2; 2400])).await;

    wait_for(|| async { h.session.snapshot().await.agent_speaking }).await;
    wait_for(|| async { h.scheduled.lock().unwrap().len() == 2 }).await;

    // 24kHz mono 2400-sample buffers chain back-to-back.
    let starts: Vec<f64> = h.scheduled.lock().unwrap().iter().map(|(_, t)| *t).collect();
    assert_eq!(starts[0], 0.0);
    assert!((starts[1] - 0.1).abs() < 1e-9);

    h.session.stop().await;
}

#[tokio::test]
async fn test_buffer_completions_clear_speaking_flag() {
    let h = harness();
    h.session.start().await.unwrap();

    h.connector.emit(audio_event(&[0.1; 2400])).await;
    wait_for(|| async { h.session.snapshot().await.agent_speaking }).await;

    // The mock output assigned id 0 to the only scheduled buffer.
    h.completions_tx.send(0).await.unwrap();

    wait_for(|| async { !h.session.snapshot().await.agent_speaking }).await;
    assert!(!h.session.is_playing().await);

    h.session.stop().await;
}

#[tokio::test]
async fn test_interruption_stops_playback() {
    let h = harness();
    h.session.start().await.unwrap();

    h.connector.emit(audio_event(&[0.1; 24000])).await;
    wait_for(|| async { h.session.is_playing().await }).await;

    h.connector
        .emit(ServerEvent {
            interrupted: Some(true),
            ..Default::default()
        })
        .await;

    wait_for(|| async { !h.session.is_playing().await }).await;
    assert!(!h.session.snapshot().await.agent_speaking);

    h.session.stop().await;
}

#[tokio::test]
async fn test_bad_audio_payload_is_skipped_not_fatal() {
    let h = harness();
    h.session.start().await.unwrap();

    // Invalid base64, then an empty payload: both skipped.
    h.connector
        .emit(ServerEvent {
            audio: Some("not base64 ???".to_string()),
            ..Default::default()
        })
        .await;
    h.connector
        .emit(ServerEvent {
            audio: Some(String::new()),
            ..Default::default()
        })
        .await;

    // The session keeps working afterwards.
    h.connector
        .emit(ServerEvent {
            user_fragment: Some("still here".to_string()),
            turn_complete: Some(true),
            ..Default::default()
        })
        .await;

    wait_for(|| async { h.session.snapshot().await.transcript_len == 1 }).await;
    assert_eq!(h.session.snapshot().await.state, SessionState::Connected);
    assert!(h.scheduled.lock().unwrap().is_empty());

    h.session.stop().await;
}

#[tokio::test]
async fn test_remote_error_forces_full_stop() {
    let h = harness();
    h.session.start().await.unwrap();

    h.connector
        .emit(ServerEvent {
            error: Some("quota exceeded".to_string()),
            ..Default::default()
        })
        .await;

    wait_for(|| async { h.session.snapshot().await.state == SessionState::Disconnected }).await;

    let snapshot = h.session.snapshot().await;
    assert_eq!(snapshot.last_error.unwrap(), "quota exceeded");
    assert!(h.connector.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_remote_close_transitions_to_disconnected() {
    let h = harness();
    h.session.start().await.unwrap();

    h.connector
        .emit(ServerEvent {
            closed: Some(true),
            ..Default::default()
        })
        .await;

    wait_for(|| async { h.session.snapshot().await.state == SessionState::Disconnected }).await;

    // Stop after the remote already closed stays a no-op.
    h.session.stop().await;
    assert_eq!(h.session.snapshot().await.state, SessionState::Disconnected);
}

#[tokio::test]
async fn test_outbound_frames_are_encoded_and_sequenced() {
    let h = harness();
    h.session.start().await.unwrap();

    let samples = vec![0.25f32, -0.25, 0.5, -0.5];
    let tx = h.frames_tx.lock().unwrap().clone().unwrap();
    for i in 0..2 {
        tx.send(voicelink::AudioFrame {
            samples: samples.clone(),
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: i * 100,
        })
        .await
        .unwrap();
    }

    wait_for(|| async { h.connector.sent.lock().unwrap().len() == 2 }).await;

    let sent = h.connector.sent.lock().unwrap();
    assert_eq!(sent[0].sequence, 0);
    assert_eq!(sent[1].sequence, 1);
    assert_eq!(sent[0].sample_rate, 16000);
    assert_eq!(sent[0].channels, 1);

    let pcm = base64::engine::general_purpose::STANDARD
        .decode(&sent[0].pcm)
        .unwrap();
    assert_eq!(pcm, voicelink::audio::pcm::encode(&samples));
    drop(sent);

    h.session.stop().await;
}
