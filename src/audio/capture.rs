use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// A chunk of captured microphone audio (float samples, mono)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Float samples in [-1, 1]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for microphone capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Capture sample rate (the remote session expects 16 kHz input)
    pub sample_rate: u32,
    /// Channel count (1 = mono)
    pub channels: u16,
    /// Samples per delivered frame
    pub frame_samples: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz mono is the fixed input format
            channels: 1,
            frame_samples: 1600, // 100ms frames
        }
    }
}

/// Microphone capture backend trait
///
/// A backend owns the underlying device and delivers fixed-size frames over
/// a channel. `start` may suspend while the platform asks the user for
/// microphone permission; a refusal surfaces as an error here and is mapped
/// to `VoiceError::PermissionDenied` by the session controller.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing; returns a receiver of captured frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing and release the device
    async fn stop(&mut self) -> Result<()>;

    /// Whether the backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Capture backend that emits silent frames at the real-time frame cadence.
///
/// Stands in for a device microphone in the service binary and in tests;
/// frame pacing and shape match what a real backend would deliver.
pub struct PacedCapture {
    config: CaptureConfig,
    task: Option<JoinHandle<()>>,
}

impl PacedCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config, task: None }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for PacedCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(16);

        let config = self.config.clone();
        let frame_ms = (config.frame_samples as u64 * 1000) / config.sample_rate as u64;

        info!(
            "Starting paced capture: {}Hz, {} samples/frame ({}ms)",
            config.sample_rate, config.frame_samples, frame_ms
        );

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(frame_ms));
            let mut elapsed_ms = 0u64;

            loop {
                interval.tick().await;

                let frame = AudioFrame {
                    samples: vec![0.0; config.frame_samples],
                    sample_rate: config.sample_rate,
                    channels: config.channels,
                    timestamp_ms: elapsed_ms,
                };
                elapsed_ms += frame_ms;

                if tx.send(frame).await.is_err() {
                    // Receiver dropped; the session is tearing down.
                    break;
                }
            }
        });

        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.is_some()
    }

    fn name(&self) -> &str {
        "paced-silence"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_config_default() {
        let config = CaptureConfig::default();

        assert_eq!(config.sample_rate, 16000, "Input format is fixed at 16kHz");
        assert_eq!(config.channels, 1, "Input format is mono");
        assert_eq!(config.frame_samples, 1600, "Default frame is 100ms");
    }

    #[tokio::test]
    async fn test_paced_capture_delivers_frames() {
        let mut backend = PacedCapture::new(CaptureConfig {
            sample_rate: 16000,
            channels: 1,
            frame_samples: 160, // 10ms frames so the test stays fast
        });

        assert!(!backend.is_capturing());

        let mut rx = backend.start().await.unwrap();
        assert!(backend.is_capturing());

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.samples.len(), 160);
        assert_eq!(frame.sample_rate, 16000);
        assert_eq!(frame.channels, 1);

        backend.stop().await.unwrap();
        assert!(!backend.is_capturing());
    }
}
