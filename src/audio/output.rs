use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::pcm::PcmBuffer;

/// Audio output backend trait
///
/// The playback sequencer talks to the output device purely through this
/// interface: a monotonic playback clock, deadline scheduling, and immediate
/// cancellation. Natural end-of-buffer completions are reported out of band
/// on the completion channel handed out at construction time.
pub trait OutputBackend: Send {
    /// Current playback clock in seconds
    fn clock(&self) -> f64;

    /// Schedule a buffer to start playing at `when` (clock seconds);
    /// returns an id for the scheduled buffer
    fn schedule(&mut self, buffer: PcmBuffer, when: f64) -> u64;

    /// Stop a scheduled or playing buffer immediately; a stopped buffer
    /// never reports a completion
    fn stop(&mut self, id: u64);

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Output backend that emulates a real-time audio device with timers.
///
/// Buffers are not rendered anywhere; each scheduled buffer completes after
/// its wall-clock deadline passes. Used by the service binary and anywhere a
/// physical output device is unavailable.
pub struct TimerOutput {
    epoch: Instant,
    next_id: u64,
    pending: HashMap<u64, JoinHandle<()>>,
    completions: mpsc::Sender<u64>,
}

impl TimerOutput {
    /// Create the backend and the channel on which buffer completions arrive.
    pub fn new() -> (Self, mpsc::Receiver<u64>) {
        let (tx, rx) = mpsc::channel(64);
        (
            Self {
                epoch: Instant::now(),
                next_id: 0,
                pending: HashMap::new(),
                completions: tx,
            },
            rx,
        )
    }
}

impl OutputBackend for TimerOutput {
    fn clock(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn schedule(&mut self, buffer: PcmBuffer, when: f64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let ends_at = when + buffer.duration_secs();
        let delay = (ends_at - self.clock()).max(0.0);
        let completions = self.completions.clone();

        debug!("Scheduled buffer {} at {:.3}s (ends {:.3}s)", id, when, ends_at);

        let task = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs_f64(delay)).await;
            let _ = completions.send(id).await;
        });

        self.pending.insert(id, task);
        id
    }

    fn stop(&mut self, id: u64) {
        if let Some(task) = self.pending.remove(&id) {
            task.abort();
        }
    }

    fn name(&self) -> &str {
        "timer"
    }
}
