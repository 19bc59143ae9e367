// Gapless playback sequencing for streamed agent audio.
//
// Inbound audio arrives in discrete payloads faster than real time. The
// sequencer schedules each decoded buffer back-to-back against the output
// clock so playback is continuous, and supports immediate interruption when
// the user starts talking over the agent.

use std::collections::HashSet;

use tracing::debug;

use super::output::OutputBackend;
use super::pcm::PcmBuffer;

/// Schedules decoded audio buffers for back-to-back playback.
pub struct PlaybackSequencer {
    output: Box<dyn OutputBackend>,
    /// Clock time at which the next buffer should start
    next_start: f64,
    /// Ids of buffers currently scheduled or playing
    active: HashSet<u64>,
}

impl PlaybackSequencer {
    pub fn new(output: Box<dyn OutputBackend>) -> Self {
        Self {
            output,
            next_start: 0.0,
            active: HashSet::new(),
        }
    }

    /// Schedule a buffer for gapless playback.
    ///
    /// The buffer starts at the later of the cursor and the current output
    /// clock, and the cursor advances by the buffer's duration so queued
    /// buffers play back-to-back. Returns the scheduled start time.
    pub fn enqueue(&mut self, buffer: PcmBuffer) -> f64 {
        let start = self.next_start.max(self.output.clock());
        let duration = buffer.duration_secs();

        let id = self.output.schedule(buffer, start);
        self.active.insert(id);
        self.next_start = start + duration;

        debug!(
            "Enqueued buffer {}: start={:.3}s, duration={:.3}s, {} active",
            id,
            start,
            duration,
            self.active.len()
        );

        start
    }

    /// Record that a buffer finished playing naturally.
    ///
    /// Returns true when this was the last active buffer, i.e. the agent
    /// finished speaking. Unknown ids (already interrupted) are ignored.
    pub fn complete(&mut self, id: u64) -> bool {
        self.active.remove(&id) && self.active.is_empty()
    }

    /// Stop all playback immediately and reset the scheduling cursor.
    ///
    /// Safe to call at any time, including with nothing playing; the cursor
    /// reset means the next enqueue starts at the then-current clock.
    pub fn interrupt(&mut self) {
        if !self.active.is_empty() {
            debug!("Interrupting {} active buffers", self.active.len());
        }

        for id in self.active.drain() {
            self.output.stop(id);
        }
        self.next_start = 0.0;
    }

    /// Teardown path; identical to `interrupt`.
    pub fn shutdown(&mut self) {
        self.interrupt();
    }

    /// Whether any buffer is scheduled or playing.
    pub fn is_playing(&self) -> bool {
        !self.active.is_empty()
    }
}
