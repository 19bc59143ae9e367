pub mod capture;
pub mod output;
pub mod pcm;
pub mod playback;

pub use capture::{AudioFrame, CaptureBackend, CaptureConfig, PacedCapture};
pub use output::{OutputBackend, TimerOutput};
pub use pcm::PcmBuffer;
pub use playback::PlaybackSequencer;
