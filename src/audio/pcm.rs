// PCM conversion between float samples and the 16-bit little-endian wire
// format the remote session expects.
//
// Encoding is deterministic and lossy: samples are clamped to [-1, 1] and
// scaled by 32767. Decoding divides by 32768; a trailing odd byte is
// dropped rather than treated as an error.

use crate::error::VoiceError;

/// A decoded audio buffer ready for the playback sequencer.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    /// Float samples in [-1, 1], interleaved if multi-channel
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}

impl PcmBuffer {
    /// Playback duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

/// Convert float samples to 16-bit little-endian PCM bytes.
///
/// Out-of-range input is clamped, never rejected.
pub fn encode(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Convert 16-bit little-endian PCM bytes back to float samples.
///
/// A trailing partial sample is truncated.
pub fn decode(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// Decode a raw payload into a buffer the playback sequencer can schedule.
pub fn decode_to_buffer(
    bytes: &[u8],
    sample_rate: u32,
    channels: u16,
) -> Result<PcmBuffer, VoiceError> {
    if bytes.is_empty() {
        return Err(VoiceError::Decode("empty audio payload".to_string()));
    }

    Ok(PcmBuffer {
        samples: decode(bytes),
        sample_rate,
        channels,
    })
}
