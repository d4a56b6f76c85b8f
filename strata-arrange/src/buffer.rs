//! Decoded audio buffers and the decode-collaborator contract

use thiserror::Error;

/// Errors reported by the decode collaborator
///
/// A failed decode never tears down playback: the affected clip simply has
/// no buffer and stays silent until corrected.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in data")]
    NoAudioTrack,
    #[error("Unsupported format")]
    UnsupportedFormat,
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Summary of a decode result, as handed to the UI layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedInfo {
    pub duration_secs: f64,
    pub channels: u16,
    pub sample_rate: u32,
}

/// Contract for the file-decoding collaborator: raw bytes in, a decoded
/// buffer out. Decoding internals live outside this workspace; the engine
/// only consumes the result.
pub trait MediaDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer, DecodeError>;
}

/// Immutable decoded sample data
///
/// Samples are interleaved stereo f32 normalized to -1.0..1.0, regardless of
/// the source channel layout (the decoder upmixes/downmixes). Buffers are
/// shared as `Arc<AudioBuffer>` and never copied through channels.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: u16,
    samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels,
            samples,
        }
    }

    /// Source sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count of the original source material
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Interleaved stereo samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Native duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn info(&self) -> DecodedInfo {
        DecodedInfo {
            duration_secs: self.duration_secs(),
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_from_frames() {
        let buffer = AudioBuffer::new(48000, 2, vec![0.0; 96000]);
        assert_eq!(buffer.frames(), 48000);
        assert!(
            (buffer.duration_secs() - 1.0).abs() < 1e-9,
            "48000 frames at 48kHz should be 1s, got {}",
            buffer.duration_secs()
        );
    }

    #[test]
    fn test_empty_buffer_zero_duration() {
        let buffer = AudioBuffer::new(48000, 2, Vec::new());
        assert_eq!(buffer.duration_secs(), 0.0);
    }

    #[test]
    fn test_zero_sample_rate_is_safe() {
        let buffer = AudioBuffer::new(0, 2, vec![0.0; 128]);
        assert_eq!(buffer.duration_secs(), 0.0);
    }

    #[test]
    fn test_info_reports_source_metadata() {
        let buffer = AudioBuffer::new(44100, 1, vec![0.0; 88200]);
        let info = buffer.info();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 1);
        assert!((info.duration_secs - 1.0).abs() < 1e-9);
    }
}
