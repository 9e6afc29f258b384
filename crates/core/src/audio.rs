//! In-memory audio clip representation for narration playback.

use thiserror::Error;

/// Sample rate of narration clips produced by speech synthesis (Hz).
pub const NARRATION_SAMPLE_RATE: u32 = 24_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AudioError {
    #[error("audio clip is empty")]
    Empty,
}

/// A mono, 16-bit PCM audio clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioClip {
    /// Wraps already-decoded samples.
    ///
    /// # Errors
    ///
    /// Returns `AudioError::Empty` for a zero-length clip.
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Result<Self, AudioError> {
        if samples.is_empty() {
            return Err(AudioError::Empty);
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Decodes raw little-endian PCM16 bytes at the narration sample rate.
    ///
    /// A trailing odd byte is ignored rather than rejected; truncated
    /// transfers still play the audio that did arrive.
    ///
    /// # Errors
    ///
    /// Returns `AudioError::Empty` if fewer than two bytes were provided.
    pub fn from_pcm16_le(bytes: &[u8]) -> Result<Self, AudioError> {
        let samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(samples, NARRATION_SAMPLE_RATE)
    }

    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Clip length in whole milliseconds.
    #[must_use]
    pub fn duration_millis(&self) -> u64 {
        (self.samples.len() as u64 * 1_000) / u64::from(self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian_pairs() {
        let clip = AudioClip::from_pcm16_le(&[0x01, 0x00, 0xFF, 0x7F]).unwrap();
        assert_eq!(clip.samples(), &[1, i16::MAX]);
        assert_eq!(clip.sample_rate(), NARRATION_SAMPLE_RATE);
    }

    #[test]
    fn trailing_odd_byte_is_ignored() {
        let clip = AudioClip::from_pcm16_le(&[0x02, 0x00, 0xAB]).unwrap();
        assert_eq!(clip.samples(), &[2]);
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert_eq!(AudioClip::from_pcm16_le(&[]), Err(AudioError::Empty));
        assert_eq!(AudioClip::from_pcm16_le(&[0x01]), Err(AudioError::Empty));
    }

    #[test]
    fn duration_reflects_sample_rate() {
        let clip = AudioClip::new(vec![0; 24_000], NARRATION_SAMPLE_RATE).unwrap();
        assert_eq!(clip.duration_millis(), 1_000);
    }
}
