//! Decoded audio buffers, selections and interleaved PCM

use crate::error::{DecodeError, SelectionError};
use std::time::Duration;

/// Most channels a 16-bit WAV frame can describe (`channels * 2` fits in `u16`)
pub const MAX_CHANNELS: usize = (u16::MAX / 2) as usize;

/// Planar float audio as handed over by the decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    /// Build a buffer from per-channel samples.
    ///
    /// Every channel must hold the same number of frames.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, DecodeError> {
        if sample_rate == 0 {
            return Err(DecodeError::InvalidAudio("sample rate must be positive".to_string()));
        }
        let Some(first) = channels.first() else {
            return Err(DecodeError::InvalidAudio("at least one channel is required".to_string()));
        };
        if channels.len() > MAX_CHANNELS {
            return Err(DecodeError::InvalidAudio(format!(
                "{} channels exceeds the maximum of {}",
                channels.len(),
                MAX_CHANNELS
            )));
        }
        let frames = first.len();
        if let Some((idx, ch)) = channels.iter().enumerate().find(|(_, ch)| ch.len() != frames) {
            return Err(DecodeError::InvalidAudio(format!(
                "channel {} has {} frames, expected {}",
                idx,
                ch.len(),
                frames
            )));
        }

        Ok(Self { sample_rate, channels })
    }

    /// Split interleaved samples into planar channels.
    pub fn from_interleaved(
        sample_rate: u32,
        channel_count: u16,
        samples: &[f32],
    ) -> Result<Self, DecodeError> {
        let n = channel_count as usize;
        if n == 0 {
            return Err(DecodeError::InvalidAudio("at least one channel is required".to_string()));
        }
        if samples.len() % n != 0 {
            return Err(DecodeError::InvalidAudio(format!(
                "{} samples cannot be split into {} channels",
                samples.len(),
                n
            )));
        }

        let frames = samples.len() / n;
        let mut channels = vec![Vec::with_capacity(frames); n];
        for frame in samples.chunks_exact(n) {
            for (ch, &sample) in channels.iter_mut().zip(frame) {
                ch.push(sample);
            }
        }

        Self::new(sample_rate, channels)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        // bounded by MAX_CHANNELS in `new`
        self.channels.len() as u16
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.channels.iter().map(Vec::as_slice)
    }

    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }
}

/// A `[start, end)` window in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    start_seconds: f64,
    end_seconds: f64,
}

impl Selection {
    pub fn new(start_seconds: f64, end_seconds: f64) -> Result<Self, SelectionError> {
        if !start_seconds.is_finite() || !end_seconds.is_finite() {
            return Err(SelectionError::InvalidSelection(
                "selection bounds must be finite".to_string(),
            ));
        }
        if start_seconds < 0.0 {
            return Err(SelectionError::InvalidSelection(format!(
                "start {:.3}s is negative",
                start_seconds
            )));
        }
        if end_seconds <= start_seconds {
            return Err(SelectionError::InvalidSelection(format!(
                "end {:.3}s is not after start {:.3}s",
                end_seconds, start_seconds
            )));
        }

        Ok(Self { start_seconds, end_seconds })
    }

    /// Region the editor proposes for freshly decoded audio: up to `max_window`
    /// from `start`, bounded by the audio duration.
    pub fn default_for(
        audio: &DecodedAudio,
        start_seconds: f64,
        max_window: Duration,
    ) -> Result<Self, SelectionError> {
        let duration = audio.duration().as_secs_f64();
        let end = (start_seconds + max_window.as_secs_f64()).min(duration);
        Self::new(start_seconds, end)
    }

    pub fn start_seconds(&self) -> f64 {
        self.start_seconds
    }

    pub fn end_seconds(&self) -> f64 {
        self.end_seconds
    }

    pub fn length_seconds(&self) -> f64 {
        self.end_seconds - self.start_seconds
    }
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s..{:.3}s", self.start_seconds, self.end_seconds)
    }
}

/// Frame-interleaved float samples: `[f0c0, f0c1, .., f1c0, ..]`.
#[derive(Debug, Clone, PartialEq)]
pub struct InterleavedPcm {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl InterleavedPcm {
    pub(crate) fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_too_many_channels() {
        let err = DecodedAudio::new(8000, vec![vec![0.0; 2]; MAX_CHANNELS + 1]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidAudio(_)));

        let err = DecodedAudio::from_interleaved(8000, u16::MAX, &vec![0.0; u16::MAX as usize]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidAudio(_)));

        let widest = DecodedAudio::new(8000, vec![vec![0.0; 1]; MAX_CHANNELS]).unwrap();
        assert_eq!(widest.channel_count() as usize, MAX_CHANNELS);
    }

    #[test]
    fn test_rejects_ragged_channels() {
        let err = DecodedAudio::new(44100, vec![vec![0.0; 10], vec![0.0; 9]]).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidAudio(_)));
    }

    #[test]
    fn test_rejects_empty_and_zero_rate() {
        assert!(DecodedAudio::new(44100, vec![]).is_err());
        assert!(DecodedAudio::new(0, vec![vec![0.0; 4]]).is_err());
    }

    #[test]
    fn test_from_interleaved_splits_channels() {
        let audio = DecodedAudio::from_interleaved(8000, 2, &[1.0, -1.0, 0.5, -0.5]).unwrap();
        assert_eq!(audio.channel_count(), 2);
        assert_eq!(audio.frame_count(), 2);
        assert_eq!(audio.channel(0).unwrap(), &[1.0, 0.5]);
        assert_eq!(audio.channel(1).unwrap(), &[-1.0, -0.5]);
    }

    #[test]
    fn test_from_interleaved_rejects_partial_frame() {
        assert!(DecodedAudio::from_interleaved(8000, 2, &[1.0, -1.0, 0.5]).is_err());
    }

    #[test]
    fn test_duration() {
        let audio = DecodedAudio::new(16000, vec![vec![0.0; 48000]]).unwrap();
        assert_eq!(audio.duration(), Duration::from_secs(3));
    }

    #[test]
    fn test_selection_validation() {
        assert!(Selection::new(0.0, 5.0).is_ok());
        assert!(Selection::new(5.0, 5.0).is_err());
        assert!(Selection::new(6.0, 5.0).is_err());
        assert!(Selection::new(-1.0, 5.0).is_err());
        assert!(Selection::new(0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_default_selection_is_bounded_by_duration() {
        let audio = DecodedAudio::new(1000, vec![vec![0.0; 12_000]]).unwrap();

        let short = Selection::default_for(&audio, 0.0, Duration::from_secs(30)).unwrap();
        assert_eq!(short.end_seconds(), 12.0);

        let windowed = Selection::default_for(&audio, 2.0, Duration::from_secs(5)).unwrap();
        assert_eq!(windowed.end_seconds(), 7.0);

        assert!(Selection::default_for(&audio, 12.0, Duration::from_secs(5)).is_err());
    }
}
