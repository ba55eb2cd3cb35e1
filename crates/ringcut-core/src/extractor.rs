//! Segment extraction: turn a selected window of planar audio into interleaved PCM

use crate::audio::{DecodedAudio, InterleavedPcm, Selection};
use crate::error::SelectionError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Slack for windows that measure over the maximum only through float error
const WINDOW_SLACK_SECS: f64 = 1e-6;

/// Handling of windows longer than the configured maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowPolicy {
    /// Shorten the window to exactly the maximum, keeping its start
    #[default]
    Clamp,
    /// Fail with `InvalidSelection`
    Reject,
}

#[derive(Debug, Clone)]
pub struct Extractor {
    max_window: Duration,
    policy: WindowPolicy,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), WindowPolicy::Clamp)
    }
}

impl Extractor {
    pub fn new(max_window: Duration, policy: WindowPolicy) -> Self {
        Self { max_window, policy }
    }

    pub fn max_window(&self) -> Duration {
        self.max_window
    }

    /// Apply the window policy to a selection.
    pub fn constrain(&self, selection: Selection) -> Result<Selection, SelectionError> {
        let max = self.max_window.as_secs_f64();
        if selection.length_seconds() <= max + WINDOW_SLACK_SECS {
            return Ok(selection);
        }

        match self.policy {
            WindowPolicy::Clamp => {
                let start = selection.start_seconds();
                warn!(
                    "Selection {} exceeds {:.1}s, clamping",
                    selection, max
                );
                Selection::new(start, start + max)
            }
            WindowPolicy::Reject => Err(SelectionError::InvalidSelection(format!(
                "{:.3}s window exceeds the {:.1}s maximum",
                selection.length_seconds(),
                max
            ))),
        }
    }

    /// Constrain the selection, then slice it out of `audio`.
    pub fn slice(
        &self,
        audio: &DecodedAudio,
        selection: Selection,
    ) -> Result<InterleavedPcm, SelectionError> {
        let selection = self.constrain(selection)?;
        slice(audio, selection)
    }
}

fn frame_index(seconds: f64, sample_rate: u32, frame_count: usize) -> usize {
    let frame = (seconds * sample_rate as f64).floor();
    if frame <= 0.0 {
        0
    } else {
        (frame as usize).min(frame_count)
    }
}

/// Interleave the frames of `selection` across all channels of `audio`.
pub fn slice(audio: &DecodedAudio, selection: Selection) -> Result<InterleavedPcm, SelectionError> {
    let rate = audio.sample_rate();
    let frame_count = audio.frame_count();
    let start = frame_index(selection.start_seconds(), rate, frame_count);
    let end = frame_index(selection.end_seconds(), rate, frame_count);

    if end <= start {
        return Err(SelectionError::InvalidSelection(format!(
            "{} covers no frames of {:.3}s audio",
            selection,
            audio.duration().as_secs_f64()
        )));
    }

    let channels = audio.channel_count() as usize;
    let frames = end - start;
    let mut interleaved = vec![0.0f32; frames * channels];

    for (ch_idx, channel) in audio.channels().enumerate() {
        for (offset, &sample) in channel[start..end].iter().enumerate() {
            interleaved[offset * channels + ch_idx] = sample;
        }
    }

    debug!(
        "Sliced frames {}..{} ({} channels, {} samples)",
        start,
        end,
        channels,
        interleaved.len()
    );

    Ok(InterleavedPcm::new(interleaved, rate, audio.channel_count()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rate: u32, seconds: usize, channels: usize) -> DecodedAudio {
        let frames = rate as usize * seconds;
        let data = (0..channels)
            .map(|ch| {
                (0..frames)
                    .map(|i| (ch as f32 + 1.0) * (i as f32 / frames as f32))
                    .collect()
            })
            .collect();
        DecodedAudio::new(rate, data).unwrap()
    }

    #[test]
    fn test_stereo_interleaving() {
        let audio = ramp(1000, 5, 2);
        let pcm = slice(&audio, Selection::new(1.0, 3.0).unwrap()).unwrap();

        assert_eq!(pcm.frame_count(), 2000);
        assert_eq!(pcm.samples().len(), 2 * 2000);
        assert_eq!(pcm.channels(), 2);

        let left = audio.channel(0).unwrap();
        let right = audio.channel(1).unwrap();
        for (i, frame) in pcm.samples().chunks_exact(2).enumerate() {
            assert_eq!(frame[0], left[1000 + i]);
            assert_eq!(frame[1], right[1000 + i]);
        }
    }

    #[test]
    fn test_generalizes_to_n_channels() {
        let audio = ramp(100, 1, 6);
        let pcm = slice(&audio, Selection::new(0.0, 0.5).unwrap()).unwrap();
        assert_eq!(pcm.samples().len(), 50 * 6);
        for ch in 0..6 {
            assert_eq!(pcm.samples()[10 * 6 + ch], audio.channel(ch).unwrap()[10]);
        }
    }

    #[test]
    fn test_mono_copies_range() {
        let audio = ramp(10, 2, 1);
        let pcm = slice(&audio, Selection::new(0.55, 1.0).unwrap()).unwrap();
        // floor(5.5) = 5, floor(10.0) = 10
        assert_eq!(pcm.samples(), &audio.channel(0).unwrap()[5..10]);
    }

    #[test]
    fn test_idempotent_and_source_untouched() {
        let audio = ramp(8000, 2, 2);
        let before = audio.clone();
        let selection = Selection::new(0.25, 1.75).unwrap();

        let first = slice(&audio, selection).unwrap();
        let second = slice(&audio, selection).unwrap();

        let bits = |pcm: &InterleavedPcm| pcm.samples().iter().map(|s| s.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&first), bits(&second));
        assert_eq!(audio, before);
    }

    #[test]
    fn test_end_is_clamped_to_buffer() {
        let audio = ramp(100, 2, 1);
        let pcm = slice(&audio, Selection::new(1.5, 10.0).unwrap()).unwrap();
        assert_eq!(pcm.frame_count(), 50);
    }

    #[test]
    fn test_zero_length_window_is_invalid() {
        let audio = ramp(10, 2, 1);
        // 0.10s and 0.15s both land on frame 1
        let err = slice(&audio, Selection::new(0.10, 0.15).unwrap()).unwrap_err();
        assert!(matches!(err, SelectionError::InvalidSelection(_)));
    }

    #[test]
    fn test_start_past_end_is_invalid() {
        let audio = ramp(100, 2, 1);
        let err = slice(&audio, Selection::new(5.0, 8.0).unwrap()).unwrap_err();
        assert!(matches!(err, SelectionError::InvalidSelection(_)));
    }

    #[test]
    fn test_clamp_policy_limits_to_exactly_max() {
        let extractor = Extractor::new(Duration::from_secs(30), WindowPolicy::Clamp);
        let selection = Selection::new(2.0, 40.0).unwrap();

        let clamped = extractor.constrain(selection).unwrap();
        assert_eq!(clamped.start_seconds(), 2.0);
        assert_eq!(clamped.length_seconds(), 30.0);

        let audio = ramp(100, 60, 1);
        let pcm = extractor.slice(&audio, selection).unwrap();
        assert_eq!(pcm.frame_count(), 30 * 100);
    }

    #[test]
    fn test_reject_policy_refuses_long_windows() {
        let extractor = Extractor::new(Duration::from_secs(30), WindowPolicy::Reject);
        let err = extractor.constrain(Selection::new(0.0, 30.5).unwrap()).unwrap_err();
        assert!(matches!(err, SelectionError::InvalidSelection(_)));

        let exact = extractor.constrain(Selection::new(0.0, 30.0).unwrap()).unwrap();
        assert_eq!(exact.length_seconds(), 30.0);
    }

    #[test]
    fn test_float_error_does_not_exceed_max() {
        // (12.7 + 30.0) - 12.7 measures 30.000000000000004
        let reject = Extractor::new(Duration::from_secs(30), WindowPolicy::Reject);
        let selection = Selection::new(12.7, 42.7).unwrap();
        assert_eq!(reject.constrain(selection).unwrap(), selection);

        let clamp = Extractor::new(Duration::from_secs(30), WindowPolicy::Clamp);
        let once = clamp.constrain(Selection::new(12.7, 50.0).unwrap()).unwrap();
        let twice = clamp.constrain(once).unwrap();
        assert_eq!(once, twice);
        assert!(reject.constrain(once).is_ok());

        assert!(reject.constrain(Selection::new(12.7, 42.71).unwrap()).is_err());
    }
}
