//! Canonical 16-bit PCM RIFF/WAVE container with peak normalization

use crate::audio::InterleavedPcm;
use crate::error::EncodeError;
use tracing::debug;

pub const HEADER_LEN: usize = 44;

/// Fraction of full scale the loudest sample is normalized to.
pub const PEAK_TARGET: f32 = 0.95;

const FORMAT_PCM: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

/// Fields of a canonical WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub channels: u16,
    pub sample_rate: u32,
    pub data_len: u32,
}

impl WavHeader {
    /// Bytes per frame and per second, checked against the header field widths.
    fn layout(&self) -> Result<(u16, u32), EncodeError> {
        let block_align = self.channels.checked_mul(BITS_PER_SAMPLE / 8).ok_or_else(|| {
            EncodeError::InvalidLayout(format!("{} channels do not fit a 16-bit frame", self.channels))
        })?;
        let byte_rate = self.sample_rate.checked_mul(block_align as u32).ok_or_else(|| {
            EncodeError::InvalidLayout(format!(
                "{} Hz at {} bytes per frame overflows the byte rate",
                self.sample_rate, block_align
            ))
        })?;
        Ok((block_align, byte_rate))
    }

    pub fn byte_rate(&self) -> Result<u32, EncodeError> {
        self.layout().map(|(_, byte_rate)| byte_rate)
    }

    pub fn block_align(&self) -> Result<u16, EncodeError> {
        self.layout().map(|(block_align, _)| block_align)
    }

    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        let (block_align, byte_rate) = self.layout()?;

        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + self.data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");

        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
        out.extend_from_slice(&self.channels.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

        out.extend_from_slice(b"data");
        out.extend_from_slice(&self.data_len.to_le_bytes());
        Ok(())
    }

    /// Parse the 44-byte header written by [`encode_wav`].
    pub fn parse(bytes: &[u8]) -> Result<Self, EncodeError> {
        if bytes.len() < HEADER_LEN {
            return Err(EncodeError::MalformedHeader(format!(
                "{} bytes is shorter than a header",
                bytes.len()
            )));
        }

        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };

        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(EncodeError::MalformedHeader("missing RIFF/WAVE magic".to_string()));
        }
        if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
            return Err(EncodeError::MalformedHeader("unexpected chunk layout".to_string()));
        }
        if u16_at(20) != FORMAT_PCM || u16_at(34) != BITS_PER_SAMPLE {
            return Err(EncodeError::MalformedHeader(format!(
                "format {} at {} bits is not 16-bit PCM",
                u16_at(20),
                u16_at(34)
            )));
        }

        let header = Self {
            channels: u16_at(22),
            sample_rate: u32_at(24),
            data_len: u32_at(40),
        };
        if header.channels == 0 {
            return Err(EncodeError::MalformedHeader("zero channels".to_string()));
        }
        header.layout()?;
        Ok(header)
    }
}

/// Largest absolute sample value.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// Gain that brings `peak` to [`PEAK_TARGET`]; unity for silence.
pub fn normalization_gain(peak: f32) -> f32 {
    if peak > 0.0 {
        PEAK_TARGET / peak
    } else {
        1.0
    }
}

/// Apply gain, clamp to [-1, 1] and map onto the asymmetric i16 range.
pub fn quantize(sample: f32, gain: f32) -> i16 {
    let s = (sample * gain).clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Normalize, quantize and wrap interleaved samples in a WAV container.
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>, EncodeError> {
    if channels == 0 {
        return Err(EncodeError::InvalidLayout("zero channels".to_string()));
    }
    if samples.len() % channels as usize != 0 {
        return Err(EncodeError::InvalidLayout(format!(
            "{} samples is not a whole number of {}-channel frames",
            samples.len(),
            channels
        )));
    }

    let data_bytes = samples.len() * 2;
    let data_len = u32::try_from(data_bytes)
        .ok()
        .filter(|len| *len <= u32::MAX - 36)
        .ok_or(EncodeError::TooLarge(data_bytes))?;

    let peak = peak(samples);
    let gain = normalization_gain(peak);
    debug!("Peak {:.4}, gain {:.4}", peak, gain);

    let header = WavHeader {
        channels,
        sample_rate,
        data_len,
    };
    header.layout()?;

    let mut out = Vec::with_capacity(HEADER_LEN + data_bytes);
    header.write_to(&mut out)?;
    for &sample in samples {
        out.extend_from_slice(&quantize(sample, gain).to_le_bytes());
    }

    Ok(out)
}

/// [`encode_wav`] for an extractor result.
pub fn encode_pcm(pcm: &InterleavedPcm) -> Result<Vec<u8>, EncodeError> {
    encode_wav(pcm.samples(), pcm.sample_rate(), pcm.channels())
}
