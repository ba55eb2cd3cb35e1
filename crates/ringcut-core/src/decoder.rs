//! Audio decoder using FFmpeg

use crate::audio::DecodedAudio;
use crate::error::DecodeError;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Decoder {
    ffmpeg_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub duration: f64,
}

impl Decoder {
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        Self { ffmpeg_path }
    }

    /// Decode the first audio stream of `input` to planar 32-bit float samples
    pub async fn decode(&self, input: &Path) -> Result<DecodedAudio, DecodeError> {
        let info = self.get_audio_info(input).await?;
        info!(
            "Decoding {} ({} Hz, {} channels, {:.1}s)",
            input.display(),
            info.sample_rate,
            info.channels,
            info.duration
        );

        let output = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error"])
            .arg("-i")
            .arg(input)
            .args(["-vn", "-map", "0:a:0"])
            .args(["-ac", &info.channels.to_string()])
            .args(["-ar", &info.sample_rate.to_string()])
            .args(["-f", "f32le", "-acodec", "pcm_f32le", "-"])
            .output()
            .await
            .map_err(map_spawn_error)?;

        if !output.status.success() {
            debug!("ffmpeg stderr: {}", String::from_utf8_lossy(&output.stderr));
            return Err(DecodeError::FfmpegFailed(output.status.code()));
        }

        let samples: Vec<f32> = output
            .stdout
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let audio = DecodedAudio::from_interleaved(info.sample_rate, info.channels, &samples)?;
        debug!("Decoded {} frames", audio.frame_count());
        Ok(audio)
    }

    /// Get audio stream info (sample rate, channels, duration)
    pub async fn get_audio_info(&self, input: &Path) -> Result<AudioInfo, DecodeError> {
        let output = Command::new(&self.ffmpeg_path)
            .arg("-hide_banner")
            .arg("-i")
            .arg(input)
            .output()
            .await
            .map_err(map_spawn_error)?;

        // FFmpeg prints stream info to stderr (and exits non-zero without an output)
        let stderr = String::from_utf8_lossy(&output.stderr);
        parse_audio_info(&stderr).ok_or_else(|| DecodeError::NoAudioStream(input.display().to_string()))
    }
}

fn map_spawn_error(e: std::io::Error) -> DecodeError {
    if e.kind() == std::io::ErrorKind::NotFound {
        DecodeError::FfmpegNotFound
    } else {
        DecodeError::Io(e)
    }
}

fn parse_audio_info(ffmpeg_output: &str) -> Option<AudioInfo> {
    let re = Regex::new(r"Audio: [^\n]*?(\d+) Hz, ([^,\n]+)").ok()?;
    let caps = re.captures(ffmpeg_output)?;

    let sample_rate = caps.get(1)?.as_str().parse().ok()?;
    let channels = parse_channels(caps.get(2)?.as_str()).unwrap_or(2);
    let duration = parse_duration(ffmpeg_output).unwrap_or(0.0);

    Some(AudioInfo {
        sample_rate,
        channels,
        duration,
    })
}

fn parse_channels(layout: &str) -> Option<u16> {
    let layout = layout.trim();
    if let Some(count) = layout.strip_suffix(" channels") {
        return count.trim().parse().ok();
    }

    match layout.split('(').next()? {
        "mono" => Some(1),
        "stereo" | "downmix" => Some(2),
        "2.1" | "3.0" => Some(3),
        "quad" | "4.0" => Some(4),
        "5.0" => Some(5),
        "5.1" | "6.0" => Some(6),
        "7.0" | "6.1" => Some(7),
        "7.1" => Some(8),
        _ => None,
    }
}

fn parse_duration(ffmpeg_output: &str) -> Option<f64> {
    // Look for pattern like "Duration: 00:03:45.12"
    let re = Regex::new(r"Duration: (\d+):(\d+):(\d+)\.(\d+)").ok()?;
    let caps = re.captures(ffmpeg_output)?;

    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    let centiseconds: f64 = caps.get(4)?.as_str().parse().ok()?;

    Some(hours * 3600.0 + minutes * 60.0 + seconds + centiseconds / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE: &str = "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'post.mp4':
  Duration: 00:00:15.07, start: 0.000000, bitrate: 1203 kb/s
  Stream #0:0[0x1](und): Video: h264 (High) (avc1 / 0x31637661), yuv420p, 576x1024, 1068 kb/s, 30 fps
  Stream #0:1[0x2](und): Audio: aac (LC) (mp4a / 0x6134706D), 44100 Hz, stereo, fltp, 128 kb/s (default)
At least one output file must be specified";

    #[test]
    fn test_parse_probe_output() {
        let info = parse_audio_info(PROBE).unwrap();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 2);
        assert!((info.duration - 15.07).abs() < 1e-9);
    }

    #[test]
    fn test_video_only_has_no_audio() {
        let probe = "  Duration: 00:00:05.00, start: 0.000000\n  Stream #0:0: Video: h264, yuv420p, 30 fps, 48000 Hz, stereo";
        assert!(parse_audio_info(probe).is_none());
    }

    #[test]
    fn test_parse_channels() {
        assert_eq!(parse_channels("mono"), Some(1));
        assert_eq!(parse_channels(" stereo"), Some(2));
        assert_eq!(parse_channels("5.1(side)"), Some(6));
        assert_eq!(parse_channels("3 channels"), Some(3));
        assert_eq!(parse_channels("fltp"), None);
    }

    #[tokio::test]
    async fn test_missing_ffmpeg() {
        let decoder = Decoder::new(PathBuf::from("/nonexistent/ringcut/ffmpeg"));
        let err = decoder.decode(Path::new("post.mp4")).await.unwrap_err();
        assert!(matches!(err, DecodeError::FfmpegNotFound));
    }
}
