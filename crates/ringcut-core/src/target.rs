//! Export targets and their codec parameters

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// iPhone ringtone: AAC in an M4A container, renamed `.m4r`
    Ios,
    /// Android ringtone: MP3
    Android,
    /// Uncompressed 16-bit PCM WAV
    Wav,
}

/// Channel layout requested from the codec engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Stereo,
    /// Keep the channel count of the source container
    Source,
}

/// Parameter set handed to the codec engine for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecParams {
    pub codec: &'static str,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub channels: ChannelLayout,
    /// FFmpeg muxer name
    pub muxer: &'static str,
    /// Extension of the file the engine writes
    pub work_extension: &'static str,
}

impl CodecParams {
    /// Engine arguments, resolving `Source` against the source channel count.
    pub fn args(&self, input: &str, output: &str, source_channels: u16) -> Vec<String> {
        let channels = match self.channels {
            ChannelLayout::Stereo => 2,
            ChannelLayout::Source => source_channels,
        };

        vec![
            "-i".to_string(),
            input.to_string(),
            "-vn".to_string(),
            "-c:a".to_string(),
            self.codec.to_string(),
            "-b:a".to_string(),
            format!("{}k", self.bitrate_kbps),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-ac".to_string(),
            channels.to_string(),
            "-f".to_string(),
            self.muxer.to_string(),
            output.to_string(),
        ]
    }
}

impl TargetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::Ios => "m4r",
            TargetFormat::Android => "mp3",
            TargetFormat::Wav => "wav",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            TargetFormat::Ios => "audio/mp4",
            TargetFormat::Android => "audio/mpeg",
            TargetFormat::Wav => "audio/wav",
        }
    }

    /// Codec parameters, or `None` when the WAV container is delivered as is.
    pub fn codec_params(&self) -> Option<CodecParams> {
        match self {
            TargetFormat::Ios => Some(CodecParams {
                codec: "aac",
                bitrate_kbps: 128,
                sample_rate: 44100,
                channels: ChannelLayout::Stereo,
                muxer: "ipod",
                work_extension: "m4a",
            }),
            TargetFormat::Android => Some(CodecParams {
                codec: "libmp3lame",
                bitrate_kbps: 192,
                sample_rate: 44100,
                channels: ChannelLayout::Source,
                muxer: "mp3",
                work_extension: "mp3",
            }),
            TargetFormat::Wav => None,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ios" | "iphone" | "m4r" => Some(TargetFormat::Ios),
            "android" | "mp3" => Some(TargetFormat::Android),
            "wav" => Some(TargetFormat::Wav),
            _ => None,
        }
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetFormat::Ios => write!(f, "iPhone (.m4r)"),
            TargetFormat::Android => write!(f, "Android (.mp3)"),
            TargetFormat::Wav => write!(f, "WAV"),
        }
    }
}

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Millisecond timestamp, strictly increasing within the process.
fn unique_stamp() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_STAMP.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// `ringtone-<timestamp>.<ext>`
pub fn ringtone_filename(target: TargetFormat) -> String {
    format!("ringtone-{}.{}", unique_stamp(), target.extension())
}

/// Final output handed to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAsset {
    pub bytes: Vec<u8>,
    pub suggested_filename: String,
    pub mime_type: &'static str,
}

impl EncodedAsset {
    pub fn new(bytes: Vec<u8>, target: TargetFormat) -> Self {
        Self {
            bytes,
            suggested_filename: ringtone_filename(target),
            mime_type: target.mime_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parameter_table() {
        let ios = TargetFormat::Ios.codec_params().unwrap();
        assert_eq!(ios.codec, "aac");
        assert_eq!(ios.bitrate_kbps, 128);
        assert_eq!(ios.sample_rate, 44100);
        assert_eq!(ios.channels, ChannelLayout::Stereo);
        assert_eq!(TargetFormat::Ios.mime_type(), "audio/mp4");

        let android = TargetFormat::Android.codec_params().unwrap();
        assert_eq!(android.codec, "libmp3lame");
        assert_eq!(android.bitrate_kbps, 192);
        assert_eq!(android.channels, ChannelLayout::Source);
        assert_eq!(TargetFormat::Android.mime_type(), "audio/mpeg");

        assert!(TargetFormat::Wav.codec_params().is_none());
    }

    #[test]
    fn test_args_resolve_channels() {
        let mp3 = TargetFormat::Android.codec_params().unwrap();
        let args = mp3.args("in.wav", "out.mp3", 1);
        let ac = args.iter().position(|a| a == "-ac").unwrap();
        assert_eq!(args[ac + 1], "1");
        assert_eq!(args.last().unwrap(), "out.mp3");
        assert!(args.contains(&"192k".to_string()));

        let aac = TargetFormat::Ios.codec_params().unwrap();
        let args = aac.args("in.wav", "out.m4a", 1);
        let ac = args.iter().position(|a| a == "-ac").unwrap();
        assert_eq!(args[ac + 1], "2");
    }

    #[test]
    fn test_from_str() {
        assert_eq!(TargetFormat::from_str("iPhone"), Some(TargetFormat::Ios));
        assert_eq!(TargetFormat::from_str("mp3"), Some(TargetFormat::Android));
        assert_eq!(TargetFormat::from_str("flac"), None);
    }

    #[test]
    fn test_filenames_are_unique() {
        let names: HashSet<String> = (0..500)
            .map(|_| ringtone_filename(TargetFormat::Android))
            .collect();
        assert_eq!(names.len(), 500);
        assert!(names.iter().all(|n| n.starts_with("ringtone-") && n.ends_with(".mp3")));
    }
}
