//! Error types for ringcut-core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RingcutError>;

#[derive(Error, Debug)]
pub enum RingcutError {
    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("yt-dlp not found. Install with: brew install yt-dlp")]
    YtDlpNotFound,

    #[error("yt-dlp failed with exit code: {0:?}")]
    YtDlpFailed(Option<i32>),

    #[error("Invalid URL, or missing TikTok URL: {0}")]
    InvalidUrl(String),

    #[error("Post unavailable or private: {0}")]
    PostUnavailable(String),

    #[error("No audio stream available")]
    NoAudioStream,

    #[error("Failed to parse metadata: {0}")]
    MetadataParse(String),

    #[error("Download rejected: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("FFmpeg not found. Install with: brew install ffmpeg")]
    FfmpegNotFound,

    #[error("FFmpeg failed with exit code: {0:?}")]
    FfmpegFailed(Option<i32>),

    #[error("No audio stream found in {0}")]
    NoAudioStream(String),

    #[error("Invalid audio buffer: {0}")]
    InvalidAudio(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Invalid PCM layout: {0}")]
    InvalidLayout(String),

    #[error("PCM data of {0} bytes does not fit a RIFF container")]
    TooLarge(usize),

    #[error("Malformed WAV header: {0}")]
    MalformedHeader(String),
}

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Codec engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Codec engine has not finished loading")]
    NotLoaded,

    #[error("Codec engine failed with exit code: {0:?}")]
    EngineFailed(Option<i32>),

    #[error("Codec engine produced no output")]
    EmptyOutput,

    #[error("Input is not a usable container: {0}")]
    InvalidContainer(#[from] EncodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures surfaced at the export boundary.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Please select a region first: {0}")]
    InvalidSelection(String),

    #[error("Audio data not ready yet")]
    SourceNotReady,

    #[error("Transcoding failed: {0}")]
    TranscodeFailure(TranscodeError),

    #[error("Codec engine is still loading, try again shortly")]
    TranscoderNotLoaded,

    #[error("Encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("Export superseded by a newer request")]
    Superseded,
}

impl From<SelectionError> for ExportError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::InvalidSelection(reason) => ExportError::InvalidSelection(reason),
        }
    }
}

impl From<TranscodeError> for ExportError {
    fn from(err: TranscodeError) -> Self {
        match err {
            TranscodeError::NotLoaded => ExportError::TranscoderNotLoaded,
            other => ExportError::TranscodeFailure(other),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadError(String),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}
