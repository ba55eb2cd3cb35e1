//! ringcut-core: Segment extraction and ringtone encoding

pub mod audio;
pub mod config;
pub mod decoder;
pub mod downloader;
pub mod error;
pub mod export;
pub mod extractor;
pub mod ffmpeg;
pub mod pipeline;
pub mod target;
pub mod transcoder;
pub mod wav;

pub use audio::{DecodedAudio, InterleavedPcm, Selection};
pub use config::Config;
pub use error::{ExportError, Result, RingcutError};
pub use export::ExportSession;
pub use target::{EncodedAsset, TargetFormat};
