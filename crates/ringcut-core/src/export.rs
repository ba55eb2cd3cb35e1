//! Export boundary: selection -> interleaved PCM -> WAV -> target asset

use crate::audio::{DecodedAudio, Selection};
use crate::config::Config;
use crate::error::{ExportError, TranscodeError};
use crate::extractor::Extractor;
use crate::ffmpeg::FfmpegLoader;
use crate::target::{EncodedAsset, TargetFormat};
use crate::transcoder::SharedTranscoder;
use crate::wav;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// One editing session. Only the most recent export may deliver a result.
#[derive(Debug)]
pub struct ExportSession {
    extractor: Extractor,
    transcoder: Arc<SharedTranscoder>,
    generation: AtomicU64,
}

impl ExportSession {
    pub fn new(extractor: Extractor, transcoder: Arc<SharedTranscoder>) -> Self {
        Self {
            extractor,
            transcoder,
            generation: AtomicU64::new(0),
        }
    }

    /// Session backed by FFmpeg, configured from `config`
    pub fn from_config(config: &Config) -> Self {
        let loader = FfmpegLoader::new(config.paths.ffmpeg.clone(), config.workspace_root());
        let transcoder = SharedTranscoder::new(Box::new(loader), config.transcoder.readiness);
        let extractor = Extractor::new(config.max_window(), config.selection.policy);
        Self::new(extractor, Arc::new(transcoder))
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn transcoder(&self) -> &Arc<SharedTranscoder> {
        &self.transcoder
    }

    /// Discard the result of any export still in flight.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn export(
        &self,
        source: Option<&DecodedAudio>,
        selection: Option<Selection>,
        target: TargetFormat,
    ) -> Result<EncodedAsset, ExportError> {
        let audio = source.ok_or(ExportError::SourceNotReady)?;
        let selection = selection
            .ok_or_else(|| ExportError::InvalidSelection("no region selected".to_string()))?;

        let pcm = self.extractor.slice(audio, selection)?;
        let container = wav::encode_pcm(&pcm)?;

        // Rejected requests leave the export in flight untouched
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "Exporting {} ({} frames, {} channels) as {}",
            selection,
            pcm.frame_count(),
            pcm.channels(),
            target
        );

        // Runs detached so cleanup completes even if this future is dropped
        let transcoder = self.transcoder.clone();
        let job = tokio::spawn(async move { transcoder.transcode(&container, target).await });
        let settled = job.await.map_err(|e| {
            TranscodeError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        });

        if self.generation.load(Ordering::SeqCst) != ticket {
            debug!("Discarding superseded export #{}", ticket);
            return Err(ExportError::Superseded);
        }

        let asset = settled??;
        info!("Export ready: {} ({} bytes)", asset.suggested_filename, asset.bytes.len());
        Ok(asset)
    }
}
