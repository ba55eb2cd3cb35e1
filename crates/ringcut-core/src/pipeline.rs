//! Pipeline orchestration: source -> decoded audio -> selection -> ringtone file

use crate::audio::Selection;
use crate::decoder::Decoder;
use crate::downloader::{validate_post_url, Downloader};
use crate::error::{DownloadError, ExportError, RingcutError};
use crate::export::ExportSession;
use crate::target::{EncodedAsset, TargetFormat};
use crate::transcoder::EngineStatus;
use crate::Config;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Where the audio comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Url(String),
}

impl Source {
    /// Existing paths are local files; anything else must be a post URL.
    pub fn parse(input: &str) -> Result<Self, DownloadError> {
        let path = Path::new(input);
        if path.exists() {
            Ok(Source::File(path.to_path_buf()))
        } else if validate_post_url(input) {
            Ok(Source::Url(input.to_string()))
        } else {
            Err(DownloadError::InvalidUrl(input.to_string()))
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source: Source,
    pub start_seconds: f64,
    /// End of the window; defaults to the longest allowed window from `start_seconds`
    pub end_seconds: Option<f64>,
    pub target: TargetFormat,
    pub output_dir: PathBuf,
}

/// Pipeline progress stages
#[derive(Debug, Clone)]
pub enum PipelineStage {
    Downloading { url: String },
    Decoding { title: String },
    Selected { selection: Selection, duration: Duration },
    Engine { status: EngineStatus },
    Encoding { target: TargetFormat },
    Complete { output: PathBuf, elapsed: Duration },
    Failed { stage: String, error: String },
}

pub struct Pipeline {
    config: PipelineConfig,
    app_config: Config,
    session: Arc<ExportSession>,
    progress_tx: mpsc::Sender<PipelineStage>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        app_config: Config,
        session: Arc<ExportSession>,
        progress_tx: mpsc::Sender<PipelineStage>,
    ) -> Self {
        Self {
            config,
            app_config,
            session,
            progress_tx,
        }
    }

    fn fail<E: std::fmt::Display>(&self, stage: &str, error: &E) {
        let _ = self.progress_tx.try_send(PipelineStage::Failed {
            stage: stage.to_string(),
            error: error.to_string(),
        });
    }

    pub async fn run(&self) -> Result<PathBuf, RingcutError> {
        let start_time = Instant::now();
        let target = self.config.target;

        if target.codec_params().is_some() {
            follow_engine(self.session.transcoder().subscribe(), self.progress_tx.downgrade());
        }

        // Warm up the codec engine while the source is fetched and decoded
        if self.app_config.transcoder.eager_load && target.codec_params().is_some() {
            let transcoder = self.session.transcoder().clone();
            tokio::spawn(async move {
                // failures are logged and retried by the export itself
                let _ = transcoder.load().await;
            });
        }

        let work_dir = tempfile::Builder::new()
            .prefix("ringcut-")
            .tempdir_in(self.app_config.workspace_root())?;
        debug!("Work directory: {}", work_dir.path().display());

        // 1. Resolve the media file
        let (media_path, title) = match self.config.source {
            Source::File(ref path) => {
                let title = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (path.clone(), title)
            }
            Source::Url(ref url) => {
                let _ = self.progress_tx.send(PipelineStage::Downloading { url: url.clone() }).await;

                let yt_dlp_path = self.app_config.yt_dlp_path()?;
                let downloader = Downloader::new(yt_dlp_path, work_dir.path().to_path_buf());
                let post = downloader.fetch(url).await.into_result().map_err(|e| {
                    self.fail("download", &e);
                    e
                })?;
                (post.media_path, post.uploader.unwrap_or(post.title))
            }
        };

        // 2. Decode
        let _ = self.progress_tx.send(PipelineStage::Decoding { title }).await;

        let decoder = Decoder::new(self.app_config.ffmpeg_path()?);
        let audio = decoder.decode(&media_path).await.map_err(|e| {
            self.fail("decode", &e);
            e
        })?;

        // 3. Select
        let extractor = self.session.extractor();
        let selection = match self.config.end_seconds {
            Some(end) => Selection::new(self.config.start_seconds, end),
            None => Selection::default_for(&audio, self.config.start_seconds, extractor.max_window()),
        }
        .and_then(|s| extractor.constrain(s))
        .map_err(|e| {
            self.fail("select", &e);
            ExportError::from(e)
        })?;

        let _ = self.progress_tx.send(PipelineStage::Selected {
            selection,
            duration: audio.duration(),
        }).await;

        // 4. Export
        let _ = self.progress_tx.send(PipelineStage::Encoding { target }).await;

        let asset = self
            .session
            .export(Some(&audio), Some(selection), target)
            .await
            .map_err(|e| {
                self.fail("export", &e);
                e
            })?;

        // 5. Deliver
        let output = deliver(&asset, &self.config.output_dir).map_err(|e| {
            self.fail("write", &e);
            e
        })?;

        let elapsed = start_time.elapsed();
        info!("Pipeline complete: {} ({:.1}s)", output.display(), elapsed.as_secs_f32());

        let _ = self.progress_tx.send(PipelineStage::Complete {
            output: output.clone(),
            elapsed,
        }).await;

        Ok(output)
    }
}

/// Forward engine lifecycle changes as progress until the pipeline's sender is gone.
fn follow_engine(
    mut status_rx: watch::Receiver<EngineStatus>,
    progress: mpsc::WeakSender<PipelineStage>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut status = *status_rx.borrow_and_update();
        loop {
            if status != EngineStatus::NotLoaded {
                let Some(tx) = progress.upgrade() else { break };
                let _ = tx.send(PipelineStage::Engine { status }).await;
            }
            if status_rx.changed().await.is_err() {
                break;
            }
            status = *status_rx.borrow_and_update();
        }
    })
}

/// Write an asset into `dir` under its suggested name.
///
/// The bytes go to a temporary file first, so a failed write never leaves a
/// truncated ringtone behind.
pub fn deliver(asset: &EncodedAsset, dir: &Path) -> Result<PathBuf, std::io::Error> {
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&asset.bytes)?;
    tmp.flush()?;

    let path = dir.join(&asset.suggested_filename);
    tmp.persist(&path).map_err(|e| e.error)?;

    debug!("Wrote {} ({})", path.display(), asset.mime_type);
    Ok(path)
}
