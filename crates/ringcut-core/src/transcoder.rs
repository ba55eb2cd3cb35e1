//! Process-wide codec engine with a serialized transcode queue
//!
//! The engine is loaded at most once and then shared. Jobs run one at a time
//! behind a mutex, and every job's scratch files are deleted whether the job
//! succeeded or not.

use crate::error::TranscodeError;
use crate::target::{CodecParams, EncodedAsset, TargetFormat};
use crate::wav::WavHeader;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex, OnceCell};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Black-box codec engine operating on a private file workspace.
pub trait CodecEngine: Send + Sync {
    fn write_file<'a>(&'a self, name: &'a str, data: &'a [u8]) -> BoxFuture<'a, Result<(), TranscodeError>>;

    fn exec<'a>(&'a self, args: &'a [String]) -> BoxFuture<'a, Result<(), TranscodeError>>;

    fn read_file<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Vec<u8>, TranscodeError>>;

    /// Remove a workspace file. Missing files are not an error.
    fn delete_file<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), TranscodeError>>;
}

/// Produces the engine on first use.
pub trait EngineLoader: Send + Sync {
    fn load(&self) -> BoxFuture<'_, Result<Box<dyn CodecEngine>, TranscodeError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    NotLoaded,
    Loading,
    Ready,
    Busy,
    /// Last load attempt failed; the next request retries
    Failed,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineStatus::NotLoaded => write!(f, "not loaded"),
            EngineStatus::Loading => write!(f, "loading"),
            EngineStatus::Ready => write!(f, "ready"),
            EngineStatus::Busy => write!(f, "busy"),
            EngineStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What a transcode request does while the engine is not ready yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessPolicy {
    /// Load the engine, or wait for the load in flight
    #[default]
    Wait,
    /// Fail with `NotLoaded`
    Reject,
}

pub struct SharedTranscoder {
    loader: Box<dyn EngineLoader>,
    engine: OnceCell<Mutex<Box<dyn CodecEngine>>>,
    status: watch::Sender<EngineStatus>,
    jobs: watch::Sender<usize>,
    readiness: ReadinessPolicy,
}

impl std::fmt::Debug for SharedTranscoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTranscoder")
            .field("status", &*self.status.borrow())
            .field("jobs", &*self.jobs.borrow())
            .field("readiness", &self.readiness)
            .finish()
    }
}

/// Flips the status back to `Ready` once a job settles, even if its future is dropped.
struct BusyGuard<'a>(&'a watch::Sender<EngineStatus>);

impl<'a> BusyGuard<'a> {
    fn enter(status: &'a watch::Sender<EngineStatus>) -> Self {
        status.send_replace(EngineStatus::Busy);
        Self(status)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(EngineStatus::Ready);
    }
}

/// Counts a request from entry until it settles.
struct JobGuard<'a>(&'a watch::Sender<usize>);

impl<'a> JobGuard<'a> {
    fn enter(jobs: &'a watch::Sender<usize>) -> Self {
        jobs.send_modify(|n| *n += 1);
        Self(jobs)
    }
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n -= 1);
    }
}

impl SharedTranscoder {
    pub fn new(loader: Box<dyn EngineLoader>, readiness: ReadinessPolicy) -> Self {
        let (status, _) = watch::channel(EngineStatus::NotLoaded);
        let (jobs, _) = watch::channel(0);
        Self {
            loader,
            engine: OnceCell::new(),
            status,
            jobs,
            readiness,
        }
    }

    pub fn status(&self) -> EngineStatus {
        *self.status.borrow()
    }

    /// Follow lifecycle changes (loading indicator, diagnostics).
    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status.subscribe()
    }

    /// Resolves once no transcode request is queued or running.
    pub async fn idle(&self) {
        let mut rx = self.jobs.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Load the engine if it is not loaded yet. Concurrent callers share one load.
    pub async fn load(&self) -> Result<(), TranscodeError> {
        self.engine_or_load().await.map(|_| ())
    }

    async fn engine_or_load(&self) -> Result<&Mutex<Box<dyn CodecEngine>>, TranscodeError> {
        self.engine
            .get_or_try_init(|| async {
                self.status.send_replace(EngineStatus::Loading);
                info!("Loading codec engine");

                match self.loader.load().await {
                    Ok(engine) => {
                        self.status.send_replace(EngineStatus::Ready);
                        info!("Codec engine ready");
                        Ok(Mutex::new(engine))
                    }
                    Err(e) => {
                        self.status.send_replace(EngineStatus::Failed);
                        warn!("Codec engine failed to load: {}", e);
                        Err(e)
                    }
                }
            })
            .await
    }

    /// Re-encode a WAV container for `target`.
    pub async fn transcode(
        &self,
        container: &[u8],
        target: TargetFormat,
    ) -> Result<EncodedAsset, TranscodeError> {
        let _job = JobGuard::enter(&self.jobs);
        let header = WavHeader::parse(container)?;

        let Some(params) = target.codec_params() else {
            return Ok(EncodedAsset::new(container.to_vec(), target));
        };

        let engine = match self.readiness {
            ReadinessPolicy::Wait => self.engine_or_load().await?,
            ReadinessPolicy::Reject => self.engine.get().ok_or(TranscodeError::NotLoaded)?,
        };

        let engine = engine.lock().await;
        let _busy = BusyGuard::enter(&self.status);

        info!("Transcoding to {}", target);
        let bytes = run_job(&**engine, container, &params, header.channels).await?;
        debug!("Transcoded {} -> {} bytes", container.len(), bytes.len());

        Ok(EncodedAsset::new(bytes, target))
    }
}

async fn run_job(
    engine: &dyn CodecEngine,
    container: &[u8],
    params: &CodecParams,
    source_channels: u16,
) -> Result<Vec<u8>, TranscodeError> {
    let job = Uuid::new_v4().simple().to_string();
    let input = format!("{}-input.wav", job);
    let output = format!("{}-output.{}", job, params.work_extension);

    let result = async {
        engine.write_file(&input, container).await?;
        let args = params.args(&input, &output, source_channels);
        engine.exec(&args).await?;

        let bytes = engine.read_file(&output).await?;
        if bytes.is_empty() {
            return Err(TranscodeError::EmptyOutput);
        }
        Ok(bytes)
    }
    .await;

    for name in [&input, &output] {
        if let Err(e) = engine.delete_file(name).await {
            warn!("Failed to delete scratch file {}: {}", name, e);
        }
    }

    result
}
