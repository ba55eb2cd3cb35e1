//! Codec engine backed by the FFmpeg binary

use crate::error::TranscodeError;
use crate::transcoder::{CodecEngine, EngineLoader};
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info};

/// FFmpeg with a scratch directory that lives as long as the engine.
#[derive(Debug)]
pub struct FfmpegEngine {
    ffmpeg_path: PathBuf,
    workspace: TempDir,
}

impl FfmpegEngine {
    pub fn new(ffmpeg_path: PathBuf, workspace: TempDir) -> Self {
        Self { ffmpeg_path, workspace }
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, TranscodeError> {
        // Only bare file names; nothing may escape the workspace
        if Path::new(name).file_name().and_then(|n| n.to_str()) != Some(name) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a workspace file name: {}", name),
            )
            .into());
        }
        Ok(self.workspace.path().join(name))
    }
}

impl CodecEngine for FfmpegEngine {
    fn write_file<'a>(&'a self, name: &'a str, data: &'a [u8]) -> BoxFuture<'a, Result<(), TranscodeError>> {
        Box::pin(async move {
            let path = self.resolve(name)?;
            tokio::fs::write(&path, data).await?;
            Ok(())
        })
    }

    fn exec<'a>(&'a self, args: &'a [String]) -> BoxFuture<'a, Result<(), TranscodeError>> {
        Box::pin(async move {
            debug!("ffmpeg {}", args.join(" "));

            let output = Command::new(&self.ffmpeg_path)
                .current_dir(self.workspace.path())
                .args(["-hide_banner", "-loglevel", "error", "-y"])
                .args(args)
                .output()
                .await?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                debug!("ffmpeg stderr: {}", stderr.trim());
                return Err(TranscodeError::EngineFailed(output.status.code()));
            }
            Ok(())
        })
    }

    fn read_file<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Vec<u8>, TranscodeError>> {
        Box::pin(async move {
            let path = self.resolve(name)?;
            Ok(tokio::fs::read(&path).await?)
        })
    }

    fn delete_file<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), TranscodeError>> {
        Box::pin(async move {
            let path = self.resolve(name)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }
}

/// Locates and probes FFmpeg, then opens its workspace.
#[derive(Debug, Clone)]
pub struct FfmpegLoader {
    ffmpeg_path: Option<PathBuf>,
    workspace_root: PathBuf,
}

impl FfmpegLoader {
    pub fn new(ffmpeg_path: Option<PathBuf>, workspace_root: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            workspace_root,
        }
    }

    fn locate(&self) -> Result<PathBuf, TranscodeError> {
        match self.ffmpeg_path {
            Some(ref path) => Ok(path.clone()),
            None => which::which("ffmpeg")
                .map_err(|_| TranscodeError::EngineUnavailable("ffmpeg not found in PATH".to_string())),
        }
    }

    pub async fn open(&self) -> Result<FfmpegEngine, TranscodeError> {
        let ffmpeg_path = self.locate()?;

        let probe = Command::new(&ffmpeg_path)
            .args(["-hide_banner", "-version"])
            .output()
            .await
            .map_err(|e| {
                TranscodeError::EngineUnavailable(format!("{}: {}", ffmpeg_path.display(), e))
            })?;
        if !probe.status.success() {
            return Err(TranscodeError::EngineUnavailable(format!(
                "{} -version exited with {:?}",
                ffmpeg_path.display(),
                probe.status.code()
            )));
        }

        let version = String::from_utf8_lossy(&probe.stdout)
            .split_whitespace()
            .nth(2)
            .unwrap_or("unknown")
            .to_string();

        tokio::fs::create_dir_all(&self.workspace_root).await?;
        let workspace = tempfile::Builder::new()
            .prefix("ringcut-engine-")
            .tempdir_in(&self.workspace_root)?;

        info!(
            "Using ffmpeg {} ({}), workspace {}",
            version,
            ffmpeg_path.display(),
            workspace.path().display()
        );
        Ok(FfmpegEngine::new(ffmpeg_path, workspace))
    }
}

impl EngineLoader for FfmpegLoader {
    fn load(&self) -> BoxFuture<'_, Result<Box<dyn CodecEngine>, TranscodeError>> {
        Box::pin(async move {
            let engine = self.open().await?;
            Ok(Box::new(engine) as Box<dyn CodecEngine>)
        })
    }
}
