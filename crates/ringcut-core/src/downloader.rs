//! Post media downloader using yt-dlp

use crate::error::DownloadError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Downloader {
    yt_dlp_path: PathBuf,
    temp_dir: PathBuf,
}

/// Subset of the yt-dlp info JSON we rely on.
#[derive(Debug, Clone, Deserialize)]
struct InfoJson {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default, rename = "_filename")]
    filename: Option<String>,
}

/// A downloaded post, ready for decoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub uploader: Option<String>,
    pub duration: Option<f64>,
    pub media_path: PathBuf,
}

/// Tagged result of one download attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DownloadOutcome {
    Success { payload: Post },
    Failure { reason: String },
}

impl DownloadOutcome {
    pub fn into_result(self) -> Result<Post, DownloadError> {
        match self {
            DownloadOutcome::Success { payload } => Ok(payload),
            DownloadOutcome::Failure { reason } => Err(DownloadError::Rejected(reason)),
        }
    }
}

impl Downloader {
    pub fn new(yt_dlp_path: PathBuf, temp_dir: PathBuf) -> Self {
        Self { yt_dlp_path, temp_dir }
    }

    /// Download a post once and report the outcome.
    pub async fn fetch(&self, url: &str) -> DownloadOutcome {
        match self.download(url).await {
            Ok(payload) => DownloadOutcome::Success { payload },
            Err(e) => {
                warn!("Download of {} failed: {}", url, e);
                DownloadOutcome::Failure { reason: e.to_string() }
            }
        }
    }

    /// Download the media of a post URL
    pub async fn download(&self, url: &str) -> Result<Post, DownloadError> {
        if !validate_post_url(url) {
            return Err(DownloadError::InvalidUrl(url.to_string()));
        }
        info!("Downloading post: {}", url);

        let output_template = self.temp_dir.join("%(id)s.%(ext)s");

        let output = Command::new(&self.yt_dlp_path)
            .args([
                // Audio-only rendition when offered, the full post otherwise
                "-f", "bestaudio/best",
                "--no-playlist",
                "--no-overwrites",
                "--print-json",
                "-o",
            ])
            .arg(&output_template)
            .arg(url)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DownloadError::YtDlpNotFound
                } else {
                    DownloadError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);

            if stderr.contains("Video unavailable")
                || stderr.contains("private")
                || stderr.contains("status code 10204")
            {
                return Err(DownloadError::PostUnavailable(url.to_string()));
            }
            if stderr.contains("is not a valid URL") || stderr.contains("Unsupported URL") {
                return Err(DownloadError::InvalidUrl(url.to_string()));
            }

            return Err(DownloadError::YtDlpFailed(output.status.code()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let info = parse_info_json(&stdout)?;
        debug!("Downloaded: {:?} ({})", info.title, info.id);

        let media_path = self.find_media_file(&info)?;

        Ok(Post {
            title: info
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| info.id.clone()),
            id: info.id,
            uploader: info.uploader,
            duration: info.duration,
            media_path,
        })
    }

    fn find_media_file(&self, info: &InfoJson) -> Result<PathBuf, DownloadError> {
        if let Some(ref name) = info.filename {
            let path = Path::new(name);
            if path.exists() {
                return Ok(path.to_path_buf());
            }
        }

        let extensions = ["m4a", "mp4", "mp3", "webm", "opus", "aac"];
        for ext in extensions {
            let path = self.temp_dir.join(format!("{}.{}", info.id, ext));
            if path.exists() {
                debug!("Found media file: {}", path.display());
                return Ok(path);
            }
        }

        Err(DownloadError::NoAudioStream)
    }
}

fn parse_info_json(stdout: &str) -> Result<InfoJson, DownloadError> {
    // yt-dlp prints one JSON object per line; the last one describes the download
    let line = stdout
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with('{'))
        .ok_or_else(|| DownloadError::MetadataParse("no JSON in yt-dlp output".to_string()))?;

    serde_json::from_str(line).map_err(|e| DownloadError::MetadataParse(e.to_string()))
}

/// Validate that a string looks like a TikTok post URL
pub fn validate_post_url(url: &str) -> bool {
    let Some(rest) = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    else {
        return false;
    };

    let host = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .split(':')
        .next()
        .unwrap_or("")
        .to_lowercase();

    host == "tiktok.com" || host.ends_with(".tiktok.com")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_post_url() {
        assert!(validate_post_url("https://www.tiktok.com/@user/video/7301234567890123456"));
        assert!(validate_post_url("https://vm.tiktok.com/ZMabcdef/"));
        assert!(validate_post_url("http://tiktok.com/@user/video/1"));
        assert!(!validate_post_url("tiktok.com/@user/video/1"));
        assert!(!validate_post_url("https://example.com/?next=tiktok.com"));
        assert!(!validate_post_url("https://nottiktok.com/video"));
        assert!(!validate_post_url(""));
    }

    #[test]
    fn test_parse_last_json_line() {
        let stdout = "[info] something\n{\"id\": \"123\", \"title\": \"dance\", \"uploader\": \"someone\", \"duration\": 14.9, \"_filename\": \"/tmp/123.mp4\"}\n";
        let info = parse_info_json(stdout).unwrap();
        assert_eq!(info.id, "123");
        assert_eq!(info.title.as_deref(), Some("dance"));
        assert_eq!(info.uploader.as_deref(), Some("someone"));
        assert_eq!(info.filename.as_deref(), Some("/tmp/123.mp4"));

        assert!(parse_info_json("ERROR: nope").is_err());
    }

    #[test]
    fn test_outcome_is_tagged() {
        let outcome = DownloadOutcome::Failure {
            reason: "offline".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["reason"], "offline");
        assert!(matches!(outcome.into_result(), Err(DownloadError::Rejected(_))));
    }

    #[test]
    fn test_find_media_by_id() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("42.mp4"), b"media").unwrap();
        let downloader = Downloader::new(PathBuf::from("yt-dlp"), dir.path().to_path_buf());

        let info = InfoJson {
            id: "42".to_string(),
            title: None,
            uploader: None,
            duration: None,
            filename: None,
        };
        assert_eq!(downloader.find_media_file(&info).unwrap(), dir.path().join("42.mp4"));
    }

    #[tokio::test]
    async fn test_invalid_url_short_circuits() {
        let downloader = Downloader::new(PathBuf::from("/nonexistent/yt-dlp"), std::env::temp_dir());
        let outcome = downloader.fetch("https://example.com/watch").await;
        assert!(matches!(outcome, DownloadOutcome::Failure { .. }));
    }
}
