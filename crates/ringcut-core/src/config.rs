//! Configuration management for ringcut

use crate::error::ConfigError;
use crate::extractor::WindowPolicy;
use crate::target::TargetFormat;
use crate::transcoder::ReadinessPolicy;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    pub selection: SelectionConfig,
    pub transcoder: TranscoderConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Path to yt-dlp binary (auto-detected if not set)
    pub yt_dlp: Option<PathBuf>,
    /// Path to FFmpeg binary (auto-detected if not set)
    pub ffmpeg: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Longest ringtone window in seconds (default: 30)
    pub max_window_secs: f64,
    /// What to do with longer windows: "clamp" or "reject"
    pub policy: WindowPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Start loading the codec engine as soon as the CLI starts
    pub eager_load: bool,
    /// Behaviour when an export arrives before the engine is ready
    pub readiness: ReadinessPolicy,
    /// Root for the engine scratch workspace (uses system temp if not set)
    pub workspace: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default export target
    pub default_target: TargetFormat,
    /// Default output directory
    pub default_directory: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                yt_dlp: None,
                ffmpeg: None,
            },
            selection: SelectionConfig {
                max_window_secs: 30.0,
                policy: WindowPolicy::Clamp,
            },
            transcoder: TranscoderConfig {
                eager_load: true,
                readiness: ReadinessPolicy::Wait,
                workspace: None,
            },
            output: OutputConfig {
                default_target: TargetFormat::Ios,
                default_directory: PathBuf::from("."),
            },
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()));

        // Load from default config directory
        if let Some(config_dir) = dirs::config_dir() {
            let default_config = config_dir.join("ringcut/config.toml");
            if default_config.exists() {
                figment = figment.merge(Toml::file(&default_config));
            }
        }

        // Load from specified config file
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }

        // RINGCUT_SELECTION__MAX_WINDOW_SECS=20 -> selection.max_window_secs
        figment = figment.merge(Env::prefixed("RINGCUT_").split("__"));

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::LoadError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let max = self.selection.max_window_secs;
        if !max.is_finite() || max <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "selection.max_window_secs must be positive, got {}",
                max
            )));
        }
        Ok(())
    }

    /// Maximum selection window
    pub fn max_window(&self) -> Duration {
        Duration::from_secs_f64(self.selection.max_window_secs)
    }

    /// Get yt-dlp path, auto-detecting if not configured
    pub fn yt_dlp_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref path) = self.paths.yt_dlp {
            Ok(path.clone())
        } else {
            which::which("yt-dlp")
                .map_err(|_| ConfigError::InvalidValue("yt-dlp not found in PATH".to_string()))
        }
    }

    /// Get FFmpeg path, auto-detecting if not configured
    pub fn ffmpeg_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref path) = self.paths.ffmpeg {
            Ok(path.clone())
        } else {
            which::which("ffmpeg")
                .map_err(|_| ConfigError::InvalidValue("ffmpeg not found in PATH".to_string()))
        }
    }

    /// Get the root for scratch workspaces
    pub fn workspace_root(&self) -> PathBuf {
        self.transcoder
            .workspace
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.selection.max_window_secs, 30.0);
        assert_eq!(config.selection.policy, WindowPolicy::Clamp);
        assert_eq!(config.transcoder.readiness, ReadinessPolicy::Wait);
        assert_eq!(config.output.default_target, TargetFormat::Ios);
        assert_eq!(config.max_window(), Duration::from_secs(30));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[selection]\nmax_window_secs = 20.0\npolicy = \"reject\"\n\n[output]\ndefault_target = \"android\""
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.selection.max_window_secs, 20.0);
        assert_eq!(config.selection.policy, WindowPolicy::Reject);
        assert_eq!(config.output.default_target, TargetFormat::Android);
        assert!(config.transcoder.eager_load);
    }

    #[test]
    fn test_rejects_non_positive_window() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[selection]\nmax_window_secs = 0.0").unwrap();

        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_to_toml_lists_sections() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("[selection]"));
        assert!(rendered.contains("policy = \"clamp\""));
        assert!(rendered.contains("default_target = \"ios\""));
    }
}
