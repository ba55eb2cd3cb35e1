use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ringcut")]
#[command(author, version, about = "Cut ringtones out of social-media posts")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export a ringtone from a post URL or a local media file
    Export {
        /// TikTok post URL or path to a local audio/video file
        source: String,

        #[command(flatten)]
        options: ExportOptions,
    },

    /// Check external tools
    Doctor,

    /// Show configuration
    Config,
}

#[derive(clap::Args, Clone)]
pub struct ExportOptions {
    /// Start of the ringtone, in seconds
    #[arg(short, long, default_value = "0")]
    pub start: f64,

    /// End of the ringtone, in seconds (default: start + maximum window)
    #[arg(short, long)]
    pub end: Option<f64>,

    /// Target device
    #[arg(short, long, value_enum)]
    pub target: Option<Target>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// iPhone - AAC in .m4r
    #[value(aliases = ["iphone", "m4r"])]
    Ios,
    /// Android - MP3
    #[value(alias = "mp3")]
    Android,
    /// Uncompressed WAV
    Wav,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Ios => write!(f, "ios"),
            Target::Android => write!(f, "android"),
            Target::Wav => write!(f, "wav"),
        }
    }
}
