use anyhow::Result;
use std::path::Path;
use ringcut_core::config::Config;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    println!("ringcut configuration\n");
    println!("{}", config.to_toml()?);

    if config.paths.ffmpeg.is_none() || config.paths.yt_dlp.is_none() {
        println!("# tools without a configured path are looked up in PATH");
    }
    if config.transcoder.workspace.is_none() {
        println!("# scratch workspace: {}", config.workspace_root().display());
    }

    // Show config file locations
    println!("\nConfig file locations (in priority order):");
    println!("  1. Environment variables (RINGCUT_*, nested with __)");
    if let Some(p) = config_path {
        println!("  2. {} (specified)", p.display());
    }
    if let Some(config_dir) = dirs::config_dir() {
        println!("  3. {}/ringcut/config.toml", config_dir.display());
    }

    Ok(())
}
