use anyhow::Result;
use std::path::Path;
use std::process::Command;
use ringcut_core::config::Config;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    println!("ringcut dependency check\n");

    let mut all_ok = true;

    // Check yt-dlp
    print!("yt-dlp:      ");
    match config.yt_dlp_path() {
        Ok(path) => match tool_version(&path, "--version") {
            Some(v) => println!("OK ({})", v),
            None => {
                println!("FOUND but failed to get version");
                all_ok = false;
            }
        },
        Err(_) => {
            println!("NOT FOUND (only needed for URLs)");
            println!("             Install with: brew install yt-dlp");
        }
    }

    // Check FFmpeg
    print!("ffmpeg:      ");
    let ffmpeg = match config.ffmpeg_path() {
        Ok(path) => match tool_version(&path, "-version") {
            Some(first_line) => {
                // "ffmpeg version 6.1.1 Copyright ..."
                let version_part = first_line
                    .split_whitespace()
                    .nth(2)
                    .unwrap_or("unknown")
                    .to_string();
                println!("OK ({})", version_part);
                Some(path)
            }
            None => {
                println!("FOUND but failed to get version");
                all_ok = false;
                None
            }
        },
        Err(_) => {
            println!("NOT FOUND");
            println!("             Install with: brew install ffmpeg");
            all_ok = false;
            None
        }
    };

    // Check the encoders the ringtone targets rely on
    if let Some(ffmpeg) = ffmpeg {
        let encoders = list_encoders(&ffmpeg);
        for (name, target) in [("aac", "iPhone .m4r"), ("libmp3lame", "Android .mp3")] {
            print!("  {:<10} ", name);
            if encoders.iter().any(|e| e == name) {
                println!("OK ({})", target);
            } else {
                println!("MISSING (needed for {})", target);
                all_ok = false;
            }
        }
    }

    println!();
    if all_ok {
        println!("All dependencies OK!");
    } else {
        println!("Some dependencies are missing. See above for installation instructions.");
    }

    Ok(())
}

fn tool_version(path: &Path, flag: &str) -> Option<String> {
    let out = Command::new(path).arg(flag).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&out.stdout);
    stdout.lines().next().map(|l| l.trim().to_string())
}

fn list_encoders(ffmpeg: &Path) -> Vec<String> {
    let Ok(out) = Command::new(ffmpeg).args(["-hide_banner", "-encoders"]).output() else {
        return Vec::new();
    };
    parse_encoders(&String::from_utf8_lossy(&out.stdout))
}

/// Encoder names from `ffmpeg -encoders` (" A....D aac   AAC (Advanced Audio Coding)")
fn parse_encoders(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let flags = parts.next()?;
            if flags.len() != 6 || !flags.starts_with(['A', 'V', 'S']) {
                return None;
            }
            parts.next().filter(|name| *name != "=").map(String::from)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_encoders() {
        let listing = "Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC
 A....D aac                  AAC (Advanced Audio Coding)
 A....D libmp3lame           libmp3lame MP3 (MPEG audio layer 3)";

        let encoders = parse_encoders(listing);
        assert!(encoders.contains(&"aac".to_string()));
        assert!(encoders.contains(&"libmp3lame".to_string()));
        assert!(encoders.contains(&"libx264".to_string()));
        assert!(!encoders.contains(&"=".to_string()));
    }
}
