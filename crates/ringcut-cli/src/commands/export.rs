use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::args::{ExportOptions, Target};
use ringcut_core::{
    config::Config,
    pipeline::{Pipeline, PipelineConfig, PipelineStage, Source},
    transcoder::EngineStatus,
    ExportSession, TargetFormat,
};

pub async fn run(source: &str, options: &ExportOptions, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;

    let source = Source::parse(source).context("Unsupported source")?;

    let output_dir = options
        .output
        .clone()
        .unwrap_or_else(|| config.output.default_directory.clone());

    let target = match options.target {
        Some(Target::Ios) => TargetFormat::Ios,
        Some(Target::Android) => TargetFormat::Android,
        Some(Target::Wav) => TargetFormat::Wav,
        None => config.output.default_target,
    };

    let pipeline_config = PipelineConfig {
        source,
        start_seconds: options.start,
        end_seconds: options.end,
        target,
        output_dir,
    };

    let session = Arc::new(ExportSession::from_config(&config));

    let (tx, mut rx) = mpsc::channel(32);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));

    let handler_pb = pb.clone();
    let progress_handle = tokio::spawn(async move {
        let pb = handler_pb;
        while let Some(stage) = rx.recv().await {
            match stage {
                PipelineStage::Downloading { url } => {
                    pb.set_message(format!("Downloading {}", truncate(&url, 50)));
                }
                PipelineStage::Decoding { title } => {
                    pb.set_message(format!("Decoding {}", truncate(&title, 40)));
                }
                PipelineStage::Selected { selection, duration } => {
                    pb.println(format!(
                        "Selected {} of {:.1}s",
                        selection,
                        duration.as_secs_f64()
                    ));
                }
                PipelineStage::Engine { status } => match status {
                    EngineStatus::Loading => pb.set_message("Loading codec engine..."),
                    EngineStatus::Busy => pb.set_message("Transcoding..."),
                    EngineStatus::Failed => pb.println("Codec engine failed to load"),
                    EngineStatus::NotLoaded | EngineStatus::Ready => {}
                },
                PipelineStage::Encoding { target } => {
                    pb.set_message(format!("Encoding {}...", target));
                }
                PipelineStage::Complete { output, elapsed } => {
                    pb.finish_with_message(format!(
                        "Done: {} ({:.1}s)",
                        output.display(),
                        elapsed.as_secs_f32()
                    ));
                }
                PipelineStage::Failed { stage, error } => {
                    pb.abandon_with_message(format!("Failed at {}: {}", stage, error));
                }
            }
        }
    });

    let pipeline = Pipeline::new(pipeline_config, config, session.clone(), tx);

    let result = tokio::select! {
        result = pipeline.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    drop(pipeline);

    let result = match result {
        Some(result) => result,
        None => {
            session.cancel();
            pb.set_message("Cancelling...");
            // a detached transcode still owns scratch files
            session.transcoder().idle().await;
            pb.abandon_with_message("Cancelled");
            progress_handle.await?;
            anyhow::bail!("Export cancelled");
        }
    };

    progress_handle.await?;

    match result {
        Ok(output) => {
            println!("\nOutput: {}", output.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("\nError: {}", e);
            Err(e.into())
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer title", 10), "a much ...");
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
    }
}
