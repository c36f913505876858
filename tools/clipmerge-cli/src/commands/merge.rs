//! Merge two clips and export the result.

use std::path::PathBuf;
use std::sync::Arc;

use clipmerge_common::config::AppConfig;
use clipmerge_export::{
    ExportOutcome, ExportProgress, FfmpegDriver, MergeSession, ProgressCallback,
};
use clipmerge_media_model::{ClipSlot, MediaKind};

use super::load_clip;

pub async fn run(
    config: &AppConfig,
    first: PathBuf,
    second: PathBuf,
    audio: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut session =
        MergeSession::new(config).map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    let mut slots = vec![(ClipSlot::First, first), (ClipSlot::Second, second)];
    if let Some(audio) = audio {
        slots.push((ClipSlot::Audio, audio));
    }
    for (slot, path) in slots {
        let clip = load_clip(&path)?;
        if !session.load(slot, clip) {
            anyhow::bail!(
                "{} is not a supported {} file",
                path.display(),
                match slot.media_kind() {
                    MediaKind::Movie => "movie",
                    MediaKind::Audio => "audio",
                }
            );
        }
    }

    let output_path = output.unwrap_or_else(|| PathBuf::from(&config.merge.default_output_name));

    println!("Merging:");
    for slot in ClipSlot::ALL {
        println!("  {slot}: {}", session.slot_label(slot));
    }
    println!("  Canvas: {}", session.canvas());
    println!("  Output: {}", output_path.display());
    println!("  Preset: {}", session.settings().preset);

    let progress_cb: ProgressCallback = Box::new(|p: ExportProgress| {
        print!(
            "\r  Progress: {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
            p.progress * 100.0,
            p.frames_rendered,
            p.total_frames,
            p.eta_secs,
        );
    });

    let outcome = session
        .merge_with(
            Arc::new(FfmpegDriver::new()),
            output_path.clone(),
            Some(progress_cb),
        )
        .await
        .map_err(|e| anyhow::anyhow!("Merge planning failed: {e}"))?;

    match outcome {
        Some(outcome) => report(outcome),
        None => {
            println!("Nothing to merge: both video clips are required");
            Ok(())
        }
    }
}

/// Print a finished export; a failed export is an error for the process.
fn report(outcome: ExportOutcome) -> anyhow::Result<()> {
    let finished = outcome.finished_at.format("%H:%M:%S");
    match outcome.result {
        Ok(path) => {
            println!("\nMerge complete at {finished}: {}", path.display());
            Ok(())
        }
        Err(e) => anyhow::bail!("Merge failed at {finished}: {e}"),
    }
}
