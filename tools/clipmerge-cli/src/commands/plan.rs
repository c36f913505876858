//! Build a merge plan.

use std::path::PathBuf;

use clipmerge_common::config::AppConfig;
use clipmerge_composition::{plan_merge, MergeRequest, PlanWarning};
use clipmerge_media_model::{MergePlan, Size};

use super::load_clip;

pub fn run(
    config: &AppConfig,
    first: PathBuf,
    second: PathBuf,
    audio: Option<PathBuf>,
    canvas: Option<String>,
    fps: Option<u32>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let first = load_clip(&first)?;
    let second = load_clip(&second)?;
    let audio = audio.as_deref().map(load_clip).transpose()?;

    let canvas = match canvas {
        Some(raw) => parse_canvas(&raw)?,
        None => first
            .first_video_track()
            .map(|track| track.natural_size)
            .filter(|size| !size.is_empty())
            .unwrap_or_else(|| {
                Size::new(
                    config.merge.canvas_width as f64,
                    config.merge.canvas_height as f64,
                )
            }),
    };

    let request = MergeRequest {
        first: Some(first),
        second: Some(second),
        audio,
        canvas,
        frame_rate: fps.unwrap_or(config.merge.frame_rate),
    };
    let planned = plan_merge(&request).map_err(|e| anyhow::anyhow!("Merge planning failed: {e}"))?;

    for warning in &planned.warnings {
        match warning {
            PlanWarning::AudioSkipped { reason } => {
                eprintln!("Warning: audio skipped: {reason}");
            }
        }
    }

    match output {
        Some(out) => {
            planned
                .plan
                .save(&out)
                .map_err(|e| anyhow::anyhow!("Failed to save plan: {e}"))?;
            println!("Plan saved: {}", out.display());
            print_summary(&planned.plan);
        }
        None => println!("{}", serde_json::to_string_pretty(&planned.plan)?),
    }

    Ok(())
}

/// Print the parts of a plan a person checks first.
pub fn print_summary(plan: &MergePlan) {
    println!(
        "  Duration: {:.3}s ({} frames @ {}fps)",
        plan.total_duration.as_secs_f64(),
        plan.total_frames(),
        plan.frame_rate()
    );
    println!("  Render size: {}", plan.render_size);
    for (segment, instruction) in plan.video_segments.iter().zip(&plan.instructions) {
        let range = segment.timeline_range();
        println!(
            "  {}: {} [{:.3}s, {:.3}s) scale {:.4} {:?}{}",
            segment.slot,
            segment.source.display(),
            range.start.as_secs_f64(),
            range.start.as_secs_f64() + range.duration.as_secs_f64(),
            instruction.scale,
            instruction.orientation,
            if instruction.is_portrait { " (portrait)" } else { "" }
        );
    }
    match &plan.audio {
        Some(audio) => println!("  Audio: {}", audio.source.display()),
        None => println!("  Audio: none"),
    }
}

fn parse_canvas(raw: &str) -> anyhow::Result<Size> {
    let (w, h) = raw
        .split_once(|c| c == 'x' || c == 'X')
        .ok_or_else(|| anyhow::anyhow!("Canvas must look like 1280x720, got '{raw}'"))?;
    let width: u32 = w.trim().parse()?;
    let height: u32 = h.trim().parse()?;
    if width == 0 || height == 0 {
        anyhow::bail!("Canvas dimensions must be non-zero");
    }
    Ok(Size::new(width as f64, height as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canvas() {
        assert_eq!(parse_canvas("1280x720").unwrap(), Size::new(1280.0, 720.0));
        assert_eq!(parse_canvas("640X480").unwrap(), Size::new(640.0, 480.0));
        assert!(parse_canvas("1280").is_err());
        assert!(parse_canvas("0x720").is_err());
    }
}
