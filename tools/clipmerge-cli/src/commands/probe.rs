//! Probe a media file.

use std::path::PathBuf;

use clipmerge_composition::classify_orientation;
use clipmerge_export::probe_clip;

pub fn run(path: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let clip = probe_clip(&path).map_err(|e| anyhow::anyhow!("Failed to probe clip: {e}"))?;

    match output {
        Some(out) => {
            clip.save(&out)
                .map_err(|e| anyhow::anyhow!("Failed to save descriptor: {e}"))?;
            println!("Descriptor saved: {}", out.display());
            for (i, track) in clip.video_tracks.iter().enumerate() {
                let orientation = classify_orientation(&track.preferred_transform);
                println!(
                    "  Video {i}: {} ({:?}{})",
                    track.natural_size,
                    orientation.class,
                    if orientation.is_portrait { ", portrait" } else { "" }
                );
            }
            for (i, track) in clip.audio_tracks.iter().enumerate() {
                println!("  Audio {i}: {:.3}s", track.duration.as_secs_f64());
            }
        }
        None => println!("{}", serde_json::to_string_pretty(&clip)?),
    }

    Ok(())
}
