//! Clip probing via ffprobe.
//!
//! Reads stream sizes, durations and display rotation, and expresses the
//! rotation as the preferred transform a camera would have written.

use std::path::Path;
use std::process::Command;

use serde_json::Value;

use clipmerge_common::error::{ClipmergeError, ClipmergeResult};
use clipmerge_media_model::{
    AffineTransform, AudioTrack, ClipDescriptor, MediaTime, Size, VideoTrack, DEFAULT_TIMESCALE,
};

/// Probe a media file into a clip descriptor.
pub fn probe_clip(path: &Path) -> ClipmergeResult<ClipDescriptor> {
    if !path.exists() {
        return Err(ClipmergeError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| ClipmergeError::probe(format!("Failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(ClipmergeError::probe(format!(
            "ffprobe failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    let clip = parse_probe_output(path, &raw)?;
    tracing::debug!(
        source = %path.display(),
        duration_secs = clip.duration.as_secs_f64(),
        video_tracks = clip.video_tracks.len(),
        audio_tracks = clip.audio_tracks.len(),
        "Probed clip"
    );
    Ok(clip)
}

/// Build a clip descriptor from ffprobe's JSON output.
pub fn parse_probe_output(path: &Path, raw: &str) -> ClipmergeResult<ClipDescriptor> {
    let json: Value = serde_json::from_str(raw)
        .map_err(|e| ClipmergeError::probe(format!("Failed to parse ffprobe output: {e}")))?;

    let streams = json["streams"]
        .as_array()
        .ok_or_else(|| ClipmergeError::probe(format!("No streams found in {}", path.display())))?;

    let mut video_tracks = Vec::new();
    let mut audio_tracks = Vec::new();
    let mut longest: Option<MediaTime> = None;

    for stream in streams {
        let duration = stream_duration(stream);
        match stream["codec_type"].as_str() {
            Some("video") if !is_attached_picture(stream) => {
                let width = stream["width"].as_u64().unwrap_or(0) as f64;
                let height = stream["height"].as_u64().unwrap_or(0) as f64;
                let rotation = clockwise_rotation(stream);
                video_tracks.push(VideoTrack {
                    natural_size: Size::new(width, height),
                    preferred_transform: transform_for_rotation(rotation, width, height),
                });
            }
            Some("audio") => {
                audio_tracks.push(AudioTrack {
                    duration: duration.unwrap_or(MediaTime::ZERO),
                });
            }
            _ => continue,
        }
        if let Some(d) = duration {
            if longest.map_or(true, |l| d > l) {
                longest = Some(d);
            }
        }
    }

    let duration = json["format"]["duration"]
        .as_str()
        .and_then(parse_seconds)
        .or(longest)
        .ok_or_else(|| {
            ClipmergeError::probe(format!("Could not read duration of {}", path.display()))
        })?;

    // Audio tracks without their own duration play for the whole clip.
    for track in &mut audio_tracks {
        if track.duration.is_zero() {
            track.duration = duration;
        }
    }

    Ok(ClipDescriptor {
        source: path.to_path_buf(),
        duration,
        video_tracks,
        audio_tracks,
    })
}

fn is_attached_picture(stream: &Value) -> bool {
    stream["disposition"]["attached_pic"].as_i64() == Some(1)
}

/// Exact duration from `duration_ts` and `time_base`, else decimal seconds.
fn stream_duration(stream: &Value) -> Option<MediaTime> {
    let exact = stream["duration_ts"].as_i64().and_then(|ts| {
        let (num, den) = stream["time_base"].as_str()?.split_once('/')?;
        let num = num.trim().parse::<i64>().ok()?;
        let den = den.trim().parse::<i32>().ok()?;
        if den <= 0 || num <= 0 {
            return None;
        }
        Some(MediaTime::new(ts.checked_mul(num)?, den))
    });
    exact.or_else(|| stream["duration"].as_str().and_then(parse_seconds))
}

fn parse_seconds(raw: &str) -> Option<MediaTime> {
    let secs = raw.trim().parse::<f64>().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| MediaTime::from_secs_f64(secs, DEFAULT_TIMESCALE))
}

/// Display rotation in clockwise degrees, normalized to `[0, 360)`.
///
/// The display matrix reports counter-clockwise degrees; the legacy
/// `rotate` tag reports clockwise degrees.
fn clockwise_rotation(stream: &Value) -> f64 {
    let from_matrix = stream["side_data_list"].as_array().and_then(|side_data| {
        side_data.iter().find_map(|d| {
            if d["side_data_type"].as_str() == Some("Display Matrix") {
                d["rotation"].as_f64().map(|r| -r)
            } else {
                None
            }
        })
    });
    let degrees = from_matrix
        .or_else(|| {
            stream["tags"]["rotate"]
                .as_str()
                .and_then(|r| r.trim().parse::<f64>().ok())
        })
        .unwrap_or(0.0);
    degrees.rem_euclid(360.0)
}

/// Preferred transform for a clockwise display rotation of a `width` x `height` frame.
fn transform_for_rotation(degrees: f64, width: f64, height: f64) -> AffineTransform {
    if degrees == 0.0 {
        AffineTransform::IDENTITY
    } else if degrees == 90.0 {
        AffineTransform::new(0.0, 1.0, -1.0, 0.0, height, 0.0)
    } else if degrees == 180.0 {
        AffineTransform::new(-1.0, 0.0, 0.0, -1.0, width, height)
    } else if degrees == 270.0 {
        AffineTransform::new(0.0, -1.0, 1.0, 0.0, 0.0, width)
    } else {
        tracing::warn!(degrees, "Non-quarter-turn display rotation");
        AffineTransform::rotation(degrees.to_radians())
    }
}
