//! Frame compositor: resolves which layer is on screen at each output frame.
//!
//! Instructions stack in plan order, the first instruction on top. A layer
//! is visible at `t` when its time range contains `t` and its opacity there
//! is above zero.

use clipmerge_common::error::{ClipmergeError, ClipmergeResult};
use clipmerge_media_model::{AffineTransform, ClipSlot, MediaTime, MergePlan};

/// A single frame's composition.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameComposition {
    /// Frame number.
    pub frame_index: u64,

    /// Presentation time on the output timeline.
    pub time: MediaTime,

    /// Topmost visible layer, if any.
    pub layer: Option<VisibleLayer>,
}

/// The layer drawn for a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleLayer {
    pub slot: ClipSlot,
    pub transform: AffineTransform,
    pub opacity: f64,
}

/// Topmost visible layer at timeline time `t`.
pub fn layer_at(plan: &MergePlan, t: MediaTime) -> Option<VisibleLayer> {
    visible_layers(plan, t).next()
}

fn visible_layers(plan: &MergePlan, t: MediaTime) -> impl Iterator<Item = VisibleLayer> + '_ {
    plan.instructions.iter().filter_map(move |instruction| {
        if instruction.time_range.is_empty() || !instruction.time_range.contains(t) {
            return None;
        }
        let opacity = instruction.opacity_at(t);
        (opacity > 0.0).then_some(VisibleLayer {
            slot: instruction.slot,
            transform: instruction.transform,
            opacity,
        })
    })
}

/// Time of output frame `index`, if representable.
fn frame_time(plan: &MergePlan, index: u64) -> Option<MediaTime> {
    let index = i64::try_from(index).ok()?;
    let value = plan.frame_duration.value.checked_mul(index)?;
    Some(MediaTime::new(value, plan.frame_duration.timescale))
}

/// Compute the composition for each frame of the plan's output.
pub fn compute_frames(plan: &MergePlan) -> Vec<FrameComposition> {
    if !plan.frame_duration.is_valid() || plan.frame_duration.value <= 0 {
        return Vec::new();
    }

    let mut frames = Vec::new();
    let mut index = 0u64;
    while let Some(time) = frame_time(plan, index) {
        if time >= plan.total_duration {
            break;
        }
        frames.push(FrameComposition {
            frame_index: index,
            time,
            layer: layer_at(plan, time),
        });
        index += 1;
    }
    frames
}

/// Check that every output frame shows exactly one layer.
///
/// Returns the number of frames on success.
pub fn verify_coverage(plan: &MergePlan) -> ClipmergeResult<u64> {
    if !plan.frame_duration.is_valid() || plan.frame_duration.value <= 0 {
        return Err(ClipmergeError::planning(format!(
            "invalid frame duration {}",
            plan.frame_duration
        )));
    }

    let mut index = 0u64;
    while let Some(time) = frame_time(plan, index) {
        if time >= plan.total_duration {
            break;
        }
        match visible_layers(plan, time).count() {
            1 => {}
            0 => {
                return Err(ClipmergeError::planning(format!(
                    "frame {index} at {time} has no visible layer"
                )))
            }
            n => {
                return Err(ClipmergeError::planning(format!(
                    "frame {index} at {time} has {n} visible layers"
                )))
            }
        }
        index += 1;
    }

    if index == 0 {
        return Err(ClipmergeError::planning("plan has no frames to render"));
    }

    tracing::debug!(frames = index, "Verified frame coverage");
    Ok(index)
}
