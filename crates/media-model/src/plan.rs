//! Merge plan types.
//!
//! A [`MergePlan`] is the complete, structurally validated description of a
//! two-clip merge: where each source lands on the output timeline, how each
//! layer is transformed onto the canvas, and which audio (if any) plays
//! underneath. Export drivers consume it as-is.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::clip::{load_json, save_json, ClipSlot, ModelError, Size};
use crate::time::{MediaTime, TimeRange};
use crate::transform::{AffineTransform, OrientationClass};

/// Media type of a timeline segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

/// A piece of a source track placed on the output timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSegment {
    /// Which clip this segment comes from.
    pub slot: ClipSlot,

    /// Media type of the inserted track.
    pub kind: TrackKind,

    /// Source media file.
    pub source: PathBuf,

    /// Index of the track within its kind in the source.
    #[serde(default)]
    pub track_index: usize,

    /// Range read from the source.
    pub source_range: TimeRange,

    /// Where the range starts on the output timeline.
    pub timeline_start: MediaTime,
}

impl TrackSegment {
    /// Occupied range on the output timeline.
    pub fn timeline_range(&self) -> TimeRange {
        TimeRange::new(self.timeline_start, self.source_range.duration)
    }
}

/// Opacity set at a point in time; holds until the next keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpacityKeyframe {
    pub time: MediaTime,
    pub value: f64,
}

/// How one clip's layer is rendered onto the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutInstruction {
    /// Clip the layer belongs to.
    pub slot: ClipSlot,

    /// Timeline range the instruction is scoped to.
    pub time_range: TimeRange,

    /// Frame size of the source track the transform applies to.
    pub natural_size: Size,

    /// Transform applied from time zero; never animated.
    pub transform: AffineTransform,

    /// Uniform scale factor folded into `transform`.
    pub scale: f64,

    /// Orientation classified from the clip's preferred transform.
    pub orientation: OrientationClass,

    /// Whether the clip displays rotated by a quarter turn.
    pub is_portrait: bool,

    /// Optional fade-out keyframe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<OpacityKeyframe>,
}

impl LayoutInstruction {
    /// Opacity of this layer at timeline time `t`.
    pub fn opacity_at(&self, t: MediaTime) -> f64 {
        match self.opacity {
            Some(keyframe) if t >= keyframe.time => keyframe.value,
            _ => 1.0,
        }
    }
}

/// The full merge plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergePlan {
    /// Video segments in timeline order.
    pub video_segments: Vec<TrackSegment>,

    /// One layout instruction per video segment, same order.
    pub instructions: Vec<LayoutInstruction>,

    /// Sum of all video segment durations.
    pub total_duration: MediaTime,

    /// Audio spanning `[0, total_duration)`, when an audio clip fit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<TrackSegment>,

    /// Duration of one output frame.
    pub frame_duration: MediaTime,

    /// Output canvas size.
    pub render_size: Size,
}

impl MergePlan {
    /// Output frame rate, derived from the frame duration.
    pub fn frame_rate(&self) -> u32 {
        if self.frame_duration.value <= 0 {
            return 0;
        }
        (self.frame_duration.timescale as f64 / self.frame_duration.value as f64).round() as u32
    }

    /// Number of output frames.
    pub fn total_frames(&self) -> u64 {
        (self.total_duration.as_secs_f64() * self.frame_rate() as f64).ceil() as u64
    }

    /// Instruction for a given clip slot.
    pub fn instruction(&self, slot: ClipSlot) -> Option<&LayoutInstruction> {
        self.instructions.iter().find(|i| i.slot == slot)
    }

    /// Check the structural invariants an export driver relies on.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.frame_duration.is_valid() || self.frame_duration.value <= 0 {
            return Err(ModelError::validation(format!(
                "frame duration must be positive, got {}",
                self.frame_duration
            )));
        }
        if self.render_size.is_empty() {
            return Err(ModelError::validation(format!(
                "render size must be non-empty, got {}",
                self.render_size
            )));
        }
        if !self.total_duration.is_valid() {
            return Err(ModelError::validation(format!(
                "total duration {} has an invalid timescale",
                self.total_duration
            )));
        }
        if self.video_segments.is_empty() {
            return Err(ModelError::validation("plan has no video segments"));
        }

        let mut summed = MediaTime::ZERO;
        for (i, segment) in self.video_segments.iter().enumerate() {
            if segment.kind != TrackKind::Video || segment.slot == ClipSlot::Audio {
                return Err(ModelError::validation(format!(
                    "video segment {i} has mismatched media type ({:?} from {})",
                    segment.kind, segment.slot
                )));
            }
            if !segment.source_range.duration.is_valid()
                || segment.source_range.duration.is_negative()
                || !segment.source_range.start.is_valid()
                || !segment.timeline_start.is_valid()
                || segment.timeline_range().end().is_none()
            {
                return Err(ModelError::validation(format!(
                    "video segment {i} has an invalid placement ({} at {})",
                    segment.source_range.duration, segment.timeline_start
                )));
            }
            for (j, other) in self.video_segments.iter().enumerate().skip(i + 1) {
                if segment.timeline_range().overlaps(&other.timeline_range()) {
                    return Err(ModelError::validation(format!(
                        "video segments {i} and {j} overlap on the timeline"
                    )));
                }
            }
            summed = summed
                .checked_add(&segment.source_range.duration)
                .ok_or_else(|| ModelError::validation("segment durations overflow"))?;
        }
        if summed != self.total_duration {
            return Err(ModelError::validation(format!(
                "total duration {} does not equal segment sum {}",
                self.total_duration, summed
            )));
        }

        if self.instructions.len() != self.video_segments.len() {
            return Err(ModelError::validation(format!(
                "{} instructions for {} video segments",
                self.instructions.len(),
                self.video_segments.len()
            )));
        }
        for (instruction, segment) in self.instructions.iter().zip(&self.video_segments) {
            if instruction.slot != segment.slot {
                return Err(ModelError::validation(format!(
                    "instruction for {} paired with segment from {}",
                    instruction.slot, segment.slot
                )));
            }
            if instruction.time_range != segment.timeline_range() {
                return Err(ModelError::validation(format!(
                    "instruction for {} is not scoped to its segment",
                    instruction.slot
                )));
            }
        }

        if let Some(audio) = &self.audio {
            if audio.kind != TrackKind::Audio || audio.slot != ClipSlot::Audio {
                return Err(ModelError::validation(format!(
                    "audio segment has mismatched media type ({:?} from {})",
                    audio.kind, audio.slot
                )));
            }
            if audio.timeline_range() != TimeRange::from_zero(self.total_duration) {
                return Err(ModelError::validation(
                    "audio segment must span the whole output duration",
                ));
            }
        }

        Ok(())
    }

    /// Load a plan from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        load_json(path.as_ref())
    }

    /// Save this plan as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        save_json(path.as_ref(), self)
    }
}
