//! Two-clip merge planning.
//!
//! The first clip plays from zero for its full duration, the second clip
//! follows immediately, and the first layer drops to zero opacity exactly
//! when the second begins. An optional audio clip plays underneath the
//! whole output; if it is too short it is left out and the video merge
//! proceeds unchanged.

use serde::{Deserialize, Serialize};

use clipmerge_media_model::{
    ClipDescriptor, ClipSlot, MediaTime, MergePlan, OpacityKeyframe, Size, TimeRange,
    TrackKind, TrackSegment, VideoTrack,
};

use crate::layout::build_layout;

/// Output frame rate used when a request does not override it.
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Everything the planner reads, passed explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Clip played first.
    pub first: Option<ClipDescriptor>,

    /// Clip played second.
    pub second: Option<ClipDescriptor>,

    /// Optional background audio.
    #[serde(default)]
    pub audio: Option<ClipDescriptor>,

    /// Output canvas size.
    pub canvas: Size,

    /// Output frame rate.
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
}

fn default_frame_rate() -> u32 {
    DEFAULT_FRAME_RATE
}

impl MergeRequest {
    pub fn new(first: ClipDescriptor, second: ClipDescriptor, canvas: Size) -> Self {
        Self {
            first: Some(first),
            second: Some(second),
            audio: None,
            canvas,
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }

    pub fn with_audio(mut self, audio: ClipDescriptor) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_frame_rate(mut self, frame_rate: u32) -> Self {
        self.frame_rate = frame_rate;
        self
    }
}

/// A non-fatal problem found while planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanWarning {
    /// The audio clip could not be inserted; the plan has no audio.
    AudioSkipped { reason: String },
}

/// A plan plus whatever was dropped on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMerge {
    pub plan: MergePlan,
    pub warnings: Vec<PlanWarning>,
}

/// Errors that abort planning. No export may start after one of these.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MergeError {
    #[error("No {slot} clip loaded")]
    MissingClip { slot: ClipSlot },

    #[error("Failed to insert {slot} video track: {reason}")]
    TrackInsertion { slot: ClipSlot, reason: String },

    #[error("Invalid duration {duration} for {slot} clip")]
    InvalidDuration { slot: ClipSlot, duration: MediaTime },

    #[error("Invalid merge request: {message}")]
    InvalidRequest { message: String },
}

/// Plan a merge of `request.first` followed by `request.second`.
pub fn plan_merge(request: &MergeRequest) -> Result<PlannedMerge, MergeError> {
    let first = request.first.as_ref().ok_or(MergeError::MissingClip {
        slot: ClipSlot::First,
    })?;
    let second = request.second.as_ref().ok_or(MergeError::MissingClip {
        slot: ClipSlot::Second,
    })?;

    if request.canvas.is_empty() {
        return Err(MergeError::InvalidRequest {
            message: format!("canvas size {} is empty", request.canvas),
        });
    }
    if request.frame_rate == 0 || request.frame_rate > i32::MAX as u32 {
        return Err(MergeError::InvalidRequest {
            message: format!("frame rate {} is out of range", request.frame_rate),
        });
    }

    check_duration(ClipSlot::First, first.duration)?;
    check_duration(ClipSlot::Second, second.duration)?;

    let first_track = insertable_video_track(ClipSlot::First, first)?;
    let second_track = insertable_video_track(ClipSlot::Second, second)?;

    let total_duration = first
        .duration
        .checked_add(&second.duration)
        .ok_or_else(|| MergeError::InvalidRequest {
            message: format!(
                "total duration {} + {} is not representable",
                first.duration, second.duration
            ),
        })?;

    let first_segment = video_segment(ClipSlot::First, first, MediaTime::ZERO);
    let second_segment = video_segment(ClipSlot::Second, second, first.duration);

    let mut first_instruction = build_layout(
        ClipSlot::First,
        first_track,
        request.canvas,
        first_segment.timeline_range(),
    );
    first_instruction.opacity = Some(OpacityKeyframe {
        time: first.duration,
        value: 0.0,
    });
    let second_instruction = build_layout(
        ClipSlot::Second,
        second_track,
        request.canvas,
        second_segment.timeline_range(),
    );

    let mut warnings = vec![];
    let audio = match &request.audio {
        Some(clip) => match audio_segment(clip, total_duration) {
            Ok(segment) => Some(segment),
            Err(reason) => {
                tracing::warn!(
                    source = %clip.source.display(),
                    %reason,
                    "Failed to load audio track, merging without audio"
                );
                warnings.push(PlanWarning::AudioSkipped { reason });
                None
            }
        },
        None => None,
    };

    let plan = MergePlan {
        video_segments: vec![first_segment, second_segment],
        instructions: vec![first_instruction, second_instruction],
        total_duration,
        audio,
        frame_duration: MediaTime::new(1, request.frame_rate as i32),
        render_size: request.canvas,
    };

    tracing::info!(
        total_secs = plan.total_duration.as_secs_f64(),
        render_size = %plan.render_size,
        frame_rate = request.frame_rate,
        has_audio = plan.audio.is_some(),
        "Merge plan built"
    );

    Ok(PlannedMerge { plan, warnings })
}

fn check_duration(slot: ClipSlot, duration: MediaTime) -> Result<(), MergeError> {
    if !duration.is_valid() || duration.is_negative() {
        return Err(MergeError::InvalidDuration { slot, duration });
    }
    Ok(())
}

fn insertable_video_track(
    slot: ClipSlot,
    clip: &ClipDescriptor,
) -> Result<&VideoTrack, MergeError> {
    let track = clip.first_video_track().ok_or_else(|| {
        tracing::error!(%slot, source = %clip.source.display(), "Failed to load video track");
        MergeError::TrackInsertion {
            slot,
            reason: "source has no video track".to_string(),
        }
    })?;
    if track.natural_size.is_empty() {
        tracing::error!(%slot, source = %clip.source.display(), "Video track has no frame size");
        return Err(MergeError::TrackInsertion {
            slot,
            reason: format!("video track has empty natural size {}", track.natural_size),
        });
    }
    Ok(track)
}

fn video_segment(slot: ClipSlot, clip: &ClipDescriptor, at: MediaTime) -> TrackSegment {
    TrackSegment {
        slot,
        kind: TrackKind::Video,
        source: clip.source.clone(),
        track_index: 0,
        source_range: TimeRange::from_zero(clip.duration),
        timeline_start: at,
    }
}

fn audio_segment(clip: &ClipDescriptor, total: MediaTime) -> Result<TrackSegment, String> {
    let track = clip
        .first_audio_track()
        .ok_or_else(|| "source has no audio track".to_string())?;
    if !track.duration.is_valid() || track.duration < total {
        return Err(format!(
            "audio lasts {:.3}s but the merged video lasts {:.3}s",
            track.duration.as_secs_f64(),
            total.as_secs_f64()
        ));
    }
    Ok(TrackSegment {
        slot: ClipSlot::Audio,
        kind: TrackKind::Audio,
        source: clip.source.clone(),
        track_index: 0,
        source_range: TimeRange::from_zero(total),
        timeline_start: MediaTime::ZERO,
    })
}
