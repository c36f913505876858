//! Merge session: the state behind the merge screen.
//!
//! Holds the three loaded clips, the canvas taken from the first clip and
//! the busy flag that locks the controls while an export runs. The export
//! outcome is the only place the loaded clips are released.

use std::path::PathBuf;
use std::sync::Arc;

use clipmerge_common::config::AppConfig;
use clipmerge_common::error::ClipmergeResult;
use clipmerge_composition::{plan_merge, MergeError, MergeRequest, PlanWarning};
use clipmerge_media_model::{ClipDescriptor, ClipSlot, Size};

use crate::export::{
    spawn_export, ExportDriver, ExportJob, ExportOutcome, ExportSettings, ProgressCallback,
};

const UNLOADED_LABEL: &str = "Unloaded";

/// An export the session has committed to.
#[derive(Debug, Clone)]
pub struct StartedMerge {
    pub job: ExportJob,
    pub warnings: Vec<PlanWarning>,
}

/// Clip slots, canvas and busy state for one merge flow.
#[derive(Debug, Clone)]
pub struct MergeSession {
    first: Option<ClipDescriptor>,
    second: Option<ClipDescriptor>,
    audio: Option<ClipDescriptor>,
    default_canvas: Size,
    canvas: Size,
    frame_rate: u32,
    settings: ExportSettings,
    busy: bool,
}

impl MergeSession {
    pub fn new(config: &AppConfig) -> ClipmergeResult<Self> {
        let default_canvas = Size::new(
            config.merge.canvas_width as f64,
            config.merge.canvas_height as f64,
        );
        Ok(Self {
            first: None,
            second: None,
            audio: None,
            default_canvas,
            canvas: default_canvas,
            frame_rate: config.merge.frame_rate,
            settings: ExportSettings::from_defaults(&config.export)?,
            busy: false,
        })
    }

    /// Put `clip` into `slot`.
    ///
    /// Ignored while an export runs or when the file is not of the slot's
    /// media kind. Loading the first clip sets the canvas to its frame size.
    pub fn load(&mut self, slot: ClipSlot, clip: ClipDescriptor) -> bool {
        if self.busy {
            tracing::debug!(%slot, "Export in progress, ignoring clip load");
            return false;
        }
        if !slot.media_kind().accepts(&clip.source) {
            tracing::debug!(
                %slot,
                source = %clip.source.display(),
                "File type not accepted for slot, ignoring"
            );
            return false;
        }

        if slot == ClipSlot::First {
            if let Some(track) = clip.first_video_track() {
                if !track.natural_size.is_empty() {
                    self.canvas = track.natural_size;
                }
            }
        }

        tracing::info!(%slot, source = %clip.source.display(), "Clip loaded");
        *self.slot_mut(slot) = Some(clip);
        true
    }

    pub fn clip(&self, slot: ClipSlot) -> Option<&ClipDescriptor> {
        match slot {
            ClipSlot::First => self.first.as_ref(),
            ClipSlot::Second => self.second.as_ref(),
            ClipSlot::Audio => self.audio.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: ClipSlot) -> &mut Option<ClipDescriptor> {
        match slot {
            ClipSlot::First => &mut self.first,
            ClipSlot::Second => &mut self.second,
            ClipSlot::Audio => &mut self.audio,
        }
    }

    /// Label shown next to a slot: the loaded file name or "Unloaded".
    pub fn slot_label(&self, slot: ClipSlot) -> String {
        self.clip(slot)
            .map(ClipDescriptor::display_name)
            .unwrap_or_else(|| UNLOADED_LABEL.to_string())
    }

    pub fn controls_enabled(&self) -> bool {
        !self.busy
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn canvas(&self) -> Size {
        self.canvas
    }

    pub fn settings(&self) -> ExportSettings {
        self.settings
    }

    /// The planner input for the current slots.
    pub fn request(&self) -> MergeRequest {
        MergeRequest {
            first: self.first.clone(),
            second: self.second.clone(),
            audio: self.audio.clone(),
            canvas: self.canvas,
            frame_rate: self.frame_rate,
        }
    }

    /// Plan the merge and commit to exporting it to `destination`.
    ///
    /// Returns `Ok(None)` without side effects when busy or when either
    /// video clip is missing. On success the session is busy until
    /// [`MergeSession::finish_export`].
    pub fn begin_merge(
        &mut self,
        destination: impl Into<PathBuf>,
    ) -> Result<Option<StartedMerge>, MergeError> {
        if self.busy {
            tracing::debug!("Merge already in progress");
            return Ok(None);
        }
        if self.first.is_none() || self.second.is_none() {
            tracing::debug!("Both video clips are required to merge");
            return Ok(None);
        }

        let planned = plan_merge(&self.request()).map_err(|e| {
            tracing::error!(error = %e, "Merge planning failed, nothing exported");
            e
        })?;

        self.busy = true;
        let job = ExportJob::new(planned.plan, destination, self.settings);
        tracing::info!(output = %job.output_path.display(), "Merge started");
        Ok(Some(StartedMerge {
            job,
            warnings: planned.warnings,
        }))
    }

    /// Apply an export outcome: clears every slot and the busy flag.
    pub fn finish_export(&mut self, outcome: &ExportOutcome) {
        match &outcome.result {
            Ok(path) => tracing::info!(output = %path.display(), "Merge exported"),
            Err(e) => tracing::error!(
                output = %outcome.destination.display(),
                error = %e,
                "Merge export failed"
            ),
        }
        self.clear();
    }

    /// Release everything, as when leaving the merge screen.
    pub fn reset(&mut self) {
        tracing::debug!("Merge session reset");
        self.clear();
    }

    fn clear(&mut self) {
        self.first = None;
        self.second = None;
        self.audio = None;
        self.canvas = self.default_canvas;
        self.busy = false;
    }

    /// Plan, export through `driver`, and apply the outcome.
    ///
    /// Returns `Ok(None)` when the merge preconditions are not met.
    pub async fn merge_with(
        &mut self,
        driver: Arc<dyn ExportDriver>,
        destination: impl Into<PathBuf>,
        progress: Option<ProgressCallback>,
    ) -> Result<Option<ExportOutcome>, MergeError> {
        let Some(started) = self.begin_merge(destination)? else {
            return Ok(None);
        };
        for warning in &started.warnings {
            tracing::warn!(?warning, "Merging with warning");
        }

        let outcome = spawn_export(driver, started.job, progress).wait().await;
        self.finish_export(&outcome);
        Ok(Some(outcome))
    }
}
