//! Export settings, jobs, and the driver seam.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use clipmerge_common::config::ExportDefaults;
use clipmerge_common::error::{ClipmergeError, ClipmergeResult};
use clipmerge_media_model::MergePlan;

use crate::compositor::verify_coverage;

/// Encoder quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    #[default]
    HighestQuality,
    MediumQuality,
    LowQuality,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::HighestQuality => "highest_quality",
            QualityPreset::MediumQuality => "medium_quality",
            QualityPreset::LowQuality => "low_quality",
        }
    }
}

impl FromStr for QualityPreset {
    type Err = ClipmergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "highest_quality" | "highest" => Ok(QualityPreset::HighestQuality),
            "medium_quality" | "medium" => Ok(QualityPreset::MediumQuality),
            "low_quality" | "low" => Ok(QualityPreset::LowQuality),
            other => Err(ClipmergeError::config(format!(
                "unknown quality preset '{other}'"
            ))),
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output container. Merges are always written as QuickTime movies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    #[default]
    Mov,
}

impl ContainerFormat {
    /// Muxer name passed to the encoder.
    pub fn muxer(&self) -> &'static str {
        match self {
            ContainerFormat::Mov => "mov",
        }
    }
}

impl FromStr for ContainerFormat {
    type Err = ClipmergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mov" | "quicktime" => Ok(ContainerFormat::Mov),
            other => Err(ClipmergeError::config(format!(
                "unsupported output container '{other}'"
            ))),
        }
    }
}

/// Encoder settings for one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSettings {
    pub container: ContainerFormat,
    pub preset: QualityPreset,

    /// Put the movie index at the front of the file.
    pub optimize_for_network: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            container: ContainerFormat::Mov,
            preset: QualityPreset::HighestQuality,
            optimize_for_network: true,
        }
    }
}

impl ExportSettings {
    /// Build settings from the `export` section of the app config.
    pub fn from_defaults(defaults: &ExportDefaults) -> ClipmergeResult<Self> {
        Ok(Self {
            container: defaults.container.parse()?,
            preset: defaults.preset.parse()?,
            optimize_for_network: defaults.optimize_for_network,
        })
    }
}

/// A merge plan ready to be encoded.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// The plan to flatten.
    pub plan: MergePlan,

    /// Output file path.
    pub output_path: PathBuf,

    /// Encoder settings.
    pub settings: ExportSettings,
}

impl ExportJob {
    pub fn new(plan: MergePlan, output_path: impl Into<PathBuf>, settings: ExportSettings) -> Self {
        Self {
            plan,
            output_path: output_path.into(),
            settings,
        }
    }
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Export progress report.
#[derive(Debug, Clone)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

impl ExportProgress {
    pub(crate) fn stage(stage: ExportStage, total_frames: u64) -> Self {
        let done = matches!(stage, ExportStage::Complete);
        Self {
            progress: if done { 1.0 } else { 0.0 },
            frames_rendered: if done { total_frames } else { 0 },
            total_frames,
            eta_secs: 0.0,
            stage,
        }
    }
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    Preparing,
    Encoding,
    Finalizing,
    Complete,
    Failed,
}

/// An encoder that can flatten a merge plan into a movie file.
#[async_trait::async_trait]
pub trait ExportDriver: Send + Sync {
    /// Encode `job`, returning the written file.
    async fn export(
        &self,
        job: &ExportJob,
        progress: Option<ProgressCallback>,
    ) -> ClipmergeResult<PathBuf>;

    /// Check if this driver can run on this system.
    fn is_available(&self) -> bool;

    /// Driver name.
    fn name(&self) -> &str;
}

/// The single completion report of an export.
#[derive(Debug)]
pub struct ExportOutcome {
    /// Destination the export was asked to write.
    pub destination: PathBuf,

    /// Written file, or why nothing usable was written.
    pub result: ClipmergeResult<PathBuf>,

    /// When the export finished.
    pub finished_at: DateTime<Utc>,
}

impl ExportOutcome {
    fn new(destination: PathBuf, result: ClipmergeResult<PathBuf>) -> Self {
        Self {
            destination,
            result,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Receiving end of a spawned export.
#[derive(Debug)]
pub struct ExportHandle {
    destination: PathBuf,
    rx: oneshot::Receiver<ExportOutcome>,
}

impl ExportHandle {
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Wait for the export to finish.
    pub async fn wait(self) -> ExportOutcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => ExportOutcome::new(
                self.destination,
                Err(ClipmergeError::export(
                    "export task ended without reporting a result",
                )),
            ),
        }
    }
}

/// Validate `job` and hand it to `driver`.
pub async fn run_export(
    driver: &dyn ExportDriver,
    job: &ExportJob,
    progress: Option<ProgressCallback>,
) -> ClipmergeResult<PathBuf> {
    tracing::info!(
        output = %job.output_path.display(),
        preset = %job.settings.preset,
        driver = driver.name(),
        "Starting export"
    );

    job.plan
        .validate()
        .map_err(|e| ClipmergeError::planning(format!("Refusing to export invalid plan: {e}")))?;
    let total_frames = verify_coverage(&job.plan)?;

    if !driver.is_available() {
        return Err(ClipmergeError::unsupported(format!(
            "Export driver '{}' is not available on this system",
            driver.name()
        )));
    }

    if let Some(parent) = job.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    if let Some(cb) = &progress {
        cb(ExportProgress::stage(ExportStage::Preparing, total_frames));
    }

    driver.export(job, progress).await
}

/// Run `job` on a tokio task; the outcome arrives exactly once on the handle.
pub fn spawn_export(
    driver: Arc<dyn ExportDriver>,
    job: ExportJob,
    progress: Option<ProgressCallback>,
) -> ExportHandle {
    let (tx, rx) = oneshot::channel();
    let destination = job.output_path.clone();

    tokio::spawn(async move {
        let result = run_export(driver.as_ref(), &job, progress).await;
        if let Err(e) = &result {
            tracing::debug!(error = %e, "Export task finished with error");
        }
        if tx
            .send(ExportOutcome::new(job.output_path.clone(), result))
            .is_err()
        {
            tracing::debug!("Export outcome dropped; nobody is waiting");
        }
    });

    ExportHandle { destination, rx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipmerge_composition::{plan_merge, MergeRequest};
    use clipmerge_media_model::{AffineTransform, ClipDescriptor, MediaTime, Size};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct RecordingDriver {
        available: bool,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ExportDriver for RecordingDriver {
        async fn export(
            &self,
            job: &ExportJob,
            progress: Option<ProgressCallback>,
        ) -> ClipmergeResult<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(cb) = &progress {
                cb(ExportProgress::stage(
                    ExportStage::Complete,
                    job.plan.total_frames(),
                ));
            }
            Ok(job.output_path.clone())
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn sample_job(dir: &Path) -> ExportJob {
        let size = Size::new(1280.0, 720.0);
        let request = MergeRequest::new(
            ClipDescriptor::video("a.mov", size, AffineTransform::IDENTITY, MediaTime::from_secs(2)),
            ClipDescriptor::video("b.mov", size, AffineTransform::IDENTITY, MediaTime::from_secs(1)),
            size,
        );
        let plan = plan_merge(&request).unwrap().plan;
        ExportJob::new(plan, dir.join("out").join("merged.mov"), ExportSettings::default())
    }

    #[test]
    fn test_settings_from_config_defaults() {
        let settings = ExportSettings::from_defaults(&ExportDefaults::default()).unwrap();
        assert_eq!(settings, ExportSettings::default());
        assert_eq!(settings.preset, QualityPreset::HighestQuality);
        assert!(settings.optimize_for_network);
    }

    #[test]
    fn test_unknown_preset_is_config_error() {
        let defaults = ExportDefaults {
            preset: "ultra".to_string(),
            ..ExportDefaults::default()
        };
        let err = ExportSettings::from_defaults(&defaults).unwrap_err();
        assert!(matches!(err, ClipmergeError::Config { .. }));
    }

    #[test]
    fn test_preset_parse_aliases() {
        assert_eq!("medium".parse::<QualityPreset>().unwrap(), QualityPreset::MediumQuality);
        assert_eq!("LOW_QUALITY".parse::<QualityPreset>().unwrap(), QualityPreset::LowQuality);
        assert_eq!("quicktime".parse::<ContainerFormat>().unwrap(), ContainerFormat::Mov);
        assert!("mp4".parse::<ContainerFormat>().is_err());
    }

    #[tokio::test]
    async fn test_spawned_export_reports_once() {
        let dir = std::env::temp_dir().join("clipmerge_test_spawn_export");
        let _ = std::fs::remove_dir_all(&dir);

        let driver = Arc::new(RecordingDriver {
            available: true,
            calls: AtomicUsize::new(0),
        });
        let job = sample_job(&dir);
        let expected = job.output_path.clone();

        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);
        let progress: ProgressCallback = Box::new(move |p: ExportProgress| {
            sink.lock().unwrap().push(p.stage);
        });

        let handle = spawn_export(driver.clone(), job, Some(progress));
        assert_eq!(handle.destination(), expected.as_path());
        let outcome = handle.wait().await;

        assert!(outcome.is_success());
        assert_eq!(outcome.result.unwrap(), expected);
        assert_eq!(driver.calls.load(Ordering::SeqCst), 1);
        assert!(expected.parent().unwrap().exists());
        assert_eq!(
            *stages.lock().unwrap(),
            vec![ExportStage::Preparing, ExportStage::Complete]
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_unavailable_driver_fails_without_exporting() {
        let dir = std::env::temp_dir().join("clipmerge_test_unavailable_driver");
        let driver = RecordingDriver {
            available: false,
            calls: AtomicUsize::new(0),
        };
        let err = run_export(&driver, &sample_job(&dir), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClipmergeError::Unsupported { .. }));
        assert_eq!(driver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_plan_is_rejected_before_driver() {
        let dir = std::env::temp_dir().join("clipmerge_test_invalid_plan");
        let driver = RecordingDriver {
            available: true,
            calls: AtomicUsize::new(0),
        };
        let mut job = sample_job(&dir);
        job.plan.total_duration = MediaTime::from_secs(10);

        let err = run_export(&driver, &job, None).await.unwrap_err();
        assert!(matches!(err, ClipmergeError::Planning { .. }));
        assert_eq!(driver.calls.load(Ordering::SeqCst), 0);
    }
}
