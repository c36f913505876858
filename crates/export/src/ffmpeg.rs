//! ffmpeg export driver.
//!
//! Each non-empty video segment becomes one filter chain: trim the source
//! range, apply the axis-aligned part of the layout transform as
//! transpose/flip filters, scale to the transformed bounding box and overlay
//! it on a black canvas at the box origin. The chains are concatenated in
//! timeline order. Inputs are opened with `-noautorotate` because the layout
//! transforms already encode display orientation.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use clipmerge_common::error::{ClipmergeError, ClipmergeResult};
use clipmerge_media_model::{AffineTransform, LayoutInstruction, MediaTime, TrackSegment};

use crate::export::{
    ExportDriver, ExportJob, ExportProgress, ExportSettings, ExportStage, ProgressCallback,
    QualityPreset,
};

const AXIS_EPSILON: f64 = 1e-9;
const AUDIO_BITRATE: &str = "192k";

/// Export driver that shells out to the `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegDriver {
    binary: String,
}

impl Default for FfmpegDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegDriver {
    pub fn new() -> Self {
        Self::with_binary("ffmpeg")
    }

    /// Use a specific ffmpeg executable.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait::async_trait]
impl ExportDriver for FfmpegDriver {
    async fn export(
        &self,
        job: &ExportJob,
        progress: Option<ProgressCallback>,
    ) -> ClipmergeResult<PathBuf> {
        let invocation = build_invocation(job)?;
        tracing::info!(
            output = %job.output_path.display(),
            inputs = invocation.input_count,
            total_frames = invocation.total_frames,
            "Encoding merge with ffmpeg"
        );

        let binary = self.binary.clone();
        tokio::task::spawn_blocking(move || run_ffmpeg(&binary, &invocation, progress))
            .await
            .map_err(|e| ClipmergeError::export(format!("ffmpeg worker failed: {e}")))??;

        if !job.output_path.exists() {
            return Err(ClipmergeError::export(format!(
                "ffmpeg reported success but {} was not written",
                job.output_path.display()
            )));
        }

        Ok(job.output_path.clone())
    }

    fn is_available(&self) -> bool {
        command_exists(&self.binary)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// A fully built ffmpeg command line for one job.
#[derive(Debug, Clone)]
pub struct FfmpegInvocation {
    pub args: Vec<String>,
    pub input_count: usize,
    pub total_frames: u64,
    pub expected_duration_secs: f64,
}

/// Translate an export job into ffmpeg arguments.
pub fn build_invocation(job: &ExportJob) -> ClipmergeResult<FfmpegInvocation> {
    let plan = &job.plan;
    let fps = plan.frame_rate();
    if fps == 0 {
        return Err(ClipmergeError::export("plan has no usable frame rate"));
    }

    let render_w = even_dimension(plan.render_size.width);
    let render_h = even_dimension(plan.render_size.height);

    let mut args = vec!["-y".to_string()];
    let mut graph = Vec::new();
    let mut labels = Vec::new();

    let layers = plan
        .video_segments
        .iter()
        .zip(&plan.instructions)
        .filter(|(segment, _)| !segment.source_range.is_empty());
    for (input, (segment, instruction)) in layers.enumerate() {
        args.extend([
            "-noautorotate".to_string(),
            "-i".to_string(),
            segment.source.to_string_lossy().to_string(),
        ]);
        graph.push(segment_chain(input, segment, instruction, render_w, render_h, fps));
        labels.push(format!("[v{input}]"));
    }

    if labels.is_empty() {
        return Err(ClipmergeError::export("plan has no video to encode"));
    }

    let concat = if labels.len() == 1 {
        format!("{}null[vout]", labels[0])
    } else {
        format!("{}concat=n={}:v=1:a=0[vout]", labels.concat(), labels.len())
    };
    graph.push(concat);

    let mut input_count = labels.len();
    if let Some(audio) = &plan.audio {
        args.extend([
            "-i".to_string(),
            audio.source.to_string_lossy().to_string(),
        ]);
        graph.push(format!(
            "[{input_count}:a:{}]atrim=start={}:duration={},asetpts=PTS-STARTPTS[aout]",
            audio.track_index,
            secs(audio.source_range.start),
            secs(audio.source_range.duration),
        ));
        input_count += 1;
    }

    args.extend([
        "-filter_complex".to_string(),
        graph.join(";"),
        "-map".to_string(),
        "[vout]".to_string(),
    ]);
    if plan.audio.is_some() {
        args.extend(["-map".to_string(), "[aout]".to_string()]);
    } else {
        args.push("-an".to_string());
    }

    args.extend([
        "-r".to_string(),
        fps.to_string(),
        "-t".to_string(),
        secs(plan.total_duration),
    ]);
    args.extend(codec_args_for_settings(&job.settings, plan.audio.is_some()));
    args.extend([
        "-progress".to_string(),
        "pipe:1".to_string(),
        "-nostats".to_string(),
        job.output_path.to_string_lossy().to_string(),
    ]);

    Ok(FfmpegInvocation {
        args,
        input_count,
        total_frames: plan.total_frames(),
        expected_duration_secs: plan.total_duration.as_secs_f64(),
    })
}

fn segment_chain(
    input: usize,
    segment: &TrackSegment,
    instruction: &LayoutInstruction,
    render_w: u32,
    render_h: u32,
    fps: u32,
) -> String {
    let transform = instruction.transform;
    let natural = instruction.natural_size;
    let (min_x, min_y, max_x, max_y) = transform.bounding_box(natural.width, natural.height);
    let width = even_dimension(max_x - min_x);
    let height = even_dimension(max_y - min_y);

    let reorient = reorient_filter(&transform).unwrap_or_else(|| {
        tracing::warn!(
            slot = %instruction.slot,
            a = transform.a,
            b = transform.b,
            c = transform.c,
            d = transform.d,
            "Layout transform is not axis-aligned, rendering unrotated"
        );
        "null"
    });

    let duration = secs(segment.source_range.duration);
    format!(
        "[{input}:v:{track}]trim=start={start}:duration={duration},setpts=PTS-STARTPTS,\
         {reorient},scale={width}:{height},setsar=1[fg{input}];\
         color=c=black:s={render_w}x{render_h}:r={fps}:d={duration}[bg{input}];\
         [bg{input}][fg{input}]overlay=x={x}:y={y}:shortest=1,format=yuv420p[v{input}]",
        track = segment.track_index,
        start = secs(segment.source_range.start),
        x = min_x.round() as i64,
        y = min_y.round() as i64,
    )
}

/// Filter that reproduces the linear part of `transform` up to scale.
///
/// Returns `None` when the transform is not a multiple of a quarter turn,
/// optionally mirrored.
fn reorient_filter(transform: &AffineTransform) -> Option<&'static str> {
    let sign = |v: f64| {
        if v > AXIS_EPSILON {
            1
        } else if v < -AXIS_EPSILON {
            -1
        } else {
            0
        }
    };
    match (
        sign(transform.a),
        sign(transform.b),
        sign(transform.c),
        sign(transform.d),
    ) {
        (1, 0, 0, 1) => Some("null"),
        (-1, 0, 0, -1) => Some("hflip,vflip"),
        (-1, 0, 0, 1) => Some("hflip"),
        (1, 0, 0, -1) => Some("vflip"),
        (0, 1, -1, 0) => Some("transpose=clock"),
        (0, -1, 1, 0) => Some("transpose=cclock"),
        (0, 1, 1, 0) => Some("transpose=cclock_flip"),
        (0, -1, -1, 0) => Some("transpose=clock_flip"),
        _ => None,
    }
}

/// Round to an even pixel count, at least 2, as yuv420p requires.
fn even_dimension(value: f64) -> u32 {
    let rounded = (value.abs() / 2.0).round() * 2.0;
    (rounded as u32).max(2)
}

fn secs(t: MediaTime) -> String {
    format!("{:.6}", t.as_secs_f64())
}

fn codec_args_for_settings(settings: &ExportSettings, has_audio: bool) -> Vec<String> {
    let (preset, crf) = match settings.preset {
        QualityPreset::HighestQuality => ("slow", 18),
        QualityPreset::MediumQuality => ("medium", 23),
        QualityPreset::LowQuality => ("veryfast", 28),
    };

    let mut args = vec![
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        preset.to_string(),
        "-crf".to_string(),
        crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ];
    if has_audio {
        args.extend([
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            AUDIO_BITRATE.to_string(),
        ]);
    }
    args.extend(["-f".to_string(), settings.container.muxer().to_string()]);
    if settings.optimize_for_network {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }
    args
}

fn run_ffmpeg(
    binary: &str,
    invocation: &FfmpegInvocation,
    progress: Option<ProgressCallback>,
) -> ClipmergeResult<()> {
    tracing::debug!(args = ?invocation.args, "Running ffmpeg");
    let mut cmd = Command::new(binary);
    cmd.args(&invocation.args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let start = std::time::Instant::now();
    let mut child = cmd
        .spawn()
        .map_err(|e| ClipmergeError::export(format!("Failed to start ffmpeg: {e}")))?;

    tracing::info!(
        pid = child.id(),
        args_len = invocation.args.len(),
        total_frames = invocation.total_frames,
        "ffmpeg process started"
    );

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ClipmergeError::export("Failed to capture ffmpeg stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ClipmergeError::export("Failed to capture ffmpeg stderr"))?;

    // ffmpeg blocks once the stderr pipe fills.
    let stderr_task = std::thread::spawn(move || -> String {
        let mut reader = BufReader::new(stderr);
        let mut output = String::new();
        match reader.read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    });

    let mut reader = BufReader::new(stdout);
    let mut line = String::new();
    let mut state = ProgressState::default();
    loop {
        line.clear();
        let bytes = reader
            .read_line(&mut line)
            .map_err(|e| ClipmergeError::export(format!("Failed reading ffmpeg progress: {e}")))?;
        if bytes == 0 {
            break;
        }

        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        state.update(key, value);
        if key == "progress" {
            if let Some(cb) = &progress {
                cb(progress_report(
                    &state,
                    invocation.total_frames,
                    invocation.expected_duration_secs,
                    start.elapsed().as_secs_f64(),
                ));
            }
        }
    }

    let status = child
        .wait()
        .map_err(|e| ClipmergeError::export(format!("Failed to wait on ffmpeg: {e}")))?;
    let stderr_output = stderr_task
        .join()
        .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

    if !status.success() {
        if let Some(cb) = &progress {
            cb(ExportProgress::stage(
                ExportStage::Failed,
                invocation.total_frames,
            ));
        }
        return Err(ClipmergeError::export(format!(
            "ffmpeg export failed (status {}): {}",
            status,
            stderr_output.trim()
        )));
    }

    if let Some(cb) = &progress {
        cb(ExportProgress::stage(
            ExportStage::Complete,
            invocation.total_frames,
        ));
    }

    tracing::info!(
        elapsed_secs = start.elapsed().as_secs_f64(),
        "ffmpeg export finished"
    );
    Ok(())
}

/// Whether `binary` resolves on the current `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .args(["-c", r#"command -v "$1" >/dev/null 2>&1"#, "sh"])
        .arg(binary)
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Default)]
struct ProgressState {
    frame: u64,
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            "frame" => {
                if let Ok(frame) = value.trim().parse::<u64>() {
                    self.frame = frame;
                }
            }
            // ffmpeg reports microseconds under both keys.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.trim().parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value.trim() == "end";
            }
            _ => {}
        }
    }
}

fn progress_report(
    state: &ProgressState,
    total_frames: u64,
    expected_duration_secs: f64,
    elapsed_secs: f64,
) -> ExportProgress {
    let progress = if expected_duration_secs <= 0.0 {
        0.0
    } else {
        (state.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    };

    let frames_rendered = if state.frame > 0 {
        state.frame.min(total_frames)
    } else {
        (progress * total_frames as f64).round() as u64
    };
    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    ExportProgress {
        progress: if state.complete { 1.0 } else { progress },
        frames_rendered,
        total_frames,
        eta_secs,
        stage: if state.complete {
            ExportStage::Finalizing
        } else {
            ExportStage::Encoding
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipmerge_composition::{plan_merge, MergeRequest};
    use clipmerge_media_model::{ClipDescriptor, Size};

    fn right(natural_height: f64) -> AffineTransform {
        AffineTransform::new(0.0, 1.0, -1.0, 0.0, natural_height, 0.0)
    }

    fn job(audio: Option<ClipDescriptor>, settings: ExportSettings) -> ExportJob {
        let mut request = MergeRequest::new(
            ClipDescriptor::video(
                "/in/portrait.mov",
                Size::new(720.0, 1280.0),
                right(1280.0),
                MediaTime::from_secs(4),
            ),
            ClipDescriptor::video(
                "/in/landscape.mov",
                Size::new(1280.0, 720.0),
                AffineTransform::IDENTITY,
                MediaTime::from_secs(2),
            ),
            Size::new(640.0, 360.0),
        );
        if let Some(audio) = audio {
            request = request.with_audio(audio);
        }
        let plan = plan_merge(&request).unwrap().plan;
        ExportJob::new(plan, "/out/merged.mov", settings)
    }

    fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_filter_graph_orients_and_places_each_segment() {
        let invocation = build_invocation(&job(None, ExportSettings::default())).unwrap();
        let graph = arg_after(&invocation.args, "-filter_complex").unwrap();

        assert!(graph.contains(
            "[0:v:0]trim=start=0.000000:duration=4.000000,setpts=PTS-STARTPTS,\
             transpose=clock,scale=640:360,setsar=1[fg0]"
        ));
        assert!(graph.contains("color=c=black:s=640x360:r=30:d=4.000000[bg0]"));
        assert!(graph.contains("[bg0][fg0]overlay=x=0:y=0:shortest=1"));
        assert!(graph.contains(
            "[1:v:0]trim=start=0.000000:duration=2.000000,setpts=PTS-STARTPTS,\
             null,scale=640:360,setsar=1[fg1]"
        ));
        assert!(graph.ends_with("[v0][v1]concat=n=2:v=1:a=0[vout]"));
        assert_eq!(invocation.input_count, 2);
        assert_eq!(invocation.total_frames, 180);
    }

    #[test]
    fn test_inputs_disable_autorotate() {
        let invocation = build_invocation(&job(None, ExportSettings::default())).unwrap();
        let args = &invocation.args;
        let inputs: Vec<_> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-i")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(inputs.len(), 2);
        for i in inputs {
            assert_eq!(args[i - 1], "-noautorotate");
        }
        assert!(args.contains(&"-an".to_string()));
        assert_eq!(arg_after(args, "-t"), Some("6.000000"));
        assert_eq!(arg_after(args, "-r"), Some("30"));
        assert_eq!(args.last().map(String::as_str), Some("/out/merged.mov"));
    }

    #[test]
    fn test_audio_is_trimmed_to_output() {
        let audio = ClipDescriptor::audio("/in/music.m4a", MediaTime::from_secs(60));
        let invocation = build_invocation(&job(Some(audio), ExportSettings::default())).unwrap();
        let args = &invocation.args;
        let graph = arg_after(args, "-filter_complex").unwrap();

        assert!(graph.contains(
            "[2:a:0]atrim=start=0.000000:duration=6.000000,asetpts=PTS-STARTPTS[aout]"
        ));
        assert!(!args.contains(&"-an".to_string()));
        assert_eq!(arg_after(args, "-c:a"), Some("aac"));
        assert_eq!(invocation.input_count, 3);
    }

    #[test]
    fn test_zero_length_segment_is_not_an_input() {
        let size = Size::new(640.0, 480.0);
        let request = MergeRequest::new(
            ClipDescriptor::video("/in/empty.mov", size, AffineTransform::IDENTITY, MediaTime::ZERO),
            ClipDescriptor::video("/in/b.mov", size, AffineTransform::IDENTITY, MediaTime::from_secs(1)),
            size,
        );
        let plan = plan_merge(&request).unwrap().plan;
        let invocation =
            build_invocation(&ExportJob::new(plan, "/out/x.mov", ExportSettings::default()))
                .unwrap();
        assert!(!invocation.args.contains(&"/in/empty.mov".to_string()));
        let graph = arg_after(&invocation.args, "-filter_complex").unwrap();
        assert!(graph.ends_with("[v0]null[vout]"));
    }

    #[test]
    fn test_codec_args_follow_settings() {
        let highest = codec_args_for_settings(&ExportSettings::default(), false);
        assert_eq!(arg_after(&highest, "-crf"), Some("18"));
        assert_eq!(arg_after(&highest, "-f"), Some("mov"));
        assert_eq!(arg_after(&highest, "-movflags"), Some("+faststart"));
        assert!(!highest.contains(&"-c:a".to_string()));

        let low = codec_args_for_settings(
            &ExportSettings {
                preset: QualityPreset::LowQuality,
                optimize_for_network: false,
                ..ExportSettings::default()
            },
            true,
        );
        assert_eq!(arg_after(&low, "-crf"), Some("28"));
        assert!(!low.contains(&"-movflags".to_string()));
        assert_eq!(arg_after(&low, "-b:a"), Some("192k"));
    }

    #[test]
    fn test_reorient_filter_covers_quarter_turns_and_mirrors() {
        let cases = [
            (AffineTransform::IDENTITY, Some("null")),
            (AffineTransform::scale(0.5, 0.5), Some("null")),
            (AffineTransform::new(-1.0, 0.0, 0.0, -1.0, 0.0, 0.0), Some("hflip,vflip")),
            (AffineTransform::new(-1.0, 0.0, 0.0, 1.0, 0.0, 0.0), Some("hflip")),
            (AffineTransform::new(0.0, -2.0, 2.0, 0.0, 0.0, 0.0), Some("transpose=cclock")),
            (AffineTransform::new(0.0, 1.0, 1.0, 0.0, 0.0, 0.0), Some("transpose=cclock_flip")),
            (AffineTransform::rotation(0.3), None),
        ];
        for (transform, expected) in cases {
            assert_eq!(reorient_filter(&transform), expected, "{transform:?}");
        }
        // A half turn built from a rotation carries tiny residues.
        let half = AffineTransform::rotation(std::f64::consts::PI);
        assert_eq!(reorient_filter(&half), Some("hflip,vflip"));
    }

    #[test]
    fn test_even_dimension() {
        assert_eq!(even_dimension(639.6), 640);
        assert_eq!(even_dimension(641.0), 642);
        assert_eq!(even_dimension(0.4), 2);
    }

    #[test]
    fn test_progress_state_and_report() {
        let mut state = ProgressState::default();
        state.update("frame", "45");
        state.update("out_time_us", "1500000");
        state.update("progress", "continue");
        let report = progress_report(&state, 90, 3.0, 2.0);
        assert_eq!(report.frames_rendered, 45);
        assert!((report.progress - 0.5).abs() < 1e-9);
        assert!((report.eta_secs - 2.0).abs() < 1e-9);
        assert_eq!(report.stage, ExportStage::Encoding);

        state.update("progress", "end");
        let report = progress_report(&state, 90, 3.0, 4.0);
        assert_eq!(report.progress, 1.0);
        assert_eq!(report.stage, ExportStage::Finalizing);
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let driver = FfmpegDriver::with_binary("clipmerge-no-such-ffmpeg");
        assert!(!driver.is_available());
        assert_eq!(driver.name(), "ffmpeg");
    }

    #[test]
    fn test_command_exists_passes_name_as_argument() {
        assert!(command_exists("sh"));
        let marker = std::env::temp_dir().join("clipmerge-command-exists-marker");
        let _ = std::fs::remove_file(&marker);
        let hostile = format!("nope; touch {}", marker.display());
        assert!(!command_exists(&hostile));
        assert!(!marker.exists());
    }
}
