//! ClipMerge Export
//!
//! Hands a validated merge plan to an encoder and reports back once.
//!
//! # Pipeline Architecture
//!
//! ```text
//! first.mov ──┐
//!             ├── probe (ffprobe) ── ClipDescriptor ──┐
//! second.mov ─┘                                       │
//!                                                     ├── plan_merge
//! music.m4a ──── probe (ffprobe) ── ClipDescriptor ───┘        │
//!                                                              ▼
//!                                                      MergePlan ── compositor check
//!                                                              │
//!                                                              ▼
//!                                                 ExportDriver (ffmpeg, tokio task)
//!                                                              │
//!                                                              ▼
//!                                                   ExportOutcome (oneshot)
//! ```

pub mod compositor;
pub mod export;
pub mod ffmpeg;
pub mod probe;
pub mod session;

pub use export::*;
pub use ffmpeg::FfmpegDriver;
pub use probe::{parse_probe_output, probe_clip};
pub use session::{MergeSession, StartedMerge};
