//! ClipMerge Composition Core
//!
//! Turns two video clips (and an optional audio clip) into a merge plan:
//! - **Orientation:** Classify a clip's display transform into one of the
//!   four quarter-turn classes
//! - **Layout:** Scale and orient each clip onto the output canvas
//! - **Merge:** Place the clips back to back on one timeline with a cut at
//!   the boundary and audio underneath
//!
//! This crate is pure computation with no I/O and no platform dependencies.
//! All inputs are data; all outputs are data.

pub mod layout;
pub mod merge;
pub mod orientation;

pub use layout::build_layout;
pub use merge::{plan_merge, MergeError, MergeRequest, PlanWarning, PlannedMerge};
pub use orientation::{classify_orientation, Orientation};
