//! ClipMerge Media Model
//!
//! Defines the data contracts shared by planning and export:
//! - **Transform:** 2D affine transforms in the row-vector convention used
//!   by container display matrices
//! - **Time:** exact rational media time and time ranges
//! - **Clip:** probed media sources with their video/audio tracks
//! - **Plan:** the merge plan handed to an export driver
//!
//! All values are immutable once built and serialize to JSON.

pub mod clip;
pub mod plan;
pub mod time;
pub mod transform;

pub use clip::*;
pub use plan::*;
pub use time::*;
pub use transform::*;
