//! Orientation classification of display transforms.
//!
//! Recording devices store camera orientation as one of four quarter-turn
//! display matrices. Matching is exact: anything else, including small
//! rotations and mirrored matrices, lands in the default arm as `Up`.

use clipmerge_media_model::{AffineTransform, OrientationClass};

/// Classified orientation of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation {
    pub class: OrientationClass,
    pub is_portrait: bool,
}

impl Orientation {
    const fn of(class: OrientationClass) -> Self {
        Self {
            class,
            is_portrait: matches!(class, OrientationClass::Left | OrientationClass::Right),
        }
    }
}

/// Classify the linear part of a preferred transform.
///
/// | a | b | c | d | class |
/// |---|---|---|---|---|
/// | 0 | 1 | -1 | 0 | Right |
/// | 0 | -1 | 1 | 0 | Left |
/// | 1 | 0 | 0 | 1 | Up |
/// | -1 | 0 | 0 | -1 | Down |
///
/// Translation is ignored. Any other linear part is `Up`, not portrait.
pub fn classify_orientation(transform: &AffineTransform) -> Orientation {
    let AffineTransform { a, b, c, d, .. } = *transform;

    let class = if a == 0.0 && b == 1.0 && c == -1.0 && d == 0.0 {
        OrientationClass::Right
    } else if a == 0.0 && b == -1.0 && c == 1.0 && d == 0.0 {
        OrientationClass::Left
    } else if a == 1.0 && b == 0.0 && c == 0.0 && d == 1.0 {
        OrientationClass::Up
    } else if a == -1.0 && b == 0.0 && c == 0.0 && d == -1.0 {
        OrientationClass::Down
    } else {
        tracing::trace!(a, b, c, d, "Non-canonical display transform, treating as up");
        OrientationClass::Up
    };

    Orientation::of(class)
}
