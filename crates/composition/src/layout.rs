//! Per-clip layout onto the output canvas.
//!
//! Every clip is uniformly scaled so its display width matches the canvas
//! width. Portrait clips measure against their natural height, because the
//! preferred transform turns them a quarter. Height is not fitted.

use clipmerge_media_model::{
    AffineTransform, ClipSlot, LayoutInstruction, OrientationClass, Size, TimeRange, VideoTrack,
};

use crate::orientation::classify_orientation;

/// Build the layout instruction that places `track` on a `canvas`-sized frame.
///
/// The instruction is scoped to `time_range` and carries a single transform
/// applied from time zero, with no opacity keyframe.
pub fn build_layout(
    slot: ClipSlot,
    track: &VideoTrack,
    canvas: Size,
    time_range: TimeRange,
) -> LayoutInstruction {
    let orientation = classify_orientation(&track.preferred_transform);
    let natural = track.natural_size;

    let scale = if orientation.is_portrait {
        canvas.width / natural.height
    } else {
        canvas.width / natural.width
    };
    let scale_transform = AffineTransform::scale(scale, scale);

    let transform = if orientation.class == OrientationClass::Down {
        // The half turn maps the frame into negative space; shift it back
        // by the natural width and by natural height plus canvas height.
        AffineTransform::rotation(std::f64::consts::PI)
            .concatenating(&AffineTransform::translation(
                natural.width,
                natural.height + canvas.height,
            ))
            .concatenating(&scale_transform)
    } else {
        track.preferred_transform.concatenating(&scale_transform)
    };

    tracing::debug!(
        slot = %slot,
        orientation = ?orientation.class,
        is_portrait = orientation.is_portrait,
        scale,
        "Built layout instruction"
    );

    LayoutInstruction {
        slot,
        time_range,
        natural_size: natural,
        transform,
        scale,
        orientation: orientation.class,
        is_portrait: orientation.is_portrait,
        opacity: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipmerge_media_model::MediaTime;

    fn track(width: f64, height: f64, transform: AffineTransform) -> VideoTrack {
        VideoTrack {
            natural_size: Size::new(width, height),
            preferred_transform: transform,
        }
    }

    fn range() -> TimeRange {
        TimeRange::from_zero(MediaTime::from_secs(4))
    }

    #[test]
    fn test_landscape_scales_by_width() {
        let t = track(1920.0, 1080.0, AffineTransform::IDENTITY);
        let instruction = build_layout(ClipSlot::First, &t, Size::new(1280.0, 720.0), range());
        assert_eq!(instruction.scale, 1280.0 / 1920.0);
        assert!(!instruction.is_portrait);
        assert_eq!(instruction.orientation, OrientationClass::Up);
        assert_eq!(
            instruction.transform,
            AffineTransform::scale(1280.0 / 1920.0, 1280.0 / 1920.0)
        );
        assert!(instruction.opacity.is_none());
    }

    #[test]
    fn test_portrait_scales_by_height() {
        let preferred = AffineTransform::new(0.0, 1.0, -1.0, 0.0, 1280.0, 0.0);
        let t = track(720.0, 1280.0, preferred);
        let instruction = build_layout(ClipSlot::Second, &t, Size::new(640.0, 480.0), range());
        assert_eq!(instruction.scale, 0.5);
        assert!(instruction.is_portrait);
        assert_eq!(instruction.orientation, OrientationClass::Right);
        assert_eq!(
            instruction.transform,
            preferred.concatenating(&AffineTransform::scale(0.5, 0.5))
        );
    }

    #[test]
    fn test_left_is_portrait() {
        let preferred = AffineTransform::new(0.0, -1.0, 1.0, 0.0, 0.0, 1920.0);
        let t = track(1920.0, 1080.0, preferred);
        let instruction = build_layout(ClipSlot::First, &t, Size::new(540.0, 960.0), range());
        assert_eq!(instruction.scale, 0.5);
        assert_eq!(instruction.orientation, OrientationClass::Left);
    }

    #[test]
    fn test_down_uses_half_turn_with_recentering() {
        let preferred = AffineTransform::new(-1.0, 0.0, 0.0, -1.0, 1280.0, 720.0);
        let t = track(1280.0, 720.0, preferred);
        let canvas = Size::new(1280.0, 720.0);
        let instruction = build_layout(ClipSlot::First, &t, canvas, range());

        assert_eq!(instruction.orientation, OrientationClass::Down);
        assert_eq!(instruction.scale, 1.0);

        let m = instruction.transform;
        assert!((m.a + 1.0).abs() < 1e-9);
        assert!((m.d + 1.0).abs() < 1e-9);
        assert!(m.b.abs() < 1e-9);
        assert!(m.c.abs() < 1e-9);
        assert!((m.tx - 1280.0).abs() < 1e-9);
        assert!((m.ty - (720.0 + 720.0)).abs() < 1e-9);
    }

    #[test]
    fn test_non_canonical_transform_keeps_preferred() {
        let preferred = AffineTransform::rotation(0.1);
        let t = track(1000.0, 500.0, preferred);
        let instruction = build_layout(ClipSlot::First, &t, Size::new(500.0, 250.0), range());
        assert_eq!(instruction.orientation, OrientationClass::Up);
        assert_eq!(instruction.scale, 0.5);
        assert_eq!(
            instruction.transform,
            preferred.concatenating(&AffineTransform::scale(0.5, 0.5))
        );
    }
}
