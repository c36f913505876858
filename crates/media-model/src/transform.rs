//! 2D affine transforms.
//!
//! Points are row vectors: `[x y 1] * M`, so
//! `x' = a*x + c*y + tx` and `y' = b*x + d*y + ty`.
//! This is the layout container display matrices use, which keeps the
//! canonical orientation patterns (`0, 1, -1, 0` and friends) readable.

use serde::{Deserialize, Serialize};

/// An immutable 2D affine transform: linear part `(a, b, c, d)` plus
/// translation `(tx, ty)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl AffineTransform {
    /// The identity transform.
    pub const IDENTITY: AffineTransform = AffineTransform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, tx: f64, ty: f64) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    /// Non-uniform scale about the origin.
    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Pure translation.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Rotation about the origin by `radians`.
    pub fn rotation(radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// Compose: `self` is applied first, then `other`.
    pub fn concatenating(&self, other: &AffineTransform) -> AffineTransform {
        AffineTransform {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            tx: self.tx * other.a + self.ty * other.c + other.tx,
            ty: self.tx * other.b + self.ty * other.d + other.ty,
        }
    }

    /// Map a point through this transform.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }

    /// Exact comparison against the identity.
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Determinant of the linear part.
    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Axis-aligned bounding box `(min_x, min_y, max_x, max_y)` of the
    /// rectangle `[0, width] x [0, height]` after this transform.
    pub fn bounding_box(&self, width: f64, height: f64) -> (f64, f64, f64, f64) {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(width, 0.0),
            self.apply(0.0, height),
            self.apply(width, height),
        ];
        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }
}

/// Rotation class of a display transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrientationClass {
    #[default]
    Up,
    Down,
    Left,
    Right,
}

impl OrientationClass {
    /// Left and Right are quarter turns, so width and height swap on screen.
    pub fn is_portrait(&self) -> bool {
        matches!(self, OrientationClass::Left | OrientationClass::Right)
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identity_apply() {
        let p = AffineTransform::IDENTITY.apply(3.0, 4.0);
        assert_eq!(p, (3.0, 4.0));
        assert!(AffineTransform::default().is_identity());
    }

    #[test]
    fn test_concatenation_order() {
        // Scale first, then translate: (1,1) -> (2,2) -> (12,2)
        let t = AffineTransform::scale(2.0, 2.0)
            .concatenating(&AffineTransform::translation(10.0, 0.0));
        assert_eq!(t.apply(1.0, 1.0), (12.0, 2.0));

        // Translate first, then scale: (1,1) -> (11,1) -> (22,2)
        let t = AffineTransform::translation(10.0, 0.0)
            .concatenating(&AffineTransform::scale(2.0, 2.0));
        assert_eq!(t.apply(1.0, 1.0), (22.0, 2.0));
    }

    #[test]
    fn test_rotation_quarter_turn() {
        let r = AffineTransform::rotation(std::f64::consts::FRAC_PI_2);
        let (x, y) = r.apply(1.0, 0.0);
        assert!(approx(x, 0.0));
        assert!(approx(y, 1.0));
    }

    #[test]
    fn test_half_turn_matches_down_pattern() {
        let r = AffineTransform::rotation(std::f64::consts::PI);
        assert!(approx(r.a, -1.0));
        assert!(approx(r.d, -1.0));
        assert!(approx(r.b, 0.0));
        assert!(approx(r.c, 0.0));
    }

    #[test]
    fn test_bounding_box_of_portrait_display_matrix() {
        // 720x1280 natural frame rotated into a 1280-wide display.
        let t = AffineTransform::new(0.0, 1.0, -1.0, 0.0, 1280.0, 0.0);
        let (min_x, min_y, max_x, max_y) = t.bounding_box(720.0, 1280.0);
        assert_eq!((min_x, min_y, max_x, max_y), (0.0, 0.0, 1280.0, 720.0));
    }

    #[test]
    fn test_determinant() {
        assert_eq!(AffineTransform::scale(2.0, 3.0).determinant(), 6.0);
        assert_eq!(
            AffineTransform::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0).determinant(),
            1.0
        );
    }
}
