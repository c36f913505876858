//! Exact rational media time.
//!
//! Durations are stored as `value / timescale` seconds so that sums of clip
//! durations stay exact, whatever timescale each container reported.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Timescale used when converting from floating-point seconds.
pub const DEFAULT_TIMESCALE: i32 = 600;

/// A rational time value: `value / timescale` seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MediaTime {
    pub value: i64,
    pub timescale: i32,
}

impl MediaTime {
    pub const ZERO: MediaTime = MediaTime {
        value: 0,
        timescale: 1,
    };

    pub fn new(value: i64, timescale: i32) -> Self {
        Self { value, timescale }
    }

    /// Whole seconds.
    pub fn from_secs(secs: i64) -> Self {
        Self::new(secs, 1)
    }

    /// Nearest representable time at `timescale`.
    pub fn from_secs_f64(secs: f64, timescale: i32) -> Self {
        Self::new((secs * timescale as f64).round() as i64, timescale)
    }

    /// A positive timescale is required for every arithmetic operation.
    pub fn is_valid(&self) -> bool {
        self.timescale > 0
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    pub fn is_negative(&self) -> bool {
        self.is_valid() && self.value < 0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }

    /// Express this time at another timescale, if it divides exactly.
    pub fn convert_scale(&self, timescale: i32) -> Option<MediaTime> {
        if !self.is_valid() || timescale <= 0 {
            return None;
        }
        let scaled = self.value as i128 * timescale as i128;
        if scaled % self.timescale as i128 != 0 {
            return None;
        }
        i64::try_from(scaled / self.timescale as i128)
            .ok()
            .map(|value| MediaTime::new(value, timescale))
    }

    /// Sum of two times; `None` on invalid timescales or overflow.
    ///
    /// Exact whenever the reduced operands share a timescale that fits in
    /// `i32`. Otherwise both are rounded to the larger reduced timescale.
    pub fn checked_add(&self, other: &MediaTime) -> Option<MediaTime> {
        if !self.is_valid() || !other.is_valid() {
            return None;
        }
        if self.timescale == other.timescale {
            return self
                .value
                .checked_add(other.value)
                .map(|value| MediaTime::new(value, self.timescale));
        }
        let lhs = self.reduced();
        let rhs = other.reduced();
        let exact = i32::try_from(lcm(lhs.timescale as i64, rhs.timescale as i64))
            .ok()
            .and_then(|timescale| {
                Some((lhs.convert_scale(timescale)?, rhs.convert_scale(timescale)?))
            });
        let (lhs, rhs) = match exact {
            Some(pair) => pair,
            None => {
                let timescale = lhs.timescale.max(rhs.timescale);
                (lhs.round_to_scale(timescale)?, rhs.round_to_scale(timescale)?)
            }
        };
        lhs.value
            .checked_add(rhs.value)
            .map(|value| MediaTime::new(value, lhs.timescale))
    }

    /// Same time with `value` and `timescale` divided by their gcd.
    fn reduced(&self) -> MediaTime {
        let divisor = gcd(self.value, self.timescale as i64);
        if divisor <= 1 {
            return *self;
        }
        MediaTime::new(self.value / divisor, (self.timescale as i64 / divisor) as i32)
    }

    /// Nearest time at `timescale`, rounding half away from zero.
    fn round_to_scale(&self, timescale: i32) -> Option<MediaTime> {
        let scaled = self.value as i128 * timescale as i128;
        let den = self.timescale as i128;
        let half = den / 2;
        let rounded = if scaled >= 0 {
            (scaled + half) / den
        } else {
            (scaled - half) / den
        };
        i64::try_from(rounded)
            .ok()
            .map(|value| MediaTime::new(value, timescale))
    }

    fn cmp_exact(&self, other: &MediaTime) -> Ordering {
        let lhs = self.value as i128 * other.timescale as i128;
        let rhs = other.value as i128 * self.timescale as i128;
        lhs.cmp(&rhs)
    }
}

impl PartialEq for MediaTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_exact(other) == Ordering::Equal
    }
}

impl Eq for MediaTime {}

impl PartialOrd for MediaTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MediaTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_exact(other)
    }
}

impl Default for MediaTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for MediaTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}s", self.value, self.timescale)
    }
}

/// A half-open range `[start, start + duration)` on a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: MediaTime,
    pub duration: MediaTime,
}

impl TimeRange {
    pub fn new(start: MediaTime, duration: MediaTime) -> Self {
        Self { start, duration }
    }

    /// Range starting at zero.
    pub fn from_zero(duration: MediaTime) -> Self {
        Self::new(MediaTime::ZERO, duration)
    }

    /// `start + duration`, if representable.
    pub fn end(&self) -> Option<MediaTime> {
        self.start.checked_add(&self.duration)
    }

    pub fn is_empty(&self) -> bool {
        self.duration.is_zero()
    }

    /// Whether `t` falls inside `[start, end)`.
    pub fn contains(&self, t: MediaTime) -> bool {
        t >= self.start && self.ends_after(&t)
    }

    /// Two ranges overlap when they share any instant; empty ranges never do.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        other.ends_after(&self.start) && self.ends_after(&other.start)
    }

    /// `t < start + duration`, compared exactly without forming the sum.
    fn ends_after(&self, t: &MediaTime) -> bool {
        let (s, d) = (self.start, self.duration);
        if !t.is_valid() || !s.is_valid() || !d.is_valid() {
            return false;
        }
        // t.v / t.ts < (s.v * d.ts + d.v * s.ts) / (s.ts * d.ts)
        let lhs = t.value as i128 * s.timescale as i128 * d.timescale as i128;
        let end = s.value as i128 * d.timescale as i128 + d.value as i128 * s.timescale as i128;
        lhs < end * t.timescale as i128
    }
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a.abs()
}

fn lcm(a: i64, b: i64) -> i64 {
    a / gcd(a, b) * b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_across_timescales() {
        assert_eq!(MediaTime::new(600, 600), MediaTime::from_secs(1));
        assert_eq!(MediaTime::new(30, 30), MediaTime::new(44100, 44100));
        assert_ne!(MediaTime::new(1, 30), MediaTime::new(1, 25));
    }

    #[test]
    fn test_add_same_timescale() {
        let sum = MediaTime::new(300, 600)
            .checked_add(&MediaTime::new(900, 600))
            .unwrap();
        assert_eq!(sum.value, 1200);
        assert_eq!(sum.timescale, 600);
    }

    #[test]
    fn test_add_mixed_timescales_is_exact() {
        // 1/30 + 1/25 = 11/150
        let sum = MediaTime::new(1, 30)
            .checked_add(&MediaTime::new(1, 25))
            .unwrap();
        assert_eq!(sum, MediaTime::new(11, 150));
        assert_eq!(sum.timescale, 150);
    }

    #[test]
    fn test_add_reduces_before_rescaling() {
        // Both are one second at coprime timescales whose product overflows i32.
        let a = MediaTime::new(1_000_003, 1_000_003);
        let b = MediaTime::new(999_983, 999_983);
        let sum = a.checked_add(&b).unwrap();
        assert_eq!(sum, MediaTime::from_secs(2));
    }

    #[test]
    fn test_add_rounds_when_exact_scale_overflows() {
        let a = MediaTime::new(1, 999_983);
        let b = MediaTime::new(1, 1_000_003);
        let sum = a.checked_add(&b).unwrap();
        assert_eq!(sum.timescale, 1_000_003);
        assert_eq!(sum.value, 2);
    }

    #[test]
    fn test_end_overflow_is_none() {
        let range = TimeRange::new(MediaTime::new(i64::MAX, 1), MediaTime::from_secs(1));
        assert!(range.end().is_none());
        assert!(!range.contains(MediaTime::from_secs(1)));
    }

    #[test]
    fn test_overlap_is_exact_at_coprime_scales() {
        let a = TimeRange::from_zero(MediaTime::new(1, 1_000_003));
        let b = TimeRange::new(MediaTime::new(1, 999_983), MediaTime::new(1, 1_000_003));
        assert!(!a.overlaps(&b));
        assert!(b.contains(MediaTime::new(1, 999_983)));
        assert!(!a.contains(MediaTime::new(1, 999_983)));
    }

    #[test]
    fn test_checked_add_rejects_invalid_timescale() {
        assert!(MediaTime::new(1, 0)
            .checked_add(&MediaTime::from_secs(1))
            .is_none());
    }

    #[test]
    fn test_ordering() {
        assert!(MediaTime::new(1, 3) < MediaTime::new(1, 2));
        assert!(MediaTime::from_secs(5) > MediaTime::new(2999, 600));
    }

    #[test]
    fn test_from_secs_f64_rounds() {
        let t = MediaTime::from_secs_f64(2.5, DEFAULT_TIMESCALE);
        assert_eq!(t.value, 1500);
        assert!((t.as_secs_f64() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_range_overlap() {
        let a = TimeRange::from_zero(MediaTime::from_secs(5));
        let b = TimeRange::new(MediaTime::from_secs(5), MediaTime::from_secs(3));
        let c = TimeRange::new(MediaTime::from_secs(4), MediaTime::from_secs(3));
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert_eq!(b.end(), Some(MediaTime::from_secs(8)));
        assert!(b.contains(MediaTime::from_secs(5)));
        assert!(!b.contains(MediaTime::from_secs(8)));
    }

    #[test]
    fn test_empty_range_never_overlaps() {
        let empty = TimeRange::from_zero(MediaTime::ZERO);
        let full = TimeRange::from_zero(MediaTime::from_secs(3));
        assert!(empty.is_empty());
        assert!(!empty.overlaps(&full));
    }

    proptest::proptest! {
        #[test]
        fn prop_mixed_timescale_sum_is_exact(
            a in 0i64..1_000_000,
            b in 0i64..1_000_000,
            ts_a in 1i32..2_000,
            ts_b in 1i32..2_000,
        ) {
            let lhs = MediaTime::new(a, ts_a);
            let rhs = MediaTime::new(b, ts_b);
            let sum = lhs.checked_add(&rhs).unwrap();
            proptest::prop_assert_eq!(sum, rhs.checked_add(&lhs).unwrap());
            proptest::prop_assert!(sum >= lhs && sum >= rhs);
            let expected = a as f64 / ts_a as f64 + b as f64 / ts_b as f64;
            proptest::prop_assert!((sum.as_secs_f64() - expected).abs() < 1e-6);
        }
    }
}
