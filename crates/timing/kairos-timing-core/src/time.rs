//! Three-valued document time and its duration algebra.
//!
//! A time is either resolved (any finite number of seconds), indefinite
//! (positive infinity), or unresolved (NaN). The arithmetic below propagates
//! these states with deliberately asymmetric rules taken from the active
//! duration computation of the timing model; a naive `f32::min`/`f32::max`
//! gives the wrong answer for the mixed cases.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// One point or span on the document timeline, in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct TimeValue(f32);

impl TimeValue {
    pub const ZERO: TimeValue = TimeValue(0.0);
    pub const INDEFINITE: TimeValue = TimeValue(f32::INFINITY);
    pub const UNRESOLVED: TimeValue = TimeValue(f32::NAN);

    /// Wrap a raw number of seconds. Finite values are resolved; callers may
    /// also pass infinities or NaN to construct the other two states.
    #[inline]
    pub fn seconds(seconds: f32) -> Self {
        Self(seconds)
    }

    /// Raw seconds, including the infinity/NaN encodings.
    #[inline]
    pub fn as_seconds(self) -> f32 {
        self.0
    }

    /// Seconds when resolved, otherwise `None`.
    #[inline]
    pub fn resolved_seconds(self) -> Option<f32> {
        if self.is_resolved() {
            Some(self.0)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_resolved(self) -> bool {
        self.0.is_finite()
    }

    #[inline]
    pub fn is_indefinite(self) -> bool {
        self.0 == f32::INFINITY
    }

    #[inline]
    pub fn is_unresolved(self) -> bool {
        self.0.is_nan()
    }

    /// Sum. Unresolved absorbs everything, then indefinite, then ordinary
    /// addition. Native `f32` addition already implements these rules.
    #[inline]
    pub fn add(self, other: TimeValue) -> TimeValue {
        TimeValue(self.0 + other.0)
    }

    /// Difference. Unresolved if either operand is unresolved, indefinite if
    /// either operand is indefinite (including indefinite minus indefinite),
    /// otherwise ordinary subtraction.
    #[inline]
    pub fn subtract(self, other: TimeValue) -> TimeValue {
        if self.is_unresolved() || other.is_unresolved() {
            TimeValue::UNRESOLVED
        } else if self.is_indefinite() || other.is_indefinite() {
            TimeValue::INDEFINITE
        } else {
            TimeValue(self.0 - other.0)
        }
    }

    /// Scale a resolved time by `n`; indefinite and unresolved pass through
    /// with `n` ignored.
    #[inline]
    pub fn multiply(self, n: f32) -> TimeValue {
        if self.is_resolved() {
            TimeValue(self.0 * n)
        } else {
            self
        }
    }

    /// Minimum under the duration algebra: an exact zero on either side wins
    /// outright, a resolved operand beats indefinite or unresolved, and a
    /// mixed indefinite/unresolved pair collapses to indefinite.
    pub fn min(self, other: TimeValue) -> TimeValue {
        if self.0 == 0.0 || other.0 == 0.0 {
            return TimeValue::ZERO;
        }
        match (self.is_resolved(), other.is_resolved()) {
            (true, true) => TimeValue(self.0.min(other.0)),
            (true, false) => self,
            (false, true) => other,
            (false, false) => {
                if self.is_unresolved() && other.is_unresolved() {
                    TimeValue::UNRESOLVED
                } else {
                    TimeValue::INDEFINITE
                }
            }
        }
    }

    /// Maximum under the duration algebra: the mirror of `min`, except that a
    /// resolved operand loses to indefinite or unresolved, and a mixed
    /// indefinite/unresolved pair collapses to unresolved.
    pub fn max(self, other: TimeValue) -> TimeValue {
        match (self.is_resolved(), other.is_resolved()) {
            (true, true) => TimeValue(self.0.max(other.0)),
            (true, false) => other,
            (false, true) => self,
            (false, false) => {
                if self.is_indefinite() && other.is_indefinite() {
                    TimeValue::INDEFINITE
                } else {
                    TimeValue::UNRESOLVED
                }
            }
        }
    }
}

// Ordering uses the IEEE total order so unresolved (NaN) sorts after
// indefinite. Instance lists and the interval scan rely on this: a finite
// sample time is never `>=` an unresolved end, and an unresolved end is `>`
// any resolved begin.
impl PartialEq for TimeValue {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for TimeValue {}

impl PartialOrd for TimeValue {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeValue {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f32> for TimeValue {
    fn from(seconds: f32) -> Self {
        TimeValue::seconds(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(TimeValue::seconds(1.5).is_resolved());
        assert!(TimeValue::seconds(-2.0).is_resolved());
        assert!(TimeValue::INDEFINITE.is_indefinite());
        assert!(!TimeValue::INDEFINITE.is_resolved());
        assert!(TimeValue::UNRESOLVED.is_unresolved());
        assert!(!TimeValue::UNRESOLVED.is_resolved());
    }

    #[test]
    fn subtract_rules() {
        assert_eq!(
            TimeValue::seconds(5.0).subtract(TimeValue::seconds(2.0)),
            TimeValue::seconds(3.0)
        );
        assert_eq!(
            TimeValue::INDEFINITE.subtract(TimeValue::INDEFINITE),
            TimeValue::INDEFINITE
        );
        assert_eq!(
            TimeValue::seconds(5.0).subtract(TimeValue::INDEFINITE),
            TimeValue::INDEFINITE
        );
        assert!(TimeValue::UNRESOLVED
            .subtract(TimeValue::INDEFINITE)
            .is_unresolved());
        assert!(TimeValue::seconds(1.0)
            .subtract(TimeValue::UNRESOLVED)
            .is_unresolved());
    }

    #[test]
    fn multiply_rules() {
        assert_eq!(TimeValue::seconds(2.0).multiply(3.0), TimeValue::seconds(6.0));
        assert_eq!(TimeValue::INDEFINITE.multiply(3.0), TimeValue::INDEFINITE);
        assert!(TimeValue::UNRESOLVED.multiply(3.0).is_unresolved());
    }

    #[test]
    fn min_rules() {
        assert_eq!(
            TimeValue::ZERO.min(TimeValue::UNRESOLVED),
            TimeValue::ZERO
        );
        assert_eq!(
            TimeValue::INDEFINITE.min(TimeValue::ZERO),
            TimeValue::ZERO
        );
        assert_eq!(
            TimeValue::seconds(5.0).min(TimeValue::INDEFINITE),
            TimeValue::seconds(5.0)
        );
        assert_eq!(
            TimeValue::seconds(5.0).min(TimeValue::UNRESOLVED),
            TimeValue::seconds(5.0)
        );
        assert_eq!(
            TimeValue::UNRESOLVED.min(TimeValue::INDEFINITE),
            TimeValue::INDEFINITE
        );
        assert!(TimeValue::UNRESOLVED
            .min(TimeValue::UNRESOLVED)
            .is_unresolved());
        assert_eq!(
            TimeValue::seconds(2.0).min(TimeValue::seconds(3.0)),
            TimeValue::seconds(2.0)
        );
    }

    #[test]
    fn max_rules() {
        assert!(TimeValue::UNRESOLVED.max(TimeValue::seconds(5.0)).is_unresolved());
        assert_eq!(
            TimeValue::seconds(5.0).max(TimeValue::INDEFINITE),
            TimeValue::INDEFINITE
        );
        assert!(TimeValue::INDEFINITE
            .max(TimeValue::UNRESOLVED)
            .is_unresolved());
        assert_eq!(
            TimeValue::INDEFINITE.max(TimeValue::INDEFINITE),
            TimeValue::INDEFINITE
        );
        assert_eq!(
            TimeValue::seconds(2.0).max(TimeValue::seconds(3.0)),
            TimeValue::seconds(3.0)
        );
        // Zero has no special power over max, unlike min.
        assert_eq!(
            TimeValue::ZERO.max(TimeValue::seconds(3.0)),
            TimeValue::seconds(3.0)
        );
    }

    #[test]
    fn total_order_places_unresolved_last() {
        assert!(TimeValue::seconds(1.0) < TimeValue::INDEFINITE);
        assert!(TimeValue::INDEFINITE < TimeValue::UNRESOLVED);
        assert!(!(TimeValue::seconds(10.0) >= TimeValue::UNRESOLVED));
        assert_eq!(TimeValue::UNRESOLVED, TimeValue::UNRESOLVED);
    }
}
