//! Base types a temporal value can range over.
//!
//! The [`BaseValue`] trait is the registry of recognized base types: it
//! dispatches equality, hashing, linear-interpolation ability, collinearity,
//! and the segment-level solvers (value location and crossings) used by
//! restriction and synchronization. Implementations exist for `bool`,
//! `i64`, `f64`, [`Text`], and the spatial point type in
//! [`crate::point`].

use crate::boxes::{TBox, TemporalBox};
use crate::error::{Result, TemporalError};
use crate::span::{Span, SpanBound, TsTzSpan};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Tolerance for near-zero checks in collinearity and crossover solving.
///
/// Never used for equality of values inserted by the user.
pub const EPSILON: f64 = 1e-12;

/// A type usable as the base of a temporal value.
pub trait BaseValue: Clone + PartialEq + fmt::Debug {
    /// Bounding box kind cached on composite temporal values.
    type Bbox: TemporalBox;

    /// Whether linear interpolation is meaningful for this type.
    const CONTINUOUS: bool;

    /// Name used in diagnostics.
    const NAME: &'static str;

    /// Reject values that must not enter a temporal (non-finite floats).
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Verify that two values may appear in the same temporal or be
    /// combined by a binary operator (SRID and friends for points).
    fn ensure_compatible(&self, _other: &Self) -> Result<()> {
        Ok(())
    }

    /// Value at `ratio` in `[0, 1]` along the segment from `self` to
    /// `other`. Step types hold their left value.
    fn interpolate(&self, _other: &Self, _ratio: f64) -> Self {
        self.clone()
    }

    /// Whether `mid` lies on the straight segment from `first` to `last`
    /// at `ratio`, within [`EPSILON`]. Only meaningful for continuous
    /// types.
    fn collinear(_first: &Self, _mid: &Self, _last: &Self, _ratio: f64) -> bool {
        false
    }

    /// Ratio in `[0, 1]` at which the linear segment from `start` to `end`
    /// passes through `target`, if it does. Only meaningful for continuous
    /// types.
    fn segment_locate(_start: &Self, _end: &Self, _target: &Self) -> Option<f64> {
        None
    }

    /// Ratio strictly inside `(0, 1)` at which two synchronized linear
    /// segments take the same value, if they cross.
    fn value_cross(_a1: &Self, _a2: &Self, _b1: &Self, _b2: &Self) -> Option<f64> {
        None
    }

    /// Distance used by streaming gap detection; `None` when the type has
    /// no meaningful distance.
    fn gap_distance(&self, _other: &Self) -> Option<f64> {
        None
    }

    fn hash_value<H: Hasher>(&self, state: &mut H);

    /// Bounding box of a single instant.
    fn instant_box(&self, t: DateTime<Utc>) -> Self::Bbox;
}

impl BaseValue for bool {
    type Bbox = TsTzSpan;
    const CONTINUOUS: bool = false;
    const NAME: &'static str = "bool";

    fn hash_value<H: Hasher>(&self, state: &mut H) {
        self.hash(state);
    }

    fn instant_box(&self, t: DateTime<Utc>) -> TsTzSpan {
        Span::instant(t)
    }
}

impl BaseValue for i64 {
    type Bbox = TBox;
    const CONTINUOUS: bool = false;
    const NAME: &'static str = "int";

    fn gap_distance(&self, other: &Self) -> Option<f64> {
        Some((self - other).abs() as f64)
    }

    fn hash_value<H: Hasher>(&self, state: &mut H) {
        self.hash(state);
    }

    fn instant_box(&self, t: DateTime<Utc>) -> TBox {
        TBox::from_value_time(*self as f64, t)
    }
}

impl BaseValue for f64 {
    type Bbox = TBox;
    const CONTINUOUS: bool = true;
    const NAME: &'static str = "float";

    fn validate(&self) -> Result<()> {
        if self.is_finite() {
            Ok(())
        } else {
            Err(TemporalError::InvalidInput(format!(
                "float value must be finite, got: {}",
                self
            )))
        }
    }

    fn interpolate(&self, other: &Self, ratio: f64) -> Self {
        self + (other - self) * ratio
    }

    fn collinear(first: &Self, mid: &Self, last: &Self, ratio: f64) -> bool {
        (mid - first.interpolate(last, ratio)).abs() <= EPSILON
    }

    fn segment_locate(start: &Self, end: &Self, target: &Self) -> Option<f64> {
        if start == end {
            return if target == start { Some(0.0) } else { None };
        }
        let (min, max) = if start < end {
            (start, end)
        } else {
            (end, start)
        };
        if target < min || target > max {
            return None;
        }
        Some((target - start) / (end - start))
    }

    fn value_cross(a1: &Self, a2: &Self, b1: &Self, b2: &Self) -> Option<f64> {
        let denom = (a2 - a1) - (b2 - b1);
        if denom.abs() <= EPSILON {
            return None;
        }
        let ratio = (b1 - a1) / denom;
        if ratio > 0.0 && ratio < 1.0 {
            Some(ratio)
        } else {
            None
        }
    }

    fn gap_distance(&self, other: &Self) -> Option<f64> {
        Some((self - other).abs())
    }

    fn hash_value<H: Hasher>(&self, state: &mut H) {
        self.to_bits().hash(state);
    }

    fn instant_box(&self, t: DateTime<Utc>) -> TBox {
        TBox::from_value_time(*self, t)
    }
}

/// Text base values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Text(String);

impl Text {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Concatenation, the lifted binary function for text.
    pub fn concat(&self, other: &Self) -> Self {
        Self(format!("{}{}", self.0, other.0))
    }

    pub fn to_uppercase(&self) -> Self {
        Self(self.0.to_uppercase())
    }

    pub fn to_lowercase(&self) -> Self {
        Self(self.0.to_lowercase())
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Text {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl BaseValue for Text {
    type Bbox = TsTzSpan;
    const CONTINUOUS: bool = false;
    const NAME: &'static str = "text";

    fn hash_value<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }

    fn instant_box(&self, t: DateTime<Utc>) -> TsTzSpan {
        Span::instant(t)
    }
}

/// Numeric base values: the ones a [`TBox`] and a value [`Span`] can hold.
pub trait NumberValue: BaseValue<Bbox = TBox> + SpanBound + Copy + PartialOrd {
    fn to_f64(self) -> f64;
}

impl NumberValue for i64 {
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl NumberValue for f64 {
    fn to_f64(self) -> f64 {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_validate() {
        assert!(1.5f64.validate().is_ok());
        assert!(f64::NAN.validate().is_err());
        assert!(f64::INFINITY.validate().is_err());
    }

    #[test]
    fn test_float_interpolate() {
        assert_eq!(10.0f64.interpolate(&20.0, 0.5), 15.0);
        assert_eq!(10.0f64.interpolate(&20.0, 0.0), 10.0);
        assert_eq!(10.0f64.interpolate(&20.0, 1.0), 20.0);
    }

    #[test]
    fn test_float_collinear() {
        assert!(f64::collinear(&0.0, &5.0, &10.0, 0.5));
        assert!(!f64::collinear(&0.0, &6.0, &10.0, 0.5));
    }

    #[test]
    fn test_float_segment_locate() {
        assert_eq!(f64::segment_locate(&10.0, &20.0, &15.0), Some(0.5));
        assert_eq!(f64::segment_locate(&20.0, &10.0, &15.0), Some(0.5));
        assert_eq!(f64::segment_locate(&10.0, &20.0, &25.0), None);
        assert_eq!(f64::segment_locate(&10.0, &10.0, &10.0), Some(0.0));
    }

    #[test]
    fn test_float_value_cross() {
        // 0 -> 10 against 10 -> 0 cross exactly midway.
        assert_eq!(f64::value_cross(&0.0, &10.0, &10.0, &0.0), Some(0.5));
        // Parallel segments never cross.
        assert_eq!(f64::value_cross(&0.0, &10.0, &1.0, &11.0), None);
        // Crossing outside the segment is ignored.
        assert_eq!(f64::value_cross(&0.0, &1.0, &10.0, &9.5), None);
    }

    #[test]
    fn test_step_types_do_not_interpolate() {
        assert_eq!(5i64.interpolate(&9, 0.5), 5);
        assert_eq!(true.interpolate(&false, 0.9), true);
    }

    #[test]
    fn test_text_concat() {
        let a = Text::from("foo");
        let b = Text::from("bar");
        assert_eq!(a.concat(&b), Text::from("foobar"));
    }
}
