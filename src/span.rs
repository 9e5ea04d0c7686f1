//! Spans: half-open or closed intervals over a totally ordered domain.
//!
//! A [`Span`] holds a lower and an upper bound together with per-bound
//! inclusivity flags. Bounds over the discrete integer domain are
//! canonicalized to the `[lower, upper)` form; float and timestamp bounds
//! keep their flags as given. The timestamp line is treated as continuous,
//! so instant spans `[t, t]` survive canonicalization.

use crate::error::{Result, TemporalError};
use crate::spanset::SpanSet;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A type usable as a span bound.
pub trait SpanBound: Copy + PartialEq + PartialOrd + fmt::Debug {
    /// Difference type between two bounds.
    type Delta: Copy + PartialEq + fmt::Debug;

    /// Whether the domain is discrete and spans canonicalize to `[l, u)`.
    const DISCRETE: bool;

    /// Successor value, used only for canonicalization of discrete domains.
    fn next(self) -> Self;

    fn plus(self, delta: Self::Delta) -> Result<Self>;

    /// `self - other`.
    fn minus(self, other: Self) -> Self::Delta;

    fn delta_positive(delta: Self::Delta) -> bool;

    fn delta_zero() -> Self::Delta;

    /// `offset * new_width / old_width`, used by proportional rescaling.
    fn rescale(offset: Self::Delta, old_width: Self::Delta, new_width: Self::Delta)
    -> Self::Delta;

    fn hash_bound<H: Hasher>(self, state: &mut H);
}

impl SpanBound for i64 {
    type Delta = i64;
    const DISCRETE: bool = true;

    fn next(self) -> Self {
        self.saturating_add(1)
    }

    fn plus(self, delta: i64) -> Result<Self> {
        self.checked_add(delta)
            .ok_or_else(|| TemporalError::NumericOverflow("integer span bound".to_string()))
    }

    fn minus(self, other: Self) -> i64 {
        self.saturating_sub(other)
    }

    fn delta_positive(delta: i64) -> bool {
        delta > 0
    }

    fn delta_zero() -> i64 {
        0
    }

    fn rescale(offset: i64, old_width: i64, new_width: i64) -> i64 {
        if old_width == 0 {
            return 0;
        }
        ((offset as i128 * new_width as i128) / old_width as i128) as i64
    }

    fn hash_bound<H: Hasher>(self, state: &mut H) {
        self.hash(state);
    }
}

impl SpanBound for f64 {
    type Delta = f64;
    const DISCRETE: bool = false;

    fn next(self) -> Self {
        self
    }

    fn plus(self, delta: f64) -> Result<Self> {
        let v = self + delta;
        if v.is_finite() {
            Ok(v)
        } else {
            Err(TemporalError::NumericOverflow("float span bound".to_string()))
        }
    }

    fn minus(self, other: Self) -> f64 {
        self - other
    }

    fn delta_positive(delta: f64) -> bool {
        delta > 0.0
    }

    fn delta_zero() -> f64 {
        0.0
    }

    fn rescale(offset: f64, old_width: f64, new_width: f64) -> f64 {
        if old_width == 0.0 {
            return 0.0;
        }
        offset * new_width / old_width
    }

    fn hash_bound<H: Hasher>(self, state: &mut H) {
        self.to_bits().hash(state);
    }
}

/// Saturating microsecond count of a delta; differences of in-range
/// timestamps always fit.
pub(crate) fn delta_micros(d: TimeDelta) -> i64 {
    d.num_microseconds().unwrap_or(if d > TimeDelta::zero() {
        i64::MAX
    } else {
        i64::MIN
    })
}

impl SpanBound for DateTime<Utc> {
    type Delta = TimeDelta;
    const DISCRETE: bool = false;

    fn next(self) -> Self {
        self
    }

    fn plus(self, delta: TimeDelta) -> Result<Self> {
        self.checked_add_signed(delta)
            .ok_or_else(|| TemporalError::NumericOverflow("timestamp span bound".to_string()))
    }

    fn minus(self, other: Self) -> TimeDelta {
        self - other
    }

    fn delta_positive(delta: TimeDelta) -> bool {
        delta > TimeDelta::zero()
    }

    fn delta_zero() -> TimeDelta {
        TimeDelta::zero()
    }

    fn rescale(offset: TimeDelta, old_width: TimeDelta, new_width: TimeDelta) -> TimeDelta {
        let old = delta_micros(old_width) as i128;
        if old == 0 {
            return TimeDelta::zero();
        }
        let scaled = delta_micros(offset) as i128 * delta_micros(new_width) as i128 / old;
        TimeDelta::microseconds(scaled as i64)
    }

    fn hash_bound<H: Hasher>(self, state: &mut H) {
        self.timestamp_micros().hash(state);
    }
}

pub(crate) fn cmp_values<T: SpanBound>(a: T, b: T) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Rank of a bound among bounds with the same value: an exclusive upper
/// bound sits just below the value, an exclusive lower bound just above.
fn bound_rank(inc: bool, lower: bool) -> i8 {
    if inc {
        0
    } else if lower {
        1
    } else {
        -1
    }
}

/// Total order on span bounds, inclusivity-aware.
pub(crate) fn cmp_bounds<T: SpanBound>(
    v1: T,
    inc1: bool,
    lower1: bool,
    v2: T,
    inc2: bool,
    lower2: bool,
) -> Ordering {
    cmp_values(v1, v2).then_with(|| bound_rank(inc1, lower1).cmp(&bound_rank(inc2, lower2)))
}

/// An interval over a totally ordered domain, with inclusivity flags per
/// bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span<T: SpanBound> {
    lower: T,
    upper: T,
    lower_inc: bool,
    upper_inc: bool,
}

/// Span over 64-bit integers, canonical `[l, u)`.
pub type IntSpan = Span<i64>;
/// Span over floats.
pub type FloatSpan = Span<f64>;
/// Span over timestamps.
pub type TsTzSpan = Span<DateTime<Utc>>;

impl<T: SpanBound> Span<T> {
    /// Create a span, validating bound order and canonicalizing discrete
    /// bounds.
    ///
    /// Fails with `InvalidSpan` if `lower > upper`, or if `lower == upper`
    /// without both bounds inclusive.
    pub fn new(lower: T, upper: T, lower_inc: bool, upper_inc: bool) -> Result<Self> {
        match cmp_values(lower, upper) {
            Ordering::Greater => {
                return Err(TemporalError::InvalidSpan(format!(
                    "lower bound {:?} is greater than upper bound {:?}",
                    lower, upper
                )));
            }
            Ordering::Equal if !(lower_inc && upper_inc) => {
                return Err(TemporalError::InvalidSpan(format!(
                    "instant span at {:?} must include both bounds",
                    lower
                )));
            }
            _ => {}
        }

        let mut span = Self {
            lower,
            upper,
            lower_inc,
            upper_inc,
        };
        if T::DISCRETE {
            if !span.lower_inc {
                span.lower = span.lower.next();
                span.lower_inc = true;
            }
            if span.upper_inc {
                span.upper = span.upper.next();
                span.upper_inc = false;
            }
        }
        Ok(span)
    }

    /// Span holding a single value.
    pub fn instant(value: T) -> Self {
        if T::DISCRETE {
            Self {
                lower: value,
                upper: value.next(),
                lower_inc: true,
                upper_inc: false,
            }
        } else {
            Self {
                lower: value,
                upper: value,
                lower_inc: true,
                upper_inc: true,
            }
        }
    }

    pub(crate) fn from_parts(lower: T, upper: T, lower_inc: bool, upper_inc: bool) -> Self {
        Self {
            lower,
            upper,
            lower_inc,
            upper_inc,
        }
    }

    pub fn lower(&self) -> T {
        self.lower
    }

    pub fn upper(&self) -> T {
        self.upper
    }

    pub fn lower_inc(&self) -> bool {
        self.lower_inc
    }

    pub fn upper_inc(&self) -> bool {
        self.upper_inc
    }

    /// Whether the span holds exactly one value.
    pub fn is_instant(&self) -> bool {
        if T::DISCRETE {
            self.upper == self.lower.next()
        } else {
            self.lower == self.upper
        }
    }

    /// Difference between the bounds.
    pub fn width(&self) -> T::Delta {
        self.upper.minus(self.lower)
    }

    pub fn contains_value(&self, value: T) -> bool {
        let lower_ok = match cmp_values(self.lower, value) {
            Ordering::Less => true,
            Ordering::Equal => self.lower_inc,
            Ordering::Greater => false,
        };
        let upper_ok = match cmp_values(value, self.upper) {
            Ordering::Less => true,
            Ordering::Equal => self.upper_inc,
            Ordering::Greater => false,
        };
        lower_ok && upper_ok
    }

    pub fn contains_span(&self, other: &Self) -> bool {
        cmp_bounds(
            self.lower,
            self.lower_inc,
            true,
            other.lower,
            other.lower_inc,
            true,
        ) != Ordering::Greater
            && cmp_bounds(
                self.upper,
                self.upper_inc,
                false,
                other.upper,
                other.upper_inc,
                false,
            ) != Ordering::Less
    }

    pub fn contained_in(&self, other: &Self) -> bool {
        other.contains_span(self)
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        cmp_bounds(
            self.lower,
            self.lower_inc,
            true,
            other.upper,
            other.upper_inc,
            false,
        ) != Ordering::Greater
            && cmp_bounds(
                other.lower,
                other.lower_inc,
                true,
                self.upper,
                self.upper_inc,
                false,
            ) != Ordering::Greater
    }

    /// Whether the two spans touch without sharing any value.
    ///
    /// `[1, 3)` is adjacent to `[3, 5]`; `[1, 3]` is not (they overlap).
    pub fn adjacent(&self, other: &Self) -> bool {
        (self.upper == other.lower && self.upper_inc != other.lower_inc)
            || (other.upper == self.lower && other.upper_inc != self.lower_inc)
    }

    pub fn adjacent_value(&self, value: T) -> bool {
        self.adjacent(&Span::instant(value))
    }

    /// Strictly before `other` on the axis.
    pub fn is_left(&self, other: &Self) -> bool {
        cmp_bounds(
            self.upper,
            self.upper_inc,
            false,
            other.lower,
            other.lower_inc,
            true,
        ) == Ordering::Less
    }

    pub fn is_right(&self, other: &Self) -> bool {
        other.is_left(self)
    }

    /// Does not extend to the right of `other`.
    pub fn is_over_left(&self, other: &Self) -> bool {
        cmp_bounds(
            self.upper,
            self.upper_inc,
            false,
            other.upper,
            other.upper_inc,
            false,
        ) != Ordering::Greater
    }

    /// Does not extend to the left of `other`.
    pub fn is_over_right(&self, other: &Self) -> bool {
        cmp_bounds(
            self.lower,
            self.lower_inc,
            true,
            other.lower,
            other.lower_inc,
            true,
        ) != Ordering::Less
    }

    pub fn is_left_value(&self, value: T) -> bool {
        self.is_left(&Span::instant(value))
    }

    pub fn is_right_value(&self, value: T) -> bool {
        self.is_right(&Span::instant(value))
    }

    /// Smallest span covering both inputs.
    pub fn hull(&self, other: &Self) -> Self {
        let (lower, lower_inc) = if cmp_bounds(
            self.lower,
            self.lower_inc,
            true,
            other.lower,
            other.lower_inc,
            true,
        ) != Ordering::Greater
        {
            (self.lower, self.lower_inc)
        } else {
            (other.lower, other.lower_inc)
        };
        let (upper, upper_inc) = if cmp_bounds(
            self.upper,
            self.upper_inc,
            false,
            other.upper,
            other.upper_inc,
            false,
        ) != Ordering::Less
        {
            (self.upper, self.upper_inc)
        } else {
            (other.upper, other.upper_inc)
        };
        Self {
            lower,
            upper,
            lower_inc,
            upper_inc,
        }
    }

    /// Set union; the result decomposes into two spans when the inputs
    /// neither overlap nor touch.
    pub fn union(&self, other: &Self) -> SpanSet<T> {
        SpanSet::make_unchecked(if self.overlaps(other) || self.adjacent(other) {
            vec![self.hull(other)]
        } else if cmp_bounds(
            self.lower,
            self.lower_inc,
            true,
            other.lower,
            other.lower_inc,
            true,
        ) != Ordering::Greater
        {
            vec![*self, *other]
        } else {
            vec![*other, *self]
        })
    }

    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        let (lower, lower_inc) = if cmp_bounds(
            self.lower,
            self.lower_inc,
            true,
            other.lower,
            other.lower_inc,
            true,
        ) != Ordering::Less
        {
            (self.lower, self.lower_inc)
        } else {
            (other.lower, other.lower_inc)
        };
        let (upper, upper_inc) = if cmp_bounds(
            self.upper,
            self.upper_inc,
            false,
            other.upper,
            other.upper_inc,
            false,
        ) != Ordering::Greater
        {
            (self.upper, self.upper_inc)
        } else {
            (other.upper, other.upper_inc)
        };
        Some(Self {
            lower,
            upper,
            lower_inc,
            upper_inc,
        })
    }

    /// Set difference `self \ other` as a span set with one or two members,
    /// or `None` when `other` covers `self`.
    pub fn difference(&self, other: &Self) -> Option<SpanSet<T>> {
        let inter = match self.intersection(other) {
            Some(inter) => inter,
            None => return Some(SpanSet::make_unchecked(vec![*self])),
        };

        let mut pieces = Vec::new();
        // Left remainder: [self.lower, inter.lower).
        if cmp_bounds(
            self.lower,
            self.lower_inc,
            true,
            inter.lower,
            inter.lower_inc,
            true,
        ) == Ordering::Less
        {
            pieces.push(Self {
                lower: self.lower,
                upper: inter.lower,
                lower_inc: self.lower_inc,
                upper_inc: !inter.lower_inc,
            });
        }
        // Right remainder: (inter.upper, self.upper].
        if cmp_bounds(
            inter.upper,
            inter.upper_inc,
            false,
            self.upper,
            self.upper_inc,
            false,
        ) == Ordering::Less
        {
            pieces.push(Self {
                lower: inter.upper,
                upper: self.upper,
                lower_inc: !inter.upper_inc,
                upper_inc: self.upper_inc,
            });
        }
        if pieces.is_empty() {
            None
        } else {
            Some(SpanSet::make_unchecked(pieces))
        }
    }

    /// Distance between the spans along the axis; zero when they overlap.
    pub fn distance(&self, other: &Self) -> T::Delta {
        if self.overlaps(other) || self.adjacent(other) {
            T::delta_zero()
        } else if self.is_left(other) {
            other.lower.minus(self.upper)
        } else {
            self.lower.minus(other.upper)
        }
    }

    /// Translate both bounds by `delta`.
    pub fn shift(&self, delta: T::Delta) -> Result<Self> {
        Ok(Self {
            lower: self.lower.plus(delta)?,
            upper: self.upper.plus(delta)?,
            lower_inc: self.lower_inc,
            upper_inc: self.upper_inc,
        })
    }

    /// Rescale around the lower bound so the width becomes `new_width`.
    ///
    /// Instant spans are returned unchanged. Fails with `InvalidDuration`
    /// when `new_width` is not positive.
    pub fn scale(&self, new_width: T::Delta) -> Result<Self> {
        if !T::delta_positive(new_width) {
            return Err(TemporalError::InvalidDuration(
                "span width must be positive".to_string(),
            ));
        }
        if self.is_instant() {
            return Ok(*self);
        }
        Ok(Self {
            lower: self.lower,
            upper: self.lower.plus(new_width)?,
            lower_inc: self.lower_inc,
            upper_inc: self.upper_inc,
        })
    }

    pub fn shift_scale(
        &self,
        delta: Option<T::Delta>,
        new_width: Option<T::Delta>,
    ) -> Result<Self> {
        let mut span = *self;
        if let Some(delta) = delta {
            span = span.shift(delta)?;
        }
        if let Some(width) = new_width {
            span = span.scale(width)?;
        }
        Ok(span)
    }
}

impl TsTzSpan {
    /// Length of the span as a duration.
    pub fn duration(&self) -> TimeDelta {
        self.upper - self.lower
    }
}

impl<T: SpanBound> Hash for Span<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lower.hash_bound(state);
        self.upper.hash_bound(state);
        self.lower_inc.hash(state);
        self.upper_inc.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_new_validates_order() {
        assert!(FloatSpan::new(3.0, 1.0, true, false).is_err());
        assert!(FloatSpan::new(1.0, 1.0, true, false).is_err());
        assert!(FloatSpan::new(1.0, 1.0, true, true).is_ok());
    }

    #[test]
    fn test_int_canonical_form() {
        let span = IntSpan::new(1, 3, true, true).unwrap();
        assert_eq!(span.lower(), 1);
        assert_eq!(span.upper(), 4);
        assert!(!span.upper_inc());

        let span = IntSpan::new(1, 3, false, false).unwrap();
        assert_eq!(span.lower(), 2);
        assert!(span.lower_inc());
        assert_eq!(span.upper(), 3);
    }

    #[test]
    fn test_contains_value() {
        let span = FloatSpan::new(1.0, 3.0, true, false).unwrap();
        assert!(span.contains_value(1.0));
        assert!(span.contains_value(2.5));
        assert!(!span.contains_value(3.0));
        assert!(!span.contains_value(0.5));
    }

    #[test]
    fn test_adjacency_respects_inclusivity() {
        let a = FloatSpan::new(1.0, 3.0, true, false).unwrap();
        let b = FloatSpan::new(3.0, 5.0, true, true).unwrap();
        assert!(a.adjacent(&b));
        assert!(!a.overlaps(&b));

        let c = FloatSpan::new(1.0, 3.0, true, true).unwrap();
        assert!(!c.adjacent(&b));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_intersection() {
        let a = FloatSpan::new(1.0, 5.0, true, false).unwrap();
        let b = FloatSpan::new(3.0, 8.0, true, true).unwrap();
        let inter = a.intersection(&b).unwrap();
        assert_eq!(inter.lower(), 3.0);
        assert_eq!(inter.upper(), 5.0);
        assert!(!inter.upper_inc());

        let c = FloatSpan::new(6.0, 8.0, true, true).unwrap();
        assert!(a.intersection(&c).is_none());
    }

    #[test]
    fn test_difference_two_pieces() {
        let a = FloatSpan::new(1.0, 10.0, true, true).unwrap();
        let b = FloatSpan::new(4.0, 6.0, true, true).unwrap();
        let diff = a.difference(&b).unwrap();
        assert_eq!(diff.num_spans(), 2);
        let left = diff.span_n(0).unwrap();
        assert_eq!((left.lower(), left.upper()), (1.0, 4.0));
        assert!(!left.upper_inc());
        let right = diff.span_n(1).unwrap();
        assert_eq!((right.lower(), right.upper()), (6.0, 10.0));
        assert!(!right.lower_inc());
    }

    #[test]
    fn test_timestamp_span_duration() {
        let span = TsTzSpan::new(ts(0, 0), ts(0, 10), true, false).unwrap();
        assert_eq!(span.duration(), TimeDelta::minutes(10));
    }

    #[test]
    fn test_scale_around_lower() {
        let span = TsTzSpan::new(ts(0, 0), ts(0, 10), true, false).unwrap();
        let scaled = span.scale(TimeDelta::minutes(20)).unwrap();
        assert_eq!(scaled.lower(), ts(0, 0));
        assert_eq!(scaled.upper(), ts(0, 20));

        assert!(span.scale(TimeDelta::zero()).is_err());
    }

    #[test]
    fn test_instant_span_scale_noop() {
        let span = TsTzSpan::instant(ts(1, 0));
        let scaled = span.scale(TimeDelta::minutes(5)).unwrap();
        assert_eq!(scaled, span);
    }
}
