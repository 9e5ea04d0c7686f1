//! Value x time bounding boxes for temporal numbers.

use super::TemporalBox;
use crate::error::{Result, TemporalError};
use crate::span::{FloatSpan, Span, TsTzSpan};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A bounding box over the value and time dimensions of a temporal number.
///
/// Either dimension may be absent, but not both.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TBox {
    span: Option<FloatSpan>,
    period: Option<TsTzSpan>,
}

impl TBox {
    pub fn new(span: Option<FloatSpan>, period: Option<TsTzSpan>) -> Result<Self> {
        if span.is_none() && period.is_none() {
            return Err(TemporalError::InvalidInput(
                "a TBox requires at least one dimension".to_string(),
            ));
        }
        Ok(Self { span, period })
    }

    pub fn from_span(span: FloatSpan) -> Self {
        Self {
            span: Some(span),
            period: None,
        }
    }

    pub fn from_period(period: TsTzSpan) -> Self {
        Self {
            span: None,
            period: Some(period),
        }
    }

    pub fn from_value(value: f64) -> Self {
        Self::from_span(Span::instant(value))
    }

    pub fn from_value_time(value: f64, t: DateTime<Utc>) -> Self {
        Self {
            span: Some(Span::instant(value)),
            period: Some(Span::instant(t)),
        }
    }

    pub fn span(&self) -> Option<&FloatSpan> {
        self.span.as_ref()
    }

    pub fn period(&self) -> Option<&TsTzSpan> {
        self.period.as_ref()
    }

    pub fn has_value(&self) -> bool {
        self.span.is_some()
    }

    pub fn has_time(&self) -> bool {
        self.period.is_some()
    }

    pub fn xmin(&self) -> Option<f64> {
        self.span.map(|s| s.lower())
    }

    pub fn xmax(&self) -> Option<f64> {
        self.span.map(|s| s.upper())
    }

    pub fn tmin(&self) -> Option<DateTime<Utc>> {
        self.period.map(|p| p.lower())
    }

    pub fn tmax(&self) -> Option<DateTime<Utc>> {
        self.period.map(|p| p.upper())
    }

    /// Dimensions present on both sides; at least one is required.
    fn common_dims(&self, other: &Self) -> Result<(bool, bool)> {
        let value = self.span.is_some() && other.span.is_some();
        let time = self.period.is_some() && other.period.is_some();
        if !value && !time {
            return Err(TemporalError::TypeMismatch(
                "the boxes share no dimension".to_string(),
            ));
        }
        Ok((value, time))
    }

    /// Containment over the dimensions present on both sides.
    pub fn contains(&self, other: &Self) -> Result<bool> {
        let (value, time) = self.common_dims(other)?;
        let mut ok = true;
        if value {
            ok &= self.span.as_ref().is_some_and(|a| {
                other.span.as_ref().is_some_and(|b| a.contains_span(b))
            });
        }
        if time {
            ok &= self.period.as_ref().is_some_and(|a| {
                other.period.as_ref().is_some_and(|b| a.contains_span(b))
            });
        }
        Ok(ok)
    }

    pub fn contained_in(&self, other: &Self) -> Result<bool> {
        other.contains(self)
    }

    /// Overlap over the dimensions present on both sides.
    pub fn overlaps(&self, other: &Self) -> Result<bool> {
        let (value, time) = self.common_dims(other)?;
        let mut ok = true;
        if value {
            ok &= self
                .span
                .as_ref()
                .is_some_and(|a| other.span.as_ref().is_some_and(|b| a.overlaps(b)));
        }
        if time {
            ok &= self
                .period
                .as_ref()
                .is_some_and(|a| other.period.as_ref().is_some_and(|b| a.overlaps(b)));
        }
        Ok(ok)
    }

    /// Equality over the dimensions present on both sides.
    pub fn same(&self, other: &Self) -> Result<bool> {
        let (value, time) = self.common_dims(other)?;
        let mut ok = true;
        if value {
            ok &= self.span == other.span;
        }
        if time {
            ok &= self.period == other.period;
        }
        Ok(ok)
    }

    /// Whether the boxes touch without overlapping.
    pub fn adjacent(&self, other: &Self) -> Result<bool> {
        let (value, time) = self.common_dims(other)?;
        if self.overlaps(other)? {
            return Ok(false);
        }
        let mut touches = false;
        if value {
            if let (Some(a), Some(b)) = (&self.span, &other.span) {
                if !a.overlaps(b) && !a.adjacent(b) {
                    return Ok(false);
                }
                touches |= a.adjacent(b);
            }
        }
        if time {
            if let (Some(a), Some(b)) = (&self.period, &other.period) {
                if !a.overlaps(b) && !a.adjacent(b) {
                    return Ok(false);
                }
                touches |= a.adjacent(b);
            }
        }
        Ok(touches)
    }

    fn value_pair(&self, other: &Self) -> Result<(FloatSpan, FloatSpan)> {
        match (self.span, other.span) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(TemporalError::TypeMismatch(
                "both boxes must have a value dimension".to_string(),
            )),
        }
    }

    fn time_pair(&self, other: &Self) -> Result<(TsTzSpan, TsTzSpan)> {
        match (self.period, other.period) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(TemporalError::TypeMismatch(
                "both boxes must have a time dimension".to_string(),
            )),
        }
    }

    pub fn is_left(&self, other: &Self) -> Result<bool> {
        let (a, b) = self.value_pair(other)?;
        Ok(a.is_left(&b))
    }

    pub fn is_over_left(&self, other: &Self) -> Result<bool> {
        let (a, b) = self.value_pair(other)?;
        Ok(a.is_over_left(&b))
    }

    pub fn is_right(&self, other: &Self) -> Result<bool> {
        let (a, b) = self.value_pair(other)?;
        Ok(a.is_right(&b))
    }

    pub fn is_over_right(&self, other: &Self) -> Result<bool> {
        let (a, b) = self.value_pair(other)?;
        Ok(a.is_over_right(&b))
    }

    pub fn is_before(&self, other: &Self) -> Result<bool> {
        let (a, b) = self.time_pair(other)?;
        Ok(a.is_left(&b))
    }

    pub fn is_over_before(&self, other: &Self) -> Result<bool> {
        let (a, b) = self.time_pair(other)?;
        Ok(a.is_over_left(&b))
    }

    pub fn is_after(&self, other: &Self) -> Result<bool> {
        let (a, b) = self.time_pair(other)?;
        Ok(a.is_right(&b))
    }

    pub fn is_over_after(&self, other: &Self) -> Result<bool> {
        let (a, b) = self.time_pair(other)?;
        Ok(a.is_over_right(&b))
    }

    /// Bounding union; both inputs must carry the same dimensions.
    pub fn union(&self, other: &Self) -> Result<Self> {
        if self.span.is_some() != other.span.is_some()
            || self.period.is_some() != other.period.is_some()
        {
            return Err(TemporalError::TypeMismatch(
                "cannot union boxes with different dimensions".to_string(),
            ));
        }
        Ok(Self {
            span: match (self.span, other.span) {
                (Some(a), Some(b)) => Some(a.hull(&b)),
                _ => None,
            },
            period: match (self.period, other.period) {
                (Some(a), Some(b)) => Some(a.hull(&b)),
                _ => None,
            },
        })
    }

    /// Intersection over common dimensions; `None` when disjoint.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let span = match (self.span, other.span) {
            (Some(a), Some(b)) => Some(a.intersection(&b)?),
            _ => None,
        };
        let period = match (self.period, other.period) {
            (Some(a), Some(b)) => Some(a.intersection(&b)?),
            _ => None,
        };
        if span.is_none() && period.is_none() {
            return None;
        }
        Some(Self { span, period })
    }

    /// Inflate the value dimension by `margin` on both sides.
    pub fn expand_value(&self, margin: f64) -> Result<Self> {
        let span = self.span.ok_or_else(|| {
            TemporalError::TypeMismatch("the box has no value dimension".to_string())
        })?;
        Ok(Self {
            span: Some(Span::from_parts(
                span.lower() - margin,
                span.upper() + margin,
                span.lower_inc(),
                span.upper_inc(),
            )),
            period: self.period,
        })
    }

    /// Inflate the time dimension by `margin` on both sides.
    pub fn expand_time(&self, margin: TimeDelta) -> Result<Self> {
        let period = self.period.ok_or_else(|| {
            TemporalError::TypeMismatch("the box has no time dimension".to_string())
        })?;
        Ok(Self {
            span: self.span,
            period: Some(Span::from_parts(
                period.lower() - margin,
                period.upper() + margin,
                period.lower_inc(),
                period.upper_inc(),
            )),
        })
    }

    /// Round the value bounds to `digits` decimal digits.
    pub fn round(&self, digits: u32) -> Self {
        let factor = 10f64.powi(digits as i32);
        Self {
            span: self.span.map(|s| {
                Span::from_parts(
                    (s.lower() * factor).round() / factor,
                    (s.upper() * factor).round() / factor,
                    s.lower_inc(),
                    s.upper_inc(),
                )
            }),
            period: self.period,
        }
    }
}

impl TemporalBox for TBox {
    fn expand(&mut self, other: &Self) {
        self.span = match (self.span, other.span) {
            (Some(a), Some(b)) => Some(a.hull(&b)),
            (a, b) => a.or(b),
        };
        self.period = match (self.period, other.period) {
            (Some(a), Some(b)) => Some(a.hull(&b)),
            (a, b) => a.or(b),
        };
    }

    fn period(&self) -> Option<&TsTzSpan> {
        self.period.as_ref()
    }

    fn set_period(&mut self, period: TsTzSpan) {
        self.period = Some(period);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, h, 0, 0).unwrap()
    }

    fn vspan(l: f64, u: f64) -> FloatSpan {
        FloatSpan::new(l, u, true, true).unwrap()
    }

    fn period(l: u32, u: u32) -> TsTzSpan {
        TsTzSpan::new(ts(l), ts(u), true, true).unwrap()
    }

    #[test]
    fn test_requires_one_dimension() {
        assert!(TBox::new(None, None).is_err());
        assert!(TBox::new(Some(vspan(0.0, 1.0)), None).is_ok());
    }

    #[test]
    fn test_overlaps_common_dimensions() {
        // The time dimension is absent on one side, so only values count.
        let a = TBox::new(Some(vspan(0.0, 10.0)), Some(period(0, 10))).unwrap();
        let b = TBox::new(Some(vspan(5.0, 15.0)), None).unwrap();
        assert!(a.overlaps(&b).unwrap());

        let c = TBox::new(Some(vspan(11.0, 15.0)), None).unwrap();
        assert!(!a.overlaps(&c).unwrap());
    }

    #[test]
    fn test_no_common_dimension_errors() {
        let a = TBox::new(Some(vspan(0.0, 10.0)), None).unwrap();
        let b = TBox::new(None, Some(period(0, 10))).unwrap();
        assert!(a.overlaps(&b).is_err());
    }

    #[test]
    fn test_position_operators() {
        let a = TBox::new(Some(vspan(0.0, 5.0)), Some(period(0, 5))).unwrap();
        let b = TBox::new(Some(vspan(6.0, 9.0)), Some(period(6, 9))).unwrap();
        assert!(a.is_left(&b).unwrap());
        assert!(a.is_before(&b).unwrap());
        assert!(b.is_right(&a).unwrap());
        assert!(b.is_after(&a).unwrap());
        assert!(a.is_over_left(&b).unwrap());
    }

    #[test]
    fn test_union_and_intersection() {
        let a = TBox::new(Some(vspan(0.0, 5.0)), Some(period(0, 5))).unwrap();
        let b = TBox::new(Some(vspan(3.0, 9.0)), Some(period(3, 9))).unwrap();
        let u = a.union(&b).unwrap();
        assert_eq!(u.xmin(), Some(0.0));
        assert_eq!(u.xmax(), Some(9.0));

        let i = a.intersection(&b).unwrap();
        assert_eq!(i.xmin(), Some(3.0));
        assert_eq!(i.xmax(), Some(5.0));
        assert_eq!(i.tmin(), Some(ts(3)));
    }

    #[test]
    fn test_expand() {
        let a = TBox::new(Some(vspan(0.0, 5.0)), Some(period(1, 2))).unwrap();
        let e = a.expand_value(1.0).unwrap();
        assert_eq!(e.xmin(), Some(-1.0));
        assert_eq!(e.xmax(), Some(6.0));

        let e = a.expand_time(TimeDelta::hours(1)).unwrap();
        assert_eq!(e.tmin(), Some(ts(0)));
        assert_eq!(e.tmax(), Some(ts(3)));
    }
}
