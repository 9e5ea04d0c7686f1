//! Span sets: sorted, disjoint, non-adjacent unions of spans.
//!
//! Construction normalizes an arbitrary span array: spans are sorted,
//! overlapping and adjacent members are merged, and the convex-hull span is
//! cached for `O(1)` bounding queries.

use crate::error::{Result, TemporalError};
use crate::span::{Span, SpanBound, cmp_bounds};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A normalized set of spans with a cached bounding span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanSet<T: SpanBound> {
    spans: Vec<Span<T>>,
    hull: Span<T>,
}

/// Set of integer spans.
pub type IntSpanSet = SpanSet<i64>;
/// Set of float spans.
pub type FloatSpanSet = SpanSet<f64>;
/// Set of timestamp spans.
pub type TsTzSpanSet = SpanSet<DateTime<Utc>>;

impl<T: SpanBound> SpanSet<T> {
    /// Build a span set from an arbitrary span array.
    ///
    /// Sorts the spans and merges overlapping and adjacent members. Fails
    /// with `EmptyInput` when the array is empty.
    pub fn new(spans: Vec<Span<T>>) -> Result<Self> {
        if spans.is_empty() {
            return Err(TemporalError::EmptyInput(
                "a span set requires at least one span".to_string(),
            ));
        }
        Ok(Self::normalize(spans))
    }

    pub fn from_span(span: Span<T>) -> Self {
        Self {
            hull: span,
            spans: vec![span],
        }
    }

    /// Build from spans already known to be sorted, disjoint, and
    /// non-adjacent.
    pub(crate) fn make_unchecked(spans: Vec<Span<T>>) -> Self {
        debug_assert!(!spans.is_empty());
        let hull = spans[0].hull(&spans[spans.len() - 1]);
        Self { spans, hull }
    }

    pub(crate) fn normalize(mut spans: Vec<Span<T>>) -> Self {
        spans.sort_by(|a, b| {
            cmp_bounds(a.lower(), a.lower_inc(), true, b.lower(), b.lower_inc(), true)
        });
        let mut merged: Vec<Span<T>> = Vec::with_capacity(spans.len());
        for span in spans {
            match merged.last_mut() {
                Some(last) if last.overlaps(&span) || last.adjacent(&span) => {
                    *last = last.hull(&span);
                }
                _ => merged.push(span),
            }
        }
        Self::make_unchecked(merged)
    }

    pub fn spans(&self) -> &[Span<T>] {
        &self.spans
    }

    pub fn num_spans(&self) -> usize {
        self.spans.len()
    }

    pub fn span_n(&self, n: usize) -> Option<&Span<T>> {
        self.spans.get(n)
    }

    pub fn start_span(&self) -> &Span<T> {
        &self.spans[0]
    }

    pub fn end_span(&self) -> &Span<T> {
        &self.spans[self.spans.len() - 1]
    }

    /// The cached convex hull of the set.
    pub fn hull(&self) -> &Span<T> {
        &self.hull
    }

    pub fn lower(&self) -> T {
        self.hull.lower()
    }

    pub fn upper(&self) -> T {
        self.hull.upper()
    }

    /// Index of the span containing `value`, by binary search.
    pub fn find_value(&self, value: T) -> Option<usize> {
        let mut lo = 0usize;
        let mut hi = self.spans.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let span = &self.spans[mid];
            if span.contains_value(value) {
                return Some(mid);
            }
            if span.is_left(&Span::instant(value)) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        None
    }

    pub fn contains_value(&self, value: T) -> bool {
        self.find_value(value).is_some()
    }

    pub fn contains_span(&self, span: &Span<T>) -> bool {
        if !self.hull.contains_span(span) {
            return false;
        }
        self.spans.iter().any(|s| s.contains_span(span))
    }

    pub fn contains_spanset(&self, other: &Self) -> bool {
        other.spans.iter().all(|s| self.contains_span(s))
    }

    pub fn overlaps_span(&self, span: &Span<T>) -> bool {
        self.hull.overlaps(span) && self.spans.iter().any(|s| s.overlaps(span))
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        if !self.hull.overlaps(&other.hull) {
            return false;
        }
        let mut i = 0;
        let mut j = 0;
        while i < self.spans.len() && j < other.spans.len() {
            let a = &self.spans[i];
            let b = &other.spans[j];
            if a.overlaps(b) {
                return true;
            }
            if a.is_left(b) {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }

    pub fn adjacent_span(&self, span: &Span<T>) -> bool {
        !self.overlaps_span(span) && self.spans.iter().any(|s| s.adjacent(span))
    }

    pub fn is_left(&self, other: &Self) -> bool {
        self.hull.is_left(&other.hull)
    }

    pub fn is_right(&self, other: &Self) -> bool {
        self.hull.is_right(&other.hull)
    }

    pub fn union_span(&self, span: &Span<T>) -> Self {
        let mut spans = self.spans.clone();
        spans.push(*span);
        Self::normalize(spans)
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut spans = self.spans.clone();
        spans.extend_from_slice(&other.spans);
        Self::normalize(spans)
    }

    pub fn intersection_span(&self, span: &Span<T>) -> Option<Self> {
        let pieces: Vec<Span<T>> = self
            .spans
            .iter()
            .filter_map(|s| s.intersection(span))
            .collect();
        if pieces.is_empty() {
            None
        } else {
            Some(Self::make_unchecked(pieces))
        }
    }

    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let mut pieces = Vec::new();
        let mut i = 0;
        let mut j = 0;
        while i < self.spans.len() && j < other.spans.len() {
            let a = &self.spans[i];
            let b = &other.spans[j];
            if let Some(inter) = a.intersection(b) {
                pieces.push(inter);
            }
            // Advance the side that ends first.
            if cmp_bounds(
                a.upper(),
                a.upper_inc(),
                false,
                b.upper(),
                b.upper_inc(),
                false,
            ) == Ordering::Less
            {
                i += 1;
            } else {
                j += 1;
            }
        }
        if pieces.is_empty() {
            None
        } else {
            Some(Self::make_unchecked(pieces))
        }
    }

    pub fn difference_span(&self, span: &Span<T>) -> Option<Self> {
        let mut pieces = Vec::new();
        for s in &self.spans {
            match s.difference(span) {
                Some(rest) => pieces.extend_from_slice(rest.spans()),
                None => {}
            }
        }
        if pieces.is_empty() {
            None
        } else {
            Some(Self::make_unchecked(pieces))
        }
    }

    pub fn difference(&self, other: &Self) -> Option<Self> {
        let mut pieces = Vec::new();
        for s in &self.spans {
            let mut rest = vec![*s];
            for b in &other.spans {
                if b.is_right(s) {
                    break;
                }
                let mut next = Vec::new();
                for piece in rest {
                    if let Some(d) = piece.difference(b) {
                        next.extend_from_slice(d.spans());
                    }
                }
                rest = next;
                if rest.is_empty() {
                    break;
                }
            }
            pieces.extend(rest);
        }
        if pieces.is_empty() {
            None
        } else {
            Some(Self::make_unchecked(pieces))
        }
    }

    /// Translate every span by `delta`.
    pub fn shift(&self, delta: T::Delta) -> Result<Self> {
        let spans = self
            .spans
            .iter()
            .map(|s| s.shift(delta))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::make_unchecked(spans))
    }

    /// Rescale proportionally around the hull's lower bound so the hull
    /// width becomes `new_width`.
    pub fn scale(&self, new_width: T::Delta) -> Result<Self> {
        if !T::delta_positive(new_width) {
            return Err(TemporalError::InvalidDuration(
                "span set width must be positive".to_string(),
            ));
        }
        if self.hull.is_instant() {
            return Ok(self.clone());
        }
        let origin = self.hull.lower();
        let old_width = self.hull.width();
        let spans = self
            .spans
            .iter()
            .map(|s| {
                let lower =
                    origin.plus(T::rescale(s.lower().minus(origin), old_width, new_width))?;
                let upper =
                    origin.plus(T::rescale(s.upper().minus(origin), old_width, new_width))?;
                Ok(Span::from_parts(lower, upper, s.lower_inc(), s.upper_inc()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::make_unchecked(spans))
    }

    pub fn shift_scale(
        &self,
        delta: Option<T::Delta>,
        new_width: Option<T::Delta>,
    ) -> Result<Self> {
        let mut set = self.clone();
        if let Some(delta) = delta {
            set = set.shift(delta)?;
        }
        if let Some(width) = new_width {
            set = set.scale(width)?;
        }
        Ok(set)
    }
}

impl TsTzSpanSet {
    /// Sum of the member durations.
    pub fn duration(&self) -> TimeDelta {
        self.spans
            .iter()
            .fold(TimeDelta::zero(), |acc, s| acc + s.duration())
    }

    /// Duration of the bounding span, gaps included.
    pub fn duration_hull(&self) -> TimeDelta {
        self.hull.duration()
    }
}

impl<T: SpanBound> Hash for SpanSet<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.spans.len().hash(state);
        for span in &self.spans {
            span.hash(state);
        }
    }
}

impl<T: SpanBound> From<Span<T>> for SpanSet<T> {
    fn from(span: Span<T>) -> Self {
        Self::from_span(span)
    }
}
