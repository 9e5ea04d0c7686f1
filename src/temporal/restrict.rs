//! Restriction of temporal values by value, value span, and time.
//!
//! Every `at_*` operation returns `None` for an empty result; every
//! `minus_*` operation is the exact complement, so
//! `at(x, S) U minus(x, S) == x` for any restrictor `S`.

use super::instant::TInstant;
use super::instant_set::TInstantSet;
use super::sequence::TSequence;
use super::sequence_set::TSequenceSet;
use super::{TInterpolation, Temporal};
use crate::base::{BaseValue, NumberValue};
use crate::span::{Span, TsTzSpan, delta_micros};
use crate::spanset::TsTzSpanSet;
use chrono::{DateTime, TimeDelta, Utc};

/// Timestamp at `ratio` within `[start, end]`.
pub(crate) fn time_at_ratio(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    ratio: f64,
) -> DateTime<Utc> {
    let offset = (delta_micros(end - start) as f64 * ratio).round() as i64;
    start + TimeDelta::microseconds(offset)
}

impl<B: BaseValue> TSequence<B> {
    /// Restriction of a sequence to a time span.
    pub(crate) fn at_period_seq(&self, span: &TsTzSpan) -> Option<TSequence<B>> {
        let inter = self.time_span().intersection(span)?;
        if inter.is_instant() {
            let t = inter.lower();
            let inst = TInstant::from_parts(self.value_at_closed(t), t);
            return Some(TSequence::assemble(
                vec![inst],
                true,
                true,
                self.interpolation(),
            ));
        }

        let mut instants: Vec<TInstant<B>> = Vec::new();
        instants.push(TInstant::from_parts(
            self.value_at_closed(inter.lower()),
            inter.lower(),
        ));
        for inst in self.instants() {
            if inst.timestamp() > inter.lower() && inst.timestamp() < inter.upper() {
                instants.push(inst.clone());
            }
        }
        instants.push(TInstant::from_parts(
            self.value_at_closed(inter.upper()),
            inter.upper(),
        ));
        Some(TSequence::assemble(
            instants,
            inter.lower_inc(),
            inter.upper_inc(),
            self.interpolation(),
        ))
    }

    /// Time spans on which the sequence takes exactly the value `v`.
    pub(crate) fn value_spans(&self, v: &B) -> Vec<TsTzSpan> {
        let instants = self.instants();
        let mut spans = Vec::new();
        if instants.len() == 1 {
            if instants[0].value() == v {
                spans.push(Span::instant(instants[0].timestamp()));
            }
            return spans;
        }
        match self.interpolation() {
            TInterpolation::Linear => {
                for w in instants.windows(2) {
                    let (v1, v2) = (w[0].value(), w[1].value());
                    let (t1, t2) = (w[0].timestamp(), w[1].timestamp());
                    if v1 == v2 {
                        if v1 == v {
                            spans.push(Span::from_parts(t1, t2, true, true));
                        }
                    } else if let Some(ratio) = B::segment_locate(v1, v2, v) {
                        spans.push(Span::instant(time_at_ratio(t1, t2, ratio)));
                    }
                }
            }
            _ => {
                for (i, w) in instants.windows(2).enumerate() {
                    if w[0].value() == v {
                        // The value holds on [t_i, t_{i+1}).
                        spans.push(Span::from_parts(
                            w[0].timestamp(),
                            w[1].timestamp(),
                            true,
                            i + 2 == instants.len() && self.upper_inc() && w[1].value() == v,
                        ));
                    }
                }
                let last = &instants[instants.len() - 1];
                if self.upper_inc() && last.value() == v {
                    spans.push(Span::instant(last.timestamp()));
                }
            }
        }
        spans
    }
}

impl<B: NumberValue> TSequence<B> {
    /// Time spans on which the sequence's value lies within `span`.
    pub(crate) fn span_spans(&self, span: &Span<B>) -> Vec<TsTzSpan> {
        let instants = self.instants();
        let mut spans = Vec::new();
        if instants.len() == 1 || self.interpolation() != TInterpolation::Linear {
            for (i, inst) in instants.iter().enumerate() {
                if !span.contains_value(*inst.value()) {
                    continue;
                }
                if i + 1 < instants.len() {
                    spans.push(Span::from_parts(
                        inst.timestamp(),
                        instants[i + 1].timestamp(),
                        true,
                        false,
                    ));
                } else {
                    spans.push(Span::instant(inst.timestamp()));
                }
            }
            return spans;
        }
        for w in instants.windows(2) {
            if let Some(piece) = segment_span_overlap(
                *w[0].value(),
                *w[1].value(),
                w[0].timestamp(),
                w[1].timestamp(),
                span,
            ) {
                spans.push(piece);
            }
        }
        spans
    }
}

/// Portion of a linear segment whose value lies within `span`, as a time
/// span.
fn segment_span_overlap<B: NumberValue>(
    v1: B,
    v2: B,
    t1: DateTime<Utc>,
    t2: DateTime<Utc>,
    span: &Span<B>,
) -> Option<TsTzSpan> {
    if v1 == v2 {
        return span
            .contains_value(v1)
            .then(|| Span::from_parts(t1, t2, true, true));
    }
    let (a, b) = (v1.to_f64(), v2.to_f64());
    let increasing = b > a;
    // Ratios at which the segment meets the span bounds.
    let ratio_of = |v: f64| (v - a) / (b - a);
    let (lo_ratio, lo_inc, hi_ratio, hi_inc) = if increasing {
        (
            ratio_of(span.lower().to_f64()),
            span.lower_inc(),
            ratio_of(span.upper().to_f64()),
            span.upper_inc(),
        )
    } else {
        (
            ratio_of(span.upper().to_f64()),
            span.upper_inc(),
            ratio_of(span.lower().to_f64()),
            span.lower_inc(),
        )
    };
    // Clamp to the segment; clamped ends are attained, hence inclusive.
    let (lo_ratio, lo_inc) = if lo_ratio < 0.0 {
        (0.0, true)
    } else {
        (lo_ratio, lo_inc)
    };
    let (hi_ratio, hi_inc) = if hi_ratio > 1.0 {
        (1.0, true)
    } else {
        (hi_ratio, hi_inc)
    };
    if lo_ratio > hi_ratio || lo_ratio > 1.0 || hi_ratio < 0.0 {
        return None;
    }
    let lower = time_at_ratio(t1, t2, lo_ratio);
    let upper = time_at_ratio(t1, t2, hi_ratio);
    if lower == upper {
        if lo_inc && hi_inc {
            return Some(Span::instant(lower));
        }
        return None;
    }
    Some(Span::from_parts(lower, upper, lo_inc, hi_inc))
}

impl<B: BaseValue> Temporal<B> {
    /// Restrict to a time span.
    pub fn at_period(&self, span: &TsTzSpan) -> Option<Self> {
        match self {
            Temporal::Instant(i) => span
                .contains_value(i.timestamp())
                .then(|| self.clone()),
            Temporal::InstantSet(s) => {
                let kept: Vec<TInstant<B>> = s
                    .instants()
                    .iter()
                    .filter(|i| span.contains_value(i.timestamp()))
                    .cloned()
                    .collect();
                Self::wrap_instants(kept)
            }
            Temporal::Sequence(s) => s.at_period_seq(span).map(Temporal::Sequence),
            Temporal::SequenceSet(s) => {
                let kept: Vec<TSequence<B>> = s
                    .sequences()
                    .iter()
                    .filter_map(|seq| seq.at_period_seq(span))
                    .collect();
                Self::wrap_sequences(kept)
            }
        }
    }

    /// Restrict to a set of time spans.
    pub fn at_periods(&self, spans: &TsTzSpanSet) -> Option<Self> {
        match self {
            Temporal::Instant(i) => spans
                .contains_value(i.timestamp())
                .then(|| self.clone()),
            Temporal::InstantSet(s) => {
                let kept: Vec<TInstant<B>> = s
                    .instants()
                    .iter()
                    .filter(|i| spans.contains_value(i.timestamp()))
                    .cloned()
                    .collect();
                Self::wrap_instants(kept)
            }
            Temporal::Sequence(s) => {
                let kept: Vec<TSequence<B>> = spans
                    .spans()
                    .iter()
                    .filter_map(|span| s.at_period_seq(span))
                    .collect();
                Self::wrap_sequences(kept)
            }
            Temporal::SequenceSet(s) => {
                let mut kept = Vec::new();
                for seq in s.sequences() {
                    for span in spans.spans() {
                        if let Some(piece) = seq.at_period_seq(span) {
                            kept.push(piece);
                        }
                    }
                }
                Self::wrap_sequences(kept)
            }
        }
    }

    /// Restrict to a single timestamp.
    pub fn at_timestamp(&self, t: DateTime<Utc>) -> Option<Self> {
        self.value_at_timestamp(t)
            .map(|v| Temporal::Instant(TInstant::from_parts(v, t)))
    }

    /// Restrict to a set of timestamps.
    pub fn at_timestamps(&self, ts: &[DateTime<Utc>]) -> Option<Self> {
        let mut sorted: Vec<DateTime<Utc>> = ts.to_vec();
        sorted.sort();
        sorted.dedup();
        let kept: Vec<TInstant<B>> = sorted
            .into_iter()
            .filter_map(|t| {
                self.value_at_timestamp(t)
                    .map(|v| TInstant::from_parts(v, t))
            })
            .collect();
        Self::wrap_instants(kept)
    }

    /// Complement of [`Self::at_period`].
    pub fn minus_period(&self, span: &TsTzSpan) -> Option<Self> {
        self.minus_time(&TsTzSpanSet::from_span(*span))
    }

    /// Complement of [`Self::at_periods`].
    pub fn minus_periods(&self, spans: &TsTzSpanSet) -> Option<Self> {
        self.minus_time(spans)
    }

    /// Complement of [`Self::at_timestamp`].
    pub fn minus_timestamp(&self, t: DateTime<Utc>) -> Option<Self> {
        self.minus_time(&TsTzSpanSet::from_span(Span::instant(t)))
    }

    /// Complement of [`Self::at_timestamps`].
    pub fn minus_timestamps(&self, ts: &[DateTime<Utc>]) -> Option<Self> {
        if ts.is_empty() {
            return Some(self.clone());
        }
        let spans: Vec<TsTzSpan> = ts.iter().map(|&t| Span::instant(t)).collect();
        match TsTzSpanSet::new(spans) {
            Ok(set) => self.minus_time(&set),
            Err(_) => Some(self.clone()),
        }
    }

    /// Remove a portion of the time support.
    fn minus_time(&self, removed: &TsTzSpanSet) -> Option<Self> {
        match self.time().difference(removed) {
            Some(keep) => self.at_periods(&keep),
            None => None,
        }
    }

    /// Time at which the value is exactly `v`.
    fn value_time(&self, v: &B) -> Option<TsTzSpanSet> {
        let spans: Vec<TsTzSpan> = match self {
            Temporal::Instant(i) => (i.value() == v)
                .then(|| Span::instant(i.timestamp()))
                .into_iter()
                .collect(),
            Temporal::InstantSet(s) => s
                .instants()
                .iter()
                .filter(|i| i.value() == v)
                .map(|i| Span::instant(i.timestamp()))
                .collect(),
            Temporal::Sequence(s) => s.value_spans(v),
            Temporal::SequenceSet(s) => s
                .sequences()
                .iter()
                .flat_map(|seq| seq.value_spans(v))
                .collect(),
        };
        TsTzSpanSet::new(spans).ok()
    }

    /// Restrict to the times at which the value is exactly `v`.
    pub fn at_value(&self, v: &B) -> Option<Self> {
        match self {
            Temporal::Instant(i) => (i.value() == v).then(|| self.clone()),
            Temporal::InstantSet(s) => {
                let kept: Vec<TInstant<B>> = s
                    .instants()
                    .iter()
                    .filter(|i| i.value() == v)
                    .cloned()
                    .collect();
                Self::wrap_instants(kept)
            }
            _ => {
                let time = self.value_time(v)?;
                self.at_periods(&time)
            }
        }
    }

    /// Complement of [`Self::at_value`].
    pub fn minus_value(&self, v: &B) -> Option<Self> {
        match self {
            Temporal::Instant(i) => (i.value() != v).then(|| self.clone()),
            Temporal::InstantSet(s) => {
                let kept: Vec<TInstant<B>> = s
                    .instants()
                    .iter()
                    .filter(|i| i.value() != v)
                    .cloned()
                    .collect();
                Self::wrap_instants(kept)
            }
            _ => match self.value_time(v) {
                Some(time) => self.minus_time(&time),
                None => Some(self.clone()),
            },
        }
    }

    /// Restrict to the times at which the value is any of `values`.
    pub fn at_values(&self, values: &[B]) -> Option<Self> {
        let mut pieces: Vec<Self> = Vec::new();
        for v in values {
            if let Some(piece) = self.at_value(v) {
                pieces.push(piece);
            }
        }
        match pieces.len() {
            0 => None,
            1 => pieces.pop(),
            _ => Temporal::merge_array(&pieces).ok(),
        }
    }

    /// Complement of [`Self::at_values`].
    pub fn minus_values(&self, values: &[B]) -> Option<Self> {
        let mut spans = Vec::new();
        for v in values {
            if let Some(time) = self.value_time(v) {
                spans.extend_from_slice(time.spans());
            }
        }
        if spans.is_empty() {
            return Some(self.clone());
        }
        match TsTzSpanSet::new(spans) {
            Ok(set) => self.minus_time(&set),
            Err(_) => Some(self.clone()),
        }
    }

    fn wrap_instants(mut kept: Vec<TInstant<B>>) -> Option<Self> {
        match kept.len() {
            0 => None,
            1 => Some(Temporal::Instant(kept.swap_remove(0))),
            _ => Some(Temporal::InstantSet(TInstantSet::assemble(kept))),
        }
    }

    fn wrap_sequences(mut kept: Vec<TSequence<B>>) -> Option<Self> {
        match kept.len() {
            0 => None,
            1 => Some(Temporal::Sequence(kept.swap_remove(0))),
            _ => TSequenceSet::new(kept).ok().map(Temporal::SequenceSet),
        }
    }
}

impl<B: NumberValue> Temporal<B> {
    /// Time at which the value lies within `span`.
    fn span_time(&self, span: &Span<B>) -> Option<TsTzSpanSet> {
        let spans: Vec<TsTzSpan> = match self {
            Temporal::Instant(i) => span
                .contains_value(*i.value())
                .then(|| Span::instant(i.timestamp()))
                .into_iter()
                .collect(),
            Temporal::InstantSet(s) => s
                .instants()
                .iter()
                .filter(|i| span.contains_value(*i.value()))
                .map(|i| Span::instant(i.timestamp()))
                .collect(),
            Temporal::Sequence(s) => s.span_spans(span),
            Temporal::SequenceSet(s) => s
                .sequences()
                .iter()
                .flat_map(|seq| seq.span_spans(span))
                .collect(),
        };
        TsTzSpanSet::new(spans).ok()
    }

    /// Restrict to the times at which the value lies within `span`.
    pub fn at_span(&self, span: &Span<B>) -> Option<Self> {
        let time = self.span_time(span)?;
        self.at_periods(&time)
    }

    /// Complement of [`Self::at_span`].
    pub fn minus_span(&self, span: &Span<B>) -> Option<Self> {
        match self.span_time(span) {
            Some(time) => self.minus_time(&time),
            None => Some(self.clone()),
        }
    }

    /// Restrict to the times at which the value lies within `spans`.
    pub fn at_spanset(&self, spans: &crate::spanset::SpanSet<B>) -> Option<Self> {
        let mut time_spans = Vec::new();
        for span in spans.spans() {
            if let Some(time) = self.span_time(span) {
                time_spans.extend_from_slice(time.spans());
            }
        }
        let time = TsTzSpanSet::new(time_spans).ok()?;
        self.at_periods(&time)
    }

    /// Complement of [`Self::at_spanset`].
    pub fn minus_spanset(&self, spans: &crate::spanset::SpanSet<B>) -> Option<Self> {
        let mut time_spans = Vec::new();
        for span in spans.spans() {
            if let Some(time) = self.span_time(span) {
                time_spans.extend_from_slice(time.spans());
            }
        }
        if time_spans.is_empty() {
            return Some(self.clone());
        }
        match TsTzSpanSet::new(time_spans) {
            Ok(set) => self.minus_time(&set),
            Err(_) => Some(self.clone()),
        }
    }
}

impl<B: BaseValue + PartialOrd> Temporal<B> {
    /// Restrict to the times of the minimum value.
    pub fn at_min(&self) -> Option<Self> {
        self.at_value(&self.min_value())
    }

    /// Restrict to the times of the maximum value.
    pub fn at_max(&self) -> Option<Self> {
        self.at_value(&self.max_value())
    }

    pub fn minus_min(&self) -> Option<Self> {
        self.minus_value(&self.min_value())
    }

    pub fn minus_max(&self) -> Option<Self> {
        self.minus_value(&self.max_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, m / 60, m % 60, 0).unwrap()
    }

    fn linear(values: &[(f64, u32)], lower_inc: bool, upper_inc: bool) -> Temporal<f64> {
        Temporal::Sequence(
            TSequence::new(
                values
                    .iter()
                    .map(|&(v, m)| TInstant::new(v, ts(m)).unwrap())
                    .collect(),
                lower_inc,
                upper_inc,
                TInterpolation::Linear,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_at_value_linear_midpoint() {
        // S1: [10@00:00, 20@00:10) at value 15 is the instant 15@00:05.
        let seq = linear(&[(10.0, 0), (20.0, 10)], true, false);
        let at = seq.at_value(&15.0).unwrap();
        assert_eq!(at.num_instants(), 1);
        assert_eq!(at.start_value(), 15.0);
        assert_eq!(at.start_timestamp(), ts(5));
    }

    #[test]
    fn test_at_value_not_taken() {
        let seq = linear(&[(10.0, 0), (20.0, 10)], true, false);
        assert!(seq.at_value(&25.0).is_none());
        // The end value of a right-open sequence is never attained.
        assert!(seq.at_value(&20.0).is_none());
    }

    #[test]
    fn test_minus_value_splits() {
        let seq = linear(&[(10.0, 0), (20.0, 10)], true, true);
        let minus = seq.minus_value(&15.0).unwrap();
        assert_eq!(minus.subtype_name(), "SequenceSet");
        assert!(minus.value_at_timestamp(ts(5)).is_none());
        assert_eq!(minus.value_at_timestamp(ts(4)), Some(14.0));
    }

    #[test]
    fn test_at_minus_complement() {
        let seq = linear(&[(10.0, 0), (20.0, 10)], true, true);
        let at = seq.at_value(&15.0).unwrap();
        let minus = seq.minus_value(&15.0).unwrap();
        let merged = at.merge(&minus).unwrap();
        for m in [0u32, 2, 5, 7, 10] {
            assert_eq!(merged.value_at_timestamp(ts(m)), seq.value_at_timestamp(ts(m)));
        }
    }

    #[test]
    fn test_at_period() {
        let seq = linear(&[(0.0, 0), (10.0, 10)], true, true);
        let span = TsTzSpan::new(ts(2), ts(8), true, false).unwrap();
        let at = seq.at_period(&span).unwrap();
        assert_eq!(at.start_value(), 2.0);
        assert_eq!(at.end_value(), 8.0);
        assert_eq!(at.start_timestamp(), ts(2));
        match &at {
            Temporal::Sequence(s) => assert!(!s.upper_inc()),
            other => panic!("expected a sequence, got {}", other.subtype_name()),
        }
    }

    #[test]
    fn test_at_period_instant_result() {
        let seq = linear(&[(0.0, 0), (10.0, 10)], true, true);
        let span = TsTzSpan::instant(ts(5));
        let at = seq.at_period(&span).unwrap();
        assert_eq!(at.num_instants(), 1);
        assert_eq!(at.start_value(), 5.0);
    }

    #[test]
    fn test_minus_period_complement() {
        let seq = linear(&[(0.0, 0), (10.0, 10)], true, true);
        let span = TsTzSpan::new(ts(2), ts(8), true, false).unwrap();
        let minus = seq.minus_period(&span).unwrap();
        assert!(minus.value_at_timestamp(ts(5)).is_none());
        assert_eq!(minus.value_at_timestamp(ts(1)), Some(1.0));
        assert_eq!(minus.value_at_timestamp(ts(8)), Some(8.0));
    }

    #[test]
    fn test_at_timestamp() {
        let seq = linear(&[(0.0, 0), (10.0, 10)], true, true);
        let at = seq.at_timestamp(ts(3)).unwrap();
        assert_eq!(at.subtype_name(), "Instant");
        assert_eq!(at.start_value(), 3.0);
        assert!(seq.at_timestamp(ts(11)).is_none());
    }

    #[test]
    fn test_at_span() {
        let seq = linear(&[(0.0, 0), (10.0, 10)], true, true);
        let span = Span::new(2.0, 5.0, true, true).unwrap();
        let at = seq.at_span(&span).unwrap();
        assert_eq!(at.start_value(), 2.0);
        assert_eq!(at.end_value(), 5.0);
        assert_eq!(at.start_timestamp(), ts(2));
        assert_eq!(at.end_timestamp(), ts(5));
    }

    #[test]
    fn test_at_span_decreasing() {
        let seq = linear(&[(10.0, 0), (0.0, 10)], true, true);
        let span = Span::new(2.0, 5.0, true, false).unwrap();
        let at = seq.at_span(&span).unwrap();
        // Value falls through (5, 2]: time interval (00:05, 00:08].
        assert_eq!(at.start_timestamp(), ts(5));
        assert_eq!(at.end_timestamp(), ts(8));
        assert!(seq.value_at_timestamp(ts(5)) == Some(5.0));
        match &at {
            Temporal::Sequence(s) => {
                assert!(!s.lower_inc());
                assert!(s.upper_inc());
            }
            other => panic!("expected a sequence, got {}", other.subtype_name()),
        }
    }

    #[test]
    fn test_at_span_step_int() {
        let instants = vec![
            TInstant::new(1i64, ts(0)).unwrap(),
            TInstant::new(5i64, ts(10)).unwrap(),
            TInstant::new(2i64, ts(20)).unwrap(),
        ];
        let seq = Temporal::Sequence(
            TSequence::new(instants, true, true, TInterpolation::Step).unwrap(),
        );
        let span = Span::new(1, 2, true, true).unwrap();
        let at = seq.at_span(&span).unwrap();
        assert_eq!(at.value_at_timestamp(ts(5)), Some(1));
        assert!(at.value_at_timestamp(ts(15)).is_none());
        assert_eq!(at.value_at_timestamp(ts(20)), Some(2));
    }

    #[test]
    fn test_at_min_max() {
        let seq = linear(&[(5.0, 0), (1.0, 10), (7.0, 20)], true, true);
        let at_min = seq.at_min().unwrap();
        assert_eq!(at_min.start_timestamp(), ts(10));
        let at_max = seq.at_max().unwrap();
        assert_eq!(at_max.start_timestamp(), ts(20));
    }

    #[test]
    fn test_instantset_restriction() {
        let set = Temporal::InstantSet(
            TInstantSet::new(vec![
                TInstant::new(1i64, ts(0)).unwrap(),
                TInstant::new(2i64, ts(10)).unwrap(),
                TInstant::new(1i64, ts(20)).unwrap(),
            ])
            .unwrap(),
        );
        let at = set.at_value(&1).unwrap();
        assert_eq!(at.num_instants(), 2);
        let minus = set.minus_value(&1).unwrap();
        assert_eq!(minus.num_instants(), 1);
        assert_eq!(minus.start_timestamp(), ts(10));
    }
}
