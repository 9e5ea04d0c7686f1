//! Temporal sequence sets: time-disjoint sequences under one
//! interpolation.

use super::TInterpolation;
use super::instant::TInstant;
use super::sequence::TSequence;
use crate::base::BaseValue;
use crate::boxes::TemporalBox;
use crate::error::{Result, TemporalError};
use crate::spanset::TsTzSpanSet;
use chrono::{DateTime, TimeDelta, Utc};

/// An ordered array of time-disjoint sequences sharing the base type and
/// interpolation.
///
/// Construction sorts the sequences and merges neighbors that join
/// seamlessly, so the stored array is canonical.
#[derive(Debug, Clone, PartialEq)]
pub struct TSequenceSet<B: BaseValue> {
    sequences: Vec<TSequence<B>>,
    bbox: B::Bbox,
}

impl<B: BaseValue> TSequenceSet<B> {
    pub fn new(sequences: Vec<TSequence<B>>) -> Result<Self> {
        if sequences.is_empty() {
            return Err(TemporalError::EmptyInput(
                "a sequence set requires at least one sequence".to_string(),
            ));
        }
        let interp = sequences[0].interpolation();
        for seq in &sequences[1..] {
            if seq.interpolation() != interp {
                return Err(TemporalError::TypeMismatch(format!(
                    "mixed interpolations in a sequence set: {} and {}",
                    interp,
                    seq.interpolation()
                )));
            }
            sequences[0]
                .start_instant()
                .value()
                .ensure_compatible(seq.start_instant().value())?;
        }
        Self::normalize(sequences)
    }

    pub fn from_sequence(sequence: TSequence<B>) -> Self {
        Self::assemble(vec![sequence])
    }

    fn normalize(mut sequences: Vec<TSequence<B>>) -> Result<Self> {
        sequences.sort_by(|a, b| {
            a.start_timestamp()
                .cmp(&b.start_timestamp())
                .then_with(|| a.end_timestamp().cmp(&b.end_timestamp()))
        });
        let mut merged: Vec<TSequence<B>> = Vec::with_capacity(sequences.len());
        for seq in sequences {
            match merged.last() {
                Some(last) if last.can_join(&seq) => {
                    let joined = last.join(&seq);
                    let n = merged.len();
                    merged[n - 1] = joined;
                }
                Some(last) if last.time_span().overlaps(&seq.time_span()) => {
                    return Err(TemporalError::InvalidInput(format!(
                        "overlapping sequences at {}",
                        seq.start_timestamp()
                    )));
                }
                _ => merged.push(seq),
            }
        }
        Ok(Self::assemble(merged))
    }

    /// Build from sequences already sorted, disjoint, and unjoinable.
    pub(crate) fn assemble(sequences: Vec<TSequence<B>>) -> Self {
        debug_assert!(!sequences.is_empty());
        let mut bbox = sequences[0].bbox().clone();
        for seq in &sequences[1..] {
            bbox.expand(seq.bbox());
        }
        Self { sequences, bbox }
    }

    pub fn sequences(&self) -> &[TSequence<B>] {
        &self.sequences
    }

    pub fn num_sequences(&self) -> usize {
        self.sequences.len()
    }

    pub fn sequence_n(&self, n: usize) -> Option<&TSequence<B>> {
        self.sequences.get(n)
    }

    pub fn start_sequence(&self) -> &TSequence<B> {
        &self.sequences[0]
    }

    pub fn end_sequence(&self) -> &TSequence<B> {
        &self.sequences[self.sequences.len() - 1]
    }

    pub fn interpolation(&self) -> TInterpolation {
        self.sequences[0].interpolation()
    }

    pub fn bbox(&self) -> &B::Bbox {
        &self.bbox
    }

    pub fn num_instants(&self) -> usize {
        self.sequences.iter().map(|s| s.num_instants()).sum()
    }

    /// N-th instant across the member sequences.
    pub fn instant_n(&self, n: usize) -> Option<&TInstant<B>> {
        let mut remaining = n;
        for seq in &self.sequences {
            if remaining < seq.num_instants() {
                return seq.instant_n(remaining);
            }
            remaining -= seq.num_instants();
        }
        None
    }

    pub fn instants(&self) -> impl Iterator<Item = &TInstant<B>> {
        self.sequences.iter().flat_map(|s| s.instants().iter())
    }

    pub fn start_timestamp(&self) -> DateTime<Utc> {
        self.start_sequence().start_timestamp()
    }

    pub fn end_timestamp(&self) -> DateTime<Utc> {
        self.end_sequence().end_timestamp()
    }

    pub fn start_value(&self) -> B {
        self.start_sequence().start_value()
    }

    pub fn end_value(&self) -> B {
        self.end_sequence().end_value()
    }

    /// The time support as a span set. Sequences touching at a value jump
    /// contribute one merged span.
    pub fn time(&self) -> TsTzSpanSet {
        TsTzSpanSet::normalize(self.sequences.iter().map(|s| s.time_span()).collect())
    }

    /// Active duration, gaps excluded.
    pub fn duration(&self) -> TimeDelta {
        self.sequences
            .iter()
            .fold(TimeDelta::zero(), |acc, s| acc + s.duration())
    }

    /// Duration of the bounding period, gaps included.
    pub fn duration_spanned(&self) -> TimeDelta {
        self.end_timestamp() - self.start_timestamp()
    }

    /// Index of the sequence whose time span contains `t`, by binary
    /// search.
    pub(crate) fn find_timestamp(&self, t: DateTime<Utc>) -> Option<usize> {
        let mut lo = 0usize;
        let mut hi = self.sequences.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let seq = &self.sequences[mid];
            if seq.contains_timestamp(t) {
                return Some(mid);
            }
            if t < seq.start_timestamp() {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        None
    }

    pub fn value_at_timestamp(&self, t: DateTime<Utc>) -> Option<B> {
        self.find_timestamp(t)
            .and_then(|i| self.sequences[i].value_at_timestamp(t))
    }

    pub fn shift(&self, delta: TimeDelta) -> Result<Self> {
        let sequences = self
            .sequences
            .iter()
            .map(|s| s.shift(delta))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::assemble(sequences))
    }

    /// Rescale all timestamps around the global start so the spanned
    /// duration becomes `new_duration`.
    pub fn tscale(&self, new_duration: TimeDelta) -> Result<Self> {
        if new_duration <= TimeDelta::zero() {
            return Err(TemporalError::InvalidDuration(
                "the new duration must be positive".to_string(),
            ));
        }
        let old = self.duration_spanned();
        if old.is_zero() {
            return Err(TemporalError::InvalidDuration(
                "cannot rescale a sequence set with zero duration".to_string(),
            ));
        }
        let origin = self.start_timestamp();
        let sequences = self
            .sequences
            .iter()
            .map(|s| {
                let offset = <DateTime<Utc> as crate::span::SpanBound>::rescale(
                    s.start_timestamp() - origin,
                    old,
                    new_duration,
                );
                let new_dur = <DateTime<Utc> as crate::span::SpanBound>::rescale(
                    s.duration(),
                    old,
                    new_duration,
                );
                let shifted = s.shift(offset - (s.start_timestamp() - origin))?;
                if new_dur.is_zero() || s.duration().is_zero() {
                    Ok(shifted)
                } else {
                    shifted.tscale(new_dur)
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::assemble(sequences))
    }
}

impl<B: BaseValue + PartialOrd> TSequenceSet<B> {
    pub fn min_value(&self) -> B {
        let mut min = self.sequences[0].min_value();
        for seq in &self.sequences[1..] {
            let v = seq.min_value();
            if v < min {
                min = v;
            }
        }
        min
    }

    pub fn max_value(&self) -> B {
        let mut max = self.sequences[0].max_value();
        for seq in &self.sequences[1..] {
            let v = seq.max_value();
            if v > max {
                max = v;
            }
        }
        max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, m / 60, m % 60, 0).unwrap()
    }

    fn seq(values: &[(f64, u32)], lower_inc: bool, upper_inc: bool) -> TSequence<f64> {
        TSequence::new(
            values
                .iter()
                .map(|&(v, m)| TInstant::new(v, ts(m)).unwrap())
                .collect(),
            lower_inc,
            upper_inc,
            TInterpolation::Linear,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_overlap() {
        let a = seq(&[(0.0, 0), (1.0, 10)], true, true);
        let b = seq(&[(5.0, 5), (6.0, 15)], true, true);
        assert!(TSequenceSet::new(vec![a, b]).is_err());
    }

    #[test]
    fn test_merges_seamless_neighbors() {
        let a = seq(&[(0.0, 0), (1.0, 10)], true, false);
        let b = seq(&[(1.0, 10), (2.0, 20)], true, true);
        let set = TSequenceSet::new(vec![a, b]).unwrap();
        assert_eq!(set.num_sequences(), 1);
        // Collinear instants across the junction collapse as well.
        assert_eq!(set.start_sequence().num_instants(), 2);
    }

    #[test]
    fn test_keeps_gap() {
        let a = seq(&[(0.0, 0), (1.0, 10)], true, true);
        let b = seq(&[(5.0, 20), (6.0, 30)], true, true);
        let set = TSequenceSet::new(vec![b, a]).unwrap();
        assert_eq!(set.num_sequences(), 2);
        // Sorted by start time despite the input order.
        assert_eq!(set.start_timestamp(), ts(0));
        assert_eq!(set.duration(), TimeDelta::minutes(20));
        assert_eq!(set.duration_spanned(), TimeDelta::minutes(30));
    }

    #[test]
    fn test_value_at_timestamp() {
        let a = seq(&[(0.0, 0), (10.0, 10)], true, true);
        let b = seq(&[(100.0, 20), (200.0, 30)], true, true);
        let set = TSequenceSet::new(vec![a, b]).unwrap();
        assert_eq!(set.value_at_timestamp(ts(5)), Some(5.0));
        assert_eq!(set.value_at_timestamp(ts(15)), None);
        assert_eq!(set.value_at_timestamp(ts(25)), Some(150.0));
    }

    #[test]
    fn test_min_max() {
        let a = seq(&[(5.0, 0), (10.0, 10)], true, true);
        let b = seq(&[(-1.0, 20), (3.0, 30)], true, true);
        let set = TSequenceSet::new(vec![a, b]).unwrap();
        assert_eq!(set.min_value(), -1.0);
        assert_eq!(set.max_value(), 10.0);
    }
}
