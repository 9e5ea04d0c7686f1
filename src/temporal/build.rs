//! Expandable structures for streaming ingestion.
//!
//! Sequences and instant sets support in-place `append_instant` with
//! amortized O(1) growth: when the buffer is full a new one is allocated
//! at twice the capacity. `restart_last` bounds memory during streaming by
//! retaining only a tail window. The [`TSequenceSetBuilder`] additionally
//! splits the stream into sequences at time or distance gaps.

use super::instant::TInstant;
use super::instant_set::TInstantSet;
use super::sequence::TSequence;
use super::sequence_set::TSequenceSet;
use super::TInterpolation;
use crate::base::BaseValue;
use crate::error::{Result, TemporalError};
use chrono::TimeDelta;

impl<B: BaseValue> TSequence<B> {
    /// Expandable sequence with room for `capacity` instants.
    pub fn with_capacity(
        first: TInstant<B>,
        interp: TInterpolation,
        capacity: usize,
    ) -> Result<Self> {
        let mut seq = Self::from_instant(first, interp)?;
        let spare = capacity.saturating_sub(seq.num_instants());
        seq.instants_mut().reserve_exact(spare);
        Ok(seq)
    }

    /// Append an instant in place.
    ///
    /// Fails with `OutOfOrder` unless the timestamp is strictly after the
    /// last one. The window around the new instant is re-normalized, so a
    /// long stream of redundant values stays small.
    pub fn append_instant(&mut self, inst: TInstant<B>) -> Result<()> {
        inst.value().validate()?;
        let last = self.end_instant();
        if inst.timestamp() <= last.timestamp() {
            return Err(TemporalError::OutOfOrder(format!(
                "cannot append {} after {}",
                inst.timestamp(),
                last.timestamp()
            )));
        }
        last.value().ensure_compatible(inst.value())?;

        // Grow by doubling when the buffer is full.
        let instants = self.instants_mut();
        if instants.len() == instants.capacity() {
            let target = instants.capacity().max(1) * 2;
            instants.reserve_exact(target - instants.len());
        }
        self.push_instant_unchecked(inst);
        if self.is_redundant_window() {
            self.drop_penultimate();
        }
        Ok(())
    }

    /// Retain only the last `keep` instants.
    pub fn restart_last(&mut self, keep: usize) {
        let n = self.num_instants();
        if keep == 0 || keep >= n {
            return;
        }
        self.instants_mut().drain(..n - keep);
        self.refresh_bbox();
    }
}

impl<B: BaseValue> TInstantSet<B> {
    /// Expandable instant set with room for `capacity` instants.
    pub fn with_capacity(first: TInstant<B>, capacity: usize) -> Self {
        let mut set = Self::assemble(vec![first]);
        let spare = capacity.saturating_sub(1);
        set.instants_mut().reserve_exact(spare);
        set
    }

    /// Append an instant in place; same contract as the sequence form.
    pub fn append_instant(&mut self, inst: TInstant<B>) -> Result<()> {
        inst.value().validate()?;
        let last = self.end_instant();
        if inst.timestamp() <= last.timestamp() {
            return Err(TemporalError::OutOfOrder(format!(
                "cannot append {} after {}",
                inst.timestamp(),
                last.timestamp()
            )));
        }
        last.value().ensure_compatible(inst.value())?;
        let instants = self.instants_mut();
        if instants.len() == instants.capacity() {
            let target = instants.capacity().max(1) * 2;
            instants.reserve_exact(target - instants.len());
        }
        instants.push(inst);
        self.refresh_bbox();
        Ok(())
    }

    /// Retain only the last `keep` instants.
    pub fn restart_last(&mut self, keep: usize) {
        let n = self.num_instants();
        if keep == 0 || keep >= n {
            return;
        }
        self.instants_mut().drain(..n - keep);
        self.refresh_bbox();
    }
}

/// Streaming builder assembling a sequence set, splitting at gaps.
pub struct TSequenceSetBuilder<B: BaseValue> {
    finished: Vec<TSequence<B>>,
    current: Option<TSequence<B>>,
    interp: TInterpolation,
    max_gap: Option<TimeDelta>,
    max_distance: Option<f64>,
}

impl<B: BaseValue> TSequenceSetBuilder<B> {
    pub fn new(interp: TInterpolation) -> Self {
        Self {
            finished: Vec::new(),
            current: None,
            interp,
            max_gap: None,
            max_distance: None,
        }
    }

    /// Close the running sequence whenever the time gap to the previous
    /// instant exceeds `gap`.
    pub fn with_max_gap(mut self, gap: TimeDelta) -> Self {
        self.max_gap = Some(gap);
        self
    }

    /// Close the running sequence whenever the value jump to the previous
    /// instant exceeds `distance`.
    pub fn with_max_distance(mut self, distance: f64) -> Self {
        self.max_distance = Some(distance);
        self
    }

    pub fn append_instant(&mut self, inst: TInstant<B>) -> Result<()> {
        let current = match self.current.as_mut() {
            None => {
                self.current = Some(TSequence::from_instant(inst, self.interp)?);
                return Ok(());
            }
            Some(current) => current,
        };

        let last = current.end_instant();
        if inst.timestamp() <= last.timestamp() {
            return Err(TemporalError::OutOfOrder(format!(
                "cannot append {} after {}",
                inst.timestamp(),
                last.timestamp()
            )));
        }

        let gap_split = self
            .max_gap
            .is_some_and(|gap| inst.timestamp() - last.timestamp() > gap);
        let dist_split = self.max_distance.is_some_and(|max| {
            last.value()
                .gap_distance(inst.value())
                .is_some_and(|d| d > max)
        });

        if gap_split || dist_split {
            let done = self.current.take();
            if let Some(done) = done {
                self.finished.push(done);
            }
            self.current = Some(TSequence::from_instant(inst, self.interp)?);
            return Ok(());
        }
        current.append_instant(inst)
    }

    pub fn num_sequences(&self) -> usize {
        self.finished.len() + usize::from(self.current.is_some())
    }

    /// Materialize the accumulated stream.
    pub fn finish(mut self) -> Result<TSequenceSet<B>> {
        if let Some(current) = self.current.take() {
            self.finished.push(current);
        }
        if self.finished.is_empty() {
            return Err(TemporalError::EmptyInput(
                "the builder received no instants".to_string(),
            ));
        }
        TSequenceSet::new(self.finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, m / 60, m % 60, 0).unwrap()
    }

    fn inst(v: f64, m: u32) -> TInstant<f64> {
        TInstant::new(v, ts(m)).unwrap()
    }

    #[test]
    fn test_append_out_of_order() {
        // S5: appending at the last timestamp is rejected.
        let mut seq =
            TSequence::with_capacity(inst(1.0, 5), TInterpolation::Linear, 8).unwrap();
        assert!(matches!(
            seq.append_instant(inst(2.0, 5)),
            Err(TemporalError::OutOfOrder(_))
        ));
        assert!(matches!(
            seq.append_instant(inst(2.0, 3)),
            Err(TemporalError::OutOfOrder(_))
        ));
        assert!(seq.append_instant(inst(2.0, 6)).is_ok());
    }

    #[test]
    fn test_append_normalizes_window() {
        let mut seq =
            TSequence::with_capacity(inst(0.0, 0), TInterpolation::Linear, 8).unwrap();
        seq.append_instant(inst(5.0, 5)).unwrap();
        seq.append_instant(inst(10.0, 10)).unwrap();
        // The middle instant is collinear and collapses away.
        assert_eq!(seq.num_instants(), 2);
        assert_eq!(seq.value_at_timestamp(ts(5)), Some(5.0));
    }

    #[test]
    fn test_append_reads_back() {
        let mut seq =
            TSequence::with_capacity(inst(0.0, 0), TInterpolation::Linear, 2).unwrap();
        for i in 1..100u32 {
            let v = if i % 2 == 0 { 0.0 } else { 1.0 };
            seq.append_instant(inst(v, i)).unwrap();
        }
        assert_eq!(seq.num_instants(), 100);
        assert_eq!(seq.end_timestamp(), ts(99));
        assert_eq!(seq.value_at_timestamp(ts(51)), Some(1.0));
    }

    #[test]
    fn test_restart_last() {
        let mut seq =
            TSequence::with_capacity(inst(0.0, 0), TInterpolation::Linear, 8).unwrap();
        for i in 1..10u32 {
            seq.append_instant(inst((i % 2) as f64, i)).unwrap();
        }
        seq.restart_last(3);
        assert_eq!(seq.num_instants(), 3);
        assert_eq!(seq.end_timestamp(), ts(9));
        assert_eq!(seq.start_timestamp(), ts(7));
    }

    #[test]
    fn test_instant_set_append() {
        let mut set = TInstantSet::with_capacity(inst(1.0, 0), 4);
        set.append_instant(inst(2.0, 10)).unwrap();
        assert_eq!(set.num_instants(), 2);
        assert!(matches!(
            set.append_instant(inst(3.0, 10)),
            Err(TemporalError::OutOfOrder(_))
        ));
    }

    #[test]
    fn test_builder_gap_split() {
        let mut builder =
            TSequenceSetBuilder::new(TInterpolation::Linear).with_max_gap(TimeDelta::minutes(5));
        builder.append_instant(inst(0.0, 0)).unwrap();
        builder.append_instant(inst(1.0, 2)).unwrap();
        // 10 minute hole: a new sequence starts here.
        builder.append_instant(inst(2.0, 12)).unwrap();
        builder.append_instant(inst(3.0, 14)).unwrap();
        let set = builder.finish().unwrap();
        assert_eq!(set.num_sequences(), 2);
        assert_eq!(set.sequence_n(0).unwrap().end_timestamp(), ts(2));
        assert_eq!(set.sequence_n(1).unwrap().start_timestamp(), ts(12));
    }

    #[test]
    fn test_builder_distance_split() {
        let mut builder =
            TSequenceSetBuilder::new(TInterpolation::Linear).with_max_distance(10.0);
        builder.append_instant(inst(0.0, 0)).unwrap();
        builder.append_instant(inst(5.0, 1)).unwrap();
        builder.append_instant(inst(100.0, 2)).unwrap();
        let set = builder.finish().unwrap();
        assert_eq!(set.num_sequences(), 2);
    }

    #[test]
    fn test_expandable_supports_reads() {
        let mut seq =
            TSequence::with_capacity(inst(0.0, 0), TInterpolation::Linear, 4).unwrap();
        seq.append_instant(inst(10.0, 10)).unwrap();
        // Read-only operations see the appended state.
        let temporal = crate::temporal::Temporal::Sequence(seq.clone());
        assert_eq!(temporal.value_at_timestamp(ts(5)), Some(5.0));
        assert!(temporal.at_value(&5.0).is_some());
        assert_eq!(seq.time_span().duration(), TimeDelta::minutes(10));
    }
}
