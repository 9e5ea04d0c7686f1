//! Temporal instant sets: a value sampled at isolated times.

use super::instant::TInstant;
use crate::base::BaseValue;
use crate::boxes::TemporalBox;
use crate::error::{Result, TemporalError};
use crate::span::{Span, SpanBound, TsTzSpan};
use crate::spanset::TsTzSpanSet;
use chrono::{DateTime, TimeDelta, Utc};

/// A non-empty, strictly time-ordered array of instants with no value
/// between them.
#[derive(Debug, Clone, PartialEq)]
pub struct TInstantSet<B: BaseValue> {
    instants: Vec<TInstant<B>>,
    bbox: B::Bbox,
}

impl<B: BaseValue> TInstantSet<B> {
    /// Create an instant set from strictly time-ordered instants.
    pub fn new(instants: Vec<TInstant<B>>) -> Result<Self> {
        if instants.is_empty() {
            return Err(TemporalError::EmptyInput(
                "an instant set requires at least one instant".to_string(),
            ));
        }
        for window in instants.windows(2) {
            if window[0].timestamp() >= window[1].timestamp() {
                return Err(TemporalError::OutOfOrder(format!(
                    "instant at {} does not follow {}",
                    window[1].timestamp(),
                    window[0].timestamp()
                )));
            }
            window[0].value().ensure_compatible(window[1].value())?;
        }
        Ok(Self::assemble(instants))
    }

    /// Build from instants already known to be valid.
    pub(crate) fn assemble(instants: Vec<TInstant<B>>) -> Self {
        debug_assert!(!instants.is_empty());
        let bbox = Self::compute_bbox(&instants);
        Self { instants, bbox }
    }

    pub(crate) fn compute_bbox(instants: &[TInstant<B>]) -> B::Bbox {
        let mut bbox = instants[0].bbox();
        for inst in &instants[1..] {
            bbox.expand(&inst.bbox());
        }
        bbox.set_period(Span::from_parts(
            instants[0].timestamp(),
            instants[instants.len() - 1].timestamp(),
            true,
            true,
        ));
        bbox
    }

    pub(crate) fn refresh_bbox(&mut self) {
        self.bbox = Self::compute_bbox(&self.instants);
    }

    pub fn instants(&self) -> &[TInstant<B>] {
        &self.instants
    }

    pub(crate) fn instants_mut(&mut self) -> &mut Vec<TInstant<B>> {
        &mut self.instants
    }

    pub fn num_instants(&self) -> usize {
        self.instants.len()
    }

    pub fn instant_n(&self, n: usize) -> Option<&TInstant<B>> {
        self.instants.get(n)
    }

    pub fn start_instant(&self) -> &TInstant<B> {
        &self.instants[0]
    }

    pub fn end_instant(&self) -> &TInstant<B> {
        &self.instants[self.instants.len() - 1]
    }

    pub fn start_timestamp(&self) -> DateTime<Utc> {
        self.instants[0].timestamp()
    }

    pub fn end_timestamp(&self) -> DateTime<Utc> {
        self.end_instant().timestamp()
    }

    pub fn bbox(&self) -> &B::Bbox {
        &self.bbox
    }

    /// Closed hull of the sampling times.
    pub fn time_span(&self) -> TsTzSpan {
        Span::from_parts(self.start_timestamp(), self.end_timestamp(), true, true)
    }

    /// The sampling times as a set of instant spans.
    pub fn time(&self) -> TsTzSpanSet {
        TsTzSpanSet::make_unchecked(
            self.instants
                .iter()
                .map(|i| Span::instant(i.timestamp()))
                .collect(),
        )
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.instants.iter().map(|i| i.timestamp()).collect()
    }

    /// Value at `t`; defined only at the sampling times.
    pub fn value_at_timestamp(&self, t: DateTime<Utc>) -> Option<B> {
        let idx = self.instants.partition_point(|i| i.timestamp() < t);
        match self.instants.get(idx) {
            Some(inst) if inst.timestamp() == t => Some(inst.value().clone()),
            _ => None,
        }
    }

    pub fn shift(&self, delta: TimeDelta) -> Result<Self> {
        let instants = self
            .instants
            .iter()
            .map(|i| i.shift(delta))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::assemble(instants))
    }

    /// Rescale sampling times around the start so the overall duration
    /// becomes `new_duration`.
    pub fn tscale(&self, new_duration: TimeDelta) -> Result<Self> {
        if new_duration <= TimeDelta::zero() {
            return Err(TemporalError::InvalidDuration(
                "the new duration must be positive".to_string(),
            ));
        }
        let old = self.end_timestamp() - self.start_timestamp();
        if old.is_zero() {
            return Err(TemporalError::InvalidDuration(
                "cannot rescale an instant set with zero duration".to_string(),
            ));
        }
        let origin = self.start_timestamp();
        let instants = self
            .instants
            .iter()
            .map(|i| {
                let offset =
                    <DateTime<Utc> as SpanBound>::rescale(i.timestamp() - origin, old, new_duration);
                Ok(TInstant::from_parts(i.value().clone(), origin.plus(offset)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::assemble(instants))
    }
}

impl<B: BaseValue + PartialOrd> TInstantSet<B> {
    pub fn min_value(&self) -> B {
        let mut min = self.instants[0].value();
        for inst in &self.instants[1..] {
            if inst.value() < min {
                min = inst.value();
            }
        }
        min.clone()
    }

    pub fn max_value(&self) -> B {
        let mut max = self.instants[0].value();
        for inst in &self.instants[1..] {
            if inst.value() > max {
                max = inst.value();
            }
        }
        max.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, m / 60, m % 60, 0).unwrap()
    }

    fn iset(values: &[(i64, u32)]) -> TInstantSet<i64> {
        TInstantSet::new(
            values
                .iter()
                .map(|&(v, m)| TInstant::new(v, ts(m)).unwrap())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_duplicated_timestamp() {
        let instants = vec![
            TInstant::new(1i64, ts(0)).unwrap(),
            TInstant::new(2i64, ts(0)).unwrap(),
        ];
        assert!(matches!(
            TInstantSet::new(instants),
            Err(TemporalError::OutOfOrder(_))
        ));
    }

    #[test]
    fn test_value_at_sampling_times_only() {
        let set = iset(&[(1, 0), (2, 10), (3, 20)]);
        assert_eq!(set.value_at_timestamp(ts(10)), Some(2));
        assert_eq!(set.value_at_timestamp(ts(5)), None);
    }

    #[test]
    fn test_time_is_isolated_instants() {
        let set = iset(&[(1, 0), (2, 10)]);
        let time = set.time();
        assert_eq!(time.num_spans(), 2);
        assert!(time.contains_value(ts(0)));
        assert!(!time.contains_value(ts(5)));
    }

    #[test]
    fn test_min_max() {
        let set = iset(&[(5, 0), (1, 10), (9, 20)]);
        assert_eq!(set.min_value(), 1);
        assert_eq!(set.max_value(), 9);
    }

    #[test]
    fn test_tscale() {
        let set = iset(&[(1, 0), (2, 10)]);
        let scaled = set.tscale(TimeDelta::minutes(30)).unwrap();
        assert_eq!(scaled.end_timestamp(), ts(30));
    }
}
