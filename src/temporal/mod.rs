//! Temporal values: the four subtypes and the operations over them.

pub mod agg;
pub mod build;
pub mod instant;
pub mod instant_set;
pub mod lift;
pub mod ops;
pub mod restrict;
pub mod sequence;
pub mod sequence_set;
pub mod sync;

pub use instant::TInstant;
pub use instant_set::TInstantSet;
pub use sequence::TSequence;
pub use sequence_set::TSequenceSet;

use crate::base::BaseValue;
use crate::error::{Result, TemporalError};
use crate::interval::Interval;
use crate::span::{Span, TsTzSpan};
use crate::spanset::TsTzSpanSet;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// How values evolve between two consecutive instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TInterpolation {
    /// No value between instants.
    Discrete,
    /// The value holds until the next instant.
    Step,
    /// The value is interpolated between adjacent instants.
    Linear,
}

impl fmt::Display for TInterpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TInterpolation::Discrete => "Discrete",
            TInterpolation::Step => "Step",
            TInterpolation::Linear => "Linear",
        })
    }
}

impl std::str::FromStr for TInterpolation {
    type Err = TemporalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Discrete" => Ok(TInterpolation::Discrete),
            "Step" | "Stepwise" => Ok(TInterpolation::Step),
            "Linear" => Ok(TInterpolation::Linear),
            other => Err(TemporalError::InvalidInput(format!(
                "unknown interpolation: {}",
                other
            ))),
        }
    }
}

/// A temporal value in one of the four subtypes.
#[derive(Debug, Clone, PartialEq)]
pub enum Temporal<B: BaseValue> {
    Instant(TInstant<B>),
    InstantSet(TInstantSet<B>),
    Sequence(TSequence<B>),
    SequenceSet(TSequenceSet<B>),
}

impl<B: BaseValue> From<TInstant<B>> for Temporal<B> {
    fn from(v: TInstant<B>) -> Self {
        Temporal::Instant(v)
    }
}

impl<B: BaseValue> From<TInstantSet<B>> for Temporal<B> {
    fn from(v: TInstantSet<B>) -> Self {
        Temporal::InstantSet(v)
    }
}

impl<B: BaseValue> From<TSequence<B>> for Temporal<B> {
    fn from(v: TSequence<B>) -> Self {
        Temporal::Sequence(v)
    }
}

impl<B: BaseValue> From<TSequenceSet<B>> for Temporal<B> {
    fn from(v: TSequenceSet<B>) -> Self {
        Temporal::SequenceSet(v)
    }
}

impl<B: BaseValue> Temporal<B> {
    /// Shorthand constructor for a temporal instant.
    pub fn instant(value: B, t: DateTime<Utc>) -> Result<Self> {
        Ok(Temporal::Instant(TInstant::new(value, t)?))
    }

    pub fn subtype_name(&self) -> &'static str {
        match self {
            Temporal::Instant(_) => "Instant",
            Temporal::InstantSet(_) => "InstantSet",
            Temporal::Sequence(_) => "Sequence",
            Temporal::SequenceSet(_) => "SequenceSet",
        }
    }

    pub fn interpolation(&self) -> TInterpolation {
        match self {
            Temporal::Instant(_) | Temporal::InstantSet(_) => TInterpolation::Discrete,
            Temporal::Sequence(s) => s.interpolation(),
            Temporal::SequenceSet(s) => s.interpolation(),
        }
    }

    /// Bounding box: a time span for bool/text, a `TBox` for numbers, an
    /// `STBox` for points.
    pub fn bbox(&self) -> B::Bbox {
        match self {
            Temporal::Instant(i) => i.bbox(),
            Temporal::InstantSet(s) => s.bbox().clone(),
            Temporal::Sequence(s) => s.bbox().clone(),
            Temporal::SequenceSet(s) => s.bbox().clone(),
        }
    }

    pub fn num_instants(&self) -> usize {
        match self {
            Temporal::Instant(_) => 1,
            Temporal::InstantSet(s) => s.num_instants(),
            Temporal::Sequence(s) => s.num_instants(),
            Temporal::SequenceSet(s) => s.num_instants(),
        }
    }

    pub fn instants(&self) -> Vec<&TInstant<B>> {
        match self {
            Temporal::Instant(i) => vec![i],
            Temporal::InstantSet(s) => s.instants().iter().collect(),
            Temporal::Sequence(s) => s.instants().iter().collect(),
            Temporal::SequenceSet(s) => s.instants().collect(),
        }
    }

    pub fn instant_n(&self, n: usize) -> Option<&TInstant<B>> {
        match self {
            Temporal::Instant(i) => (n == 0).then_some(i),
            Temporal::InstantSet(s) => s.instant_n(n),
            Temporal::Sequence(s) => s.instant_n(n),
            Temporal::SequenceSet(s) => s.instant_n(n),
        }
    }

    pub fn start_instant(&self) -> &TInstant<B> {
        match self {
            Temporal::Instant(i) => i,
            Temporal::InstantSet(s) => s.start_instant(),
            Temporal::Sequence(s) => s.start_instant(),
            Temporal::SequenceSet(s) => s.start_sequence().start_instant(),
        }
    }

    pub fn end_instant(&self) -> &TInstant<B> {
        match self {
            Temporal::Instant(i) => i,
            Temporal::InstantSet(s) => s.end_instant(),
            Temporal::Sequence(s) => s.end_instant(),
            Temporal::SequenceSet(s) => s.end_sequence().end_instant(),
        }
    }

    pub fn start_value(&self) -> B {
        self.start_instant().value().clone()
    }

    pub fn end_value(&self) -> B {
        self.end_instant().value().clone()
    }

    /// Values taken, in time order; consecutive duplicates are kept.
    pub fn values(&self) -> Vec<B> {
        self.instants().into_iter().map(|i| i.value().clone()).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.instants().into_iter().map(|i| i.timestamp()).collect()
    }

    pub fn num_timestamps(&self) -> usize {
        self.num_instants()
    }

    pub fn start_timestamp(&self) -> DateTime<Utc> {
        self.start_instant().timestamp()
    }

    pub fn end_timestamp(&self) -> DateTime<Utc> {
        self.end_instant().timestamp()
    }

    /// Closed hull of the time support.
    pub fn time_span(&self) -> TsTzSpan {
        match self {
            Temporal::Instant(i) => Span::instant(i.timestamp()),
            Temporal::InstantSet(s) => s.time_span(),
            Temporal::Sequence(s) => s.time_span(),
            Temporal::SequenceSet(s) => Span::from_parts(
                s.start_sequence().start_timestamp(),
                s.end_sequence().end_timestamp(),
                s.start_sequence().lower_inc(),
                s.end_sequence().upper_inc(),
            ),
        }
    }

    /// The exact time support as a span set.
    pub fn time(&self) -> TsTzSpanSet {
        match self {
            Temporal::Instant(i) => TsTzSpanSet::from_span(Span::instant(i.timestamp())),
            Temporal::InstantSet(s) => s.time(),
            Temporal::Sequence(s) => TsTzSpanSet::from_span(s.time_span()),
            Temporal::SequenceSet(s) => s.time(),
        }
    }

    /// Duration of the time support. With `ignore_gaps` the bounding
    /// period is measured instead.
    pub fn duration(&self, ignore_gaps: bool) -> TimeDelta {
        match self {
            Temporal::Instant(_) | Temporal::InstantSet(_) => TimeDelta::zero(),
            Temporal::Sequence(s) => s.duration(),
            Temporal::SequenceSet(s) => {
                if ignore_gaps {
                    s.duration_spanned()
                } else {
                    s.duration()
                }
            }
        }
    }

    pub fn value_at_timestamp(&self, t: DateTime<Utc>) -> Option<B> {
        match self {
            Temporal::Instant(i) => i.value_at_timestamp(t),
            Temporal::InstantSet(s) => s.value_at_timestamp(t),
            Temporal::Sequence(s) => s.value_at_timestamp(t),
            Temporal::SequenceSet(s) => s.value_at_timestamp(t),
        }
    }

    /// Translate every timestamp by an exact duration.
    pub fn shift(&self, delta: TimeDelta) -> Result<Self> {
        Ok(match self {
            Temporal::Instant(i) => Temporal::Instant(i.shift(delta)?),
            Temporal::InstantSet(s) => Temporal::InstantSet(s.shift(delta)?),
            Temporal::Sequence(s) => Temporal::Sequence(s.shift(delta)?),
            Temporal::SequenceSet(s) => Temporal::SequenceSet(s.shift(delta)?),
        })
    }

    /// Translate every timestamp by a calendar interval.
    pub fn shift_interval(&self, interval: &Interval) -> Result<Self> {
        if interval.months == 0 {
            return self.shift(interval.to_delta()?);
        }
        let shift_instants = |instants: &[TInstant<B>]| -> Result<Vec<TInstant<B>>> {
            instants
                .iter()
                .map(|i| {
                    Ok(TInstant::from_parts(
                        i.value().clone(),
                        interval.add_to(i.timestamp())?,
                    ))
                })
                .collect()
        };
        Ok(match self {
            Temporal::Instant(i) => Temporal::Instant(TInstant::from_parts(
                i.value().clone(),
                interval.add_to(i.timestamp())?,
            )),
            Temporal::InstantSet(s) => {
                Temporal::InstantSet(TInstantSet::new(shift_instants(s.instants())?)?)
            }
            Temporal::Sequence(s) => Temporal::Sequence(TSequence::new(
                shift_instants(s.instants())?,
                s.lower_inc(),
                s.upper_inc(),
                s.interpolation(),
            )?),
            Temporal::SequenceSet(s) => {
                let sequences = s
                    .sequences()
                    .iter()
                    .map(|seq| {
                        TSequence::new(
                            shift_instants(seq.instants())?,
                            seq.lower_inc(),
                            seq.upper_inc(),
                            seq.interpolation(),
                        )
                    })
                    .collect::<Result<Vec<_>>>()?;
                Temporal::SequenceSet(TSequenceSet::new(sequences)?)
            }
        })
    }

    /// Rescale the timestamps so the overall duration becomes
    /// `new_duration`; values are unchanged.
    ///
    /// Fails with `InvalidDuration` on instants and zero-duration values.
    pub fn tscale(&self, new_duration: TimeDelta) -> Result<Self> {
        match self {
            Temporal::Instant(_) => Err(TemporalError::InvalidDuration(
                "cannot rescale an instant".to_string(),
            )),
            Temporal::InstantSet(s) => Ok(Temporal::InstantSet(s.tscale(new_duration)?)),
            Temporal::Sequence(s) => Ok(Temporal::Sequence(s.tscale(new_duration)?)),
            Temporal::SequenceSet(s) => Ok(Temporal::SequenceSet(s.tscale(new_duration)?)),
        }
    }

    pub fn shift_tscale(
        &self,
        delta: Option<TimeDelta>,
        new_duration: Option<TimeDelta>,
    ) -> Result<Self> {
        let mut value = self.clone();
        if let Some(delta) = delta {
            value = value.shift(delta)?;
        }
        if let Some(duration) = new_duration {
            value = value.tscale(duration)?;
        }
        Ok(value)
    }

    /// Convert to another interpolation, possibly changing the subtype.
    pub fn set_interpolation(&self, interp: TInterpolation) -> Result<Self> {
        match self {
            Temporal::Instant(_) => Ok(self.clone()),
            Temporal::InstantSet(s) => match interp {
                TInterpolation::Discrete => Ok(self.clone()),
                _ => {
                    let sequences = s
                        .instants()
                        .iter()
                        .map(|i| TSequence::from_instant(i.clone(), interp))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Temporal::SequenceSet(TSequenceSet::new(sequences)?))
                }
            },
            Temporal::Sequence(s) => match interp {
                TInterpolation::Discrete => {
                    if s.num_instants() == 1 {
                        Ok(Temporal::Instant(s.start_instant().clone()))
                    } else {
                        Err(TemporalError::InvalidInput(
                            "cannot make a multi-instant sequence discrete".to_string(),
                        ))
                    }
                }
                _ => {
                    let pieces = s.set_interpolation(interp)?;
                    Self::from_sequences(pieces)
                }
            },
            Temporal::SequenceSet(s) => match interp {
                TInterpolation::Discrete => {
                    if s.sequences().iter().all(|seq| seq.num_instants() == 1) {
                        let instants = s
                            .sequences()
                            .iter()
                            .map(|seq| seq.start_instant().clone())
                            .collect();
                        Ok(Temporal::InstantSet(TInstantSet::new(instants)?))
                    } else {
                        Err(TemporalError::InvalidInput(
                            "cannot make a multi-instant sequence set discrete".to_string(),
                        ))
                    }
                }
                _ => {
                    let mut pieces = Vec::new();
                    for seq in s.sequences() {
                        pieces.extend(seq.set_interpolation(interp)?);
                    }
                    Self::from_sequences(pieces)
                }
            },
        }
    }

    /// Wrap sequences into the slimmest subtype.
    pub(crate) fn from_sequences(mut sequences: Vec<TSequence<B>>) -> Result<Self> {
        match sequences.len() {
            0 => Err(TemporalError::EmptyInput(
                "no sequences to assemble".to_string(),
            )),
            1 => Ok(Temporal::Sequence(sequences.remove(0))),
            _ => Ok(Temporal::SequenceSet(TSequenceSet::new(sequences)?)),
        }
    }

    /// Set union with another temporal value over disjoint or agreeing
    /// time supports.
    pub fn merge(&self, other: &Self) -> Result<Self> {
        Self::merge_array(&[self.clone(), other.clone()])
    }

    pub fn merge_array(values: &[Self]) -> Result<Self> {
        if values.is_empty() {
            return Err(TemporalError::EmptyInput(
                "nothing to merge".to_string(),
            ));
        }
        let discrete = values
            .iter()
            .all(|v| matches!(v, Temporal::Instant(_) | Temporal::InstantSet(_)));
        if discrete {
            let mut instants: Vec<TInstant<B>> = Vec::new();
            for v in values {
                instants.extend(v.instants().into_iter().cloned());
            }
            instants.sort_by_key(|i| i.timestamp());
            let mut deduped: Vec<TInstant<B>> = Vec::with_capacity(instants.len());
            for inst in instants {
                match deduped.last() {
                    Some(last) if last.timestamp() == inst.timestamp() => {
                        if last.value() != inst.value() {
                            return Err(TemporalError::InvalidInput(format!(
                                "conflicting values at {}",
                                inst.timestamp()
                            )));
                        }
                    }
                    _ => deduped.push(inst),
                }
            }
            return if deduped.len() == 1 {
                Ok(Temporal::Instant(deduped.swap_remove(0)))
            } else {
                Ok(Temporal::InstantSet(TInstantSet::new(deduped)?))
            };
        }

        // Continuous merge: promote everything to sequences.
        let interp = values
            .iter()
            .map(|v| v.interpolation())
            .find(|i| *i != TInterpolation::Discrete)
            .unwrap_or(TInterpolation::Step);
        let mut sequences = Vec::new();
        for v in values {
            match v {
                Temporal::Instant(i) => {
                    sequences.push(TSequence::from_instant(i.clone(), interp)?)
                }
                Temporal::InstantSet(s) => {
                    for i in s.instants() {
                        sequences.push(TSequence::from_instant(i.clone(), interp)?);
                    }
                }
                Temporal::Sequence(s) => sequences.push(s.clone()),
                Temporal::SequenceSet(s) => sequences.extend(s.sequences().iter().cloned()),
            }
        }
        Ok(Temporal::SequenceSet(TSequenceSet::new(sequences)?))
    }

    /// Coerce to a single instant.
    pub fn to_instant(&self) -> Result<TInstant<B>> {
        if self.num_instants() == 1 {
            Ok(self.start_instant().clone())
        } else {
            Err(TemporalError::InvalidInput(format!(
                "a {} with {} instants cannot become an instant",
                self.subtype_name(),
                self.num_instants()
            )))
        }
    }

    /// Coerce to a sequence under the given interpolation.
    pub fn to_sequence(&self, interp: TInterpolation) -> Result<TSequence<B>> {
        match self {
            Temporal::Instant(i) => TSequence::from_instant(i.clone(), interp),
            Temporal::InstantSet(s) if s.num_instants() == 1 => {
                TSequence::from_instant(s.start_instant().clone(), interp)
            }
            Temporal::Sequence(s) if s.interpolation() == interp => Ok(s.clone()),
            Temporal::SequenceSet(s)
                if s.num_sequences() == 1 && s.interpolation() == interp =>
            {
                Ok(s.start_sequence().clone())
            }
            _ => Err(TemporalError::InvalidInput(format!(
                "cannot coerce this {} to a sequence",
                self.subtype_name()
            ))),
        }
    }

    /// Coerce to a sequence set under the given interpolation.
    pub fn to_sequence_set(&self, interp: TInterpolation) -> Result<TSequenceSet<B>> {
        match self {
            Temporal::Instant(i) => Ok(TSequenceSet::from_sequence(TSequence::from_instant(
                i.clone(),
                interp,
            )?)),
            Temporal::InstantSet(s) => {
                let sequences = s
                    .instants()
                    .iter()
                    .map(|i| TSequence::from_instant(i.clone(), interp))
                    .collect::<Result<Vec<_>>>()?;
                TSequenceSet::new(sequences)
            }
            Temporal::Sequence(s) if s.interpolation() == interp => {
                Ok(TSequenceSet::from_sequence(s.clone()))
            }
            Temporal::SequenceSet(s) if s.interpolation() == interp => Ok(s.clone()),
            _ => Err(TemporalError::InvalidInput(format!(
                "cannot coerce this {} {} to a {} sequence set",
                self.interpolation(),
                self.subtype_name(),
                interp
            ))),
        }
    }
}

impl<B: BaseValue> Temporal<B> {
    /// Whether the value `v` is ever taken.
    pub fn ever_eq(&self, v: &B) -> bool {
        self.at_value(v).is_some()
    }

    /// Whether the value is `v` at every defined time.
    pub fn always_eq(&self, v: &B) -> bool {
        self.minus_value(v).is_none()
    }
}

impl<B: BaseValue + PartialOrd> Temporal<B> {
    pub fn min_value(&self) -> B {
        match self {
            Temporal::Instant(i) => i.value().clone(),
            Temporal::InstantSet(s) => s.min_value(),
            Temporal::Sequence(s) => s.min_value(),
            Temporal::SequenceSet(s) => s.min_value(),
        }
    }

    pub fn max_value(&self) -> B {
        match self {
            Temporal::Instant(i) => i.value().clone(),
            Temporal::InstantSet(s) => s.max_value(),
            Temporal::Sequence(s) => s.max_value(),
            Temporal::SequenceSet(s) => s.max_value(),
        }
    }

    pub fn ever_lt(&self, v: &B) -> bool {
        self.min_value() < *v
    }

    pub fn ever_le(&self, v: &B) -> bool {
        self.min_value() <= *v
    }

    pub fn ever_gt(&self, v: &B) -> bool {
        self.max_value() > *v
    }

    pub fn ever_ge(&self, v: &B) -> bool {
        self.max_value() >= *v
    }

    pub fn always_lt(&self, v: &B) -> bool {
        self.max_value() < *v
    }

    pub fn always_le(&self, v: &B) -> bool {
        self.max_value() <= *v
    }

    pub fn always_gt(&self, v: &B) -> bool {
        self.min_value() > *v
    }

    pub fn always_ge(&self, v: &B) -> bool {
        self.min_value() >= *v
    }
}

impl<B: BaseValue> Hash for Temporal<B> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.subtype_name().hash(state);
        for inst in self.instants() {
            inst.value().hash_value(state);
            inst.timestamp().hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, m / 60, m % 60, 0).unwrap()
    }

    fn seq(values: &[(f64, u32)]) -> Temporal<f64> {
        Temporal::Sequence(
            TSequence::new(
                values
                    .iter()
                    .map(|&(v, m)| TInstant::new(v, ts(m)).unwrap())
                    .collect(),
                true,
                true,
                TInterpolation::Linear,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_shift_identity() {
        let s = seq(&[(1.0, 0), (2.0, 10)]);
        assert_eq!(s.shift(TimeDelta::zero()).unwrap(), s);
    }

    #[test]
    fn test_tscale_rejects_instant() {
        let i = Temporal::instant(1.0f64, ts(0)).unwrap();
        assert!(matches!(
            i.tscale(TimeDelta::minutes(5)),
            Err(TemporalError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_merge_disjoint_sequences() {
        let a = seq(&[(1.0, 0), (2.0, 10)]);
        let b = seq(&[(5.0, 20), (6.0, 30)]);
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.subtype_name(), "SequenceSet");
        assert_eq!(merged.num_instants(), 4);
    }

    #[test]
    fn test_merge_instants() {
        let a = Temporal::instant(1i64, ts(0)).unwrap();
        let b = Temporal::instant(2i64, ts(10)).unwrap();
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.subtype_name(), "InstantSet");

        // Conflicting values at the same timestamp are rejected.
        let c = Temporal::instant(9i64, ts(0)).unwrap();
        assert!(a.merge(&c).is_err());
        // Agreeing values at the same timestamp are fine.
        assert!(a.merge(&a).is_ok());
    }

    #[test]
    fn test_ever_always() {
        let s = seq(&[(0.0, 0), (10.0, 10)]);
        assert!(s.ever_eq(&5.0));
        assert!(!s.ever_eq(&11.0));
        assert!(!s.always_eq(&5.0));
        assert!(s.ever_lt(&1.0));
        assert!(s.always_le(&10.0));
        assert!(!s.always_lt(&10.0));
    }

    #[test]
    fn test_set_interpolation_instantset_to_step() {
        let set = Temporal::InstantSet(
            TInstantSet::new(vec![
                TInstant::new(1i64, ts(0)).unwrap(),
                TInstant::new(2i64, ts(10)).unwrap(),
            ])
            .unwrap(),
        );
        let stepped = set.set_interpolation(TInterpolation::Step).unwrap();
        assert_eq!(stepped.subtype_name(), "SequenceSet");
        assert_eq!(stepped.num_instants(), 2);
    }
}
