//! Lifting base-type functions to temporal functions.
//!
//! A lifted unary function maps every instant. A lifted binary function
//! first synchronizes its arguments (inserting crossings when the operator
//! asks for them), then maps the aligned instants; comparisons over linear
//! inputs additionally split the result at the times where the lifted
//! value changes, with exclusive bounds at the crossover.

use super::instant::TInstant;
use super::instant_set::TInstantSet;
use super::sequence::TSequence;
use super::sequence_set::TSequenceSet;
use super::sync::{SyncMode, TurnFn, synchronize};
use super::{TInterpolation, Temporal};
use crate::base::BaseValue;
use crate::engine;
use crate::error::{Result, TemporalError};
use chrono::{DateTime, Utc};

/// Descriptor of a lifted binary operator.
pub struct LiftedBinary<'a, B: BaseValue, R: BaseValue> {
    /// The pointwise function.
    pub func: &'a dyn Fn(&B, &B) -> R,
    /// Whether the lifted value can change mid-segment over linear inputs
    /// (comparisons). Such operators split the output at crossovers.
    pub discontinuous: bool,
    /// Crossing solver used during synchronization.
    pub turnpoint: Option<TurnFn<'a, B, B>>,
}

/// Result interpolation for a mapped sequence.
fn result_interp<R: BaseValue>(a: TInterpolation, b: TInterpolation) -> TInterpolation {
    if R::CONTINUOUS && a == TInterpolation::Linear && b == TInterpolation::Linear {
        TInterpolation::Linear
    } else {
        TInterpolation::Step
    }
}

/// Lift a unary function over a temporal value.
pub fn lift_unary<B: BaseValue, R: BaseValue>(
    x: &Temporal<B>,
    f: impl Fn(&B) -> R,
) -> Result<Temporal<R>> {
    let map_instant =
        |i: &TInstant<B>| -> Result<TInstant<R>> { TInstant::new(f(i.value()), i.timestamp()) };
    let map_sequence = |s: &TSequence<B>| -> Result<TSequence<R>> {
        let instants = s
            .instants()
            .iter()
            .map(map_instant)
            .collect::<Result<Vec<_>>>()?;
        TSequence::new(
            instants,
            s.lower_inc(),
            s.upper_inc(),
            result_interp::<R>(s.interpolation(), s.interpolation()),
        )
    };
    Ok(match x {
        Temporal::Instant(i) => Temporal::Instant(map_instant(i)?),
        Temporal::InstantSet(s) => {
            let instants = s
                .instants()
                .iter()
                .map(map_instant)
                .collect::<Result<Vec<_>>>()?;
            Temporal::InstantSet(TInstantSet::assemble(instants))
        }
        Temporal::Sequence(s) => Temporal::Sequence(map_sequence(s)?),
        Temporal::SequenceSet(s) => {
            let sequences = s
                .sequences()
                .iter()
                .map(map_sequence)
                .collect::<Result<Vec<_>>>()?;
            Temporal::SequenceSet(TSequenceSet::new(sequences)?)
        }
    })
}

/// Lift a unary function whose exactness needs extra instants at interior
/// turning points (absolute value at zero crossings).
///
/// `turn` reports, for a linear segment, the interior ratio at which the
/// output bends together with the input value attained there.
pub fn lift_unary_turn<B: BaseValue, R: BaseValue>(
    x: &Temporal<B>,
    f: impl Fn(&B) -> R,
    turn: impl Fn(&B, &B) -> Option<f64>,
) -> Result<Temporal<R>> {
    let split = insert_turnpoints(x, &turn)?;
    lift_unary(&split, f)
}

/// Insert instants at interior turning points of every linear segment.
fn insert_turnpoints<B: BaseValue>(
    x: &Temporal<B>,
    turn: &impl Fn(&B, &B) -> Option<f64>,
) -> Result<Temporal<B>> {
    let budget = engine::global().instant_budget();
    let split_sequence = |s: &TSequence<B>| -> Result<TSequence<B>> {
        if s.interpolation() != TInterpolation::Linear {
            return Ok(s.clone());
        }
        let mut instants: Vec<TInstant<B>> = Vec::with_capacity(s.num_instants());
        for inst in s.instants() {
            if let Some(prev) = instants.last() {
                if let Some(ratio) = turn(prev.value(), inst.value()) {
                    if ratio > 0.0 && ratio < 1.0 {
                        let t = super::restrict::time_at_ratio(
                            prev.timestamp(),
                            inst.timestamp(),
                            ratio,
                        );
                        if t > prev.timestamp() && t < inst.timestamp() {
                            let ratio = super::sequence::segment_ratio(
                                prev.timestamp(),
                                inst.timestamp(),
                                t,
                            );
                            let value = prev.value().interpolate(inst.value(), ratio);
                            instants.push(TInstant::from_parts(value, t));
                        }
                    }
                }
            }
            instants.push(inst.clone());
            if instants.len() > budget {
                return Err(TemporalError::TooComplex(budget));
            }
        }
        Ok(TSequence::assemble(
            instants,
            s.lower_inc(),
            s.upper_inc(),
            s.interpolation(),
        ))
    };
    Ok(match x {
        Temporal::Sequence(s) => Temporal::Sequence(split_sequence(s)?),
        Temporal::SequenceSet(s) => {
            let sequences = s
                .sequences()
                .iter()
                .map(split_sequence)
                .collect::<Result<Vec<_>>>()?;
            Temporal::SequenceSet(TSequenceSet::assemble(sequences))
        }
        _ => x.clone(),
    })
}

/// Lift a binary function over two temporal values.
///
/// Returns `None` when the time supports are disjoint.
pub fn lift_binary<B: BaseValue, R: BaseValue>(
    x: &Temporal<B>,
    y: &Temporal<B>,
    op: &LiftedBinary<'_, B, R>,
) -> Result<Option<Temporal<R>>> {
    x.start_instant()
        .value()
        .ensure_compatible(y.start_instant().value())?;
    let budget = engine::global().instant_budget();
    let mode = if op.turnpoint.is_some() {
        SyncMode::Crossings
    } else {
        SyncMode::Exact
    };
    let (xs, ys) = match synchronize(x, y, mode, op.turnpoint, budget)? {
        Some(pair) => pair,
        None => return Ok(None),
    };

    let f = op.func;
    match (&xs, &ys) {
        (Temporal::Instant(ia), Temporal::Instant(ib)) => Ok(Some(Temporal::Instant(
            TInstant::new(f(ia.value(), ib.value()), ia.timestamp())?,
        ))),
        (Temporal::InstantSet(sa), Temporal::InstantSet(sb)) => {
            let instants = sa
                .instants()
                .iter()
                .zip(sb.instants())
                .map(|(ia, ib)| TInstant::new(f(ia.value(), ib.value()), ia.timestamp()))
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(Temporal::InstantSet(TInstantSet::assemble(instants))))
        }
        (Temporal::Sequence(sa), Temporal::Sequence(sb)) => {
            let pieces = lift_sequence_pair(sa, sb, op)?;
            Ok(Some(Temporal::from_sequences(pieces)?))
        }
        (Temporal::SequenceSet(sa), Temporal::SequenceSet(sb)) => {
            let mut pieces = Vec::new();
            for (qa, qb) in sa.sequences().iter().zip(sb.sequences()) {
                pieces.extend(lift_sequence_pair(qa, qb, op)?);
            }
            Ok(Some(Temporal::from_sequences(pieces)?))
        }
        _ => Err(TemporalError::TypeMismatch(
            "synchronization produced mismatched subtypes".to_string(),
        )),
    }
}

/// Map a synchronized sequence pair through the operator.
fn lift_sequence_pair<B: BaseValue, R: BaseValue>(
    sa: &TSequence<B>,
    sb: &TSequence<B>,
    op: &LiftedBinary<'_, B, R>,
) -> Result<Vec<TSequence<R>>> {
    let f = op.func;
    let both_linear = sa.interpolation() == TInterpolation::Linear
        && sb.interpolation() == TInterpolation::Linear;
    if op.discontinuous && both_linear && sa.num_instants() > 1 {
        return lift_discontinuous(sa, sb, f);
    }
    let instants = sa
        .instants()
        .iter()
        .zip(sb.instants())
        .map(|(ia, ib)| TInstant::new(f(ia.value(), ib.value()), ia.timestamp()))
        .collect::<Result<Vec<_>>>()?;
    Ok(vec![TSequence::new(
        instants,
        sa.lower_inc(),
        sa.upper_inc(),
        result_interp::<R>(sa.interpolation(), sb.interpolation()),
    )?])
}

/// A run of constant output value under construction.
struct Run<R> {
    value: R,
    start: DateTime<Utc>,
    start_inc: bool,
    end: DateTime<Utc>,
    end_inc: bool,
}

impl<R: BaseValue> Run<R> {
    fn into_sequence(self) -> TSequence<R> {
        if self.start == self.end {
            TSequence::assemble(
                vec![TInstant::from_parts(self.value, self.start)],
                true,
                true,
                TInterpolation::Step,
            )
        } else {
            TSequence::assemble(
                vec![
                    TInstant::from_parts(self.value.clone(), self.start),
                    TInstant::from_parts(self.value, self.end),
                ],
                self.start_inc,
                self.end_inc,
                TInterpolation::Step,
            )
        }
    }
}

/// Split a discontinuous lifted function over synchronized linear
/// sequences: the output is constant on every open segment (crossings are
/// already breakpoints), so the result is a step sequence set whose pieces
/// have exclusive bounds at the crossovers.
fn lift_discontinuous<B: BaseValue, R: BaseValue>(
    sa: &TSequence<B>,
    sb: &TSequence<B>,
    f: &dyn Fn(&B, &B) -> R,
) -> Result<Vec<TSequence<R>>> {
    let ia = sa.instants();
    let ib = sb.instants();
    let n = ia.len();
    let mut pieces: Vec<TSequence<R>> = Vec::new();
    let mut run: Option<Run<R>> = None;

    let mut flush = |run: &mut Option<Run<R>>| {
        if let Some(done) = run.take() {
            pieces.push(done.into_sequence());
        }
    };

    for i in 0..n {
        let t = ia[i].timestamp();
        // The instant itself, when it belongs to the domain.
        let at_bound = (i > 0 || sa.lower_inc()) && (i + 1 < n || sa.upper_inc());
        if at_bound {
            let value = f(ia[i].value(), ib[i].value());
            match run.as_mut() {
                Some(r) if r.value == value && r.end == t && !r.end_inc => {
                    r.end_inc = true;
                }
                Some(r) if r.value == value && r.end == t => {}
                _ => {
                    flush(&mut run);
                    run = Some(Run {
                        value,
                        start: t,
                        start_inc: true,
                        end: t,
                        end_inc: true,
                    });
                }
            }
        }
        // The open segment to the next instant.
        if i + 1 < n {
            let t2 = ia[i + 1].timestamp();
            let va = ia[i].value().interpolate(ia[i + 1].value(), 0.5);
            let vb = ib[i].value().interpolate(ib[i + 1].value(), 0.5);
            let value = f(&va, &vb);
            match run.as_mut() {
                Some(r) if r.value == value && r.end == t && r.end_inc => {
                    r.end = t2;
                    r.end_inc = false;
                }
                _ => {
                    flush(&mut run);
                    run = Some(Run {
                        value,
                        start: t,
                        start_inc: false,
                        end: t2,
                        end_inc: false,
                    });
                }
            }
        }
    }
    flush(&mut run);
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, m / 60, m % 60, 0).unwrap()
    }

    fn linear(values: &[(f64, u32)]) -> Temporal<f64> {
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
    fn test_lift_unary_preserves_structure() {
        let x = linear(&[(1.0, 0), (3.0, 10)]);
        let doubled = lift_unary(&x, |v| v * 2.0).unwrap();
        assert_eq!(doubled.value_at_timestamp(ts(5)), Some(4.0));
        assert_eq!(doubled.interpolation(), TInterpolation::Linear);
    }

    #[test]
    fn test_lift_unary_step_result_type() {
        // A predicate over a linear float is a step temporal.
        let x = linear(&[(0.0, 0), (10.0, 10)]);
        let positive = lift_unary(&x, |v| *v > 5.0).unwrap();
        assert_eq!(positive.interpolation(), TInterpolation::Step);
    }

    #[test]
    fn test_lift_binary_sum() {
        let x = linear(&[(1.0, 0), (3.0, 10)]);
        let y = linear(&[(10.0, 0), (10.0, 10)]);
        let op = LiftedBinary {
            func: &|a: &f64, b: &f64| a + b,
            discontinuous: false,
            turnpoint: None,
        };
        let sum = lift_binary(&x, &y, &op).unwrap().unwrap();
        assert_eq!(sum.value_at_timestamp(ts(0)), Some(11.0));
        assert_eq!(sum.value_at_timestamp(ts(5)), Some(12.0));
        assert_eq!(sum.value_at_timestamp(ts(10)), Some(13.0));
    }

    #[test]
    fn test_lift_binary_disjoint() {
        let x = linear(&[(1.0, 0), (3.0, 10)]);
        let y = linear(&[(1.0, 20), (3.0, 30)]);
        let op = LiftedBinary {
            func: &|a: &f64, b: &f64| a + b,
            discontinuous: false,
            turnpoint: None,
        };
        assert!(lift_binary(&x, &y, &op).unwrap().is_none());
    }

    #[test]
    fn test_lift_eq_crossover() {
        // S2: eq over crossing linear sequences yields
        // {[f, T0, T5), [t, T5, T5], (f, T5, T10]}.
        let x = linear(&[(0.0, 0), (10.0, 10)]);
        let y = linear(&[(10.0, 0), (0.0, 10)]);
        let turn = |a1: &f64, a2: &f64, b1: &f64, b2: &f64| f64::value_cross(a1, a2, b1, b2);
        let op = LiftedBinary {
            func: &|a: &f64, b: &f64| a == b,
            discontinuous: true,
            turnpoint: Some(&turn),
        };
        let eq = lift_binary(&x, &y, &op).unwrap().unwrap();
        match &eq {
            Temporal::SequenceSet(set) => {
                assert_eq!(set.num_sequences(), 3);
                let s0 = set.sequence_n(0).unwrap();
                assert_eq!(s0.start_value(), false);
                assert!(s0.lower_inc());
                assert!(!s0.upper_inc());
                assert_eq!(s0.end_timestamp(), ts(5));

                let s1 = set.sequence_n(1).unwrap();
                assert_eq!(s1.start_value(), true);
                assert_eq!(s1.num_instants(), 1);
                assert_eq!(s1.start_timestamp(), ts(5));

                let s2 = set.sequence_n(2).unwrap();
                assert_eq!(s2.start_value(), false);
                assert!(!s2.lower_inc());
                assert!(s2.upper_inc());
                assert_eq!(s2.end_timestamp(), ts(10));
            }
            other => panic!("expected a sequence set, got {}", other.subtype_name()),
        }
        // Pointwise check of the lifted comparison.
        assert_eq!(eq.value_at_timestamp(ts(5)), Some(true));
        assert_eq!(eq.value_at_timestamp(ts(3)), Some(false));
        assert_eq!(eq.value_at_timestamp(ts(7)), Some(false));
    }

    #[test]
    fn test_lift_eq_no_crossing() {
        let x = linear(&[(0.0, 0), (10.0, 10)]);
        let y = linear(&[(20.0, 0), (30.0, 10)]);
        let turn = |a1: &f64, a2: &f64, b1: &f64, b2: &f64| f64::value_cross(a1, a2, b1, b2);
        let op = LiftedBinary {
            func: &|a: &f64, b: &f64| a == b,
            discontinuous: true,
            turnpoint: Some(&turn),
        };
        let eq = lift_binary(&x, &y, &op).unwrap().unwrap();
        assert_eq!(eq.subtype_name(), "Sequence");
        assert_eq!(eq.value_at_timestamp(ts(5)), Some(false));
    }

    #[test]
    fn test_lift_unary_turn_abs() {
        let x = linear(&[(-5.0, 0), (5.0, 10)]);
        let abs = lift_unary_turn(
            &x,
            |v: &f64| v.abs(),
            |v1: &f64, v2: &f64| f64::segment_locate(v1, v2, &0.0),
        )
        .unwrap();
        // The zero crossing becomes a breakpoint, so interpolation is
        // exact on both sides.
        assert_eq!(abs.value_at_timestamp(ts(0)), Some(5.0));
        assert_eq!(abs.value_at_timestamp(ts(5)), Some(0.0));
        assert_eq!(abs.value_at_timestamp(ts(7)), Some(2.0));
        assert_eq!(abs.value_at_timestamp(ts(10)), Some(5.0));
    }
}
