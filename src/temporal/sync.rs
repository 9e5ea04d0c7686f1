//! Synchronization: aligning two temporal values on a common time domain.

use super::instant::TInstant;
use super::sequence::TSequence;
use super::Temporal;
use crate::base::BaseValue;
use crate::error::{Result, TemporalError};
use crate::temporal::restrict::time_at_ratio;
use chrono::{DateTime, Utc};

/// How two temporal values are aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Project both values onto the union of their breakpoints over the
    /// common time domain.
    Exact,
    /// Additionally insert instants where the pair crosses, as reported by
    /// the turnpoint solver.
    Crossings,
}

/// Solver reporting the ratio strictly inside `(0, 1)` at which two
/// synchronized segments cross, given the segment end values of both
/// sides.
pub type TurnFn<'a, A, B> = &'a dyn Fn(&A, &A, &B, &B) -> Option<f64>;

/// Align two temporal values on their common time domain.
///
/// Returns a pair with identical subtype and identical time support, or
/// `None` when the supports are disjoint. With [`SyncMode::Crossings`] the
/// inserted instants count against `budget`; exceeding it fails with
/// `TooComplex`.
pub fn synchronize<A: BaseValue, B: BaseValue>(
    a: &Temporal<A>,
    b: &Temporal<B>,
    mode: SyncMode,
    turn: Option<TurnFn<'_, A, B>>,
    budget: usize,
) -> Result<Option<(Temporal<A>, Temporal<B>)>> {
    match (a, b) {
        (Temporal::Instant(ia), _) => Ok(b.value_at_timestamp(ia.timestamp()).map(|vb| {
            (
                a.clone(),
                Temporal::Instant(TInstant::from_parts(vb, ia.timestamp())),
            )
        })),
        (_, Temporal::Instant(ib)) => Ok(a.value_at_timestamp(ib.timestamp()).map(|va| {
            (
                Temporal::Instant(TInstant::from_parts(va, ib.timestamp())),
                b.clone(),
            )
        })),
        (Temporal::InstantSet(_), _) | (_, Temporal::InstantSet(_)) => {
            // At least one side is discrete: the common domain is the set
            // of its sampling times where the other side is defined.
            let times: Vec<DateTime<Utc>> = if matches!(a, Temporal::InstantSet(_)) {
                a.instants().iter().map(|i| i.timestamp()).collect()
            } else {
                b.instants().iter().map(|i| i.timestamp()).collect()
            };
            let mut pa: Vec<TInstant<A>> = Vec::new();
            let mut pb: Vec<TInstant<B>> = Vec::new();
            for t in times {
                if let (Some(va), Some(vb)) = (a.value_at_timestamp(t), b.value_at_timestamp(t))
                {
                    pa.push(TInstant::from_parts(va, t));
                    pb.push(TInstant::from_parts(vb, t));
                }
            }
            Ok(wrap_instant_pairs(pa, pb))
        }
        (Temporal::Sequence(sa), Temporal::Sequence(sb)) => {
            match sync_sequences(sa, sb, mode, turn, budget)? {
                Some((ra, rb)) => Ok(Some((Temporal::Sequence(ra), Temporal::Sequence(rb)))),
                None => Ok(None),
            }
        }
        _ => {
            // At least one sequence set: synchronize the overlapping
            // sequence pairs.
            let seqs_a = sequences_of(a);
            let seqs_b = sequences_of(b);
            let mut ra = Vec::new();
            let mut rb = Vec::new();
            let mut i = 0;
            let mut j = 0;
            while i < seqs_a.len() && j < seqs_b.len() {
                let sa = seqs_a[i];
                let sb = seqs_b[j];
                if let Some((pa, pb)) = sync_sequences(sa, sb, mode, turn, budget)? {
                    ra.push(pa);
                    rb.push(pb);
                }
                if sa.end_timestamp() <= sb.end_timestamp() {
                    i += 1;
                } else {
                    j += 1;
                }
            }
            if ra.is_empty() {
                return Ok(None);
            }
            Ok(Some((
                Temporal::from_sequences(ra)?,
                Temporal::from_sequences(rb)?,
            )))
        }
    }
}

fn sequences_of<B: BaseValue>(t: &Temporal<B>) -> Vec<&TSequence<B>> {
    match t {
        Temporal::Sequence(s) => vec![s],
        Temporal::SequenceSet(s) => s.sequences().iter().collect(),
        _ => vec![],
    }
}

fn wrap_instant_pairs<A: BaseValue, B: BaseValue>(
    mut pa: Vec<TInstant<A>>,
    mut pb: Vec<TInstant<B>>,
) -> Option<(Temporal<A>, Temporal<B>)> {
    match pa.len() {
        0 => None,
        1 => Some((
            Temporal::Instant(pa.swap_remove(0)),
            Temporal::Instant(pb.swap_remove(0)),
        )),
        _ => Some((
            Temporal::InstantSet(super::instant_set::TInstantSet::assemble(pa)),
            Temporal::InstantSet(super::instant_set::TInstantSet::assemble(pb)),
        )),
    }
}

/// Synchronize two sequences over their common time span.
fn sync_sequences<A: BaseValue, B: BaseValue>(
    a: &TSequence<A>,
    b: &TSequence<B>,
    mode: SyncMode,
    turn: Option<TurnFn<'_, A, B>>,
    budget: usize,
) -> Result<Option<(TSequence<A>, TSequence<B>)>> {
    let inter = match a.time_span().intersection(&b.time_span()) {
        Some(inter) => inter,
        None => return Ok(None),
    };

    if inter.is_instant() {
        let t = inter.lower();
        return Ok(Some((
            TSequence::assemble(
                vec![TInstant::from_parts(a.value_at_closed(t), t)],
                true,
                true,
                a.interpolation(),
            ),
            TSequence::assemble(
                vec![TInstant::from_parts(b.value_at_closed(t), t)],
                true,
                true,
                b.interpolation(),
            ),
        )));
    }

    // Union of the breakpoints of both sequences inside the intersection.
    let mut times: Vec<DateTime<Utc>> =
        Vec::with_capacity(a.num_instants() + b.num_instants() + 2);
    times.push(inter.lower());
    for t in a
        .instants()
        .iter()
        .map(|i| i.timestamp())
        .chain(b.instants().iter().map(|i| i.timestamp()))
    {
        if t > inter.lower() && t < inter.upper() {
            times.push(t);
        }
    }
    times.push(inter.upper());
    times.sort();
    times.dedup();

    let mut ia: Vec<TInstant<A>> = Vec::with_capacity(times.len());
    let mut ib: Vec<TInstant<B>> = Vec::with_capacity(times.len());

    ia.push(TInstant::from_parts(a.value_at_closed(times[0]), times[0]));
    ib.push(TInstant::from_parts(b.value_at_closed(times[0]), times[0]));

    for w in times.windows(2) {
        let (t1, t2) = (w[0], w[1]);
        let va2 = a.value_at_closed(t2);
        let vb2 = b.value_at_closed(t2);
        if mode == SyncMode::Crossings {
            if let Some(turn) = turn {
                let va1 = ia[ia.len() - 1].value().clone();
                let vb1 = ib[ib.len() - 1].value().clone();
                if let Some(ratio) = turn(&va1, &va2, &vb1, &vb2) {
                    let tx = time_at_ratio(t1, t2, ratio);
                    if tx > t1 && tx < t2 {
                        let ratio = super::sequence::segment_ratio(t1, t2, tx);
                        ia.push(TInstant::from_parts(va1.interpolate(&va2, ratio), tx));
                        ib.push(TInstant::from_parts(vb1.interpolate(&vb2, ratio), tx));
                        if ia.len() > budget {
                            return Err(TemporalError::TooComplex(budget));
                        }
                    }
                }
            }
        }
        ia.push(TInstant::from_parts(va2, t2));
        ib.push(TInstant::from_parts(vb2, t2));
        if ia.len() > budget {
            return Err(TemporalError::TooComplex(budget));
        }
    }

    Ok(Some((
        TSequence::assemble(ia, inter.lower_inc(), inter.upper_inc(), a.interpolation()),
        TSequence::assemble(ib, inter.lower_inc(), inter.upper_inc(), b.interpolation()),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::temporal::TInterpolation;
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
    fn test_sync_projects_breakpoints() {
        let a = linear(&[(0.0, 0), (10.0, 10)]);
        let b = linear(&[(0.0, 0), (5.0, 5), (0.0, 10)]);
        let (ra, rb) = synchronize(&a, &b, SyncMode::Exact, None, 1_000_000)
            .unwrap()
            .unwrap();
        assert_eq!(ra.num_instants(), 3);
        assert_eq!(rb.num_instants(), 3);
        // The projected value of `a` at the inserted breakpoint.
        assert_eq!(ra.value_at_timestamp(ts(5)), Some(5.0));
        // Property 4: both sides keep their original values.
        for m in [0u32, 3, 5, 8, 10] {
            assert_eq!(ra.value_at_timestamp(ts(m)), a.value_at_timestamp(ts(m)));
            assert_eq!(rb.value_at_timestamp(ts(m)), b.value_at_timestamp(ts(m)));
        }
    }

    #[test]
    fn test_sync_time_intersection() {
        let a = linear(&[(0.0, 0), (10.0, 10)]);
        let b = linear(&[(100.0, 5), (200.0, 15)]);
        let (ra, rb) = synchronize(&a, &b, SyncMode::Exact, None, 1_000_000)
            .unwrap()
            .unwrap();
        assert_eq!(ra.start_timestamp(), ts(5));
        assert_eq!(ra.end_timestamp(), ts(10));
        assert_eq!(rb.start_timestamp(), ts(5));
        assert_eq!(rb.end_timestamp(), ts(10));
    }

    #[test]
    fn test_sync_disjoint() {
        let a = linear(&[(0.0, 0), (10.0, 10)]);
        let b = linear(&[(0.0, 20), (10.0, 30)]);
        assert!(
            synchronize(&a, &b, SyncMode::Exact, None, 1_000_000)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_sync_crossings_inserts_midpoint() {
        // S2 geometry: 0->10 against 10->0 cross midway.
        let a = linear(&[(0.0, 0), (10.0, 10)]);
        let b = linear(&[(10.0, 0), (0.0, 10)]);
        let turn = |a1: &f64, a2: &f64, b1: &f64, b2: &f64| f64::value_cross(a1, a2, b1, b2);
        let (ra, rb) = synchronize(&a, &b, SyncMode::Crossings, Some(&turn), 1_000_000)
            .unwrap()
            .unwrap();
        assert_eq!(ra.num_instants(), 3);
        assert_eq!(ra.value_at_timestamp(ts(5)), Some(5.0));
        assert_eq!(rb.value_at_timestamp(ts(5)), Some(5.0));
    }

    #[test]
    fn test_sync_instant_with_sequence() {
        let a = Temporal::instant(99.0f64, ts(5)).unwrap();
        let b = linear(&[(0.0, 0), (10.0, 10)]);
        let (ra, rb) = synchronize(&a, &b, SyncMode::Exact, None, 1_000_000)
            .unwrap()
            .unwrap();
        assert_eq!(ra.subtype_name(), "Instant");
        assert_eq!(rb.subtype_name(), "Instant");
        assert_eq!(rb.start_value(), 5.0);
    }

    #[test]
    fn test_sync_budget_exceeded() {
        let a = linear(&[(0.0, 0), (10.0, 10)]);
        let b = linear(&[(0.0, 0), (5.0, 5), (0.0, 10)]);
        assert!(matches!(
            synchronize(&a, &b, SyncMode::Exact, None, 2),
            Err(TemporalError::TooComplex(2))
        ));
    }
}
