//! End-to-end scenarios over the public API.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use tempora::prelude::*;
use tempora::{SyncMode, synchronize};

fn ts(m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, m / 60, m % 60, 0).unwrap()
}

fn linear_seq(values: &[(f64, u32)], lower_inc: bool, upper_inc: bool) -> Temporal<f64> {
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

/// Scenario 1: restricting a linear sequence to an interior value yields
/// the instant where the interpolation passes through it.
#[test]
fn test_s1_instant_restriction() {
    let seq = linear_seq(&[(10.0, 0), (20.0, 10)], true, false);
    let at = seq.at_value(&15.0).expect("value is attained");
    assert_eq!(at.num_instants(), 1);
    assert_eq!(at.start_value(), 15.0);
    assert_eq!(at.start_timestamp(), ts(5));
}

/// Scenario 2: temporal equality of two crossing linear sequences is a
/// step sequence set with an instantaneous `true` at the crossover and
/// exclusive bounds around it.
#[test]
fn test_s2_crossover_synchronization() {
    let s1 = linear_seq(&[(0.0, 0), (10.0, 10)], true, true);
    let s2 = linear_seq(&[(10.0, 0), (0.0, 10)], true, true);
    let eq = s1.teq(&s2).expect("compatible").expect("overlapping");

    match &eq {
        Temporal::SequenceSet(set) => {
            assert_eq!(set.num_sequences(), 3);
            let before = set.sequence_n(0).unwrap();
            assert_eq!(before.start_value(), false);
            assert!(before.lower_inc() && !before.upper_inc());
            assert_eq!(before.start_timestamp(), ts(0));
            assert_eq!(before.end_timestamp(), ts(5));

            let at = set.sequence_n(1).unwrap();
            assert_eq!(at.start_value(), true);
            assert_eq!(at.num_instants(), 1);
            assert_eq!(at.start_timestamp(), ts(5));

            let after = set.sequence_n(2).unwrap();
            assert_eq!(after.start_value(), false);
            assert!(!after.lower_inc() && after.upper_inc());
            assert_eq!(after.end_timestamp(), ts(10));
        }
        other => panic!("expected a sequence set, got {}", other.subtype_name()),
    }
}

/// Scenario 3: span set union bridges the gap.
#[test]
fn test_s3_spanset_union() {
    let a = IntSpanSet::new(vec![
        IntSpan::new(1, 3, true, false).unwrap(),
        IntSpan::new(5, 7, true, false).unwrap(),
    ])
    .unwrap();
    let b = IntSpanSet::from_span(IntSpan::new(2, 6, true, false).unwrap());
    let union = a.union(&b);
    assert_eq!(union.num_spans(), 1);
    assert_eq!(union.span_n(0).unwrap().lower(), 1);
    assert_eq!(union.span_n(0).unwrap().upper(), 7);
    assert!(!union.span_n(0).unwrap().upper_inc());
}

/// Scenario 4: time-weighted centroid of two moving points.
#[test]
fn test_s4_twcentroid() {
    let p1 = Temporal::Sequence(
        TSequence::new(
            vec![
                TInstant::new(PointValue::new(0.0, 0.0), ts(0)).unwrap(),
                TInstant::new(PointValue::new(10.0, 0.0), ts(10)).unwrap(),
            ],
            true,
            true,
            TInterpolation::Linear,
        )
        .unwrap(),
    );
    let p2 = Temporal::Sequence(
        TSequence::new(
            vec![
                TInstant::new(PointValue::new(0.0, 10.0), ts(0)).unwrap(),
                TInstant::new(PointValue::new(0.0, 0.0), ts(10)).unwrap(),
            ],
            true,
            true,
            TInterpolation::Linear,
        )
        .unwrap(),
    );
    let mut agg = tempora::TCentroidAgg::new();
    agg.add(&p1).unwrap();
    agg.add(&p2).unwrap();
    let centroid = agg.finish().unwrap().expect("non-empty aggregate");
    assert!((centroid.x() - 2.5).abs() < 1e-9);
    assert!((centroid.y() - 2.5).abs() < 1e-9);
}

/// Scenario 5: appending at or before the last timestamp fails.
#[test]
fn test_s5_append_order_violation() {
    let mut seq = TSequence::with_capacity(
        TInstant::new(1.0f64, ts(5)).unwrap(),
        TInterpolation::Linear,
        16,
    )
    .unwrap();
    let err = seq
        .append_instant(TInstant::new(2.0, ts(5)).unwrap())
        .expect_err("equal timestamp must be rejected");
    assert!(matches!(err, TemporalError::OutOfOrder(_)));
}

/// Scenario 6: STBox overlap ignores a dimension absent on one side.
#[test]
fn test_s6_stbox_topological() {
    let a = STBox::space(0.0, 10.0, 0.0, 10.0)
        .unwrap()
        .with_period(TsTzSpan::new(ts(0), ts(10), true, true).unwrap());
    let b = STBox::space(5.0, 15.0, 0.0, 10.0).unwrap();
    assert!(a.overlaps(&b).unwrap());
}

/// Property 1: construction canonicalizes, so printing and reparsing is
/// the identity.
#[test]
fn test_canonicality_roundtrip() {
    let literals = [
        "1.5@2000-01-01 00:00:00+00",
        "{1@2000-01-01 00:00:00+00, 2@2000-01-01 00:10:00+00}",
        "[10@2000-01-01 00:00:00+00, 20@2000-01-01 00:10:00+00)",
        "Interp=Step;[10@2000-01-01 00:00:00+00, 20@2000-01-01 00:10:00+00]",
        "{[1@2000-01-01 00:00:00+00, 2@2000-01-01 00:10:00+00], \
          [5@2000-01-01 01:00:00+00, 6@2000-01-01 01:10:00+00]}",
    ];
    for literal in literals {
        let x: Temporal<f64> = literal.parse().unwrap();
        let reparsed: Temporal<f64> = x.to_string().parse().unwrap();
        assert_eq!(reparsed, x, "literal: {}", literal);
    }
}

/// Property 2/3: restriction and its complement partition the value, and
/// restriction is idempotent.
#[test]
fn test_restriction_complement_and_idempotence() {
    let x = linear_seq(&[(0.0, 0), (10.0, 10), (0.0, 20)], true, true);
    let restrictors = [2.5f64, 5.0, 10.0, 42.0];
    for v in restrictors {
        let at = x.at_value(&v);
        let minus = x.minus_value(&v);
        match (&at, &minus) {
            (Some(at), Some(minus)) => {
                let merged = at.merge(minus).unwrap();
                for m in [0u32, 3, 5, 10, 13, 17, 20] {
                    assert_eq!(
                        merged.value_at_timestamp(ts(m)),
                        x.value_at_timestamp(ts(m)),
                        "value {} at minute {}",
                        v,
                        m
                    );
                }
            }
            (None, Some(minus)) => assert_eq!(minus, &x),
            (Some(at), None) => assert_eq!(at, &x),
            (None, None) => panic!("both restriction and complement empty"),
        }
        if let Some(at) = at {
            assert_eq!(at.at_value(&v), Some(at.clone()), "idempotence for {}", v);
        }
    }
    assert_eq!(x.shift(TimeDelta::zero()).unwrap(), x);
}

/// Property 4: synchronized values share the time domain and keep their
/// pointwise values.
#[test]
fn test_synchronization_symmetry() {
    let x = linear_seq(&[(0.0, 0), (10.0, 10)], true, true);
    let y = linear_seq(&[(5.0, 5), (0.0, 15), (5.0, 25)], true, true);
    let (xs, ys) = synchronize(&x, &y, SyncMode::Exact, None, 1_000_000)
        .unwrap()
        .expect("overlap");
    assert_eq!(xs.time_span(), ys.time_span());
    assert_eq!(xs.start_timestamp(), ts(5));
    assert_eq!(xs.end_timestamp(), ts(10));
    for m in [5u32, 6, 8, 10] {
        assert_eq!(xs.value_at_timestamp(ts(m)), x.value_at_timestamp(ts(m)));
        assert_eq!(ys.value_at_timestamp(ts(m)), y.value_at_timestamp(ts(m)));
    }
}

/// Property 5: the lifted function agrees with the pointwise one.
#[test]
fn test_lifting_correctness() {
    let x = linear_seq(&[(1.0, 0), (5.0, 10)], true, true);
    let y = linear_seq(&[(2.0, 0), (2.0, 10)], true, true);
    let sum = x.add(&y).unwrap().unwrap();
    let prod = x.mul(&y).unwrap().unwrap();
    for m in [0u32, 1, 4, 7, 10] {
        let (vx, vy) = (
            x.value_at_timestamp(ts(m)).unwrap(),
            y.value_at_timestamp(ts(m)).unwrap(),
        );
        assert_eq!(sum.value_at_timestamp(ts(m)), Some(vx + vy));
        assert_eq!(prod.value_at_timestamp(ts(m)), Some(vx * vy));
    }
}

/// Property 6: appends are amortized constant; a long stream completes
/// with the buffer growing by doubling only.
#[test]
fn test_append_amortized() {
    let mut seq = TSequence::with_capacity(
        TInstant::new(0.0f64, ts(0)).unwrap(),
        TInterpolation::Linear,
        1,
    )
    .unwrap();
    let base = ts(0);
    for i in 1..100_000u32 {
        let t = base + TimeDelta::seconds(i as i64);
        let v = if i % 2 == 0 { 0.0 } else { 1.0 };
        seq.append_instant(TInstant::new(v, t).unwrap()).unwrap();
    }
    assert_eq!(seq.num_instants(), 100_000);
}

/// Property 7: when the bounding boxes rule out an interaction, the exact
/// predicate agrees.
#[test]
fn test_bbox_soundness() {
    let x = linear_seq(&[(0.0, 0), (1.0, 10)], true, true);
    let y = linear_seq(&[(100.0, 100), (101.0, 110)], true, true);
    let bx: TBox = x.bbox();
    let by: TBox = y.bbox();
    assert!(!bx.overlaps(&by).unwrap());
    // Exact interaction is indeed empty: the values never meet in time.
    assert!(x.teq(&y).unwrap().is_none());
    assert!(x.add(&y).unwrap().is_none());
}

/// Restriction by a time span commutes with the textual round-trip.
#[test]
fn test_at_period_public_api() {
    let x: Temporal<f64> =
        "[0@2000-01-01 00:00:00+00, 10@2000-01-01 00:10:00+00]".parse().unwrap();
    let window = TsTzSpan::new(ts(2), ts(8), true, true).unwrap();
    let clipped = x.at_period(&window).unwrap();
    assert_eq!(clipped.start_value(), 2.0);
    assert_eq!(clipped.end_value(), 8.0);
    let complement = x.minus_period(&window).unwrap();
    let merged = clipped.merge(&complement).unwrap();
    assert_eq!(merged.value_at_timestamp(ts(4)), x.value_at_timestamp(ts(4)));
}

/// WKB round-trip through the public traits.
#[test]
fn test_wkb_public_roundtrip() {
    let x: Temporal<f64> =
        "{[1@2000-01-01 00:00:00+00, 2@2000-01-01 00:10:00+00], \
          [5@2000-01-01 01:00:00+00, 6@2000-01-01 01:10:00+00]}"
            .parse()
            .unwrap();
    let back = Temporal::<f64>::from_hexwkb(&x.as_hexwkb()).unwrap();
    assert_eq!(back, x);
}

/// Streaming ingestion with gap splitting, as a caller-driven loop.
#[test]
fn test_streaming_builder() {
    let mut builder = tempora::temporal::build::TSequenceSetBuilder::new(
        TInterpolation::Linear,
    )
    .with_max_gap(TimeDelta::minutes(2));
    for (i, minute) in [0u32, 1, 2, 10, 11, 12].iter().enumerate() {
        builder
            .append_instant(TInstant::new(i as f64, ts(*minute)).unwrap())
            .unwrap();
    }
    let set = builder.finish().unwrap();
    assert_eq!(set.num_sequences(), 2);
    assert_eq!(set.sequence_n(0).unwrap().end_timestamp(), ts(2));
    assert_eq!(set.sequence_n(1).unwrap().start_timestamp(), ts(10));
}
