use chrono::{TimeDelta, TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use tempora::{TInstant, TInterpolation, TSequence};

fn benchmark_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("expandable_append");
    let base = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();

    group.bench_function("append_1m", |b| {
        b.iter(|| {
            let mut seq = TSequence::with_capacity(
                TInstant::new(0.0f64, base).unwrap(),
                TInterpolation::Linear,
                64,
            )
            .unwrap();
            for i in 1..1_000_000i64 {
                let t = base + TimeDelta::microseconds(i);
                let v = (i % 2) as f64;
                seq.append_instant(TInstant::new(v, t).unwrap()).unwrap();
            }
            black_box(seq.num_instants())
        })
    });

    group.bench_function("append_restart_window", |b| {
        b.iter(|| {
            let mut seq = TSequence::with_capacity(
                TInstant::new(0.0f64, base).unwrap(),
                TInterpolation::Linear,
                64,
            )
            .unwrap();
            for i in 1..100_000i64 {
                let t = base + TimeDelta::microseconds(i);
                seq.append_instant(TInstant::new((i % 2) as f64, t).unwrap())
                    .unwrap();
                if seq.num_instants() > 1024 {
                    seq.restart_last(512);
                }
            }
            black_box(seq.num_instants())
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_append);
criterion_main!(benches);
