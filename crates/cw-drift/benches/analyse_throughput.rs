use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cw_core::WeighingScheme;
use cw_drift::analyse;

fn bench_analyse(c: &mut Criterion) {
    let scheme = WeighingScheme::parse("1a 1b 1c 1d 1e").unwrap();
    let times: Vec<f64> = (0..scheme.num_readings())
        .map(|k| 1.3 * k as f64)
        .collect();
    let readings: Vec<f64> = (0..scheme.num_readings())
        .map(|k| 1000.0 + (k % 5) as f64 * 0.2 + 0.003 * k as f64 + ((k * 7) % 3) as f64 * 1e-4)
        .collect();

    c.bench_function("analyse_auto_select_five_groups", |b| {
        b.iter(|| analyse(black_box(&scheme), black_box(&readings), Some(&times), None).unwrap())
    });
}

criterion_group!(benches, bench_analyse);
criterion_main!(benches);
