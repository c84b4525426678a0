//! Throughput of report parsing and metric computation
//!
//! Run: cargo bench --bench analysis
//! Compare: cargo bench --bench analysis -- --save-baseline main
//!          cargo bench --bench analysis -- --baseline main

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use parsweep::{SweepRecord, metrics, parse_report};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write;
use std::hint::black_box;

// ============================================================================
// Input generators
// ============================================================================

const THREADS: [u32; 5] = [1, 2, 4, 8, 12];

fn generate_report(sizes: usize) -> String {
    let mut rng = StdRng::seed_from_u64(42);
    let mut text = String::new();

    for i in 0..sizes {
        let size = 100 * (i + 1);
        let base: f64 = rng.random_range(5.0..50.0);

        let _ = writeln!(text, "{} - 3 Median Values (seq)", size);
        let _ = writeln!(
            text,
            "Read: {:.5}\nWrite: {:.5}\nMult.: {:.5}\nTotal Time: {:.5}\n",
            0.1,
            0.1,
            base,
            base + 0.2
        );

        for threads in THREADS {
            let total = base / f64::from(threads) * rng.random_range(1.0..1.3);
            let _ = writeln!(text, "{} - 3 Median Values (parallel {} Threads)", size, threads);
            let _ = writeln!(
                text,
                "Read: {:.5}\nWrite: {:.5}\nMult.: {:.5}\nTotal Time: {:.5}\n",
                0.1,
                0.1,
                total - 0.2,
                total
            );
        }
    }

    text
}

fn generate_sweep(offsets: usize) -> Vec<SweepRecord> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut records = Vec::new();

    for i in 0..offsets {
        let offset = 10u64.pow(i as u32 % 9 + 1);
        let base: f64 = rng.random_range(1.0..10.0);
        for threads in THREADS {
            records.push(SweepRecord {
                median: base / f64::from(threads) * rng.random_range(1.0..1.2),
                offset: offset + i as u64,
                threads: Some(threads),
                batch_size: None,
            });
        }
    }

    records
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_report");

    for sizes in [10, 100, 1000] {
        let text = generate_report(sizes);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(sizes), &text, |b, text| {
            b.iter(|| parse_report(black_box(text)).unwrap())
        });
    }

    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");

    let report = parse_report(&generate_report(100)).unwrap();
    group.bench_function("analyze_report_groups", |b| {
        b.iter(|| {
            metrics::analyze_groups(
                report
                    .groups
                    .iter()
                    .map(|g| (g.size.as_str(), black_box(g.records.as_slice()))),
            )
            .unwrap()
        })
    });

    let dataset = parsweep::Dataset::new(generate_sweep(200));
    group.bench_function("sweep_scaling_groups", |b| {
        b.iter(|| {
            let groups = black_box(&dataset).scaling_groups();
            for g in &groups {
                black_box(metrics::analyze_group(&g.records).unwrap());
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_metrics);
criterion_main!(benches);
