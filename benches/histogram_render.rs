//! Harness-side overhead benchmark suite
//!
//! Benchmarks for the work the harness does around each store call:
//! - Re-bucketing raw estimate histograms at various cardinalities
//! - Command construction per key policy
//! - Runner overhead against the in-process store

use cardinality_bench::channel::memory::MemoryChannel;
use cardinality_bench::harness::{MonotonicClock, ThroughputRunner};
use cardinality_bench::histogram::{render, ErrorHistogram, DISPLAY_BUCKETS};
use cardinality_bench::policy::KeyPolicy;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Histogram of `trials` estimates spread ~2% around `truth`.
fn spread_histogram(truth: usize, trials: usize, seed: u64) -> ErrorHistogram {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut hist = ErrorHistogram::new(truth * 2);
    let spread = (truth / 50).max(1);
    for _ in 0..trials {
        let est = truth - spread + rng.gen_range(0..spread * 2);
        hist.record(est);
    }
    hist
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("histogram_render");

    for truth in [1_000usize, 10_000, 100_000, 1_000_000] {
        let hist = spread_histogram(truth, 500, 42);
        group.bench_with_input(BenchmarkId::new("render_20", truth), &hist, |bencher, hist| {
            bencher.iter(|| render(black_box(hist), DISPLAY_BUCKETS))
        });
    }

    group.finish();
}

fn bench_key_policies(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_policy");

    let policies = [
        ("varying_element", KeyPolicy::VaryingElement {
            key: "cb:mh:add".to_string(),
        }),
        ("distinct_key", KeyPolicy::DistinctKey {
            prefix: "cb:mh:key".to_string(),
        }),
        ("paired", KeyPolicy::PairedWithBaseline {
            baseline: "cb:mh:key0".to_string(),
            prefix: "cb:mh:key".to_string(),
        }),
    ];

    for (name, policy) in &policies {
        group.bench_function(*name, |bencher| {
            let mut i = 0u64;
            bencher.iter(|| {
                i += 1;
                black_box(policy.command("MH.COUNT", black_box(i)))
            })
        });
    }

    group.finish();
}

fn bench_runner_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("runner_overhead");

    for iters in [100u64, 1_000] {
        group.bench_with_input(BenchmarkId::new("memory_pfadd", iters), &iters, |bencher, &iters| {
            let policy = KeyPolicy::VaryingElement {
                key: "cb:pf:add".to_string(),
            };
            bencher.iter(|| {
                let mut ch = MemoryChannel::new();
                let runner = ThroughputRunner::new(&MonotonicClock);
                black_box(runner.run(
                    &mut ch,
                    "PFADD",
                    iters,
                    |i| policy.command("PFADD", i),
                    |_| true,
                ))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_render, bench_key_policies, bench_runner_overhead);
criterion_main!(benches);
