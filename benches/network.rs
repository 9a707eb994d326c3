//! Criterion benchmarks for the associative network.
//!
//! Run with:
//!   cargo bench
//!   cargo bench --features parallel
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use assocnet::network::{ExecutionTier, Network, NetworkConfig};
use assocnet::prng::Prng;
use assocnet::temporal::TemporalPolicy;
use assocnet::topology::TopologyPolicy;

fn keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("bench p{i}")).collect()
}

/// Present a random subset of `keys` at full load.
fn present(net: &mut Network<String, TopologyPolicy>, keys: &[String], rng: &mut Prng, n: usize) {
    for _ in 0..n {
        if let Some(k) = rng.choose(keys) {
            net.ingest(k.clone(), 1.0);
        }
    }
}

fn make_sparse(pool: usize, tier: ExecutionTier) -> Network<String, TopologyPolicy> {
    let mut net = Network::new(
        TopologyPolicy::default(),
        NetworkConfig::topology().with_tier(tier),
    );
    let keys = keys(pool);
    let mut rng = Prng::new(42);
    for _ in 0..20 {
        present(&mut net, &keys, &mut rng, pool / 4);
        net.step();
    }
    net
}

/// Benchmark step() with growing pattern pools.
fn bench_step_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_size");

    for pool in [32, 64, 128, 256].iter() {
        group.throughput(Throughput::Elements(*pool as u64));

        group.bench_with_input(BenchmarkId::new("sparse", pool), pool, |b, &pool| {
            let mut net = make_sparse(pool, ExecutionTier::Scalar);
            let keys = keys(pool);
            let mut rng = Prng::new(7);

            b.iter(|| {
                present(&mut net, &keys, &mut rng, pool / 8);
                net.step();
                black_box(net.diagnostics().association_count)
            });
        });
    }

    group.finish();
}

/// Benchmark step() comparing execution tiers at a fixed size.
fn bench_step_tiers(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_tier");
    let pool = 256;
    group.throughput(Throughput::Elements(pool as u64));

    for (name, tier) in [
        ("scalar_256", ExecutionTier::Scalar),
        // Falls back to scalar if the `parallel` feature is not enabled.
        ("parallel_256", ExecutionTier::Parallel),
    ] {
        group.bench_function(name, |b| {
            let mut net = make_sparse(pool, tier);
            let keys = keys(pool);
            let mut rng = Prng::new(7);

            b.iter(|| {
                present(&mut net, &keys, &mut rng, pool / 8);
                net.step();
                black_box(net.diagnostics().mean_abs_weight)
            });
        });
    }

    group.finish();
}

/// Benchmark the fully connected temporal network.
fn bench_temporal(c: &mut Criterion) {
    let mut group = c.benchmark_group("temporal");

    for units in [16u32, 32, 64].iter() {
        group.throughput(Throughput::Elements((*units * (*units - 1)) as u64));

        group.bench_with_input(BenchmarkId::new("dense", units), units, |b, &units| {
            let mut net = Network::new(TemporalPolicy::default(), NetworkConfig::temporal());
            for k in 0..units {
                net.ingest(k, 1.0);
            }
            let mut t = 0u32;

            b.iter(|| {
                net.ingest(t % units, 1.0);
                t += 1;
                net.step();
                black_box(net.diagnostics().mean_abs_weight)
            });
        });
    }

    group.finish();
}

/// Benchmark structural surgery.
fn bench_surgery(c: &mut Criterion) {
    let mut group = c.benchmark_group("surgery");

    group.bench_function("split_join_128", |b| {
        let mut net = make_sparse(128, ExecutionTier::Scalar);
        let Some(old) = net.units().iter().next().map(|u| u.key.clone()) else {
            return;
        };
        let new = "bench copy".to_string();

        b.iter(|| {
            net.split_data(&old, new.clone());
            net.join_data(&old, &new);
            black_box(net.association_count())
        });
    });

    group.finish();
}

/// Benchmark image round-trip.
fn bench_image(c: &mut Criterion) {
    let mut group = c.benchmark_group("image");

    for pool in [64, 256].iter() {
        group.bench_with_input(BenchmarkId::new("save", pool), pool, |b, &pool| {
            let net = make_sparse(pool, ExecutionTier::Scalar);
            b.iter(|| black_box(net.to_image().associations.len()));
        });

        group.bench_with_input(BenchmarkId::new("load", pool), pool, |b, &pool| {
            let net = make_sparse(pool, ExecutionTier::Scalar);
            let image = net.to_image();

            b.iter(|| {
                let loaded =
                    Network::from_image(TopologyPolicy::default(), *net.config(), image.clone())
                        .unwrap();
                black_box(loaded.unit_count())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_step_sizes,
    bench_step_tiers,
    bench_temporal,
    bench_surgery,
    bench_image,
);
criterion_main!(benches);
