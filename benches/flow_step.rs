//! Benchmarks for the CPU side of the flow.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use glam::Vec3;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use neural_flow::flow::{evaluate_into, flow_step};
use neural_flow::noise::noise3;
use neural_flow::pool::ParticlePool;
use neural_flow::uniforms::SimulationUniforms;

fn bench_noise(c: &mut Criterion) {
    let mut group = c.benchmark_group("noise3");

    group.bench_function("single", |b| {
        let p = Vec3::new(1.3, -0.7, 4.2);
        b.iter(|| black_box(noise3(black_box(p))))
    });

    group.bench_function("four_permutations", |b| {
        let p = Vec3::new(1.3, -0.7, 4.2);
        let t = 0.8;
        b.iter(|| {
            let p = black_box(p);
            black_box(
                noise3(p * 0.1 + Vec3::new(0.0, 0.0, t))
                    + noise3(Vec3::new(p.x, t, p.z))
                    + noise3(Vec3::new(t, p.y, p.x))
                    + noise3(Vec3::new(p.z, p.x, t)),
            )
        })
    });

    group.finish();
}

fn bench_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_generate");

    for count in [1000u32, 5000, 20_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut rng = SmallRng::seed_from_u64(7);
            b.iter(|| black_box(ParticlePool::generate(count, u32::MAX, &mut rng)))
        });
    }

    group.finish();
}

fn bench_flow_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("flow_step");

    let mut rng = SmallRng::seed_from_u64(11);
    let pool = ParticlePool::generate(5000, u32::MAX, &mut rng).unwrap();

    let mut uniforms = SimulationUniforms::default();
    uniforms.elapsed_time = 12.5;
    uniforms.pointer_world = Vec3::new(2.0, -1.0, 0.0);

    group.bench_function("single", |b| {
        let particle = pool.particles()[0];
        b.iter(|| black_box(flow_step(black_box(&particle), &uniforms)))
    });

    group.throughput(Throughput::Elements(pool.size() as u64));
    group.bench_function("pool_5000", |b| {
        let mut out = Vec::with_capacity(pool.particles().len());
        b.iter(|| {
            evaluate_into(pool.particles(), &uniforms, &mut out);
            black_box(out.len())
        })
    });

    uniforms.pulse = 2.0;
    group.bench_function("pool_5000_pulse", |b| {
        let mut out = Vec::with_capacity(pool.particles().len());
        b.iter(|| {
            evaluate_into(pool.particles(), &uniforms, &mut out);
            black_box(out.len())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_noise, bench_pool, bench_flow_step);
criterion_main!(benches);
