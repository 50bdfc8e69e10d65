//! Benchmarks for colored noise generation.
//!
//! Generators precompute their buffer once, so this is construction cost,
//! not per-block cost.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use simsound::dsp::noise::{noise_buffer, NoiseType};

use crate::SAMPLE_RATE;

pub fn bench_noise(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/noise");
    let len = (SAMPLE_RATE * 2.0) as usize;

    for noise_type in [NoiseType::White, NoiseType::Pink, NoiseType::Brown] {
        let name = format!("{noise_type:?}").to_lowercase();
        group.bench_with_input(BenchmarkId::new(name, len), &len, |b, &len| {
            b.iter(|| noise_buffer(black_box(noise_type), len, Some(1)))
        });
    }

    group.finish();
}
