//! Benchmarks for complete generator graphs.

use std::{hint::black_box, rc::Rc};

use criterion::{BenchmarkId, Criterion};
use simsound::{
    backend::{RenderContext, Renderer},
    dsp::noise::NoiseType,
    generator::{
        NoiseGenerator, NoiseGeneratorOptions, PitchedPopGenerator, PitchedPopOptions,
    },
    SoundGeneratorOptions,
};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

const QUEUE_CAPACITY: usize = 4096;

fn connected() -> SoundGeneratorOptions {
    SoundGeneratorOptions {
        connect_immediately: true,
        ..Default::default()
    }
}

pub fn bench_generators(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/generators");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // === POP POOL ===
        // Eight voices through the shared compressor, one new pop per block
        let (context, mut renderer) = RenderContext::new(SAMPLE_RATE, QUEUE_CAPACITY);
        let pops = PitchedPopGenerator::new(
            Rc::new(context),
            PitchedPopOptions {
                generator: connected(),
                ..Default::default()
            },
        )
        .expect("valid pop options");
        let mut step = 0u32;
        group.bench_with_input(BenchmarkId::new("pop_pool", size), &size, |b, _| {
            b.iter(|| {
                step = (step + 1) % 8;
                pops.play_default_pop(step as f32 / 7.0).expect("pitch in range");
                renderer.render(black_box(&mut buffer));
            })
        });

        // === FILTERED NOISE ===
        // Looping pink noise through high-pass, low-pass and tremolo
        let (context, mut renderer) = RenderContext::new(SAMPLE_RATE, QUEUE_CAPACITY);
        let noise = NoiseGenerator::new(
            Rc::new(context),
            NoiseGeneratorOptions {
                noise_type: NoiseType::Pink,
                high_pass_cutoff: Some(200.0),
                low_pass_cutoff: Some(2_000.0),
                lfo_initially_enabled: true,
                seed: Some(1),
                generator: connected(),
                ..Default::default()
            },
        )
        .expect("valid noise options");
        noise.start();
        group.bench_with_input(BenchmarkId::new("filtered_noise", size), &size, |b, _| {
            b.iter(|| renderer.render(black_box(&mut buffer)))
        });

        // === IDLE GRAPH ===
        // Only the destination; the floor cost of a block
        let (_context, mut idle) = RenderContext::new(SAMPLE_RATE, QUEUE_CAPACITY);
        group.bench_with_input(BenchmarkId::new("idle", size), &size, |b, _| {
            b.iter(|| render_idle(&mut idle, black_box(&mut buffer)))
        });
    }

    group.finish();
}

fn render_idle(renderer: &mut Renderer, buffer: &mut [f32]) {
    renderer.render(buffer);
}
