//! Benchmarks for parameter timeline evaluation.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use simsound::dsp::{AutomationEvent, ParamTimeline};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_automation(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/automation");
    let period = 1.0 / SAMPLE_RATE as f64;

    for &size in BLOCK_SIZES {
        let mut out = vec![0.0f32; size];

        // Nothing scheduled ahead: a single fill
        let settled = ParamTimeline::new(0.5);
        group.bench_with_input(BenchmarkId::new("settled", size), &size, |b, _| {
            b.iter(|| settled.fill(black_box(0.0), period, &mut out))
        });

        // A pop envelope: attack approach, then decay approach
        let mut pop = ParamTimeline::new(0.0);
        pop.insert(AutomationEvent::SetValue { value: 0.0, time: 0.0 });
        pop.insert(AutomationEvent::SetTarget {
            target: 1.0,
            time: 0.0,
            time_constant: 0.02 / 16.0,
        });
        pop.insert(AutomationEvent::SetTarget {
            target: 0.0,
            time: 0.005,
            time_constant: 0.005,
        });
        group.bench_with_input(BenchmarkId::new("pop_envelope", size), &size, |b, _| {
            b.iter(|| pop.fill(black_box(0.0), period, &mut out))
        });

        // Linear enable ramp
        let mut ramp = ParamTimeline::new(0.0);
        ramp.insert(AutomationEvent::SetValue { value: 0.0, time: 0.0 });
        ramp.insert(AutomationEvent::LinearRamp { value: 1.0, time: 0.1 });
        group.bench_with_input(BenchmarkId::new("linear_ramp", size), &size, |b, _| {
            b.iter(|| ramp.fill(black_box(0.0), period, &mut out))
        });
    }

    group.finish();
}
