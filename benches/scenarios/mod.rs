//! Scenario benchmarks.
//!
//! Generators are built on a [`simsound::backend::RenderContext`] and the
//! paired renderer is timed, so these cover graph traversal, automation and
//! per-node DSP together.

mod generators;

pub use generators::bench_generators;
