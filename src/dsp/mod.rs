//! Low-level DSP primitives used by the software renderer.
//!
//! These components are allocation-free once constructed and realtime-safe,
//! so the renderer can run them on the audio thread. They stay focused on the
//! signal-processing math; node wiring and scheduling live in `backend`.

/// Scheduled parameter curves (set, linear ramp, exponential approach).
pub mod automation;
/// Gain stage helpers.
pub mod amplify;
/// Feed-forward soft-knee compressor.
pub mod compressor;
/// State-variable filter implementation with multiple responses.
pub mod filter;
/// Summing bus helpers.
pub mod mix;
/// White, pink and brown noise buffers.
pub mod noise;
/// Phase-accumulator oscillator waveforms.
pub mod oscillator;

pub use automation::{AutomationEvent, ParamTimeline};
