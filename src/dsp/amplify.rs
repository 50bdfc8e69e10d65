//! Gain stage primitives.

/*
Gain Stages
===========

Every sound generator ends in a gain stage: a node that multiplies its input
by a gain value. The gain may be a constant, or a per-sample curve produced by
a parameter timeline (fades, envelopes) plus any signal patched into it (an
LFO for tremolo).

  gain > 1.0   louder
  gain = 1.0   unchanged (unity)
  gain < 1.0   quieter
  gain = 0.0   silence

Levels in decibels: dB = 20 × log₁₀(gain). Halving the gain is about -6 dB.

A gain stage with a timeline is how every fade in this crate happens. The
enable/disable ramps, pop envelopes and master volume all reduce to
`output[i] = input[i] × gain[i]`.
*/

/// Multiply a signal by a constant gain factor (in-place).
#[inline]
pub fn apply_gain(signal: &mut [f32], gain: f32) {
    for sample in signal.iter_mut() {
        *sample *= gain;
    }
}

/// Multiply a signal by a per-sample gain curve (in-place).
#[inline]
pub fn multiply_in_place(signal: &mut [f32], gains: &[f32]) {
    debug_assert_eq!(signal.len(), gains.len());

    for (s, &g) in signal.iter_mut().zip(gains.iter()) {
        *s *= g;
    }
}
