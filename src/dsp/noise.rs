//! Colored noise generation.

/*
Colored Noise
=============

Noise is named after light: the "color" describes how energy is spread over
the spectrum.

  white    Equal energy per hertz. Bright hiss, like a detuned radio.
  pink     Energy falls 3 dB per octave (equal energy per octave). Sounds
           balanced to the ear: rain, a waterfall.
  brown    Energy falls 6 dB per octave. Deep rumble, like surf or wind
           heard from indoors. (Named after Brownian motion, not the color.)


Pink: Paul Kellet's Filter Bank
-------------------------------

Pink noise is approximated by summing white noise through a bank of one-pole
low-pass filters with staggered corner frequencies. Each stage is

    b[i] = pole[i] * b[i] + white * gain[i]

and the output is the sum of all stages plus a direct white term. The
"refined" coefficient set is accurate to ±0.05 dB above 9.2 Hz at 44.1 kHz.
The raw sum peaks around ±9, so it is scaled by 0.11 to land near ±1.


Brown: Leaky Integrator
-----------------------

Integrating white noise gives a 6 dB/octave slope but wanders off without
bound. A leak pulls it back to zero:

    out = (last + 0.02 * white) / 1.02

Its typical swing is small, so it is scaled by 3.5 to match the loudness of
the other colors.


Why Precompute
--------------

Noise generators loop a fixed two-second buffer instead of synthesizing per
sample. A listener cannot pick out a two-second loop in broadband noise, and
it keeps the render path down to a buffer read.
*/

use std::str::FromStr;

use rand::{rngs::StdRng, Rng, SeedableRng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::SoundError;

/// Output scale applied to the pink filter bank.
pub const PINK_SCALE: f32 = 0.11;
/// Output scale applied to the brown integrator.
pub const BROWN_SCALE: f32 = 3.5;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseType {
    White,
    #[default]
    Pink,
    Brown,
}

impl FromStr for NoiseType {
    type Err = SoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "white" => Ok(NoiseType::White),
            "pink" => Ok(NoiseType::Pink),
            "brown" | "brownian" => Ok(NoiseType::Brown),
            _ => Err(SoundError::InvalidNoiseType(s.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct PinkFilter {
    b: [f32; 7],
}

impl PinkFilter {
    #[inline]
    pub fn next_sample(&mut self, white: f32) -> f32 {
        let b = &mut self.b;
        b[0] = 0.99886 * b[0] + white * 0.0555179;
        b[1] = 0.99332 * b[1] + white * 0.0750759;
        b[2] = 0.96900 * b[2] + white * 0.1538520;
        b[3] = 0.86650 * b[3] + white * 0.3104856;
        b[4] = 0.55000 * b[4] + white * 0.5329522;
        b[5] = -0.7616 * b[5] - white * 0.0168980;
        let out = b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362;
        b[6] = white * 0.115926;
        out * PINK_SCALE
    }
}

#[derive(Debug, Default)]
pub struct BrownFilter {
    last: f32,
}

impl BrownFilter {
    #[inline]
    pub fn next_sample(&mut self, white: f32) -> f32 {
        self.last = (self.last + 0.02 * white) / 1.02;
        self.last * BROWN_SCALE
    }
}

/// Fill `out` with noise of the given color drawn from `rng`.
pub fn fill_noise<R: Rng>(noise_type: NoiseType, rng: &mut R, out: &mut [f32]) {
    match noise_type {
        NoiseType::White => {
            for sample in out.iter_mut() {
                *sample = white(rng);
            }
        }
        NoiseType::Pink => {
            let mut pink = PinkFilter::default();
            for sample in out.iter_mut() {
                *sample = pink.next_sample(white(rng));
            }
        }
        NoiseType::Brown => {
            let mut brown = BrownFilter::default();
            for sample in out.iter_mut() {
                *sample = brown.next_sample(white(rng));
            }
        }
    }
}

/// Build a noise buffer of `len` samples.
///
/// A seed makes the buffer reproducible; without one it is drawn from OS entropy.
pub fn noise_buffer(noise_type: NoiseType, len: usize, seed: Option<u64>) -> Vec<f32> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut buffer = vec![0.0; len];
    fill_noise(noise_type, &mut rng, &mut buffer);
    buffer
}

#[inline]
fn white<R: Rng>(rng: &mut R) -> f32 {
    rng.random_range(-1.0f32..1.0)
}
