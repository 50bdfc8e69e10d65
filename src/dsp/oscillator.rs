use std::{f32::consts::TAU, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::SoundError;

/*
Phase-Accumulator Oscillator
============================

The oscillator keeps a phase in [0, 1) and advances it by `frequency /
sample_rate` every sample. The waveform is a pure function of the phase:

    sine       sin(2π · phase)
    square     +1 for the first half of the cycle, -1 for the second
    sawtooth   rises linearly from -1 to +1, then snaps back
    triangle   rises -1 → +1 over the first half, falls back over the second

Frequency is read per sample so it can be automated or modulated without
clicks: a frequency change only changes how fast the phase moves, never
where it currently is.

No band-limiting is applied. The pop and tone generators built on this run
at low pitches where the aliasing of square and sawtooth is inaudible.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    #[inline]
    pub fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (phase * TAU).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => phase * 2.0 - 1.0,
            Waveform::Triangle => {
                if phase < 0.5 {
                    phase * 4.0 - 1.0
                } else {
                    3.0 - phase * 4.0
                }
            }
        }
    }
}

impl FromStr for Waveform {
    type Err = SoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sine" => Ok(Waveform::Sine),
            "square" => Ok(Waveform::Square),
            "sawtooth" | "saw" => Ok(Waveform::Sawtooth),
            "triangle" => Ok(Waveform::Triangle),
            _ => Err(SoundError::InvalidWaveform(s.to_string())),
        }
    }
}

pub struct OscillatorBlock {
    waveform: Waveform,
    phase: f32,
}

impl OscillatorBlock {
    pub fn new(waveform: Waveform) -> Self {
        Self { waveform, phase: 0.0 }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    #[inline]
    pub fn next_sample(&mut self, frequency: f32, sample_rate: f32) -> f32 {
        let value = self.waveform.sample(self.phase);
        self.phase = (self.phase + frequency / sample_rate).rem_euclid(1.0);
        value
    }

    /// Render one sample per entry of `frequencies` (Hz) into `out`.
    pub fn render(&mut self, out: &mut [f32], frequencies: &[f32], sample_rate: f32) {
        debug_assert_eq!(out.len(), frequencies.len());

        for (sample, &frequency) in out.iter_mut().zip(frequencies) {
            *sample = self.next_sample(frequency, sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_sine() {
        let sample_rate = 48_000.0;
        let frequency = 440.0;
        let mut osc = OscillatorBlock::new(Waveform::Sine);

        let mut buffer = vec![0.0f32; 128];
        osc.render(&mut buffer, &vec![frequency; 128], sample_rate);

        // sample n should be sin(2pi f n / sr)
        let n = 12;
        let expected = (TAU * frequency * n as f32 / sample_rate).sin();
        assert!((buffer[n] - expected).abs() < 1e-4, "expected {expected}, got {}", buffer[n]);
    }

    #[test]
    fn every_waveform_stays_in_range() {
        for waveform in [Waveform::Sine, Waveform::Square, Waveform::Sawtooth, Waveform::Triangle] {
            let mut osc = OscillatorBlock::new(waveform);
            let mut buffer = vec![0.0f32; 1024];
            osc.render(&mut buffer, &vec![1_234.5; 1024], 48_000.0);

            for &sample in &buffer {
                assert!((-1.0..=1.0).contains(&sample), "{waveform:?} produced {sample}");
            }
        }
    }

    #[test]
    fn triangle_peaks_mid_cycle() {
        assert!((Waveform::Triangle.sample(0.0) + 1.0).abs() < 1e-6);
        assert!((Waveform::Triangle.sample(0.5) - 1.0).abs() < 1e-6);
        assert!((Waveform::Triangle.sample(0.25)).abs() < 1e-6);
    }

    #[test]
    fn parses_waveform_names() {
        assert_eq!("Square".parse::<Waveform>().unwrap(), Waveform::Square);
        assert_eq!("saw".parse::<Waveform>().unwrap(), Waveform::Sawtooth);
        assert!(matches!(
            "wobble".parse::<Waveform>(),
            Err(SoundError::InvalidWaveform(_))
        ));
    }
}
