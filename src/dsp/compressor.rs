//! Feed-forward dynamics compressor.

/*
Dynamics Compression
====================

A compressor turns loud passages down so that many overlapping sounds do not
sum into clipping. It watches the level of its input and, above a threshold,
reduces gain so the output rises more slowly than the input.

  threshold   Level (dBFS) where compression starts.
  ratio       Input dB over threshold per output dB over threshold.
              12:1 means a signal 12 dB over the threshold comes out 1 dB over.
  knee        Width (dB) of the region around the threshold where the ratio
              blends in gradually instead of switching on abruptly.
  attack      Seconds for gain reduction to react to a louder input.
  release     Seconds for gain reduction to recover once the input drops.

Static curve with soft knee (over = input - threshold):

    2·over < -knee     output = input
    |2·over| <= knee   output = input + (1/ratio - 1)·(over + knee/2)² / (2·knee)
    2·over > knee      output = threshold + over / ratio

The gain reduction (output - input, always <= 0 dB) is smoothed with
separate one-pole attack and release coefficients, then applied per sample.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorSettings {
    pub threshold_db: f32,
    pub knee_db: f32,
    pub ratio: f32,
    pub attack: f32,
    pub release: f32,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold_db: -24.0,
            knee_db: 30.0,
            ratio: 12.0,
            attack: 0.003,
            release: 0.25,
        }
    }
}

const SILENCE_DB: f32 = -120.0;

pub struct Compressor {
    settings: CompressorSettings,
    /// Smoothed gain reduction in dB (<= 0).
    reduction_db: f32,
}

impl Compressor {
    pub fn new(settings: CompressorSettings) -> Self {
        Self {
            settings: CompressorSettings {
                ratio: settings.ratio.max(1.0),
                knee_db: settings.knee_db.max(0.0),
                attack: settings.attack.max(0.0),
                release: settings.release.max(0.0),
                ..settings
            },
            reduction_db: 0.0,
        }
    }

    pub fn settings(&self) -> CompressorSettings {
        self.settings
    }

    /// Current gain reduction in dB (0 when idle, negative while compressing).
    pub fn reduction_db(&self) -> f32 {
        self.reduction_db
    }

    pub fn static_curve(&self, input_db: f32) -> f32 {
        let CompressorSettings {
            threshold_db,
            knee_db,
            ratio,
            ..
        } = self.settings;
        let over = input_db - threshold_db;

        if 2.0 * over < -knee_db {
            input_db
        } else if knee_db > 0.0 && 2.0 * over.abs() <= knee_db {
            let x = over + knee_db / 2.0;
            input_db + (1.0 / ratio - 1.0) * x * x / (2.0 * knee_db)
        } else {
            threshold_db + over / ratio
        }
    }

    pub fn render(&mut self, buffer: &mut [f32], sample_rate: f32) {
        let attack = smoothing_coefficient(self.settings.attack, sample_rate);
        let release = smoothing_coefficient(self.settings.release, sample_rate);

        for sample in buffer.iter_mut() {
            let level_db = linear_to_db(sample.abs());
            let target = self.static_curve(level_db) - level_db;

            let coeff = if target < self.reduction_db { attack } else { release };
            self.reduction_db = coeff * self.reduction_db + (1.0 - coeff) * target;

            *sample *= db_to_linear(self.reduction_db);
        }
    }

    pub fn reset(&mut self) {
        self.reduction_db = 0.0;
    }
}

#[inline]
fn smoothing_coefficient(seconds: f32, sample_rate: f32) -> f32 {
    if seconds <= 0.0 {
        0.0
    } else {
        (-1.0 / (seconds * sample_rate)).exp()
    }
}

#[inline]
pub fn linear_to_db(amplitude: f32) -> f32 {
    if amplitude <= 0.0 {
        SILENCE_DB
    } else {
        (20.0 * amplitude.log10()).max(SILENCE_DB)
    }
}

#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn pop_settings() -> CompressorSettings {
        CompressorSettings {
            threshold_db: -25.0,
            knee_db: 5.0,
            ratio: 12.0,
            attack: 0.0,
            release: 0.25,
        }
    }

    #[test]
    fn quiet_signal_passes_unchanged() {
        let mut comp = Compressor::new(pop_settings());
        let mut buffer = vec![0.01f32; 256]; // -40 dBFS

        comp.render(&mut buffer, SAMPLE_RATE);

        assert!(buffer.iter().all(|&s| (s - 0.01).abs() < 1e-5));
        assert!(comp.reduction_db().abs() < 1e-3);
    }

    #[test]
    fn loud_signal_is_reduced_towards_threshold() {
        let mut comp = Compressor::new(pop_settings());
        let mut buffer = vec![1.0f32; 256]; // 0 dBFS, 25 dB over

        comp.render(&mut buffer, SAMPLE_RATE);

        // threshold + 25/12 ≈ -22.9 dB
        let out_db = linear_to_db(buffer[255]);
        assert!((out_db - (-25.0 + 25.0 / 12.0)).abs() < 0.5, "got {out_db} dB");
    }

    #[test]
    fn knee_blends_continuously() {
        let comp = Compressor::new(pop_settings());
        let below = comp.static_curve(-27.5 - 1e-3);
        let at_lower_edge = comp.static_curve(-27.5);
        let at_upper_edge = comp.static_curve(-22.5);
        let above = comp.static_curve(-22.5 + 1e-3);

        assert!((below - at_lower_edge).abs() < 1e-2);
        assert!((above - at_upper_edge).abs() < 1e-2);
    }

    #[test]
    fn release_recovers_gain() {
        let mut comp = Compressor::new(pop_settings());
        let mut loud = vec![1.0f32; 128];
        comp.render(&mut loud, SAMPLE_RATE);
        assert!(comp.reduction_db() < -20.0);

        // Release is a one-pole time constant: 8 of them leave ~0.03% of the reduction.
        let mut quiet = vec![0.001f32; 2 * SAMPLE_RATE as usize];
        comp.render(&mut quiet, SAMPLE_RATE);
        assert!(comp.reduction_db() > -0.1, "got {} dB", comp.reduction_db());
    }

    #[test]
    fn db_conversions_round_trip_reference_points() {
        assert!((linear_to_db(1.0)).abs() < 1e-6);
        assert!((linear_to_db(0.5) + 6.02).abs() < 0.01);
        assert!((db_to_linear(-20.0) - 0.1).abs() < 1e-6);
        assert_eq!(linear_to_db(0.0), SILENCE_DB);
    }
}
