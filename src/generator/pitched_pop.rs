use std::{cell::Cell, ops::Deref, rc::Rc};

use tracing::warn;

use super::{GainRamper, Sound, SoundGenerator, SoundGeneratorOptions};
use crate::{
    backend::{AudioBackend, NodeId, ParamKind},
    dsp::{compressor::CompressorSettings, oscillator::Waveform},
    error::{check_positive, SoundError},
};

/*
Pitched Pops
============

Short sine "pops" whose pitch encodes a value (a particle's speed, a bar's
height). They can fire dozens of times a second, so nothing is allocated per
pop. A fixed pool of oscillator + gain voices is built once and reused in
round-robin order:

    pop 0 → voice 0, pop 1 → voice 1, ... pop N → voice 0 again

Each pop retunes its voice and schedules a tiny envelope on the voice gain:

    gain
     1 ┤   ╭─╮
       │  ╱   ╲
       │ ╱     ╲__
     0 ┼╯         ‾‾──────
       0   d/4          d        (d = duration)

    attack: approach 1 with time constant d/16, starting now
    decay:  approach 0 with time constant d/4, starting at d/4

If more than N pops overlap, the oldest voice is cut off and reused. With the
default pool of eight and 20 ms pops this only happens above ~400 pops/s.

All voices sum into a compressor so that bursts of overlapping pops do not
clip.
*/

/// Pop length used by [`PitchedPopGenerator::play_default_pop`].
pub const DEFAULT_POP_DURATION: f64 = 0.02;

const DEFAULT_PITCH_RANGE: (f32, f32) = (220.0, 660.0);
const DEFAULT_VOICE_COUNT: usize = 8;

pub fn pop_compressor_settings() -> CompressorSettings {
    CompressorSettings {
        threshold_db: -25.0,
        knee_db: 5.0,
        ratio: 12.0,
        attack: 0.0,
        release: 0.25,
    }
}

pub struct PitchedPopOptions {
    /// Frequencies (Hz) for relative pitch 0 and 1.
    pub pitch_range: (f32, f32),
    pub voice_count: usize,
    pub generator: SoundGeneratorOptions,
}

impl Default for PitchedPopOptions {
    fn default() -> Self {
        Self {
            pitch_range: DEFAULT_PITCH_RANGE,
            voice_count: DEFAULT_VOICE_COUNT,
            generator: SoundGeneratorOptions::default(),
        }
    }
}

struct Voice {
    oscillator: NodeId,
    gain: GainRamper,
}

pub struct PitchedPopGenerator {
    generator: SoundGenerator,
    voices: Vec<Voice>,
    cursor: Cell<usize>,
    compressor: NodeId,
    pitch_range: (f32, f32),
}

impl PitchedPopGenerator {
    pub fn new(backend: Rc<dyn AudioBackend>, options: PitchedPopOptions) -> Result<Self, SoundError> {
        if options.voice_count == 0 {
            return Err(SoundError::InvalidParameter {
                name: "voice_count",
                value: 0.0,
            });
        }
        let (min, max) = options.pitch_range;
        check_positive("pitch_range.min", min)?;
        check_positive("pitch_range.max", max)?;
        if max < min {
            return Err(SoundError::InvalidParameter {
                name: "pitch_range.max",
                value: max,
            });
        }

        let generator = SoundGenerator::new(Rc::clone(&backend), options.generator)?;

        let compressor = backend.create_compressor(pop_compressor_settings());
        backend.connect(compressor, generator.source_destination());

        let now = backend.current_time();
        let voices = (0..options.voice_count)
            .map(|_| {
                let oscillator = backend.create_oscillator(Waveform::Sine, min);
                let gain = GainRamper::new(Rc::clone(&backend), 0.0);
                backend.connect(oscillator, gain.node());
                backend.connect(gain.node(), compressor);
                backend.start(oscillator, now);
                Voice { oscillator, gain }
            })
            .collect();

        Ok(Self {
            generator,
            voices,
            cursor: Cell::new(0),
            compressor,
            pitch_range: (min, max),
        })
    }

    pub fn play_default_pop(&self, relative_pitch: f32) -> Result<(), SoundError> {
        self.play_pop(relative_pitch, DEFAULT_POP_DURATION)
    }

    /// Trigger one pop. `relative_pitch` maps 0..1 onto the pitch range; values
    /// outside it are clamped.
    pub fn play_pop(&self, relative_pitch: f32, duration: f64) -> Result<(), SoundError> {
        if !relative_pitch.is_finite() {
            return Err(SoundError::InvalidParameter {
                name: "relative_pitch",
                value: relative_pitch,
            });
        }
        check_positive("duration", duration as f32)?;

        let relative_pitch = if (0.0..=1.0).contains(&relative_pitch) {
            relative_pitch
        } else {
            warn!(relative_pitch, "relative pitch outside 0..1, clamping");
            relative_pitch.clamp(0.0, 1.0)
        };

        let index = self.cursor.get();
        self.cursor.set((index + 1) % self.voices.len());
        let voice = &self.voices[index];

        let backend = self.generator.backend();
        let now = backend.current_time();
        let (min, max) = self.pitch_range;
        let frequency = min + relative_pitch * (max - min);

        let pitch = voice.oscillator.param(ParamKind::Frequency);
        voice.gain.cancel_from(now);
        backend.cancel_scheduled_values(pitch, now);
        backend.set_value_at_time(pitch, frequency, now);

        voice.gain.set_value_at(0.0, now);
        voice.gain.set_target_at(1.0, now, duration / 16.0);
        voice.gain.set_target_at(0.0, now + duration / 4.0, duration / 4.0);

        Ok(())
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Index of the voice the next pop will use.
    pub fn next_voice(&self) -> usize {
        self.cursor.get()
    }

    pub fn pitch_range(&self) -> (f32, f32) {
        self.pitch_range
    }

    /// Oscillator node of every voice, in pool order.
    pub fn voice_oscillators(&self) -> Vec<NodeId> {
        self.voices.iter().map(|v| v.oscillator).collect()
    }

    /// Envelope value of voice `index` at `time`.
    pub fn voice_gain_at(&self, index: usize, time: f64) -> Option<f32> {
        self.voices.get(index).map(|v| v.gain.value_at(time))
    }
}

impl Deref for PitchedPopGenerator {
    type Target = SoundGenerator;

    fn deref(&self) -> &SoundGenerator {
        &self.generator
    }
}

impl Sound for PitchedPopGenerator {
    fn generator(&self) -> &SoundGenerator {
        &self.generator
    }
}

impl Drop for PitchedPopGenerator {
    fn drop(&mut self) {
        let backend = self.generator.backend();
        for voice in &self.voices {
            backend.release(voice.oscillator);
            backend.release(voice.gain.node());
        }
        backend.release(self.compressor);
    }
}
