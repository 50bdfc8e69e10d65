use std::{
    cell::{Cell, RefCell},
    ops::Deref,
    rc::Rc,
};

use super::{GainRamper, Sound, SoundGenerator, SoundGeneratorOptions};
use crate::{
    backend::{AudioBackend, NodeId, ParamKind},
    dsp::oscillator::Waveform,
    error::{check_positive, SoundError},
};

pub struct OscillatorOptions {
    pub waveform: Waveform,
    pub initial_frequency: f32,
    pub generator: SoundGeneratorOptions,
}

impl Default for OscillatorOptions {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            initial_frequency: 440.0,
            generator: SoundGeneratorOptions::default(),
        }
    }
}

struct Tone {
    oscillator: NodeId,
    frequency: GainRamper,
}

/// A continuous tone, started and stopped on demand.
pub struct OscillatorSoundGenerator {
    generator: SoundGenerator,
    waveform: Cell<Waveform>,
    frequency: Cell<f32>,
    tone: RefCell<Option<Tone>>,
}

impl OscillatorSoundGenerator {
    pub fn new(backend: Rc<dyn AudioBackend>, options: OscillatorOptions) -> Result<Self, SoundError> {
        let frequency = check_positive("frequency", options.initial_frequency)?;
        let generator = SoundGenerator::new(backend, options.generator)?;

        Ok(Self {
            generator,
            waveform: Cell::new(options.waveform),
            frequency: Cell::new(frequency),
            tone: RefCell::new(None),
        })
    }

    pub fn play(&self) {
        let mut tone = self.tone.borrow_mut();
        if tone.is_some() {
            return;
        }

        let backend = self.generator.backend();
        let frequency = self.frequency.get();
        let oscillator = backend.create_oscillator(self.waveform.get(), frequency);
        backend.connect(oscillator, self.generator.source_destination());
        backend.start(oscillator, backend.current_time());

        *tone = Some(Tone {
            oscillator,
            frequency: GainRamper::attach(
                Rc::clone(backend),
                oscillator.param(ParamKind::Frequency),
                frequency,
            ),
        });
    }

    pub fn stop(&self) {
        if let Some(tone) = self.tone.borrow_mut().take() {
            let backend = self.generator.backend();
            backend.stop(tone.oscillator, backend.current_time());
            backend.release(tone.oscillator);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.tone.borrow().is_some()
    }

    pub fn frequency(&self) -> f32 {
        self.frequency.get()
    }

    pub fn set_frequency(&self, frequency: f32, time_constant: f64) -> Result<(), SoundError> {
        let frequency = check_positive("frequency", frequency)?;
        self.frequency.set(frequency);

        if let Some(tone) = self.tone.borrow().as_ref() {
            if time_constant > 0.0 {
                tone.frequency.approach(frequency, time_constant);
            } else {
                tone.frequency.set_immediately(frequency);
            }
        }
        Ok(())
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform.get()
    }

    pub fn set_waveform(&self, waveform: Waveform) {
        self.waveform.set(waveform);
        if let Some(tone) = self.tone.borrow().as_ref() {
            self.generator.backend().set_waveform(tone.oscillator, waveform);
        }
    }
}

impl Deref for OscillatorSoundGenerator {
    type Target = SoundGenerator;

    fn deref(&self) -> &SoundGenerator {
        &self.generator
    }
}

impl Sound for OscillatorSoundGenerator {
    fn generator(&self) -> &SoundGenerator {
        &self.generator
    }
}

impl Drop for OscillatorSoundGenerator {
    fn drop(&mut self) {
        self.stop();
    }
}
