use std::{
    cell::Cell,
    ops::Deref,
    rc::Rc,
    sync::Arc,
};

use tracing::debug;

use super::{GainRamper, Sound, SoundGenerator, SoundGeneratorOptions, DEFAULT_TIME_CONSTANT};
use crate::{
    backend::{AudioBackend, AudioBuffer, NodeId, ParamKind},
    dsp::{
        filter::{FilterType, DEFAULT_Q},
        noise::{noise_buffer, NoiseType},
        oscillator::Waveform,
    },
    error::{check_positive, SoundError},
};

/// Length of the looped noise buffer.
pub const NOISE_BUFFER_SECONDS: f64 = 2.0;

/*
Noise generator graph:

    buffer source (looped, fresh per start)
        → high-pass → low-pass → band-pass     (each optional)
        → tremolo gain                          base 1 - depth/2
        → source destination (SoundGenerator)

    LFO oscillator → depth gain (depth/2) → tremolo gain's gain parameter

With depth 1 the tremolo gain swings between 0 and 1. With the LFO disabled
the depth gain is 0 and the base returns to 1.
*/

pub struct NoiseGeneratorOptions {
    pub noise_type: NoiseType,
    pub low_pass_cutoff: Option<f32>,
    pub high_pass_cutoff: Option<f32>,
    /// Center frequency and Q.
    pub band_pass: Option<(f32, f32)>,
    pub lfo_initially_enabled: bool,
    pub lfo_initial_frequency: f32,
    /// Tremolo depth in 0..=1.
    pub lfo_initial_depth: f32,
    pub lfo_waveform: Waveform,
    /// Fixed seed for a reproducible buffer.
    pub seed: Option<u64>,
    pub generator: SoundGeneratorOptions,
}

impl Default for NoiseGeneratorOptions {
    fn default() -> Self {
        Self {
            noise_type: NoiseType::Pink,
            low_pass_cutoff: None,
            high_pass_cutoff: None,
            band_pass: None,
            lfo_initially_enabled: false,
            lfo_initial_frequency: 2.0,
            lfo_initial_depth: 1.0,
            lfo_waveform: Waveform::Sine,
            seed: None,
            generator: SoundGeneratorOptions::default(),
        }
    }
}

struct FilterStage {
    node: NodeId,
    frequency: GainRamper,
}

impl FilterStage {
    fn new(backend: &Rc<dyn AudioBackend>, filter_type: FilterType, frequency: f32, q: f32) -> Self {
        let node = backend.create_filter(filter_type, frequency, q);
        let frequency = GainRamper::attach(
            Rc::clone(backend),
            node.param(ParamKind::Frequency),
            frequency,
        );
        Self { node, frequency }
    }
}

pub struct NoiseGenerator {
    generator: SoundGenerator,
    noise_type: NoiseType,
    buffer: Arc<AudioBuffer>,
    high_pass: Option<FilterStage>,
    low_pass: Option<FilterStage>,
    band_pass: Option<FilterStage>,
    /// Head of the filter chain, where each new buffer source connects.
    entry: NodeId,
    tremolo: GainRamper,
    lfo: NodeId,
    lfo_frequency: GainRamper,
    lfo_depth_gain: GainRamper,
    lfo_enabled: Cell<bool>,
    lfo_depth: Cell<f32>,
    source: Cell<Option<NodeId>>,
}

fn check_depth(depth: f32) -> Result<f32, SoundError> {
    if (0.0..=1.0).contains(&depth) {
        Ok(depth)
    } else {
        Err(SoundError::InvalidParameter {
            name: "lfo_depth",
            value: depth,
        })
    }
}

impl NoiseGenerator {
    pub fn new(backend: Rc<dyn AudioBackend>, options: NoiseGeneratorOptions) -> Result<Self, SoundError> {
        if let Some(cutoff) = options.low_pass_cutoff {
            check_positive("low_pass_cutoff", cutoff)?;
        }
        if let Some(cutoff) = options.high_pass_cutoff {
            check_positive("high_pass_cutoff", cutoff)?;
        }
        if let Some((center, q)) = options.band_pass {
            check_positive("band_pass_center", center)?;
            check_positive("band_pass_q", q)?;
        }
        check_positive("lfo_frequency", options.lfo_initial_frequency)?;
        let depth = check_depth(options.lfo_initial_depth)?;

        let generator = SoundGenerator::new(Rc::clone(&backend), options.generator)?;

        let len = (backend.sample_rate() as f64 * NOISE_BUFFER_SECONDS).round() as usize;
        let samples = noise_buffer(options.noise_type, len, options.seed);
        let buffer = Arc::new(AudioBuffer::new(backend.sample_rate(), samples));

        let high_pass = options
            .high_pass_cutoff
            .map(|cutoff| FilterStage::new(&backend, FilterType::HighPass, cutoff, DEFAULT_Q));
        let low_pass = options
            .low_pass_cutoff
            .map(|cutoff| FilterStage::new(&backend, FilterType::LowPass, cutoff, DEFAULT_Q));
        let band_pass = options
            .band_pass
            .map(|(center, q)| FilterStage::new(&backend, FilterType::BandPass, center, q));

        let enabled = options.lfo_initially_enabled;
        let (base, swing) = if enabled { (1.0 - depth / 2.0, depth / 2.0) } else { (1.0, 0.0) };

        let tremolo = GainRamper::new(Rc::clone(&backend), base);
        backend.connect(tremolo.node(), generator.source_destination());

        let stages: Vec<NodeId> = [&high_pass, &low_pass, &band_pass]
            .into_iter()
            .flatten()
            .map(|stage| stage.node)
            .collect();
        let mut downstream = tremolo.node();
        for &stage in stages.iter().rev() {
            backend.connect(stage, downstream);
            downstream = stage;
        }
        let entry = downstream;

        let lfo = backend.create_oscillator(options.lfo_waveform, options.lfo_initial_frequency);
        let lfo_frequency = GainRamper::attach(
            Rc::clone(&backend),
            lfo.param(ParamKind::Frequency),
            options.lfo_initial_frequency,
        );
        let lfo_depth_gain = GainRamper::new(Rc::clone(&backend), swing);
        backend.connect(lfo, lfo_depth_gain.node());
        backend.connect_param(lfo_depth_gain.node(), tremolo.param());
        backend.start(lfo, backend.current_time());

        Ok(Self {
            generator,
            noise_type: options.noise_type,
            buffer,
            high_pass,
            low_pass,
            band_pass,
            entry,
            tremolo,
            lfo,
            lfo_frequency,
            lfo_depth_gain,
            lfo_enabled: Cell::new(enabled),
            lfo_depth: Cell::new(depth),
            source: Cell::new(None),
        })
    }

    /// Start looping the noise buffer. No-op while already playing.
    pub fn start(&self) {
        if self.is_playing() {
            return;
        }

        let backend = self.generator.backend();
        let source = backend.create_buffer_source(Arc::clone(&self.buffer), true, 1.0);
        backend.connect(source, self.entry);
        backend.start(source, backend.current_time());
        self.source.set(Some(source));
        debug!(noise_type = ?self.noise_type, "noise started");
    }

    /// Stop playback. No-op while already stopped.
    pub fn stop(&self) {
        if let Some(source) = self.source.take() {
            let backend = self.generator.backend();
            backend.stop(source, backend.current_time());
            backend.release(source);
            debug!(noise_type = ?self.noise_type, "noise stopped");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.source.get().is_some()
    }

    pub fn noise_type(&self) -> NoiseType {
        self.noise_type
    }

    pub fn noise_buffer(&self) -> &Arc<AudioBuffer> {
        &self.buffer
    }

    pub fn set_low_pass_cutoff(&self, frequency: f32, time_constant: f64) -> Result<(), SoundError> {
        let stage = self.low_pass.as_ref().ok_or(SoundError::MissingStage("low-pass"))?;
        retarget(stage, check_positive("low_pass_cutoff", frequency)?, time_constant);
        Ok(())
    }

    pub fn set_high_pass_cutoff(&self, frequency: f32, time_constant: f64) -> Result<(), SoundError> {
        let stage = self.high_pass.as_ref().ok_or(SoundError::MissingStage("high-pass"))?;
        retarget(stage, check_positive("high_pass_cutoff", frequency)?, time_constant);
        Ok(())
    }

    pub fn set_band_pass_center(&self, frequency: f32, time_constant: f64) -> Result<(), SoundError> {
        let stage = self.band_pass.as_ref().ok_or(SoundError::MissingStage("band-pass"))?;
        retarget(stage, check_positive("band_pass_center", frequency)?, time_constant);
        Ok(())
    }

    pub fn lfo_enabled(&self) -> bool {
        self.lfo_enabled.get()
    }

    pub fn set_lfo_enabled(&self, enabled: bool) {
        if self.lfo_enabled.replace(enabled) != enabled {
            self.apply_lfo();
        }
    }

    pub fn lfo_depth(&self) -> f32 {
        self.lfo_depth.get()
    }

    pub fn set_lfo_depth(&self, depth: f32) -> Result<(), SoundError> {
        self.lfo_depth.set(check_depth(depth)?);
        if self.lfo_enabled.get() {
            self.apply_lfo();
        }
        Ok(())
    }

    pub fn set_lfo_frequency(&self, frequency: f32) -> Result<(), SoundError> {
        let frequency = check_positive("lfo_frequency", frequency)?;
        self.lfo_frequency.approach(frequency, DEFAULT_TIME_CONSTANT);
        Ok(())
    }

    pub fn set_lfo_waveform(&self, waveform: Waveform) {
        self.generator.backend().set_waveform(self.lfo, waveform);
    }

    /// Tremolo gain (without LFO swing) at `time`.
    pub fn tremolo_base_at(&self, time: f64) -> f32 {
        self.tremolo.value_at(time)
    }

    /// LFO swing amplitude at `time`.
    pub fn lfo_swing_at(&self, time: f64) -> f32 {
        self.lfo_depth_gain.value_at(time)
    }

    fn apply_lfo(&self) {
        let depth = self.lfo_depth.get();
        let (base, swing) = if self.lfo_enabled.get() {
            (1.0 - depth / 2.0, depth / 2.0)
        } else {
            (1.0, 0.0)
        };
        self.tremolo.approach(base, DEFAULT_TIME_CONSTANT);
        self.lfo_depth_gain.approach(swing, DEFAULT_TIME_CONSTANT);
    }
}

fn retarget(stage: &FilterStage, frequency: f32, time_constant: f64) {
    if time_constant > 0.0 {
        stage.frequency.approach(frequency, time_constant);
    } else {
        stage.frequency.set_immediately(frequency);
    }
}

impl Deref for NoiseGenerator {
    type Target = SoundGenerator;

    fn deref(&self) -> &SoundGenerator {
        &self.generator
    }
}

impl Sound for NoiseGenerator {
    fn generator(&self) -> &SoundGenerator {
        &self.generator
    }
}

impl Drop for NoiseGenerator {
    fn drop(&mut self) {
        self.stop();
        let backend = self.generator.backend();
        for stage in [&self.high_pass, &self.low_pass, &self.band_pass].into_iter().flatten() {
            backend.release(stage.node);
        }
        backend.release(self.tremolo.node());
        backend.release(self.lfo);
        backend.release(self.lfo_depth_gain.node());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Command, NodeSpec, RecordingBackend};

    const SAMPLE_RATE: f32 = 8_000.0;

    fn noise(options: NoiseGeneratorOptions) -> (Rc<RecordingBackend>, NoiseGenerator) {
        let backend = Rc::new(RecordingBackend::new(SAMPLE_RATE));
        let generator = NoiseGenerator::new(backend.clone(), options).unwrap();
        (backend, generator)
    }

    fn buffer_sources(backend: &RecordingBackend) -> Vec<NodeId> {
        backend
            .created()
            .into_iter()
            .filter(|(_, spec)| matches!(spec, NodeSpec::BufferSource { .. }))
            .map(|(id, _)| id)
            .collect()
    }

    #[test]
    fn buffer_is_two_seconds_long() {
        let (_backend, generator) = noise(NoiseGeneratorOptions {
            seed: Some(1),
            ..Default::default()
        });
        assert_eq!(generator.noise_buffer().len(), 16_000);
        assert_eq!(generator.noise_type(), NoiseType::Pink);
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let (backend, generator) = noise(NoiseGeneratorOptions::default());

        generator.start();
        generator.start();
        assert!(generator.is_playing());
        assert_eq!(buffer_sources(&backend).len(), 1);

        generator.stop();
        generator.stop();
        assert!(!generator.is_playing());

        let stops = backend
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::Stop { .. }))
            .count();
        assert_eq!(stops, 1);

        generator.start();
        let sources = buffer_sources(&backend);
        assert_eq!(sources.len(), 2);
        assert_ne!(sources[0], sources[1]);
    }

    #[test]
    fn filters_chain_high_low_band() {
        let (backend, _generator) = noise(NoiseGeneratorOptions {
            low_pass_cutoff: Some(2_000.0),
            high_pass_cutoff: Some(100.0),
            band_pass: Some((800.0, 2.0)),
            ..Default::default()
        });

        let filters: Vec<(NodeId, FilterType)> = backend
            .created()
            .into_iter()
            .filter_map(|(id, spec)| match spec {
                NodeSpec::Filter { filter_type, .. } => Some((id, filter_type)),
                _ => None,
            })
            .collect();
        let find = |t: FilterType| filters.iter().find(|(_, ft)| *ft == t).map(|(id, _)| *id).unwrap();
        let (hp, lp, bp) = (
            find(FilterType::HighPass),
            find(FilterType::LowPass),
            find(FilterType::BandPass),
        );

        let connects: Vec<(NodeId, NodeId)> = backend
            .commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::Connect { from, to } => Some((from, to)),
                _ => None,
            })
            .collect();
        assert!(connects.contains(&(hp, lp)));
        assert!(connects.contains(&(lp, bp)));
    }

    #[test]
    fn missing_filter_setters_are_errors() {
        let (_backend, generator) = noise(NoiseGeneratorOptions {
            low_pass_cutoff: Some(1_000.0),
            ..Default::default()
        });

        assert!(generator.set_low_pass_cutoff(500.0, 0.1).is_ok());
        assert!(matches!(
            generator.set_band_pass_center(500.0, 0.1),
            Err(SoundError::MissingStage("band-pass"))
        ));
        assert!(generator.set_high_pass_cutoff(50.0, 0.0).is_err());
    }

    #[test]
    fn lfo_depth_splits_base_and_swing() {
        let (backend, generator) = noise(NoiseGeneratorOptions {
            lfo_initially_enabled: true,
            lfo_initial_depth: 0.5,
            ..Default::default()
        });
        assert!((generator.tremolo_base_at(0.0) - 0.75).abs() < 1e-6);
        assert!((generator.lfo_swing_at(0.0) - 0.25).abs() < 1e-6);

        generator.set_lfo_enabled(false);
        backend.advance(1.0);
        let now = backend.current_time();
        assert!((generator.tremolo_base_at(now) - 1.0).abs() < 1e-4);
        assert!(generator.lfo_swing_at(now).abs() < 1e-4);

        assert!(generator.set_lfo_depth(1.5).is_err());
    }

    #[test]
    fn invalid_lfo_options_fail_construction() {
        let backend = Rc::new(RecordingBackend::new(SAMPLE_RATE));
        let result = NoiseGenerator::new(
            backend.clone(),
            NoiseGeneratorOptions {
                lfo_initial_frequency: 0.0,
                ..Default::default()
            },
        );
        assert!(result.is_err());
        assert!(backend.is_empty());
    }
}
