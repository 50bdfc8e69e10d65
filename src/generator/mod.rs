//! Sound generators.
//!
//! [`SoundGenerator`] is the shared output stage: a gain node whose level
//! follows an "enabled" flag derived from several boolean properties, plus
//! connection bookkeeping. Concrete generators build their own sub-graph,
//! connect it into [`SoundGenerator::source_destination`] and deref to the
//! generator for the common API.

mod clip;
mod multi_clip;
mod noise;
mod oscillator;
mod pitched_pop;
mod ramper;

use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use tracing::debug;

use crate::{
    backend::{AudioBackend, NodeId},
    error::{check_output_level, SoundError},
    signal::{BooleanProperty, EnableAggregator, ReadOnlyProperty, Subscription},
};

pub use clip::{SoundClip, SoundClipOptions};
pub use multi_clip::MultiClip;
pub use noise::{NoiseGenerator, NoiseGeneratorOptions, NOISE_BUFFER_SECONDS};
pub use oscillator::{OscillatorOptions, OscillatorSoundGenerator};
pub use pitched_pop::{
    pop_compressor_settings, PitchedPopGenerator, PitchedPopOptions, DEFAULT_POP_DURATION,
};
pub use ramper::GainRamper;

/// Time constant used by [`SoundGenerator::set_output_level`].
pub const DEFAULT_TIME_CONSTANT: f64 = 0.015;

/// Duration of the linear gain ramp on every enable/disable transition.
pub const LINEAR_GAIN_CHANGE_TIME: f64 = 0.1;

pub struct SoundGeneratorOptions {
    /// Linear gain applied while fully enabled. Must be >= 0; values above 1 amplify.
    pub initial_output_level: f32,
    /// Extra conditions that must all be true for the generator to be heard.
    pub enable_control_properties: Vec<BooleanProperty>,
    /// Connect the output to the backend destination during construction.
    pub connect_immediately: bool,
    /// Processing nodes placed in series before the output gain, in order.
    pub additional_audio_nodes: Vec<NodeId>,
}

impl Default for SoundGeneratorOptions {
    fn default() -> Self {
        Self {
            initial_output_level: 1.0,
            enable_control_properties: Vec::new(),
            connect_immediately: false,
            additional_audio_nodes: Vec::new(),
        }
    }
}

/// Anything built on top of a [`SoundGenerator`].
pub trait Sound {
    fn generator(&self) -> &SoundGenerator;
}

struct GeneratorCore {
    backend: Rc<dyn AudioBackend>,
    output: GainRamper,
    input: NodeId,
    chain: RefCell<Vec<NodeId>>,
    output_level: Cell<f32>,
    local_enable: BooleanProperty,
    aggregator: EnableAggregator,
    reaction: Cell<Option<Subscription>>,
    connections: RefCell<Vec<NodeId>>,
    disposed: Cell<bool>,
}

impl GeneratorCore {
    fn on_enabled_changed(&self, enabled: bool) {
        let target = if enabled { self.output_level.get() } else { 0.0 };
        debug!(enabled, target, "generator enable state changed");
        self.output.ramp_linear(target, LINEAR_GAIN_CHANGE_TIME);
    }

    /// The node currently feeding the output gain.
    fn chain_tail(&self) -> NodeId {
        self.chain.borrow().last().copied().unwrap_or(self.input)
    }
}

pub struct SoundGenerator {
    core: Rc<GeneratorCore>,
}

impl SoundGenerator {
    pub fn new(
        backend: Rc<dyn AudioBackend>,
        options: SoundGeneratorOptions,
    ) -> Result<Self, SoundError> {
        let level = check_output_level(options.initial_output_level)?;

        let local_enable = BooleanProperty::new(true);
        let aggregator = EnableAggregator::new(
            std::iter::once(local_enable.clone()).chain(options.enable_control_properties),
        );
        let initial_gain = if aggregator.value() { level } else { 0.0 };

        let output = GainRamper::new(Rc::clone(&backend), initial_gain);
        let input = backend.create_gain(1.0);

        let mut tail = input;
        for &node in &options.additional_audio_nodes {
            backend.connect(tail, node);
            tail = node;
        }
        backend.connect(tail, output.node());

        let core = Rc::new(GeneratorCore {
            backend,
            output,
            input,
            chain: RefCell::new(options.additional_audio_nodes),
            output_level: Cell::new(level),
            local_enable,
            aggregator,
            reaction: Cell::new(None),
            connections: RefCell::new(Vec::new()),
            disposed: Cell::new(false),
        });

        let weak: Weak<GeneratorCore> = Rc::downgrade(&core);
        let reaction = core.aggregator.property().subscribe(move |enabled| {
            if let Some(core) = weak.upgrade() {
                core.on_enabled_changed(enabled);
            }
        });
        core.reaction.set(Some(reaction));

        let generator = Self { core };
        if options.connect_immediately {
            let destination = generator.core.backend.destination();
            generator.connect(destination);
        }
        Ok(generator)
    }

    pub fn backend(&self) -> &Rc<dyn AudioBackend> {
        &self.core.backend
    }

    /// The node concrete generators connect their sources into.
    pub fn source_destination(&self) -> NodeId {
        self.core.input
    }

    /// The output gain node.
    pub fn output_node(&self) -> NodeId {
        self.core.output.node()
    }

    /// Place `node` in series between the current chain and the output gain.
    pub fn insert_audio_node(&self, node: NodeId) {
        let backend = &self.core.backend;
        let tail = self.core.chain_tail();
        let output = self.core.output.node();

        backend.disconnect(tail, output);
        backend.connect(tail, node);
        backend.connect(node, output);
        self.core.chain.borrow_mut().push(node);
    }

    pub fn connect(&self, sink: NodeId) {
        self.core.backend.connect(self.core.output.node(), sink);
        self.core.connections.borrow_mut().push(sink);
    }

    /// Remove one connection to `sink`. Returns false if there was none.
    pub fn disconnect(&self, sink: NodeId) -> bool {
        let removed = {
            let mut connections = self.core.connections.borrow_mut();
            match connections.iter().position(|&s| s == sink) {
                Some(index) => {
                    connections.remove(index);
                    true
                }
                None => false,
            }
        };

        if removed {
            self.core.backend.disconnect(self.core.output.node(), sink);
        }
        removed
    }

    pub fn is_connected_to(&self, sink: NodeId) -> bool {
        self.core.connections.borrow().contains(&sink)
    }

    pub fn disconnect_all(&self) {
        self.core.connections.borrow_mut().clear();
        self.core.backend.disconnect_all(self.core.output.node());
    }

    pub fn connections(&self) -> Vec<NodeId> {
        self.core.connections.borrow().clone()
    }

    pub fn output_level(&self) -> f32 {
        self.core.output_level.get()
    }

    /// Change the output level with [`DEFAULT_TIME_CONSTANT`].
    pub fn set_output_level(&self, level: f32) -> Result<(), SoundError> {
        self.set_output_level_with(level, DEFAULT_TIME_CONSTANT)
    }

    /// Change the output level.
    ///
    /// A zero time constant jumps; a positive one approaches exponentially.
    /// While not fully enabled the level is only stored (a jump to exactly
    /// zero still applies) and takes effect on the next enable.
    pub fn set_output_level_with(&self, level: f32, time_constant: f64) -> Result<(), SoundError> {
        let level = check_output_level(level)?;
        if !(time_constant >= 0.0 && time_constant.is_finite()) {
            return Err(SoundError::InvalidParameter {
                name: "time_constant",
                value: time_constant as f32,
            });
        }

        self.core.output_level.set(level);
        let enabled = self.fully_enabled();

        if time_constant == 0.0 {
            if enabled || level == 0.0 {
                self.core.output.set_immediately(level);
            }
        } else if enabled {
            self.core.output.approach(level, time_constant);
        }
        Ok(())
    }

    pub fn locally_enabled(&self) -> bool {
        self.core.local_enable.get()
    }

    pub fn set_locally_enabled(&self, enabled: bool) {
        self.core.local_enable.set(enabled);
    }

    pub fn local_enable_property(&self) -> BooleanProperty {
        self.core.local_enable.clone()
    }

    pub fn fully_enabled(&self) -> bool {
        self.core.aggregator.value()
    }

    pub fn fully_enabled_property(&self) -> ReadOnlyProperty<bool> {
        self.core.aggregator.property()
    }

    /// Gate the generator on one more property. Returns false if it already was.
    pub fn add_enable_control_property(&self, property: BooleanProperty) -> bool {
        self.core.aggregator.add(property)
    }

    pub fn remove_enable_control_property(&self, property: &BooleanProperty) -> bool {
        self.core.aggregator.remove(property)
    }

    pub fn has_enable_control_property(&self, property: &BooleanProperty) -> bool {
        self.core.aggregator.contains(property)
    }

    /// Gain of the output stage at the backend's current time.
    pub fn audible_gain(&self) -> f32 {
        self.core.output.current_value()
    }

    pub fn audible_gain_at(&self, time: f64) -> f32 {
        self.core.output.value_at(time)
    }

    /// Stop reacting to enable changes and unsubscribe from every enable
    /// property, including ones supplied by the caller. Connections are left
    /// as they are.
    pub fn dispose(&self) {
        if self.core.disposed.replace(true) {
            return;
        }

        if let Some(reaction) = self.core.reaction.take() {
            self.core.aggregator.property().unsubscribe(reaction);
        }
        let detached = self.core.aggregator.clear();
        debug!(detached, "sound generator disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.core.disposed.get()
    }
}

impl Sound for SoundGenerator {
    fn generator(&self) -> &SoundGenerator {
        self
    }
}

impl Drop for SoundGenerator {
    fn drop(&mut self) {
        self.dispose();
        self.core.backend.release(self.core.output.node());
        self.core.backend.release(self.core.input);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Command, RecordingBackend};

    const SAMPLE_RATE: f32 = 48_000.0;

    fn recording() -> Rc<RecordingBackend> {
        Rc::new(RecordingBackend::new(SAMPLE_RATE))
    }

    fn settle(backend: &RecordingBackend) {
        backend.advance(1.0);
    }

    #[test]
    fn negative_level_fails_before_creating_nodes() {
        let backend = recording();
        let result = SoundGenerator::new(
            backend.clone(),
            SoundGeneratorOptions {
                initial_output_level: -0.1,
                ..Default::default()
            },
        );

        assert!(matches!(result, Err(SoundError::NegativeOutputLevel(_))));
        assert!(backend.is_empty());
    }

    #[test]
    fn starts_silent_when_a_gate_is_closed() {
        let backend = recording();
        let gate = BooleanProperty::new(false);
        let generator = SoundGenerator::new(
            backend.clone(),
            SoundGeneratorOptions {
                initial_output_level: 0.7,
                enable_control_properties: vec![gate.clone()],
                ..Default::default()
            },
        )
        .unwrap();

        assert!(!generator.fully_enabled());
        assert_eq!(generator.audible_gain(), 0.0);

        gate.set(true);
        settle(&backend);
        assert!((generator.audible_gain() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn fully_enabled_follows_local_flag_alone() {
        let backend = recording();
        let generator = SoundGenerator::new(backend, SoundGeneratorOptions::default()).unwrap();

        for enabled in [false, true, true, false, true] {
            generator.set_locally_enabled(enabled);
            assert_eq!(generator.fully_enabled(), generator.locally_enabled());
        }
    }

    #[test]
    fn enable_transition_ramps_linearly() {
        let backend = recording();
        let generator = SoundGenerator::new(
            backend.clone(),
            SoundGeneratorOptions {
                initial_output_level: 0.8,
                ..Default::default()
            },
        )
        .unwrap();

        backend.set_time(1.0);
        generator.set_locally_enabled(false);

        assert!((generator.audible_gain_at(1.0) - 0.8).abs() < 1e-6);
        assert!((generator.audible_gain_at(1.05) - 0.4).abs() < 1e-4);
        assert!(generator.audible_gain_at(1.1).abs() < 1e-6);
    }

    #[test]
    fn level_change_while_disabled_is_silent_then_restored() {
        let backend = recording();
        let generator = SoundGenerator::new(backend.clone(), SoundGeneratorOptions::default()).unwrap();

        generator.set_locally_enabled(false);
        settle(&backend);

        generator.set_output_level_with(0.3, 0.0).unwrap();
        assert_eq!(generator.output_level(), 0.3);
        assert_eq!(generator.audible_gain(), 0.0);

        generator.set_output_level(0.6).unwrap();
        settle(&backend);
        assert_eq!(generator.audible_gain(), 0.0);

        generator.set_locally_enabled(true);
        settle(&backend);
        assert!((generator.audible_gain() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn level_change_while_enabled_approaches_exponentially() {
        let backend = recording();
        let generator = SoundGenerator::new(backend.clone(), SoundGeneratorOptions::default()).unwrap();

        generator.set_output_level_with(0.5, 0.1).unwrap();

        let one_tau = 0.5 + 0.5 * (-1.0f32).exp();
        assert!((generator.audible_gain_at(0.1) - one_tau).abs() < 1e-4);
    }

    #[test]
    fn rejects_bad_levels_and_time_constants() {
        let generator = SoundGenerator::new(recording(), SoundGeneratorOptions::default()).unwrap();

        assert!(generator.set_output_level(-1.0).is_err());
        assert!(generator.set_output_level(f32::NAN).is_err());
        assert!(generator.set_output_level_with(0.5, -0.1).is_err());
        assert_eq!(generator.output_level(), 1.0);

        assert!(generator.set_output_level(2.5).is_ok());
    }

    #[test]
    fn tracks_duplicate_connections() {
        let backend = recording();
        let generator = SoundGenerator::new(backend.clone(), SoundGeneratorOptions::default()).unwrap();
        let sink = backend.create_gain(1.0);

        generator.connect(sink);
        generator.connect(sink);
        assert!(generator.is_connected_to(sink));

        assert!(generator.disconnect(sink));
        assert!(generator.is_connected_to(sink));
        assert!(generator.disconnect(sink));
        assert!(!generator.is_connected_to(sink));
        assert!(!generator.disconnect(sink));
    }

    #[test]
    fn connect_immediately_targets_destination() {
        let generator = SoundGenerator::new(
            recording(),
            SoundGeneratorOptions {
                connect_immediately: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert!(generator.is_connected_to(NodeId::DESTINATION));
    }

    #[test]
    fn additional_nodes_are_chained_in_order() {
        let backend = recording();
        let a = backend.create_gain(1.0);
        let b = backend.create_gain(1.0);
        backend.take();

        let generator = SoundGenerator::new(
            backend.clone(),
            SoundGeneratorOptions {
                additional_audio_nodes: vec![a, b],
                ..Default::default()
            },
        )
        .unwrap();

        let connects: Vec<(NodeId, NodeId)> = backend
            .commands()
            .into_iter()
            .filter_map(|c| match c {
                Command::Connect { from, to } => Some((from, to)),
                _ => None,
            })
            .collect();

        let input = generator.source_destination();
        let output = generator.output_node();
        assert_eq!(connects, vec![(input, a), (a, b), (b, output)]);
    }

    #[test]
    fn dispose_unsubscribes_external_properties() {
        let backend = recording();
        let gate = BooleanProperty::new(true);
        let generator = SoundGenerator::new(
            backend.clone(),
            SoundGeneratorOptions {
                enable_control_properties: vec![gate.clone()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(gate.listener_count(), 1);

        generator.dispose();
        generator.dispose();

        assert_eq!(gate.listener_count(), 0);
        let before = backend.len();
        gate.set(false);
        assert_eq!(backend.len(), before);
    }
}
