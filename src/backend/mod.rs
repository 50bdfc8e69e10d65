//! The audio capability the sound generators are written against.
//!
//! Generators never touch samples. They build small node graphs and schedule
//! parameter changes through [`AudioBackend`], which turns every call into a
//! [`Command`]. What happens to the command is up to the implementation:
//!
//! - [`render::RenderContext`] queues it for the software [`render::Renderer`],
//!   which runs on the audio thread.
//! - [`NullBackend`] drops it. Used when no output device exists.
//! - [`RecordingBackend`] stores it for inspection in tests and tools.
//!
//! The only state read back is the clock (`current_time`). Everything else is
//! fire-and-forget, so a generator behaves the same on every backend.

mod null;
mod recording;
pub mod render;

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::{
    automation::AutomationEvent, compressor::CompressorSettings, filter::FilterType,
    oscillator::Waveform,
};

pub use null::NullBackend;
pub use recording::RecordingBackend;
pub use render::{RenderContext, Renderer};

/// Opaque handle to a node created through a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// The backend's final output. Always exists, never created.
    pub const DESTINATION: NodeId = NodeId(0);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub fn param(self, kind: ParamKind) -> ParamRef {
        ParamRef { node: self, kind }
    }
}

/// Automatable parameters. Which ones a node has depends on its kind.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Gain,
    Frequency,
    Q,
    PlaybackRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamRef {
    pub node: NodeId,
    pub kind: ParamKind,
}

/// Decoded mono PCM audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: f32,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn new(sample_rate: f32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples,
        }
    }

    /// Length in seconds at the buffer's own sample rate.
    pub fn duration(&self) -> f64 {
        if self.sample_rate <= 0.0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// What to build for a newly created node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSpec {
    Gain {
        gain: f32,
    },
    Oscillator {
        waveform: Waveform,
        frequency: f32,
    },
    Filter {
        filter_type: FilterType,
        frequency: f32,
        q: f32,
    },
    BufferSource {
        buffer: Arc<AudioBuffer>,
        looping: bool,
        playback_rate: f32,
    },
    Compressor(CompressorSettings),
}

/// One fire-and-forget instruction to a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Create { id: NodeId, spec: NodeSpec },
    /// Start a source (oscillator or buffer source) at `time`.
    Start { node: NodeId, time: f64 },
    Stop { node: NodeId, time: f64 },
    Connect { from: NodeId, to: NodeId },
    /// Add `from`'s output to a parameter's scheduled value.
    ConnectParam { from: NodeId, param: ParamRef },
    /// Remove one `from → to` connection.
    Disconnect { from: NodeId, to: NodeId },
    /// Remove every outgoing connection of `from`, to nodes and parameters.
    DisconnectAll { from: NodeId },
    /// The caller will never reference `node` again.
    Release { node: NodeId },
    Automate { param: ParamRef, event: AutomationEvent },
    /// Drop every event on `param` scheduled at or after `from`.
    Cancel { param: ParamRef, from: f64 },
    SetWaveform { node: NodeId, waveform: Waveform },
}

/// Node creation, wiring and parameter scheduling.
///
/// Implementors provide the clock, id allocation and a sink for commands;
/// every capability method is built on those four.
pub trait AudioBackend {
    fn sample_rate(&self) -> f32;

    /// Seconds since the backend started rendering.
    fn current_time(&self) -> f64;

    /// Allocate a fresh id. Never returns [`NodeId::DESTINATION`].
    fn next_node_id(&self) -> NodeId;

    fn submit(&self, command: Command);

    /// False when commands never reach an output and the clock never moves.
    fn renders(&self) -> bool {
        true
    }

    fn destination(&self) -> NodeId {
        NodeId::DESTINATION
    }

    fn create_node(&self, spec: NodeSpec) -> NodeId {
        let id = self.next_node_id();
        self.submit(Command::Create { id, spec });
        id
    }

    fn create_gain(&self, gain: f32) -> NodeId {
        self.create_node(NodeSpec::Gain { gain })
    }

    fn create_oscillator(&self, waveform: Waveform, frequency: f32) -> NodeId {
        self.create_node(NodeSpec::Oscillator {
            waveform,
            frequency,
        })
    }

    fn create_filter(&self, filter_type: FilterType, frequency: f32, q: f32) -> NodeId {
        self.create_node(NodeSpec::Filter {
            filter_type,
            frequency,
            q,
        })
    }

    fn create_buffer_source(
        &self,
        buffer: Arc<AudioBuffer>,
        looping: bool,
        playback_rate: f32,
    ) -> NodeId {
        self.create_node(NodeSpec::BufferSource {
            buffer,
            looping,
            playback_rate,
        })
    }

    fn create_compressor(&self, settings: CompressorSettings) -> NodeId {
        self.create_node(NodeSpec::Compressor(settings))
    }

    fn start(&self, node: NodeId, time: f64) {
        self.submit(Command::Start { node, time });
    }

    fn stop(&self, node: NodeId, time: f64) {
        self.submit(Command::Stop { node, time });
    }

    fn connect(&self, from: NodeId, to: NodeId) {
        self.submit(Command::Connect { from, to });
    }

    fn connect_param(&self, from: NodeId, param: ParamRef) {
        self.submit(Command::ConnectParam { from, param });
    }

    fn disconnect(&self, from: NodeId, to: NodeId) {
        self.submit(Command::Disconnect { from, to });
    }

    fn disconnect_all(&self, from: NodeId) {
        self.submit(Command::DisconnectAll { from });
    }

    fn release(&self, node: NodeId) {
        self.submit(Command::Release { node });
    }

    fn set_waveform(&self, node: NodeId, waveform: Waveform) {
        self.submit(Command::SetWaveform { node, waveform });
    }

    fn set_value_at_time(&self, param: ParamRef, value: f32, time: f64) {
        self.submit(Command::Automate {
            param,
            event: AutomationEvent::SetValue { value, time },
        });
    }

    fn linear_ramp_to_value_at_time(&self, param: ParamRef, value: f32, time: f64) {
        self.submit(Command::Automate {
            param,
            event: AutomationEvent::LinearRamp { value, time },
        });
    }

    fn set_target_at_time(&self, param: ParamRef, target: f32, time: f64, time_constant: f64) {
        self.submit(Command::Automate {
            param,
            event: AutomationEvent::SetTarget {
                target,
                time,
                time_constant,
            },
        });
    }

    fn cancel_scheduled_values(&self, param: ParamRef, from: f64) {
        self.submit(Command::Cancel { param, from });
    }
}
