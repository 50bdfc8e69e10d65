use std::cell::Cell;

use super::{AudioBackend, Command, NodeId};

/// Backend that accepts everything and produces nothing.
///
/// Substituted when no audio device is available so that simulations keep
/// working without sound. The clock stays at zero.
#[derive(Debug)]
pub struct NullBackend {
    sample_rate: f32,
    next_id: Cell<u32>,
}

impl NullBackend {
    pub const DEFAULT_SAMPLE_RATE: f32 = 48_000.0;

    pub fn new() -> Self {
        Self::with_sample_rate(Self::DEFAULT_SAMPLE_RATE)
    }

    pub fn with_sample_rate(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            next_id: Cell::new(1),
        }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for NullBackend {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        0.0
    }

    fn next_node_id(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id.wrapping_add(1).max(1));
        NodeId::from_raw(id)
    }

    fn submit(&self, _command: Command) {}

    fn renders(&self) -> bool {
        false
    }
}
