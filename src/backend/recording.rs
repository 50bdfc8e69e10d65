use std::cell::{Cell, RefCell};

use super::{AudioBackend, Command, NodeId, NodeSpec, ParamRef};
use crate::dsp::automation::AutomationEvent;

/// Backend that keeps every command it receives, with a manually driven clock.
///
/// Useful for asserting exactly what a generator scheduled without rendering.
#[derive(Debug)]
pub struct RecordingBackend {
    sample_rate: f32,
    time: Cell<f64>,
    next_id: Cell<u32>,
    commands: RefCell<Vec<Command>>,
}

impl RecordingBackend {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            time: Cell::new(0.0),
            next_id: Cell::new(1),
            commands: RefCell::new(Vec::new()),
        }
    }

    pub fn set_time(&self, seconds: f64) {
        self.time.set(seconds);
    }

    pub fn advance(&self, seconds: f64) {
        self.time.set(self.time.get() + seconds);
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.commands.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.borrow().is_empty()
    }

    /// Return and forget everything recorded so far.
    pub fn take(&self) -> Vec<Command> {
        std::mem::take(&mut *self.commands.borrow_mut())
    }

    pub fn created(&self) -> Vec<(NodeId, NodeSpec)> {
        self.commands
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Command::Create { id, spec } => Some((*id, spec.clone())),
                _ => None,
            })
            .collect()
    }

    /// Automation events scheduled on `param`, in submission order.
    pub fn automation_for(&self, param: ParamRef) -> Vec<AutomationEvent> {
        self.commands
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Command::Automate { param: p, event } if *p == param => Some(*event),
                _ => None,
            })
            .collect()
    }
}

impl AudioBackend for RecordingBackend {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.time.get()
    }

    fn next_node_id(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        NodeId::from_raw(id)
    }

    fn submit(&self, command: Command) {
        self.commands.borrow_mut().push(command);
    }
}
