//! Software rendering backend.
//!
//! [`RenderContext::new`] returns a connected pair:
//!
//! - [`RenderContext`] is the control-side [`AudioBackend`]. It lives on the
//!   simulation thread and pushes commands into a lock-free ring buffer.
//! - [`Renderer`] is moved to the audio thread (or driven offline). Every
//!   `render` call drains the queue, processes the node graph and advances
//!   the shared frame clock that `current_time` reads.
//!
//! ```
//! use simsound::backend::{AudioBackend, RenderContext};
//! use simsound::dsp::oscillator::Waveform;
//!
//! let (context, mut renderer) = RenderContext::new(48_000.0, 256);
//! let osc = context.create_oscillator(Waveform::Sine, 440.0);
//! context.connect(osc, context.destination());
//! context.start(osc, 0.0);
//!
//! let mut block = vec![0.0f32; 480];
//! renderer.render(&mut block);
//!
//! assert!((context.current_time() - 0.01).abs() < 1e-9);
//! assert!(block.iter().any(|s| s.abs() > 0.5));
//! ```

mod node;
mod renderer;

use std::{
    cell::{Cell, RefCell},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use rtrb::{Producer, PushError, RingBuffer};
use tracing::warn;

use super::{AudioBackend, Command, NodeId};

pub use renderer::Renderer;

/// Control-side handle of the software renderer.
pub struct RenderContext {
    tx: RefCell<Producer<Command>>,
    frames: Arc<AtomicU64>,
    sample_rate: f32,
    next_id: Cell<u32>,
    dropped: Cell<u64>,
}

impl RenderContext {
    pub fn new(sample_rate: f32, queue_capacity: usize) -> (Self, Renderer) {
        let (tx, rx) = RingBuffer::<Command>::new(queue_capacity.max(1));
        let frames = Arc::new(AtomicU64::new(0));

        let context = Self {
            tx: RefCell::new(tx),
            frames: Arc::clone(&frames),
            sample_rate,
            next_id: Cell::new(1),
            dropped: Cell::new(0),
        };
        let renderer = Renderer::new(sample_rate, rx, frames);

        (context, renderer)
    }

    /// Frames rendered so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Commands dropped because the queue was full.
    pub fn dropped_commands(&self) -> u64 {
        self.dropped.get()
    }
}

impl AudioBackend for RenderContext {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.frames_rendered() as f64 / self.sample_rate as f64
    }

    fn next_node_id(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        NodeId::from_raw(id)
    }

    fn submit(&self, command: Command) {
        if let Err(PushError::Full(command)) = self.tx.borrow_mut().push(command) {
            self.dropped.set(self.dropped.get() + 1);
            warn!(?command, "render queue full, dropping command");
        }
    }
}
