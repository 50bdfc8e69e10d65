use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use rtrb::Consumer;

use super::node::{Block, RenderNode};
use crate::{
    backend::{Command, NodeId},
    dsp::mix::clamp_in_place,
    MAX_BLOCK_SIZE,
};

/// Audio-thread half of the software backend.
///
/// Owns every node. Commands from the paired [`RenderContext`](super::RenderContext)
/// are applied at the start of each `render` call, so their effect is
/// quantized to the callback size while scheduled automation stays
/// sample-accurate.
pub struct Renderer {
    rx: Consumer<Command>,
    frames: Arc<AtomicU64>,
    frame: u64,
    sample_rate: f32,
    nodes: HashMap<NodeId, RenderNode>,
    /// Processing order: every node after the nodes feeding it.
    order: Vec<NodeId>,
    order_dirty: bool,
    mono: Vec<f32>,
    /// Traversal scratch for `rebuild_order`, reused across rebuilds.
    seen: HashSet<NodeId>,
    stack: Vec<(NodeId, bool)>,
}

impl Renderer {
    pub(super) fn new(sample_rate: f32, rx: Consumer<Command>, frames: Arc<AtomicU64>) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(NodeId::DESTINATION, RenderNode::destination());

        Self {
            rx,
            frames,
            frame: 0,
            sample_rate,
            nodes,
            order: Vec::new(),
            order_dirty: true,
            mono: vec![0.0; MAX_BLOCK_SIZE],
            seen: HashSet::new(),
            stack: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    /// Live nodes, not counting the destination.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Render mono samples into `out`.
    pub fn render(&mut self, out: &mut [f32]) {
        self.drain_commands();

        for block in out.chunks_mut(MAX_BLOCK_SIZE) {
            self.render_block(block);
        }
    }

    /// Render into an interleaved buffer, copying the mono mix to every channel.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        self.drain_commands();

        let mut mono = std::mem::take(&mut self.mono);
        for chunk in out.chunks_mut(MAX_BLOCK_SIZE * channels) {
            chunk.fill(0.0);
            let frames = chunk.len() / channels;
            let block = &mut mono[..frames];
            self.render_block(block);

            for (frame, &sample) in chunk.chunks_mut(channels).zip(block.iter()) {
                frame.fill(sample);
            }
        }
        self.mono = mono;
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.rx.pop() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Create { id, spec } => {
                self.nodes.insert(id, RenderNode::from_spec(spec));
            }
            Command::Start { node, time } => {
                if let Some(node) = self.nodes.get_mut(&node) {
                    node.start(time);
                }
            }
            Command::Stop { node, time } => {
                if let Some(node) = self.nodes.get_mut(&node) {
                    node.stop(time);
                }
            }
            Command::Connect { from, to } => {
                if let Some(sink) = self.nodes.get_mut(&to) {
                    sink.inputs.push(from);
                    self.order_dirty = true;
                }
            }
            Command::ConnectParam { from, param } => {
                if let Some(sink) = self.nodes.get_mut(&param.node) {
                    sink.param_inputs.push((param.kind, from));
                    self.order_dirty = true;
                }
            }
            Command::Disconnect { from, to } => {
                if let Some(sink) = self.nodes.get_mut(&to) {
                    if let Some(index) = sink.inputs.iter().position(|&source| source == from) {
                        sink.inputs.remove(index);
                        self.order_dirty = true;
                    }
                }
            }
            Command::DisconnectAll { from } => self.detach_outputs(from),
            Command::Release { node } => {
                self.detach_outputs(node);
                if node != NodeId::DESTINATION {
                    self.nodes.remove(&node);
                }
            }
            Command::Automate { param, event } => {
                if let Some(timeline) = self
                    .nodes
                    .get_mut(&param.node)
                    .and_then(|node| node.timeline_mut(param.kind))
                {
                    timeline.insert(event);
                }
            }
            Command::Cancel { param, from } => {
                if let Some(timeline) = self
                    .nodes
                    .get_mut(&param.node)
                    .and_then(|node| node.timeline_mut(param.kind))
                {
                    timeline.cancel_from(from);
                }
            }
            Command::SetWaveform { node, waveform } => {
                if let Some(node) = self.nodes.get_mut(&node) {
                    node.set_waveform(waveform);
                }
            }
        }
    }

    fn detach_outputs(&mut self, from: NodeId) {
        for node in self.nodes.values_mut() {
            node.inputs.retain(|&source| source != from);
            node.param_inputs.retain(|&(_, source)| source != from);
        }
        self.order_dirty = true;
    }

    /// Depth-first post-order from the destination over audio and parameter
    /// inputs. Nodes that cannot reach the destination are not processed.
    fn rebuild_order(&mut self) {
        let mut order = std::mem::take(&mut self.order);
        order.clear();

        let mut seen = std::mem::take(&mut self.seen);
        let mut stack = std::mem::take(&mut self.stack);
        seen.clear();
        stack.clear();
        stack.push((NodeId::DESTINATION, false));

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if seen.contains(&id) {
                continue;
            }
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };

            seen.insert(id);
            stack.push((id, true));

            let sources = node
                .inputs
                .iter()
                .chain(node.param_inputs.iter().map(|(_, source)| source));
            for &source in sources {
                if !seen.contains(&source) {
                    stack.push((source, false));
                }
            }
        }

        self.order = order;
        self.seen = seen;
        self.stack = stack;
        self.order_dirty = false;
    }

    fn render_block(&mut self, out: &mut [f32]) {
        if self.order_dirty {
            self.rebuild_order();
        }

        let block = Block {
            start_time: self.current_time(),
            len: out.len(),
            sample_rate: self.sample_rate,
        };

        for index in 0..self.order.len() {
            let id = self.order[index];
            if let Some(mut node) = self.nodes.remove(&id) {
                node.process(&block, &self.nodes);
                self.nodes.insert(id, node);
            }
        }

        match self.nodes.get(&NodeId::DESTINATION) {
            Some(destination) => out.copy_from_slice(&destination.output[..out.len()]),
            None => out.fill(0.0),
        }
        clamp_in_place(out);

        self.frame += out.len() as u64;
        self.frames.store(self.frame, Ordering::Release);

        let now = self.current_time();
        for node in self.nodes.values_mut() {
            node.prune(now);
        }
    }
}
