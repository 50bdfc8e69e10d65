use std::{collections::HashMap, sync::Arc};

use crate::{
    backend::{AudioBuffer, NodeId, NodeSpec, ParamKind},
    dsp::{
        amplify::multiply_in_place,
        automation::ParamTimeline,
        compressor::Compressor,
        filter::SVFilter,
        mix::sum_in_place,
        oscillator::{OscillatorBlock, Waveform},
    },
    MAX_BLOCK_SIZE,
};

/// Timing of one block being rendered.
pub(super) struct Block {
    pub start_time: f64,
    pub len: usize,
    pub sample_rate: f32,
}

impl Block {
    #[inline]
    fn period(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }

    #[inline]
    fn time_at(&self, index: usize) -> f64 {
        self.start_time + index as f64 / self.sample_rate as f64
    }
}

/// Start/stop window of a source node.
#[derive(Default)]
struct Schedule {
    start: Option<f64>,
    stop: Option<f64>,
}

impl Schedule {
    #[inline]
    fn is_active(&self, time: f64) -> bool {
        match self.start {
            Some(start) => time >= start && self.stop.map_or(true, |stop| time < stop),
            None => false,
        }
    }
}

enum NodeKind {
    Destination,
    Gain {
        gain: ParamTimeline,
    },
    Oscillator {
        osc: OscillatorBlock,
        frequency: ParamTimeline,
        schedule: Schedule,
    },
    Filter {
        filter: SVFilter,
        frequency: ParamTimeline,
        q: ParamTimeline,
    },
    BufferSource {
        buffer: Arc<AudioBuffer>,
        looping: bool,
        playback_rate: ParamTimeline,
        position: f64,
        finished: bool,
        schedule: Schedule,
    },
    Compressor(Compressor),
}

pub(super) struct RenderNode {
    kind: NodeKind,
    /// Nodes whose output is summed into this node's input.
    pub inputs: Vec<NodeId>,
    /// Nodes whose output is added to one of this node's parameters.
    pub param_inputs: Vec<(ParamKind, NodeId)>,
    pub output: Vec<f32>,
    input: Vec<f32>,
    values: Vec<f32>,
}

impl RenderNode {
    fn with_kind(kind: NodeKind) -> Self {
        Self {
            kind,
            inputs: Vec::new(),
            param_inputs: Vec::new(),
            output: vec![0.0; MAX_BLOCK_SIZE],
            input: vec![0.0; MAX_BLOCK_SIZE],
            values: vec![0.0; MAX_BLOCK_SIZE],
        }
    }

    pub fn destination() -> Self {
        Self::with_kind(NodeKind::Destination)
    }

    pub fn from_spec(spec: NodeSpec) -> Self {
        let kind = match spec {
            NodeSpec::Gain { gain } => NodeKind::Gain {
                gain: ParamTimeline::new(gain),
            },
            NodeSpec::Oscillator {
                waveform,
                frequency,
            } => NodeKind::Oscillator {
                osc: OscillatorBlock::new(waveform),
                frequency: ParamTimeline::new(frequency),
                schedule: Schedule::default(),
            },
            NodeSpec::Filter {
                filter_type,
                frequency,
                q,
            } => NodeKind::Filter {
                filter: SVFilter::new(filter_type),
                frequency: ParamTimeline::new(frequency),
                q: ParamTimeline::new(q),
            },
            NodeSpec::BufferSource {
                buffer,
                looping,
                playback_rate,
            } => NodeKind::BufferSource {
                buffer,
                looping,
                playback_rate: ParamTimeline::new(playback_rate),
                position: 0.0,
                finished: false,
                schedule: Schedule::default(),
            },
            NodeSpec::Compressor(settings) => NodeKind::Compressor(Compressor::new(settings)),
        };
        Self::with_kind(kind)
    }

    pub fn timeline_mut(&mut self, param: ParamKind) -> Option<&mut ParamTimeline> {
        match (&mut self.kind, param) {
            (NodeKind::Gain { gain }, ParamKind::Gain) => Some(gain),
            (NodeKind::Oscillator { frequency, .. }, ParamKind::Frequency) => Some(frequency),
            (NodeKind::Filter { frequency, .. }, ParamKind::Frequency) => Some(frequency),
            (NodeKind::Filter { q, .. }, ParamKind::Q) => Some(q),
            (NodeKind::BufferSource { playback_rate, .. }, ParamKind::PlaybackRate) => {
                Some(playback_rate)
            }
            _ => None,
        }
    }

    pub fn start(&mut self, time: f64) {
        match &mut self.kind {
            NodeKind::Oscillator { schedule, .. } | NodeKind::BufferSource { schedule, .. } => {
                // A source starts once.
                if schedule.start.is_none() {
                    schedule.start = Some(time);
                }
            }
            _ => {}
        }
    }

    pub fn stop(&mut self, time: f64) {
        match &mut self.kind {
            NodeKind::Oscillator { schedule, .. } | NodeKind::BufferSource { schedule, .. } => {
                schedule.stop = Some(time);
            }
            _ => {}
        }
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        if let NodeKind::Oscillator { osc, .. } = &mut self.kind {
            osc.set_waveform(waveform);
        }
    }

    pub fn prune(&mut self, time: f64) {
        match &mut self.kind {
            NodeKind::Gain { gain } => gain.prune_before(time),
            NodeKind::Oscillator { frequency, .. } => frequency.prune_before(time),
            NodeKind::Filter { frequency, q, .. } => {
                frequency.prune_before(time);
                q.prune_before(time);
            }
            NodeKind::BufferSource { playback_rate, .. } => playback_rate.prune_before(time),
            NodeKind::Destination | NodeKind::Compressor(_) => {}
        }
    }

    /// Render one block into `output`, reading upstream outputs from `nodes`.
    ///
    /// `self` must not be in `nodes` while this runs.
    pub fn process(&mut self, block: &Block, nodes: &HashMap<NodeId, RenderNode>) {
        let len = block.len;
        let Self {
            kind,
            inputs,
            param_inputs,
            output,
            input,
            values,
        } = self;

        let param_inputs: &[(ParamKind, NodeId)] = param_inputs;

        let input = &mut input[..len];
        input.fill(0.0);
        for source in inputs.iter() {
            if let Some(node) = nodes.get(source) {
                sum_in_place(input, &node.output[..len]);
            }
        }

        let output = &mut output[..len];
        let values = &mut values[..len];

        match kind {
            NodeKind::Destination => output.copy_from_slice(input),

            NodeKind::Gain { gain } => {
                param_curve(gain, ParamKind::Gain, param_inputs, nodes, block, values);
                output.copy_from_slice(input);
                multiply_in_place(output, values);
            }

            NodeKind::Oscillator {
                osc,
                frequency,
                schedule,
            } => {
                param_curve(frequency, ParamKind::Frequency, param_inputs, nodes, block, values);
                for (i, (out, &freq)) in output.iter_mut().zip(values.iter()).enumerate() {
                    *out = if schedule.is_active(block.time_at(i)) {
                        osc.next_sample(freq, block.sample_rate)
                    } else {
                        0.0
                    };
                }
            }

            NodeKind::Filter {
                filter,
                frequency,
                q,
            } => {
                // Coefficients are held for the block.
                let cutoff = frequency.value_at(block.start_time)
                    + modulation_at(ParamKind::Frequency, param_inputs, nodes, 0);
                let q = q.value_at(block.start_time) + modulation_at(ParamKind::Q, param_inputs, nodes, 0);

                output.copy_from_slice(input);
                filter.render(output, cutoff, q, block.sample_rate);
            }

            NodeKind::BufferSource {
                buffer,
                looping,
                playback_rate,
                position,
                finished,
                schedule,
            } => {
                param_curve(playback_rate, ParamKind::PlaybackRate, param_inputs, nodes, block, values);

                let samples = &buffer.samples;
                let frames = samples.len() as f64;
                let step = buffer.sample_rate as f64 / block.sample_rate as f64;

                for (i, (out, &rate)) in output.iter_mut().zip(values.iter()).enumerate() {
                    if *finished || samples.is_empty() || !schedule.is_active(block.time_at(i)) {
                        *out = 0.0;
                        continue;
                    }

                    *out = read_interpolated(samples, *position, *looping);
                    *position += rate.max(0.0) as f64 * step;

                    if *position >= frames {
                        if *looping {
                            *position %= frames;
                        } else {
                            *finished = true;
                        }
                    }
                }
            }

            NodeKind::Compressor(compressor) => {
                output.copy_from_slice(input);
                compressor.render(output, block.sample_rate);
            }
        }
    }
}

/// Scheduled values for one parameter plus anything connected into it.
fn param_curve(
    timeline: &ParamTimeline,
    param: ParamKind,
    param_inputs: &[(ParamKind, NodeId)],
    nodes: &HashMap<NodeId, RenderNode>,
    block: &Block,
    out: &mut [f32],
) {
    timeline.fill(block.start_time, block.period(), out);

    for (kind, source) in param_inputs {
        if *kind != param {
            continue;
        }
        if let Some(node) = nodes.get(source) {
            sum_in_place(out, &node.output[..out.len()]);
        }
    }
}

fn modulation_at(
    param: ParamKind,
    param_inputs: &[(ParamKind, NodeId)],
    nodes: &HashMap<NodeId, RenderNode>,
    index: usize,
) -> f32 {
    param_inputs
        .iter()
        .filter(|(kind, _)| *kind == param)
        .filter_map(|(_, source)| nodes.get(source))
        .map(|node| node.output[index])
        .sum()
}

#[inline]
fn read_interpolated(samples: &[f32], position: f64, looping: bool) -> f32 {
    let index = position as usize;
    let frac = (position - index as f64) as f32;

    let current = samples.get(index).copied().unwrap_or(0.0);
    let next = match samples.get(index + 1) {
        Some(&s) => s,
        None if looping => samples[0],
        None => 0.0,
    };

    current + (next - current) * frac
}
