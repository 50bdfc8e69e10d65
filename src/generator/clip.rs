use std::{
    cell::{Cell, RefCell},
    ops::Deref,
    rc::Rc,
    sync::Arc,
};

use tracing::debug;

use super::{GainRamper, Sound, SoundGenerator, SoundGeneratorOptions};
use crate::{
    backend::{AudioBackend, AudioBuffer, NodeId, ParamKind},
    error::{check_positive, SoundError},
};

pub struct SoundClipOptions {
    pub looping: bool,
    pub initial_playback_rate: f32,
    pub generator: SoundGeneratorOptions,
}

impl Default for SoundClipOptions {
    fn default() -> Self {
        Self {
            looping: false,
            initial_playback_rate: 1.0,
            generator: SoundGeneratorOptions::default(),
        }
    }
}

struct ActiveSource {
    node: NodeId,
    rate: GainRamper,
    /// When a one-shot runs out. `None` for loops.
    end_time: Option<f64>,
}

/// Plays a decoded buffer, once per trigger or as a continuous loop.
pub struct SoundClip {
    generator: SoundGenerator,
    buffer: Arc<AudioBuffer>,
    looping: bool,
    playback_rate: Cell<f32>,
    active: RefCell<Vec<ActiveSource>>,
}

impl SoundClip {
    pub fn new(
        backend: Rc<dyn AudioBackend>,
        buffer: Arc<AudioBuffer>,
        options: SoundClipOptions,
    ) -> Result<Self, SoundError> {
        let rate = check_positive("playback_rate", options.initial_playback_rate)?;
        let generator = SoundGenerator::new(backend, options.generator)?;

        Ok(Self {
            generator,
            buffer,
            looping: options.looping,
            playback_rate: Cell::new(rate),
            active: RefCell::new(Vec::new()),
        })
    }

    pub fn play(&self) {
        self.start_source(0.0);
    }

    /// Play after `delay` seconds. Negative delays play immediately.
    pub fn play_after(&self, delay: f64) {
        self.start_source(delay.max(0.0));
    }

    fn start_source(&self, delay: f64) {
        let backend = self.generator.backend();
        let now = backend.current_time();
        self.reap(now);

        if self.looping {
            if !self.active.borrow().is_empty() {
                return;
            }
        } else if !self.generator.fully_enabled() {
            debug!("clip trigger ignored while disabled");
            return;
        } else if !backend.renders() {
            // The clock never advances, so a one-shot would never finish.
            return;
        }

        let rate = self.playback_rate.get();
        let node = backend.create_buffer_source(Arc::clone(&self.buffer), self.looping, rate);
        backend.connect(node, self.generator.source_destination());

        let start = now + delay;
        backend.start(node, start);

        let end_time = if self.looping {
            None
        } else {
            Some(start + self.buffer.duration() / rate as f64)
        };
        let rate = GainRamper::attach(Rc::clone(backend), node.param(ParamKind::PlaybackRate), rate);

        self.active.borrow_mut().push(ActiveSource {
            node,
            rate,
            end_time,
        });
    }

    /// Stop every playing source.
    pub fn stop(&self) {
        let backend = self.generator.backend();
        let now = backend.current_time();
        for source in self.active.borrow_mut().drain(..) {
            backend.stop(source.node, now);
            backend.release(source.node);
        }
    }

    pub fn is_playing(&self) -> bool {
        let now = self.generator.backend().current_time();
        self.active
            .borrow()
            .iter()
            .any(|s| s.end_time.map_or(true, |end| end > now))
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        &self.buffer
    }

    pub fn playback_rate(&self) -> f32 {
        self.playback_rate.get()
    }

    /// Change the playback rate of future and currently playing sources.
    pub fn set_playback_rate(&self, rate: f32, time_constant: f64) -> Result<(), SoundError> {
        let rate = check_positive("playback_rate", rate)?;
        let previous = self.playback_rate.replace(rate);
        let now = self.generator.backend().current_time();

        for source in self.active.borrow_mut().iter_mut() {
            if time_constant > 0.0 {
                source.rate.approach(rate, time_constant);
            } else {
                source.rate.set_immediately(rate);
            }
            // Remaining time scales with the rate change.
            if let Some(end) = source.end_time.as_mut() {
                if *end > now {
                    *end = now + (*end - now) * (previous / rate) as f64;
                }
            }
        }
        Ok(())
    }

    /// Release one-shot sources that have finished.
    fn reap(&self, now: f64) {
        let backend = self.generator.backend();
        self.active.borrow_mut().retain(|source| match source.end_time {
            Some(end) if end <= now => {
                backend.release(source.node);
                false
            }
            _ => true,
        });
    }
}

impl Deref for SoundClip {
    type Target = SoundGenerator;

    fn deref(&self) -> &SoundGenerator {
        &self.generator
    }
}

impl Sound for SoundClip {
    fn generator(&self) -> &SoundGenerator {
        &self.generator
    }
}

impl Drop for SoundClip {
    fn drop(&mut self) {
        self.stop();
    }
}
