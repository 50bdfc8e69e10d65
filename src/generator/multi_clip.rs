use std::{
    cell::RefCell,
    collections::HashMap,
    hash::Hash,
    ops::Deref,
    rc::Rc,
    sync::Arc,
};

use tracing::debug;

use super::{Sound, SoundGenerator, SoundGeneratorOptions};
use crate::{
    backend::{AudioBackend, AudioBuffer, NodeId},
    error::SoundError,
};

/// A set of one-shot clips selected by key, sharing one output stage.
///
/// Typical keys are small enums ("correct", "incorrect") or integers
/// (number of objects on a balance).
pub struct MultiClip<K> {
    generator: SoundGenerator,
    clips: HashMap<K, Arc<AudioBuffer>>,
    /// Playing sources and when they end.
    active: RefCell<Vec<(NodeId, f64)>>,
}

impl<K: Eq + Hash> MultiClip<K> {
    pub fn new(
        backend: Rc<dyn AudioBackend>,
        clips: impl IntoIterator<Item = (K, Arc<AudioBuffer>)>,
        options: SoundGeneratorOptions,
    ) -> Result<Self, SoundError> {
        let generator = SoundGenerator::new(backend, options)?;

        Ok(Self {
            generator,
            clips: clips.into_iter().collect(),
            active: RefCell::new(Vec::new()),
        })
    }

    pub fn play_associated_sound(&self, key: &K) -> Result<(), SoundError> {
        self.play_associated_sound_after(key, 0.0)
    }

    /// Play the clip for `key` once after `delay` seconds.
    ///
    /// Ignored while the generator is not fully enabled.
    pub fn play_associated_sound_after(&self, key: &K, delay: f64) -> Result<(), SoundError> {
        let buffer = self.clips.get(key).ok_or(SoundError::UnknownClip)?;

        let backend = self.generator.backend();
        let now = backend.current_time();
        self.reap(now);

        if !self.generator.fully_enabled() {
            debug!("clip trigger ignored while disabled");
            return Ok(());
        }
        if !backend.renders() {
            return Ok(());
        }

        let node = backend.create_buffer_source(Arc::clone(buffer), false, 1.0);
        backend.connect(node, self.generator.source_destination());
        let start = now + delay.max(0.0);
        backend.start(node, start);

        self.active.borrow_mut().push((node, start + buffer.duration()));
        Ok(())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.clips.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn is_playing(&self) -> bool {
        let now = self.generator.backend().current_time();
        self.active.borrow().iter().any(|&(_, end)| end > now)
    }

    pub fn stop_all(&self) {
        let backend = self.generator.backend();
        let now = backend.current_time();
        for (node, _) in self.active.borrow_mut().drain(..) {
            backend.stop(node, now);
            backend.release(node);
        }
    }

    fn reap(&self, now: f64) {
        let backend = self.generator.backend();
        self.active.borrow_mut().retain(|&(node, end)| {
            if end <= now {
                backend.release(node);
                false
            } else {
                true
            }
        });
    }
}

impl<K> Deref for MultiClip<K> {
    type Target = SoundGenerator;

    fn deref(&self) -> &SoundGenerator {
        &self.generator
    }
}

impl<K> Sound for MultiClip<K> {
    fn generator(&self) -> &SoundGenerator {
        &self.generator
    }
}

impl<K> Drop for MultiClip<K> {
    fn drop(&mut self) {
        let backend = self.generator.backend();
        let now = backend.current_time();
        for (node, _) in self.active.get_mut().drain(..) {
            backend.stop(node, now);
            backend.release(node);
        }
    }
}
