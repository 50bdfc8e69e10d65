//! Explicit registry of the sounds an application plays.
//!
//! The registry owns a master gain stage connected to the backend output and
//! two global switches. Every registered sound is routed through the master
//! stage and gated on both switches:
//!
//! - `sound_enabled`: the user's global audio toggle.
//! - `simulation_visible`: false while the hosting screen is hidden.
//!
//! Nothing is global. Applications create one registry, pass it around, and
//! look sounds up by id.

use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::Rc,
};

use tracing::debug;

use crate::{
    backend::AudioBackend,
    error::{check_output_level, SoundError},
    generator::{GainRamper, Sound, DEFAULT_TIME_CONSTANT},
    signal::BooleanProperty,
};

struct Entry {
    any: Rc<dyn Any>,
    sound: Rc<dyn Sound>,
}

pub struct SoundRegistry {
    backend: Rc<dyn AudioBackend>,
    master: GainRamper,
    master_level: Cell<f32>,
    sound_enabled: BooleanProperty,
    simulation_visible: BooleanProperty,
    entries: RefCell<BTreeMap<String, Entry>>,
}

impl SoundRegistry {
    pub fn new(backend: Rc<dyn AudioBackend>) -> Self {
        let master = GainRamper::new(Rc::clone(&backend), 1.0);
        backend.connect(master.node(), backend.destination());

        Self {
            backend,
            master,
            master_level: Cell::new(1.0),
            sound_enabled: BooleanProperty::new(true),
            simulation_visible: BooleanProperty::new(true),
            entries: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn backend(&self) -> &Rc<dyn AudioBackend> {
        &self.backend
    }

    /// Global audio switch shared by every registered sound.
    pub fn sound_enabled(&self) -> BooleanProperty {
        self.sound_enabled.clone()
    }

    pub fn simulation_visible(&self) -> BooleanProperty {
        self.simulation_visible.clone()
    }

    pub fn master_output_level(&self) -> f32 {
        self.master_level.get()
    }

    /// Scale everything routed through the registry.
    pub fn set_master_output_level(&self, level: f32, time_constant: f64) -> Result<(), SoundError> {
        let level = check_output_level(level)?;
        if !(time_constant >= 0.0 && time_constant.is_finite()) {
            return Err(SoundError::InvalidParameter {
                name: "time_constant",
                value: time_constant as f32,
            });
        }
        self.master_level.set(level);
        if time_constant > 0.0 {
            self.master.approach(level, time_constant);
        } else {
            self.master.set_immediately(level);
        }
        Ok(())
    }

    pub fn fade_master_to(&self, level: f32) -> Result<(), SoundError> {
        self.set_master_output_level(level, DEFAULT_TIME_CONSTANT)
    }

    /// Route `sound` through the master stage and store it under `id`.
    pub fn register<T: Sound + 'static>(
        &self,
        id: impl Into<String>,
        sound: T,
    ) -> Result<Rc<T>, SoundError> {
        let id = id.into();
        if self.entries.borrow().contains_key(&id) {
            return Err(SoundError::DuplicateId(id));
        }

        let sound = Rc::new(sound);
        let generator = sound.generator();
        generator.connect(self.master.node());
        generator.add_enable_control_property(self.sound_enabled.clone());
        generator.add_enable_control_property(self.simulation_visible.clone());

        debug!(%id, "sound registered");
        self.entries.borrow_mut().insert(
            id,
            Entry {
                any: sound.clone(),
                sound: sound.clone(),
            },
        );
        Ok(sound)
    }

    /// Look up a sound by id and concrete type.
    pub fn get<T: Sound + 'static>(&self, id: &str) -> Option<Rc<T>> {
        let entries = self.entries.borrow();
        let any = Rc::clone(&entries.get(id)?.any);
        any.downcast::<T>().ok()
    }

    pub fn get_sound(&self, id: &str) -> Option<Rc<dyn Sound>> {
        self.entries.borrow().get(id).map(|e| Rc::clone(&e.sound))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.borrow().contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Detach a sound from the master stage and the global switches.
    pub fn unregister(&self, id: &str) -> Result<Rc<dyn Sound>, SoundError> {
        let entry = self
            .entries
            .borrow_mut()
            .remove(id)
            .ok_or_else(|| SoundError::UnknownId(id.to_string()))?;

        let generator = entry.sound.generator();
        generator.disconnect(self.master.node());
        generator.remove_enable_control_property(&self.sound_enabled);
        generator.remove_enable_control_property(&self.simulation_visible);

        debug!(%id, "sound unregistered");
        Ok(entry.sound)
    }
}

impl Drop for SoundRegistry {
    fn drop(&mut self) {
        self.backend.disconnect_all(self.master.node());
        self.backend.release(self.master.node());
    }
}
