use std::{cell::RefCell, rc::Rc};

use crate::{
    backend::{AudioBackend, NodeId, ParamKind, ParamRef},
    dsp::automation::{AutomationEvent, ParamTimeline},
};

/*
Gain Ramper
===========

Owns one automatable parameter (normally the gain of a gain node) and keeps
a local copy of everything scheduled on it. The backend's copy is the one
that sounds; the local mirror answers "what is the value right now?" without
asking the audio thread.

Every high-level change pins first:

    now   = backend clock
    value = mirror.value_at(now)
    cancel everything at or after now
    set value at now
    schedule the new ramp or approach from there

so successive changes always continue from where the sound actually is.
*/

pub struct GainRamper {
    backend: Rc<dyn AudioBackend>,
    param: ParamRef,
    mirror: RefCell<ParamTimeline>,
}

impl GainRamper {
    /// Create a gain node at `initial_gain` and take control of its gain.
    pub fn new(backend: Rc<dyn AudioBackend>, initial_gain: f32) -> Self {
        let node = backend.create_gain(initial_gain);
        Self::attach(backend, node.param(ParamKind::Gain), initial_gain)
    }

    /// Take control of an existing parameter whose unscheduled value is `initial_value`.
    pub fn attach(backend: Rc<dyn AudioBackend>, param: ParamRef, initial_value: f32) -> Self {
        Self {
            backend,
            param,
            mirror: RefCell::new(ParamTimeline::new(initial_value)),
        }
    }

    pub fn node(&self) -> NodeId {
        self.param.node
    }

    pub fn param(&self) -> ParamRef {
        self.param
    }

    pub fn value_at(&self, time: f64) -> f32 {
        self.mirror.borrow().value_at(time)
    }

    pub fn current_value(&self) -> f32 {
        self.value_at(self.backend.current_time())
    }

    /// Jump to `value` now, dropping anything scheduled.
    pub fn set_immediately(&self, value: f32) {
        let now = self.backend.current_time();
        self.cancel_from(now);
        self.set_value_at(value, now);
    }

    /// Move linearly from the current value to `value` over `duration` seconds.
    pub fn ramp_linear(&self, value: f32, duration: f64) {
        let now = self.pin();
        self.linear_ramp_to(value, now + duration.max(0.0));
    }

    /// Approach `target` exponentially from the current value.
    pub fn approach(&self, target: f32, time_constant: f64) {
        let now = self.pin();
        self.set_target_at(target, now, time_constant);
    }

    /// Hold the current value from now on. Returns the pin time.
    pub fn pin(&self) -> f64 {
        let now = self.backend.current_time();
        let current = self.value_at(now);
        self.cancel_from(now);
        self.set_value_at(current, now);
        now
    }

    pub fn cancel_from(&self, time: f64) {
        self.mirror.borrow_mut().cancel_from(time);
        self.backend.cancel_scheduled_values(self.param, time);
    }

    pub fn set_value_at(&self, value: f32, time: f64) {
        self.schedule(AutomationEvent::SetValue { value, time });
        self.backend.set_value_at_time(self.param, value, time);
    }

    pub fn linear_ramp_to(&self, value: f32, time: f64) {
        self.schedule(AutomationEvent::LinearRamp { value, time });
        self.backend
            .linear_ramp_to_value_at_time(self.param, value, time);
    }

    pub fn set_target_at(&self, target: f32, time: f64, time_constant: f64) {
        self.schedule(AutomationEvent::SetTarget {
            target,
            time,
            time_constant,
        });
        self.backend
            .set_target_at_time(self.param, target, time, time_constant);
    }

    fn schedule(&self, event: AutomationEvent) {
        let mut mirror = self.mirror.borrow_mut();
        mirror.prune_before(self.backend.current_time());
        mirror.insert(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Command, RecordingBackend};

    fn setup() -> (Rc<RecordingBackend>, GainRamper) {
        let backend = Rc::new(RecordingBackend::new(48_000.0));
        let ramper = GainRamper::new(backend.clone(), 0.0);
        (backend, ramper)
    }

    #[test]
    fn ramp_pins_before_scheduling() {
        let (backend, ramper) = setup();
        backend.set_time(1.0);
        backend.take();

        ramper.ramp_linear(1.0, 0.1);

        let param = ramper.param();
        assert_eq!(
            backend.take(),
            vec![
                Command::Cancel { param, from: 1.0 },
                Command::Automate {
                    param,
                    event: AutomationEvent::SetValue {
                        value: 0.0,
                        time: 1.0
                    }
                },
                Command::Automate {
                    param,
                    event: AutomationEvent::LinearRamp {
                        value: 1.0,
                        time: 1.1
                    }
                },
            ]
        );
    }

    #[test]
    fn reversing_mid_ramp_starts_from_current_value() {
        let (backend, ramper) = setup();
        ramper.ramp_linear(1.0, 0.1);

        backend.set_time(0.05);
        assert!((ramper.current_value() - 0.5).abs() < 1e-4);

        ramper.ramp_linear(0.0, 0.1);
        assert!((ramper.current_value() - 0.5).abs() < 1e-4);

        backend.set_time(0.1);
        assert!((ramper.current_value() - 0.25).abs() < 1e-4);

        backend.set_time(0.2);
        assert!(ramper.current_value().abs() < 1e-6);
    }

    #[test]
    fn approach_heads_to_target() {
        let (backend, ramper) = setup();
        ramper.set_immediately(1.0);
        ramper.approach(0.25, 0.015);

        backend.set_time(0.5);
        assert!((ramper.current_value() - 0.25).abs() < 1e-4);
    }

    #[test]
    fn set_immediately_overrides_schedule() {
        let (backend, ramper) = setup();
        ramper.ramp_linear(1.0, 1.0);
        ramper.set_immediately(0.3);

        backend.set_time(2.0);
        assert!((ramper.current_value() - 0.3).abs() < 1e-6);
    }
}
