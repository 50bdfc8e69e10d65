//! Scheduled parameter automation.

/*
Parameter Automation
====================

Every automatable parameter (a gain, a filter cutoff, an oscillator frequency)
owns a timeline of scheduled events. The timeline answers one question: what
is the parameter's value at time `t`?

Vocabulary
----------

  event          A scheduled change. Events are kept sorted by time; events
                 sharing a timestamp keep the order they were inserted in.

  set value      Jump to `value` at `time` and hold it.

  linear ramp    Arrive at `value` exactly at `time`, moving in a straight
                 line from the previous event's time and value.

  set target     Starting at `time`, approach `target` exponentially:

                     v(t) = target + (v0 - target) * e^(-(t - time) / tau)

                 where `v0` is the value just before the event and `tau` is the
                 time constant. After one tau the curve has covered 63% of the
                 distance, after three taus 95%. It never "arrives", it only
                 gets arbitrarily close.

  cancel         Drop every event scheduled at or after a time.


Why Pin Before Ramping
----------------------

A linear ramp starts from the PREVIOUS EVENT, not from the value the
parameter happens to have right now:

    events:   set(0.0 @ 1.0)             ramp(1.0 @ 5.0)
    now = 3.0, value is 0.5 mid-ramp.

    cancel(3.0) drops the ramp. The last remaining event is set(0.0 @ 1.0),
    so the value snaps back to 0.0. A new ramp scheduled now would start
    from (1.0, 0.0), not from (3.0, 0.5).

Reading the value first and re-inserting it as set(0.5 @ 3.0) before the new
ramp ("pinning") makes the new curve start where the sound actually is.


Pruning
-------

Evaluation walks back through earlier events, so timelines are pruned as
time moves on: everything before the most recent past event collapses into
that event plus the value that preceded it.
*/

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutomationEvent {
    SetValue {
        value: f32,
        time: f64,
    },
    LinearRamp {
        value: f32,
        time: f64,
    },
    SetTarget {
        target: f32,
        time: f64,
        time_constant: f64,
    },
}

impl AutomationEvent {
    pub fn time(&self) -> f64 {
        match *self {
            AutomationEvent::SetValue { time, .. }
            | AutomationEvent::LinearRamp { time, .. }
            | AutomationEvent::SetTarget { time, .. } => time,
        }
    }
}

/// Sorted automation events for one parameter, plus the value in effect
/// before the first of them.
#[derive(Debug, Clone)]
pub struct ParamTimeline {
    default_value: f32,
    events: Vec<AutomationEvent>,
}

impl ParamTimeline {
    pub fn new(initial_value: f32) -> Self {
        Self {
            default_value: initial_value,
            events: Vec::new(),
        }
    }

    pub fn insert(&mut self, event: AutomationEvent) {
        let time = event.time();
        let index = self.events.partition_point(|e| e.time() <= time);
        self.events.insert(index, event);
    }

    /// Remove every event scheduled at or after `time`.
    pub fn cancel_from(&mut self, time: f64) {
        self.events.retain(|e| e.time() < time);
    }

    pub fn events(&self) -> &[AutomationEvent] {
        &self.events
    }

    pub fn value_at(&self, time: f64) -> f32 {
        evaluate(&self.events, self.default_value, time)
    }

    /// Fill `out` with one value per sample, starting at `start_time`.
    pub fn fill(&self, start_time: f64, sample_period: f64, out: &mut [f32]) {
        // Nothing left to change: the whole block holds a single value.
        let settled = self
            .events
            .last()
            .map_or(true, |e| {
                e.time() <= start_time && !matches!(e, AutomationEvent::SetTarget { .. })
            });

        if settled {
            out.fill(self.value_at(start_time));
            return;
        }

        for (i, sample) in out.iter_mut().enumerate() {
            *sample = self.value_at(start_time + i as f64 * sample_period);
        }
    }

    /// Collapse history older than the latest event at or before `time`.
    ///
    /// Values at `time` and later are unchanged.
    pub fn prune_before(&mut self, time: f64) {
        let past = self.events.partition_point(|e| e.time() <= time);
        if past < 2 {
            return;
        }

        let last = past - 1;
        let anchor = self.events[last];
        let value_before = evaluate(&self.events[..last], self.default_value, anchor.time());

        self.events.drain(..last);
        self.events[0] = match anchor {
            // A completed ramp behaves like a jump to its end value.
            AutomationEvent::LinearRamp { value, time } => AutomationEvent::SetValue { value, time },
            other => other,
        };
        self.default_value = value_before;
    }
}

/// Value of an exponential approach `elapsed` seconds after it began.
#[inline]
pub fn approach(start: f32, target: f32, elapsed: f64, time_constant: f64) -> f32 {
    if time_constant <= 0.0 {
        return target;
    }
    let remaining = (-elapsed.max(0.0) / time_constant).exp() as f32;
    target + (start - target) * remaining
}

fn evaluate(events: &[AutomationEvent], default_value: f32, time: f64) -> f32 {
    let applied = events.partition_point(|e| e.time() <= time);

    // Inside a ramp: interpolate from the previous event towards the ramp's end.
    if let Some(&AutomationEvent::LinearRamp {
        value: end_value,
        time: end_time,
    }) = events.get(applied)
    {
        // A ramp with nothing before it holds the default until it completes.
        if applied == 0 {
            return default_value;
        }

        let start_time = events[applied - 1].time();
        let start_value = value_at_event(events, applied - 1, default_value);
        let span = end_time - start_time;
        if span <= 0.0 {
            return end_value;
        }

        let progress = ((time - start_time) / span) as f32;
        return start_value + (end_value - start_value) * progress;
    }

    if applied == 0 {
        return default_value;
    }

    match events[applied - 1] {
        AutomationEvent::SetValue { value, .. } | AutomationEvent::LinearRamp { value, .. } => value,
        AutomationEvent::SetTarget {
            target,
            time: start,
            time_constant,
        } => {
            let start_value = evaluate(&events[..applied - 1], default_value, start);
            approach(start_value, target, time - start, time_constant)
        }
    }
}

/// Value at the exact moment event `index` takes effect.
fn value_at_event(events: &[AutomationEvent], index: usize, default_value: f32) -> f32 {
    match events[index] {
        AutomationEvent::SetValue { value, .. } | AutomationEvent::LinearRamp { value, .. } => value,
        AutomationEvent::SetTarget { time, .. } => evaluate(&events[..index], default_value, time),
    }
}
