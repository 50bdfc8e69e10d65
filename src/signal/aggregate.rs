use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use super::{BooleanProperty, Property, ReadOnlyProperty, Subscription};

/*
Enable Aggregation
==================

A sound generator may only be heard when several independent conditions all
hold: its own on/off switch, the global "sound enabled" setting, whether the
simulation screen is visible, whether the model is running...

The aggregator keeps a set of boolean properties and derives one value,
`fully enabled`, which is the AND of every member:

    members:   local  sound_enabled  visible      derived
               true   true           true    →    true
               true   false          true    →    false
               (empty set)                   →    true

The derived value lives in its own property. It is recomputed synchronously
whenever a member changes, or a member is added or removed, and it notifies
its listeners only when the result actually flips. Two members flipping in
the same call stack therefore produce up to two notifications, never a
coalesced one.

The aggregator subscribes to its members but does not own them. Member
listeners hold a weak reference back to the aggregator, so a property that
outlives it never keeps it alive; dropping the aggregator detaches every
listener it attached.
*/

struct Member {
    signal: BooleanProperty,
    subscription: Subscription,
}

struct AggregatorInner {
    members: RefCell<Vec<Member>>,
    derived: Property<bool>,
}

impl AggregatorInner {
    fn recompute(&self) {
        let all = self.members.borrow().iter().all(|m| m.signal.get());
        self.derived.set(all);
    }

    fn detach_all(&self) -> usize {
        let members: Vec<Member> = self.members.borrow_mut().drain(..).collect();
        for member in &members {
            member.signal.unsubscribe(member.subscription);
        }
        members.len()
    }
}

impl Drop for AggregatorInner {
    fn drop(&mut self) {
        for member in self.members.get_mut().drain(..) {
            member.signal.unsubscribe(member.subscription);
        }
    }
}

/// Derives one "fully enabled" boolean from a dynamic set of boolean properties.
pub struct EnableAggregator {
    inner: Rc<AggregatorInner>,
}

impl EnableAggregator {
    pub fn new(signals: impl IntoIterator<Item = BooleanProperty>) -> Self {
        let aggregator = Self {
            inner: Rc::new(AggregatorInner {
                members: RefCell::new(Vec::new()),
                derived: Property::new(true),
            }),
        };
        for signal in signals {
            aggregator.add(signal);
        }
        aggregator
    }

    /// Add a member and publish the new derived value.
    ///
    /// Returns false (and changes nothing) if `signal` is already a member.
    pub fn add(&self, signal: BooleanProperty) -> bool {
        if self.contains(&signal) {
            return false;
        }

        let weak: Weak<AggregatorInner> = Rc::downgrade(&self.inner);
        let subscription = signal.subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.recompute();
            }
        });

        self.inner.members.borrow_mut().push(Member {
            signal,
            subscription,
        });
        self.inner.recompute();
        true
    }

    /// Remove a member and publish the new derived value.
    ///
    /// Returns false if `signal` was not a member.
    pub fn remove(&self, signal: &BooleanProperty) -> bool {
        let removed = {
            let mut members = self.inner.members.borrow_mut();
            members
                .iter()
                .position(|m| m.signal.ptr_eq(signal))
                .map(|index| members.remove(index))
        };

        match removed {
            Some(member) => {
                member.signal.unsubscribe(member.subscription);
                self.inner.recompute();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, signal: &BooleanProperty) -> bool {
        self.inner
            .members
            .borrow()
            .iter()
            .any(|m| m.signal.ptr_eq(signal))
    }

    pub fn len(&self) -> usize {
        self.inner.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// AND of every member; true for an empty set.
    pub fn value(&self) -> bool {
        self.inner.derived.get()
    }

    pub fn property(&self) -> ReadOnlyProperty<bool> {
        self.inner.derived.read_only()
    }

    /// Unsubscribe from every member. The derived value becomes true.
    ///
    /// Returns the number of members that were detached.
    pub fn clear(&self) -> usize {
        let detached = self.inner.detach_all();
        self.inner.recompute();
        detached
    }
}
