//! Single-threaded observable values.
//!
//! A [`Property`] holds a `Copy` value and calls its listeners synchronously
//! whenever the value changes. Clones share the same value, so a property can
//! be handed to several owners and flipped from any of them. Identity (used by
//! the enable aggregator for membership) is the shared allocation, not the
//! value.

mod aggregate;

pub use aggregate::EnableAggregator;

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

type Listener<T> = Rc<dyn Fn(T)>;

/// Handle returned by [`Property::subscribe`], used to unsubscribe later.
#[must_use = "dropping a Subscription leaves the listener attached"]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

struct PropertyInner<T> {
    value: Cell<T>,
    listeners: RefCell<Vec<(u64, Listener<T>)>>,
    next_id: Cell<u64>,
}

pub struct Property<T: Copy + PartialEq + 'static> {
    inner: Rc<PropertyInner<T>>,
}

/// Boolean property, the signal type that gates sound generators.
pub type BooleanProperty = Property<bool>;

impl<T: Copy + PartialEq + 'static> Property<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(PropertyInner {
                value: Cell::new(value),
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    pub fn get(&self) -> T {
        self.inner.value.get()
    }

    /// Store `value` and notify listeners if it differs from the current one.
    ///
    /// Listeners run in subscription order, in this call stack. They may set
    /// this or any other property, and may subscribe or unsubscribe.
    pub fn set(&self, value: T) {
        if self.inner.value.get() == value {
            return;
        }
        self.inner.value.set(value);

        let listeners: Vec<Listener<T>> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in listeners {
            listener(value);
        }
    }

    /// Register `listener` to run after every change.
    pub fn subscribe(&self, listener: impl Fn(T) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));
        Subscription(id)
    }

    /// Detach a listener. Returns false if it was not attached to this property.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        match listeners.iter().position(|(id, _)| *id == subscription.0) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// True when both handles share the same underlying value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn read_only(&self) -> ReadOnlyProperty<T> {
        ReadOnlyProperty {
            property: self.clone(),
        }
    }
}

impl<T: Copy + PartialEq + 'static> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Copy + PartialEq + Default + 'static> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Copy + PartialEq + fmt::Debug + 'static> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &self.get())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// A view of a property that can be observed but not set.
pub struct ReadOnlyProperty<T: Copy + PartialEq + 'static> {
    property: Property<T>,
}

impl<T: Copy + PartialEq + 'static> ReadOnlyProperty<T> {
    pub fn get(&self) -> T {
        self.property.get()
    }

    pub fn subscribe(&self, listener: impl Fn(T) + 'static) -> Subscription {
        self.property.subscribe(listener)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.property.unsubscribe(subscription)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.property.ptr_eq(&other.property)
    }
}

impl<T: Copy + PartialEq + 'static> Clone for ReadOnlyProperty<T> {
    fn clone(&self) -> Self {
        Self {
            property: self.property.clone(),
        }
    }
}

impl<T: Copy + PartialEq + fmt::Debug + 'static> fmt::Debug for ReadOnlyProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadOnlyProperty").field(&self.get()).finish()
    }
}
