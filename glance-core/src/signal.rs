//! Single-threaded publish/subscribe channels.
//!
//! `Signal<T>` is the explicit replacement for observable streams: a value
//! owner emits snapshots, listeners receive them synchronously on the same
//! logical thread. Subscriptions are RAII handles; dropping one (or the
//! `SubscriptionSet` collecting them) unsubscribes deterministically.
//!
//! Emitting while an emission is already in progress is legal: the value is
//! queued and delivered after the current round, so listeners never observe
//! a half-applied transition.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::{Rc, Weak};

type Listener<T> = Box<dyn FnMut(&T)>;

struct Registry<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
    /// Ids unsubscribed while a delivery round had the listener list
    /// checked out.
    removed: HashSet<u64>,
    emitting: bool,
    pending: Vec<T>,
}

impl<T> Registry<T> {
    fn new() -> Self {
        Registry {
            next_id: 0,
            listeners: Vec::new(),
            removed: HashSet::new(),
            emitting: false,
            pending: Vec::new(),
        }
    }
}

/// A broadcast channel for value snapshots.
pub struct Signal<T> {
    registry: Rc<RefCell<Registry<T>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Signal {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Signal {
            registry: Rc::new(RefCell::new(Registry::new())),
        }
    }

    /// Register a listener. It stays active until the returned handle
    /// is dropped.
    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe(&self, listener: impl FnMut(&T) + 'static) -> Subscription {
        let id = {
            let mut registry = self.registry.borrow_mut();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push((id, Box::new(listener)));
            id
        };

        let weak = Rc::downgrade(&self.registry);
        Subscription {
            cancel: Some(Box::new(move || unsubscribe(&weak, id))),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    /// Deliver a value to every listener. Re-entrant emissions are queued
    /// and delivered in order once the current round completes.
    pub fn emit(&self, value: T) {
        {
            let mut registry = self.registry.borrow_mut();
            if registry.emitting {
                registry.pending.push(value);
                return;
            }
            registry.emitting = true;
        }

        self.deliver(value);

        loop {
            let next = {
                let mut registry = self.registry.borrow_mut();
                if registry.pending.is_empty() {
                    registry.emitting = false;
                    None
                } else {
                    Some(registry.pending.remove(0))
                }
            };
            match next {
                Some(value) => self.deliver(value),
                None => break,
            }
        }
    }

    fn deliver(&self, value: T) {
        // Check the list out so listeners can subscribe/unsubscribe
        // without re-borrowing it.
        let mut active = std::mem::take(&mut self.registry.borrow_mut().listeners);

        for (id, listener) in &mut active {
            let skip = self.registry.borrow().removed.contains(id);
            if !skip {
                listener(&value);
            }
        }

        let mut registry = self.registry.borrow_mut();
        let added = std::mem::take(&mut registry.listeners);
        active.extend(added);
        let removed = std::mem::take(&mut registry.removed);
        active.retain(|(id, _)| !removed.contains(id));
        registry.listeners = active;
    }
}

fn unsubscribe<T>(registry: &Weak<RefCell<Registry<T>>>, id: u64) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let mut registry = registry.borrow_mut();
    if registry.emitting {
        // The list may be checked out by a delivery round.
        registry.removed.insert(id);
    }
    registry.listeners.retain(|(lid, _)| *lid != id);
}

/// RAII unsubscribe handle returned by [`Signal::subscribe`].
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Disposal scope: collects subscriptions and releases them together when
/// the owning component is torn down.
#[derive(Default, Debug)]
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
