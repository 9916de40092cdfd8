#![forbid(unsafe_code)]

//! Change notifications and the observer list that carries them.
//!
//! # Design
//!
//! A notifiable type embeds a [`ChangeListeners`] and raises a
//! [`ChangeNotification`] through it whenever one of its fields changes. The
//! list hands out an [`Unsubscribe`] per registration and exposes its
//! listeners for direct enumeration, so a sink can fire the type's
//! notification without going through the type's own setters.
//!
//! # Invariants
//!
//! 1. Listeners are invoked in registration order.
//! 2. `raise()` iterates a snapshot: listeners added or removed during a
//!    raise take effect on the next raise.
//! 3. An [`Unsubscribe`] cancels at most once, whether run explicitly or on
//!    drop.
//! 4. After `close()`, new registrations fail with
//!    [`ChainError::SourceClosed`].

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::ChainError;

/// The payload of a raw change event: the name of the field that changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangeNotification {
    field_name: String,
}

impl ChangeNotification {
    /// Create a notification for `field_name`.
    #[must_use]
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
        }
    }

    /// Name of the changed field.
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }
}

impl fmt::Display for ChangeNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} changed", self.field_name)
    }
}

/// A registered change callback.
pub type ChangeHandler = Rc<dyn Fn(&ChangeNotification)>;

/// Identifier of one registration in a [`ChangeListeners`] list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Raw numeric value, unique within the owning list.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Cancellation half of a registration/cancellation pair.
///
/// The cancellation runs exactly once: on [`unsubscribe`](Self::unsubscribe)
/// or, failing that, on drop.
#[must_use = "dropping an Unsubscribe cancels the registration immediately"]
pub struct Unsubscribe {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Unsubscribe {
    /// Wrap a cancellation closure.
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Run the cancellation now.
    pub fn unsubscribe(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

struct ListenersInner {
    next_id: u64,
    entries: Vec<(ListenerId, ChangeHandler)>,
    closed: bool,
}

/// Ordered observer list for change notifications.
///
/// Cloning creates a new handle to the **same** list.
#[derive(Clone)]
pub struct ChangeListeners {
    inner: Rc<RefCell<ListenersInner>>,
}

impl Default for ChangeListeners {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ChangeListeners")
            .field("listeners", &inner.entries.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

impl ChangeListeners {
    /// Create an empty, open list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ListenersInner {
                next_id: 0,
                entries: Vec::new(),
                closed: false,
            })),
        }
    }

    /// Register a callback.
    ///
    /// # Errors
    ///
    /// [`ChainError::SourceClosed`] if the list was closed.
    pub fn subscribe(
        &self,
        handler: impl Fn(&ChangeNotification) + 'static,
    ) -> Result<Unsubscribe, ChainError> {
        self.add(Rc::new(handler))
    }

    /// Register an already shared callback.
    ///
    /// # Errors
    ///
    /// [`ChainError::SourceClosed`] if the list was closed.
    pub fn add(&self, handler: ChangeHandler) -> Result<Unsubscribe, ChainError> {
        let id = {
            let mut inner = self.inner.borrow_mut();
            if inner.closed {
                return Err(ChainError::SourceClosed);
            }
            let id = ListenerId(inner.next_id);
            inner.next_id += 1;
            inner.entries.push((id, handler));
            id
        };
        let weak: Weak<RefCell<ListenersInner>> = Rc::downgrade(&self.inner);
        Ok(Unsubscribe::new(move || {
            if let Some(inner) = weak.upgrade() {
                drop(take_entry(&inner, id));
            }
        }))
    }

    /// Remove a registration by id. Returns whether it was present.
    pub fn remove(&self, id: ListenerId) -> bool {
        take_entry(&self.inner, id).is_some()
    }

    /// The currently registered callbacks, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(ListenerId, ChangeHandler)> {
        self.inner.borrow().entries.clone()
    }

    /// Invoke every registered callback with `notification`.
    pub fn raise(&self, notification: &ChangeNotification) {
        for (_, handler) in self.snapshot() {
            handler(notification);
        }
    }

    /// Shorthand for raising a notification for `field_name`.
    pub fn raise_field(&self, field_name: &str) {
        self.raise(&ChangeNotification::new(field_name));
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Whether no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// Tear the list down: drop all callbacks and refuse new ones.
    pub fn close(&self) {
        let dropped = {
            let mut inner = self.inner.borrow_mut();
            inner.closed = true;
            std::mem::take(&mut inner.entries)
        };
        // Callbacks may own other lists; drop them outside the borrow.
        drop(dropped);
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }
}

// Removed handlers are returned rather than dropped under the borrow: a
// handler may own an `Unsubscribe` for this same list.
fn take_entry(inner: &RefCell<ListenersInner>, id: ListenerId) -> Option<ChangeHandler> {
    let mut inner = inner.borrow_mut();
    let pos = inner.entries.iter().position(|(entry, _)| *entry == id)?;
    Some(inner.entries.remove(pos).1)
}

/// Observable-source capability: something that emits change notifications.
pub trait ChangeSource {
    /// Register `handler` for every change notification this source emits.
    ///
    /// # Errors
    ///
    /// [`ChainError::SourceClosed`] if the source was torn down.
    fn subscribe_to_changes(&self, handler: ChangeHandler) -> Result<Unsubscribe, ChainError>;
}

/// Listener-enumeration capability of a notify target.
///
/// Returning `None` means the type does not expose its listeners; notify sinks
/// refuse such targets at setup.
pub trait NotifyChanged {
    /// The type's change listener list.
    fn change_listeners(&self) -> Option<&ChangeListeners>;
}

impl ChangeSource for ChangeListeners {
    fn subscribe_to_changes(&self, handler: ChangeHandler) -> Result<Unsubscribe, ChainError> {
        self.add(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn raise_reaches_listeners_in_order() {
        let listeners = ChangeListeners::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let log1 = Rc::clone(&log);
        let _a = listeners
            .subscribe(move |n| log1.borrow_mut().push(format!("a:{}", n.field_name())))
            .unwrap();
        let log2 = Rc::clone(&log);
        let _b = listeners
            .subscribe(move |n| log2.borrow_mut().push(format!("b:{}", n.field_name())))
            .unwrap();

        listeners.raise_field("Id");
        assert_eq!(*log.borrow(), vec!["a:Id", "b:Id"]);
    }

    #[test]
    fn unsubscribe_runs_once() {
        let count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&count);
        let unsub = Unsubscribe::new(move || count_clone.set(count_clone.get() + 1));
        unsub.unsubscribe();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn dropping_unsubscribe_removes_listener() {
        let listeners = ChangeListeners::new();
        let unsub = listeners.subscribe(|_| {}).unwrap();
        assert_eq!(listeners.len(), 1);
        drop(unsub);
        assert!(listeners.is_empty());
    }

    #[test]
    fn snapshot_exposes_ids_in_registration_order() {
        let listeners = ChangeListeners::new();
        let _a = listeners.subscribe(|_| {}).unwrap();
        let _b = listeners.subscribe(|_| {}).unwrap();
        let ids: Vec<u64> = listeners.snapshot().iter().map(|(id, _)| id.get()).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn remove_by_id() {
        let listeners = ChangeListeners::new();
        let hits = Rc::new(Cell::new(0u32));
        let hits_clone = Rc::clone(&hits);
        let _keep = listeners
            .subscribe(move |_| hits_clone.set(hits_clone.get() + 1))
            .unwrap();
        let id = listeners.snapshot()[0].0;

        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        listeners.raise_field("Id");
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn listener_added_during_raise_waits_for_next_raise() {
        let listeners = ChangeListeners::new();
        let late_hits = Rc::new(Cell::new(0u32));
        let held = Rc::new(RefCell::new(Vec::new()));

        let list = listeners.clone();
        let late = Rc::clone(&late_hits);
        let held_clone = Rc::clone(&held);
        let _outer = listeners
            .subscribe(move |_| {
                let late = Rc::clone(&late);
                let unsub = list
                    .subscribe(move |_| late.set(late.get() + 1))
                    .unwrap();
                held_clone.borrow_mut().push(unsub);
            })
            .unwrap();

        listeners.raise_field("Id");
        assert_eq!(late_hits.get(), 0);
        listeners.raise_field("Id");
        assert_eq!(late_hits.get(), 1);
    }

    #[test]
    fn closed_list_refuses_subscriptions() {
        let listeners = ChangeListeners::new();
        let _sub = listeners.subscribe(|_| {}).unwrap();
        listeners.close();
        assert!(listeners.is_closed());
        assert!(listeners.is_empty());
        assert_eq!(
            listeners.subscribe(|_| {}).unwrap_err(),
            ChainError::SourceClosed
        );
    }

    #[test]
    fn unsubscribe_after_list_dropped_is_harmless() {
        let listeners = ChangeListeners::new();
        let unsub = listeners.subscribe(|_| {}).unwrap();
        drop(listeners);
        unsub.unsubscribe();
    }

    #[test]
    fn notification_display() {
        assert_eq!(ChangeNotification::new("Age").to_string(), "Age changed");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn notification_serializes_field_name() {
        let json = serde_json::to_string(&ChangeNotification::new("Id")).unwrap();
        assert_eq!(json, r#"{"field_name":"Id"}"#);
    }
}
