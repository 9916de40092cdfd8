#![forbid(unsafe_code)]

//! Per-field streams fanned out from a single change subscription.
//!
//! # Design
//!
//! [`ChainRegistry<S>`] subscribes exactly once to a source's change
//! notifications and keeps an ordered list of field stream entries. Each call
//! to [`request_field_stream`](ChainRegistry::request_field_stream) appends a
//! fresh entry, even when another entry already watches the same field. When a
//! notification arrives, every entry whose field name equals the notified name
//! (exact, case-sensitive) re-reads its field from the source and publishes.
//!
//! The handler installed on the source holds only a `Weak` reference to the
//! registry, so the source never keeps the registry alive.
//!
//! # Invariants
//!
//! 1. While not disposed, the registry holds exactly one subscription on the
//!    source; after disposal, none.
//! 2. `dispose()` unsubscribes at most once; later calls are no-ops.
//! 3. Dispatch visits entries in creation order and reads the field once per
//!    matching entry.
//! 4. Delivery after disposal is dropped silently.
//!
//! # Failure Modes
//!
//! - **Disposal during dispatch**: disposing the registry from inside one of
//!   its own subscribers stops future dispatches; entries already matched for
//!   the notification in flight still publish.
//! - **Cycles**: a registry whose chain writes back into its own source (or
//!   into another registry feeding it) recurses until the values settle or the
//!   stack overflows.

use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, trace_span};

use crate::change::{ChangeHandler, ChangeNotification, ChangeSource, Unsubscribe};
use crate::error::ChainError;
use crate::field::{FieldDescriptor, FieldSet};
use crate::stream::{Observer, Publisher, Stream, SubscriptionHandle};

/// Type-erased view of a field stream entry used during dispatch.
trait FieldEntry<S> {
    fn field_name(&self) -> &str;
    fn refresh(&self, source: &S);
}

struct RegistryInner<S> {
    source: Rc<S>,
    entries: RefCell<Vec<Rc<dyn FieldEntry<S>>>>,
    subscription: RefCell<Option<Unsubscribe>>,
    disposed: Cell<bool>,
}

impl<S> RegistryInner<S> {
    fn dispatch(&self, notification: &ChangeNotification) {
        if self.disposed.get() {
            return;
        }
        let matched: Vec<Rc<dyn FieldEntry<S>>> = self
            .entries
            .borrow()
            .iter()
            .filter(|entry| entry.field_name() == notification.field_name())
            .cloned()
            .collect();
        let _span = trace_span!(
            "dispatch",
            field = notification.field_name(),
            matched = matched.len()
        )
        .entered();
        for entry in matched {
            entry.refresh(&self.source);
        }
    }
}

/// Fan-out of one change source into independently subscribable field
/// streams.
///
/// Dropping the registry disposes it.
pub struct ChainRegistry<S: ChangeSource + FieldSet> {
    inner: Rc<RegistryInner<S>>,
}

impl<S: ChangeSource + FieldSet> fmt::Debug for ChainRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainRegistry")
            .field("source", &type_name::<S>())
            .field("entries", &self.entry_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl<S: ChangeSource + FieldSet> ChainRegistry<S> {
    /// Bind to `source` and subscribe to its change notifications.
    ///
    /// # Errors
    ///
    /// Whatever the source's subscription fails with, typically
    /// [`ChainError::SourceClosed`].
    pub fn new(source: Rc<S>) -> Result<Self, ChainError> {
        let inner = Rc::new(RegistryInner {
            source,
            entries: RefCell::new(Vec::new()),
            subscription: RefCell::new(None),
            disposed: Cell::new(false),
        });

        let weak: Weak<RegistryInner<S>> = Rc::downgrade(&inner);
        let handler: ChangeHandler = Rc::new(move |notification: &ChangeNotification| {
            if let Some(inner) = weak.upgrade() {
                inner.dispatch(notification);
            }
        });
        let subscription = inner.source.subscribe_to_changes(handler)?;
        *inner.subscription.borrow_mut() = Some(subscription);

        debug!(source = type_name::<S>(), "chain registry created");
        Ok(Self { inner })
    }

    /// Create a new stream for the field named `selector`.
    ///
    /// # Errors
    ///
    /// - [`ChainError::Disposed`] if the registry was disposed.
    /// - [`ChainError::SelectorResolution`] if `selector` does not name
    ///   exactly one field of `S` with value type `V`.
    pub fn request_field_stream<V: Clone + 'static>(
        &self,
        selector: &str,
    ) -> Result<FieldStream<S, V>, ChainError> {
        if self.is_disposed() {
            return Err(ChainError::Disposed);
        }
        let descriptor = S::field_table().resolve::<V>(selector)?;
        let entry = Rc::new(FieldStreamEntry {
            descriptor,
            source: Rc::downgrade(&self.inner.source),
            publisher: Publisher::new(),
        });
        self.inner
            .entries
            .borrow_mut()
            .push(Rc::clone(&entry) as Rc<dyn FieldEntry<S>>);
        trace!(field = selector, entries = self.entry_count(), "field stream requested");
        Ok(FieldStream { entry })
    }

    /// Feed a notification through the registry as if the source raised it.
    pub fn dispatch(&self, notification: &ChangeNotification) {
        self.inner.dispatch(notification);
    }

    /// Unsubscribe from the source. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        let subscription = self.inner.subscription.borrow_mut().take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        debug!(source = type_name::<S>(), "chain registry disposed");
    }

    /// Whether [`dispose`](Self::dispose) was called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// The bound source.
    #[must_use]
    pub fn source(&self) -> &Rc<S> {
        &self.inner.source
    }

    /// Number of field stream entries created so far.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.inner.entries.borrow().len()
    }
}

impl<S: ChangeSource + FieldSet> Drop for ChainRegistry<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

struct FieldStreamEntry<S, V> {
    descriptor: FieldDescriptor<S, V>,
    source: Weak<S>,
    publisher: Publisher<V>,
}

impl<S, V: Clone + 'static> FieldEntry<S> for FieldStreamEntry<S, V> {
    fn field_name(&self) -> &str {
        self.descriptor.name()
    }

    fn refresh(&self, source: &S) {
        self.publisher.publish(self.descriptor.read(source));
    }
}

/// Stream of one field's values, replaying the latest to new subscribers.
///
/// Before the first notification, a new subscriber receives the field's
/// current value, read at subscribe time.
pub struct FieldStream<S, V> {
    entry: Rc<FieldStreamEntry<S, V>>,
}

impl<S, V> Clone for FieldStream<S, V> {
    fn clone(&self) -> Self {
        Self {
            entry: Rc::clone(&self.entry),
        }
    }
}

impl<S, V: fmt::Debug> fmt::Debug for FieldStream<S, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldStream")
            .field("field", &self.entry.descriptor.name())
            .field("publisher", &self.entry.publisher)
            .finish()
    }
}

impl<S, V: Clone + 'static> FieldStream<S, V> {
    /// Name of the watched field.
    #[must_use]
    pub fn field_name(&self) -> &'static str {
        self.entry.descriptor.name()
    }

    /// Whether anything is subscribed to this stream.
    #[must_use]
    pub fn has_observers(&self) -> bool {
        self.entry.publisher.has_observers()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.entry.publisher.subscriber_count()
    }

    /// Number of values published from notifications.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.entry.publisher.version()
    }

    /// The most recently published value. `None` until the first matching
    /// notification; new subscribers then read the field directly.
    #[must_use]
    pub fn latest(&self) -> Option<V> {
        self.entry.publisher.latest()
    }
}

impl<S: 'static, V: Clone + 'static> Stream for FieldStream<S, V> {
    type Item = V;

    fn subscribe_observer(&self, observer: Observer<V>) -> SubscriptionHandle {
        let entry = &self.entry;
        entry.publisher.attach_seeded(observer, || {
            entry
                .source
                .upgrade()
                .map(|source| entry.descriptor.read(&source))
        })
    }
}

/// `source.change_chain()` shorthand for [`ChainRegistry::new`].
pub trait AsChangeChain<S: ChangeSource + FieldSet> {
    /// Build a chain registry bound to this source.
    ///
    /// # Errors
    ///
    /// See [`ChainRegistry::new`].
    fn change_chain(&self) -> Result<ChainRegistry<S>, ChainError>;
}

impl<S: ChangeSource + FieldSet> AsChangeChain<S> for Rc<S> {
    fn change_chain(&self) -> Result<ChainRegistry<S>, ChainError> {
        ChainRegistry::new(Rc::clone(self))
    }
}
