#![forbid(unsafe_code)]

//! Replay-latest streams and their combinators.
//!
//! # Design
//!
//! [`Publisher<V>`] is the multicast core behind every field stream: it keeps
//! the most recently published value and an ordered list of subscribers in
//! shared, reference-counted storage (`Rc<RefCell<..>>`). Subscribing replays
//! the latest value synchronously before returning. Publishing delivers to a
//! snapshot of the subscriber list taken when the publish starts.
//!
//! The [`Stream`] trait is the seam sinks and combinators are written
//! against; [`StreamExt`] adds `map`, `filter`, `distinct_until_changed`, and
//! the write/notify sinks from [`crate::sink`].
//!
//! # Invariants
//!
//! 1. Subscribers are notified in subscription order.
//! 2. A subscriber disposed during a publish receives nothing further, not
//!    even the value currently being delivered to earlier subscribers.
//! 3. A subscriber added during a publish does not see that publish; it gets
//!    the value through replay instead.
//! 4. `version` increments by exactly 1 per publish.
//!
//! # Failure Modes
//!
//! - **Panicking subscriber**: the panic unwinds through `publish()` to the
//!   dispatch caller. Subscribers after it do not receive that value. The
//!   latest value is already stored, so later subscribers still see it
//!   through replay.
//! - **Cyclic chains**: a subscriber that republishes into a stream feeding
//!   itself recurses without bound. Breaking cycles (for example with
//!   `distinct_until_changed`) is the caller's job.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::change::NotifyChanged;
use crate::error::ChainError;
use crate::field::FieldSet;
use crate::sink;

/// A subscriber callback.
pub type Observer<V> = Rc<dyn Fn(&V)>;

struct SubscriberSlot<V> {
    id: u64,
    alive: Rc<Cell<bool>>,
    observer: Observer<V>,
}

struct PublisherInner<V> {
    latest: Option<V>,
    version: u64,
    next_id: u64,
    subscribers: Vec<SubscriberSlot<V>>,
}

/// Multicast publisher with replay of the latest value.
///
/// Cloning creates a new handle to the **same** publisher.
pub struct Publisher<V> {
    inner: Rc<RefCell<PublisherInner<V>>>,
}

impl<V> Clone for Publisher<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Publisher<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Publisher")
            .field("latest", &inner.latest)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<V: Clone + 'static> Default for Publisher<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + 'static> Publisher<V> {
    /// Create a publisher that has not published anything yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(PublisherInner {
                latest: None,
                version: 0,
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// The most recently published value.
    #[must_use]
    pub fn latest(&self) -> Option<V> {
        self.inner.borrow().latest.clone()
    }

    /// Number of publishes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of attached subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Whether any subscriber is attached.
    #[must_use]
    pub fn has_observers(&self) -> bool {
        self.subscriber_count() > 0
    }

    /// Store `value` as the latest and deliver it to current subscribers.
    pub fn publish(&self, value: V) {
        let targets: Vec<(Rc<Cell<bool>>, Observer<V>)> = {
            let mut inner = self.inner.borrow_mut();
            inner.latest = Some(value.clone());
            inner.version += 1;
            inner
                .subscribers
                .iter()
                .map(|slot| (Rc::clone(&slot.alive), Rc::clone(&slot.observer)))
                .collect()
        };
        trace!(subscribers = targets.len(), "publish");
        for (alive, observer) in &targets {
            if alive.get() {
                observer(&value);
            }
        }
    }

    /// Attach `observer` and replay the latest value to it.
    pub fn attach(&self, observer: Observer<V>) -> SubscriptionHandle {
        self.attach_seeded(observer, || None)
    }

    /// Attach `observer`, replaying the latest value, or `seed()` if nothing
    /// was published yet. The seeded value is delivered to this observer only;
    /// it is not stored and does not count as a publish.
    pub fn attach_seeded(
        &self,
        observer: Observer<V>,
        seed: impl FnOnce() -> Option<V>,
    ) -> SubscriptionHandle {
        let alive = Rc::new(Cell::new(true));
        let (id, latest) = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push(SubscriberSlot {
                id,
                alive: Rc::clone(&alive),
                observer: Rc::clone(&observer),
            });
            (id, inner.latest.clone())
        };

        let handle = self.handle_for(id, Rc::clone(&alive));

        // A seed is never cached: until the first publish, every subscriber
        // reads the field afresh.
        let replay = latest.or_else(seed);
        if let Some(value) = replay
            && alive.get()
        {
            observer(&value);
        }
        handle
    }

    fn handle_for(&self, id: u64, alive: Rc<Cell<bool>>) -> SubscriptionHandle {
        let weak: Weak<RefCell<PublisherInner<V>>> = Rc::downgrade(&self.inner);
        SubscriptionHandle::new(move || {
            alive.set(false);
            if let Some(inner) = weak.upgrade() {
                let removed = {
                    let mut inner = inner.borrow_mut();
                    let pos = inner.subscribers.iter().position(|slot| slot.id == id);
                    pos.map(|pos| inner.subscribers.remove(pos))
                };
                // The observer may own handles into this publisher.
                drop(removed);
            }
        })
    }
}

/// Link between one subscriber and one publisher.
///
/// Disposing (explicitly or by dropping the handle) detaches only this
/// subscriber. Disposal is idempotent and may happen from inside the
/// subscriber's own callback.
#[must_use = "dropping a SubscriptionHandle unsubscribes immediately"]
pub struct SubscriptionHandle {
    cancel: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl SubscriptionHandle {
    fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: RefCell::new(Some(Box::new(cancel))),
        }
    }

    /// Detach the subscriber.
    pub fn dispose(&self) {
        let cancel = self.cancel.borrow_mut().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Whether [`dispose`](Self::dispose) already ran.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.cancel.borrow().is_none()
    }

    /// Drop the handle while leaving the subscriber attached for as long as
    /// its publisher lives.
    pub fn forget(self) {
        drop(self.cancel.borrow_mut().take());
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A source of values that replays to new subscribers.
pub trait Stream {
    /// Value type carried by the stream.
    type Item: 'static;

    /// Attach a shared observer.
    fn subscribe_observer(&self, observer: Observer<Self::Item>) -> SubscriptionHandle;
}

impl<V: Clone + 'static> Stream for Publisher<V> {
    type Item = V;

    fn subscribe_observer(&self, observer: Observer<V>) -> SubscriptionHandle {
        self.attach(observer)
    }
}

/// Combinators and sinks available on every [`Stream`].
pub trait StreamExt: Stream + Sized {
    /// Attach a closure.
    fn subscribe(&self, observer: impl Fn(&Self::Item) + 'static) -> SubscriptionHandle {
        self.subscribe_observer(Rc::new(observer))
    }

    /// Transform each value.
    fn map<U, F>(self, f: F) -> Map<Self, F>
    where
        F: Fn(&Self::Item) -> U + 'static,
        U: 'static,
    {
        Map {
            source: self,
            f: Rc::new(f),
        }
    }

    /// Keep only values matching `predicate`.
    fn filter<P>(self, predicate: P) -> Filter<Self, P>
    where
        P: Fn(&Self::Item) -> bool + 'static,
    {
        Filter {
            source: self,
            predicate: Rc::new(predicate),
        }
    }

    /// Suppress values equal to the previous one seen by the same subscriber.
    fn distinct_until_changed(self) -> DistinctUntilChanged<Self>
    where
        Self::Item: Clone + PartialEq,
    {
        DistinctUntilChanged { source: self }
    }

    /// Silently write each value into `field` of `target`.
    ///
    /// See [`sink::assign_to`].
    fn assign_to<T: FieldSet>(
        &self,
        target: &Rc<T>,
        field: &str,
    ) -> Result<SubscriptionHandle, ChainError>
    where
        Self::Item: Clone,
    {
        sink::assign_to(self, target, field)
    }

    /// Fire `target`'s change listeners for `field` on each value.
    ///
    /// See [`sink::raise_changed`].
    fn raise_changed<T: NotifyChanged + 'static>(
        &self,
        target: &Rc<T>,
        field: &str,
    ) -> Result<SubscriptionHandle, ChainError> {
        sink::raise_changed(self, target, field)
    }

    /// Write each value into `field` of `target`, then fire its listeners.
    ///
    /// See [`sink::assign_and_raise_changed`].
    fn assign_and_raise_changed<T: FieldSet + NotifyChanged>(
        &self,
        target: &Rc<T>,
        field: &str,
    ) -> Result<SubscriptionHandle, ChainError>
    where
        Self::Item: Clone,
    {
        sink::assign_and_raise_changed(self, target, field)
    }
}

impl<S: Stream> StreamExt for S {}

/// Stream returned by [`StreamExt::map`].
pub struct Map<S, F> {
    source: S,
    f: Rc<F>,
}

impl<S: Clone, F> Clone for Map<S, F> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            f: Rc::clone(&self.f),
        }
    }
}

impl<S, F, U> Stream for Map<S, F>
where
    S: Stream,
    F: Fn(&S::Item) -> U + 'static,
    U: 'static,
{
    type Item = U;

    fn subscribe_observer(&self, observer: Observer<U>) -> SubscriptionHandle {
        let f = Rc::clone(&self.f);
        self.source
            .subscribe_observer(Rc::new(move |value: &S::Item| observer(&f(value))))
    }
}

/// Stream returned by [`StreamExt::filter`].
pub struct Filter<S, P> {
    source: S,
    predicate: Rc<P>,
}

impl<S: Clone, P> Clone for Filter<S, P> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            predicate: Rc::clone(&self.predicate),
        }
    }
}

impl<S, P> Stream for Filter<S, P>
where
    S: Stream,
    P: Fn(&S::Item) -> bool + 'static,
{
    type Item = S::Item;

    fn subscribe_observer(&self, observer: Observer<S::Item>) -> SubscriptionHandle {
        let predicate = Rc::clone(&self.predicate);
        self.source.subscribe_observer(Rc::new(move |value: &S::Item| {
            if predicate(value) {
                observer(value);
            }
        }))
    }
}

/// Stream returned by [`StreamExt::distinct_until_changed`].
///
/// The "previous value" is tracked per subscription, so each subscriber sees
/// its own first value.
#[derive(Clone)]
pub struct DistinctUntilChanged<S> {
    source: S,
}

impl<S> Stream for DistinctUntilChanged<S>
where
    S: Stream,
    S::Item: Clone + PartialEq,
{
    type Item = S::Item;

    fn subscribe_observer(&self, observer: Observer<S::Item>) -> SubscriptionHandle {
        let last: RefCell<Option<S::Item>> = RefCell::new(None);
        self.source.subscribe_observer(Rc::new(move |value: &S::Item| {
            {
                let mut last = last.borrow_mut();
                if last.as_ref() == Some(value) {
                    return;
                }
                *last = Some(value.clone());
            }
            observer(value);
        }))
    }
}
