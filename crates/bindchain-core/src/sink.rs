#![forbid(unsafe_code)]

//! Sinks that apply stream values to target objects.
//!
//! | Sink | Writes the field | Fires the target's listeners |
//! |------|------------------|------------------------------|
//! | [`assign_to`] | yes | no |
//! | [`raise_changed`] | no | yes |
//! | [`assign_and_raise_changed`] | yes, first | yes, after the write |
//!
//! All three resolve everything they need when wired and fail then, never
//! per value. They hold the target weakly: values arriving after the target
//! was dropped are ignored.

use std::any::type_name;
use std::rc::Rc;

use tracing::debug;

use crate::change::{ChangeNotification, NotifyChanged};
use crate::error::{Capability, ChainError, SelectorProblem};
use crate::field::FieldSet;
use crate::stream::{Stream, SubscriptionHandle};

/// Write every value of `stream` into `field` of `target` without notifying.
///
/// # Errors
///
/// - [`ChainError::SelectorResolution`] if `field` does not name exactly one
///   field of `T` with the stream's value type.
/// - [`ChainError::MissingCapability`] if that field has no setter.
pub fn assign_to<St, T>(
    stream: &St,
    target: &Rc<T>,
    field: &str,
) -> Result<SubscriptionHandle, ChainError>
where
    St: Stream + ?Sized,
    St::Item: Clone,
    T: FieldSet,
{
    let write = resolve_writer::<T, St::Item>(field)?;
    let target = Rc::downgrade(target);
    debug!(target_type = type_name::<T>(), field, "assign sink wired");
    Ok(stream.subscribe_observer(Rc::new(move |value: &St::Item| {
        if let Some(target) = target.upgrade() {
            write(&target, value.clone());
        }
    })))
}

/// Fire `target`'s change listeners for `field` on every value of `stream`.
///
/// The values themselves are ignored; the stream acts as a trigger.
///
/// # Errors
///
/// - [`ChainError::SelectorResolution`] if `field` is empty.
/// - [`ChainError::MissingCapability`] if `target` does not expose its
///   listeners.
pub fn raise_changed<St, T>(
    stream: &St,
    target: &Rc<T>,
    field: &str,
) -> Result<SubscriptionHandle, ChainError>
where
    St: Stream + ?Sized,
    T: NotifyChanged + 'static,
{
    let notification = notification_for(target.as_ref(), field)?;
    let target = Rc::downgrade(target);
    debug!(target_type = type_name::<T>(), field, "raise sink wired");
    Ok(stream.subscribe_observer(Rc::new(move |_: &St::Item| {
        if let Some(target) = target.upgrade() {
            invoke_listeners(target.as_ref(), &notification);
        }
    })))
}

/// Write every value into `field` of `target`, then fire its listeners for
/// that field. Listeners observe the new value.
///
/// # Errors
///
/// Any error of [`assign_to`] or [`raise_changed`].
pub fn assign_and_raise_changed<St, T>(
    stream: &St,
    target: &Rc<T>,
    field: &str,
) -> Result<SubscriptionHandle, ChainError>
where
    St: Stream + ?Sized,
    St::Item: Clone,
    T: FieldSet + NotifyChanged,
{
    let write = resolve_writer::<T, St::Item>(field)?;
    let notification = notification_for(target.as_ref(), field)?;
    let target = Rc::downgrade(target);
    debug!(target_type = type_name::<T>(), field, "assign-and-raise sink wired");
    Ok(stream.subscribe_observer(Rc::new(move |value: &St::Item| {
        if let Some(target) = target.upgrade() {
            write(&target, value.clone());
            invoke_listeners(target.as_ref(), &notification);
        }
    })))
}

fn resolve_writer<T: FieldSet, V: 'static>(field: &str) -> Result<fn(&T, V), ChainError> {
    T::field_table()
        .resolve::<V>(field)?
        .writer()
        .ok_or_else(|| ChainError::missing(type_name::<T>(), field, Capability::Writer))
}

fn notification_for<T: NotifyChanged>(
    target: &T,
    field: &str,
) -> Result<ChangeNotification, ChainError> {
    if field.is_empty() {
        return Err(ChainError::selector(
            type_name::<T>(),
            field,
            SelectorProblem::Empty,
        ));
    }
    if target.change_listeners().is_none() {
        return Err(ChainError::missing(
            type_name::<T>(),
            field,
            Capability::ListenerEnumeration,
        ));
    }
    Ok(ChangeNotification::new(field))
}

fn invoke_listeners<T: NotifyChanged>(target: &T, notification: &ChangeNotification) {
    let Some(listeners) = target.change_listeners() else {
        return;
    };
    for (_, listener) in listeners.snapshot() {
        listener(notification);
    }
}
