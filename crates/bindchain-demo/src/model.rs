#![forbid(unsafe_code)]

//! The two objects bound in the walkthrough.
//!
//! [`Source`] raises `Id` from its setter, and only when the value changes.
//! [`Target`] has plain `Id` and `Age` fields whose setters never notify; its
//! listeners fire only when something raises on its behalf.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::OnceLock;

use bindchain_core::{
    ChainError, ChangeHandler, ChangeListeners, ChangeSource, FieldSet, FieldTable, NotifyChanged,
    Unsubscribe,
};

/// Notifying object with a single integer `Id`.
#[derive(Debug, Default)]
pub struct Source {
    id: Cell<i32>,
    listeners: ChangeListeners,
}

impl Source {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    #[must_use]
    pub fn id(&self) -> i32 {
        self.id.get()
    }

    /// Set `Id`, raising a notification if the value changed.
    pub fn set_id(&self, id: i32) {
        if self.id.replace(id) != id {
            self.listeners.raise_field("Id");
        }
    }

    #[must_use]
    pub fn listeners(&self) -> &ChangeListeners {
        &self.listeners
    }
}

impl ChangeSource for Source {
    fn subscribe_to_changes(&self, handler: ChangeHandler) -> Result<Unsubscribe, ChainError> {
        self.listeners.add(handler)
    }
}

impl NotifyChanged for Source {
    fn change_listeners(&self) -> Option<&ChangeListeners> {
        Some(&self.listeners)
    }
}

impl FieldSet for Source {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<Source>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::builder()
                .read_write("Id", |s: &Source| s.id(), Source::set_id)
                .build()
        })
    }
}

/// Plain object with `Id` and `Age`; writes are silent.
#[derive(Debug, Default)]
pub struct Target {
    id: Cell<i32>,
    age: Cell<i32>,
    listeners: ChangeListeners,
}

impl Target {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    #[must_use]
    pub fn id(&self) -> i32 {
        self.id.get()
    }

    pub fn set_id(&self, id: i32) {
        self.id.set(id);
    }

    #[must_use]
    pub fn age(&self) -> i32 {
        self.age.get()
    }

    pub fn set_age(&self, age: i32) {
        self.age.set(age);
    }

    #[must_use]
    pub fn listeners(&self) -> &ChangeListeners {
        &self.listeners
    }
}

impl ChangeSource for Target {
    fn subscribe_to_changes(&self, handler: ChangeHandler) -> Result<Unsubscribe, ChainError> {
        self.listeners.add(handler)
    }
}

impl NotifyChanged for Target {
    fn change_listeners(&self) -> Option<&ChangeListeners> {
        Some(&self.listeners)
    }
}

impl FieldSet for Target {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<Target>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::builder()
                .read_write("Id", |t: &Target| t.id(), Target::set_id)
                .read_write("Age", |t: &Target| t.age(), Target::set_age)
                .build()
        })
    }
}
