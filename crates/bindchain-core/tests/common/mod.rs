//! Shared fixtures: a notifying source and a silent target.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::OnceLock;

use bindchain_core::{
    ChainError, ChangeHandler, ChangeListeners, ChangeNotification, ChangeSource, FieldSet,
    FieldTable, NotifyChanged, Unsubscribe,
};

/// Raises `Id` only when the value actually changes.
#[derive(Default)]
pub struct Notifying {
    pub id: Cell<i32>,
    pub name: RefCell<String>,
    pub listeners: ChangeListeners,
}

impl Notifying {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn set_id(&self, id: i32) {
        if self.id.replace(id) != id {
            self.listeners.raise_field("Id");
        }
    }

    pub fn set_name(&self, name: String) {
        if *self.name.borrow() != name {
            *self.name.borrow_mut() = name;
            self.listeners.raise_field("Name");
        }
    }
}

impl ChangeSource for Notifying {
    fn subscribe_to_changes(&self, handler: ChangeHandler) -> Result<Unsubscribe, ChainError> {
        self.listeners.add(handler)
    }
}

impl NotifyChanged for Notifying {
    fn change_listeners(&self) -> Option<&ChangeListeners> {
        Some(&self.listeners)
    }
}

impl FieldSet for Notifying {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<Notifying>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::builder()
                .read_write("Id", |s: &Notifying| s.id.get(), Notifying::set_id)
                .read_write(
                    "Name",
                    |s: &Notifying| s.name.borrow().clone(),
                    Notifying::set_name,
                )
                .build()
        })
    }
}

/// Plain fields; writes never raise anything on their own.
#[derive(Default)]
pub struct Silent {
    pub id: Cell<i32>,
    pub age: Cell<i32>,
    pub listeners: ChangeListeners,
}

impl Silent {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }
}

impl ChangeSource for Silent {
    fn subscribe_to_changes(&self, handler: ChangeHandler) -> Result<Unsubscribe, ChainError> {
        self.listeners.add(handler)
    }
}

impl NotifyChanged for Silent {
    fn change_listeners(&self) -> Option<&ChangeListeners> {
        Some(&self.listeners)
    }
}

impl FieldSet for Silent {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<Silent>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::builder()
                .read_write("Id", |s: &Silent| s.id.get(), |s: &Silent, v: i32| s.id.set(v))
                .read_write("Age", |s: &Silent| s.age.get(), |s: &Silent, v: i32| s.age.set(v))
                .build()
        })
    }
}

/// Records every notification a list raises.
pub fn record_notifications(
    listeners: &ChangeListeners,
) -> (Rc<RefCell<Vec<String>>>, Unsubscribe) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let unsub = listeners
        .subscribe(move |n: &ChangeNotification| sink.borrow_mut().push(n.field_name().to_string()))
        .expect("fixture list is open");
    (log, unsub)
}
