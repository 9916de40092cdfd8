#![forbid(unsafe_code)]

//! Statically declared field descriptors.
//!
//! A type that takes part in chains declares its fields once, in a
//! [`FieldTable`] returned by [`FieldSet::field_table`]. Each entry pairs a
//! field name with a pure read function and, for writable fields, a setter.
//! Selectors are plain field names resolved against that table when a stream
//! or sink is wired, never while values flow.
//!
//! ```
//! use std::cell::Cell;
//! use std::sync::OnceLock;
//! use bindchain_core::field::{FieldSet, FieldTable};
//!
//! struct Person {
//!     age: Cell<u32>,
//! }
//!
//! impl FieldSet for Person {
//!     fn field_table() -> &'static FieldTable<Self> {
//!         static TABLE: OnceLock<FieldTable<Person>> = OnceLock::new();
//!         TABLE.get_or_init(|| {
//!             FieldTable::builder()
//!                 .read_write("Age", |p: &Person| p.age.get(), |p: &Person, v: u32| p.age.set(v))
//!                 .build()
//!         })
//!     }
//! }
//!
//! let age = Person::field_table().resolve::<u32>("Age").unwrap();
//! let person = Person { age: Cell::new(7) };
//! assert_eq!(age.read(&person), 7);
//! ```

use std::any::{Any, type_name};
use std::fmt;
use std::marker::PhantomData;

use crate::error::{ChainError, SelectorProblem};

/// Read (and optionally write) access to one named field of `T`.
pub struct FieldDescriptor<T, V> {
    name: &'static str,
    read: fn(&T) -> V,
    write: Option<fn(&T, V)>,
}

// Manual impls: fn pointers are Copy regardless of T and V.
impl<T, V> Clone for FieldDescriptor<T, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V> Copy for FieldDescriptor<T, V> {}

impl<T, V> fmt::Debug for FieldDescriptor<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("value_type", &type_name::<V>())
            .field("writable", &self.write.is_some())
            .finish()
    }
}

impl<T, V> FieldDescriptor<T, V> {
    /// A field that can only be read.
    pub const fn read_only(name: &'static str, read: fn(&T) -> V) -> Self {
        Self {
            name,
            read,
            write: None,
        }
    }

    /// A field with both a reader and a setter.
    pub const fn read_write(name: &'static str, read: fn(&T) -> V, write: fn(&T, V)) -> Self {
        Self {
            name,
            read,
            write: Some(write),
        }
    }

    /// The field name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Read the field from `source`.
    pub fn read(&self, source: &T) -> V {
        (self.read)(source)
    }

    /// The setter, if the field is writable.
    #[must_use]
    pub fn writer(&self) -> Option<fn(&T, V)> {
        self.write
    }

    /// Whether the field has a setter.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.write.is_some()
    }
}

struct FieldSlot {
    name: &'static str,
    descriptor: Box<dyn Any + Send + Sync>,
}

/// The declared fields of `T`, built once per type.
pub struct FieldTable<T> {
    slots: Vec<FieldSlot>,
    _marker: PhantomData<fn(&T)>,
}

impl<T> fmt::Debug for FieldTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldTable")
            .field("type", &type_name::<T>())
            .field("fields", &self.slots.iter().map(|s| s.name).collect::<Vec<_>>())
            .finish()
    }
}

impl<T: 'static> FieldTable<T> {
    /// Start declaring fields.
    #[must_use]
    pub fn builder() -> FieldTableBuilder<T> {
        FieldTableBuilder {
            slots: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Resolve `selector` to the single field of that name with value type `V`.
    ///
    /// # Errors
    ///
    /// [`ChainError::SelectorResolution`] if the selector is empty, names no
    /// field, names more than one field, or names a field of another type.
    pub fn resolve<V: 'static>(&self, selector: &str) -> Result<FieldDescriptor<T, V>, ChainError> {
        let fail = |problem| ChainError::selector(type_name::<T>(), selector, problem);
        if selector.is_empty() {
            return Err(fail(SelectorProblem::Empty));
        }
        let mut matches = self.slots.iter().filter(|slot| slot.name == selector);
        let slot = matches.next().ok_or_else(|| fail(SelectorProblem::Unknown))?;
        if matches.next().is_some() {
            return Err(fail(SelectorProblem::Ambiguous));
        }
        slot.descriptor
            .downcast_ref::<FieldDescriptor<T, V>>()
            .copied()
            .ok_or_else(|| fail(SelectorProblem::TypeMismatch))
    }

    /// Declared field names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slots.iter().map(|slot| slot.name)
    }

    /// Number of declared fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no fields are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Builder for [`FieldTable`].
pub struct FieldTableBuilder<T> {
    slots: Vec<FieldSlot>,
    _marker: PhantomData<fn(&T)>,
}

impl<T: 'static> FieldTableBuilder<T> {
    /// Declare a read-only field.
    #[must_use]
    pub fn read_only<V: 'static>(self, name: &'static str, read: fn(&T) -> V) -> Self {
        self.field(FieldDescriptor::read_only(name, read))
    }

    /// Declare a readable and writable field.
    #[must_use]
    pub fn read_write<V: 'static>(
        self,
        name: &'static str,
        read: fn(&T) -> V,
        write: fn(&T, V),
    ) -> Self {
        self.field(FieldDescriptor::read_write(name, read, write))
    }

    /// Declare a field from a prebuilt descriptor.
    #[must_use]
    pub fn field<V: 'static>(mut self, descriptor: FieldDescriptor<T, V>) -> Self {
        self.slots.push(FieldSlot {
            name: descriptor.name(),
            descriptor: Box::new(descriptor),
        });
        self
    }

    /// Finish the table.
    #[must_use]
    pub fn build(self) -> FieldTable<T> {
        FieldTable {
            slots: self.slots,
            _marker: PhantomData,
        }
    }
}

/// Readable/writable-field capability: the type's static field table.
pub trait FieldSet: Sized + 'static {
    /// The fields this type exposes to chains.
    fn field_table() -> &'static FieldTable<Self>;
}
