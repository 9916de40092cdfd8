#![forbid(unsafe_code)]

//! Field-level change streams for one-way and two-way data binding.
//!
//! # Role
//! `bindchain-core` turns a single "field X changed" notification from one
//! object into independently subscribable per-field streams, and applies
//! those streams to other objects by writing their fields and, when needed,
//! firing their own change notifications so further chains react. The bound
//! objects never reference each other.
//!
//! # Primary pieces
//! - **[`ChainRegistry`]**: one subscription on a source, fanned out by field
//!   name into [`FieldStream`]s that replay their latest value.
//! - **Sinks** ([`sink`]): `assign_to`, `raise_changed`, and
//!   `assign_and_raise_changed`, also available as [`StreamExt`] methods.
//! - **Capabilities**: [`ChangeSource`] (subscribe to notifications),
//!   [`FieldSet`] (static field table with readers and setters), and
//!   [`NotifyChanged`] (listener enumeration).
//!
//! # Threading
//! Everything runs synchronously on the calling thread. A notification, every
//! publish it causes, and every sink effect form one depth-first call chain.
//! Nothing here is `Send`.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use std::sync::OnceLock;
//! use bindchain_core::{
//!     AsChangeChain, ChainError, ChangeHandler, ChangeListeners, ChangeSource, FieldSet,
//!     FieldTable, NotifyChanged, StreamExt, Unsubscribe,
//! };
//!
//! #[derive(Default)]
//! struct Slider {
//!     value: Cell<i32>,
//!     listeners: ChangeListeners,
//! }
//!
//! impl Slider {
//!     fn set_value(&self, v: i32) {
//!         if self.value.replace(v) != v {
//!             self.listeners.raise_field("Value");
//!         }
//!     }
//! }
//!
//! impl ChangeSource for Slider {
//!     fn subscribe_to_changes(&self, h: ChangeHandler) -> Result<Unsubscribe, ChainError> {
//!         self.listeners.add(h)
//!     }
//! }
//!
//! impl NotifyChanged for Slider {
//!     fn change_listeners(&self) -> Option<&ChangeListeners> {
//!         Some(&self.listeners)
//!     }
//! }
//!
//! impl FieldSet for Slider {
//!     fn field_table() -> &'static FieldTable<Self> {
//!         static TABLE: OnceLock<FieldTable<Slider>> = OnceLock::new();
//!         TABLE.get_or_init(|| {
//!             FieldTable::builder()
//!                 .read_write("Value", |s: &Slider| s.value.get(), Slider::set_value)
//!                 .build()
//!         })
//!     }
//! }
//!
//! let a = Rc::new(Slider::default());
//! let b = Rc::new(Slider::default());
//! let chain = a.change_chain()?;
//! let _binding = chain
//!     .request_field_stream::<i32>("Value")?
//!     .assign_to(&b, "Value")?;
//!
//! a.set_value(42);
//! assert_eq!(b.value.get(), 42);
//! # Ok::<(), ChainError>(())
//! ```

pub mod change;
pub mod error;
pub mod field;
pub mod registry;
pub mod sink;
pub mod stream;

pub use change::{
    ChangeHandler, ChangeListeners, ChangeNotification, ChangeSource, ListenerId, NotifyChanged,
    Unsubscribe,
};
pub use error::{Capability, ChainError, SelectorProblem};
pub use field::{FieldDescriptor, FieldSet, FieldTable, FieldTableBuilder};
pub use registry::{AsChangeChain, ChainRegistry, FieldStream};
pub use stream::{
    DistinctUntilChanged, Filter, Map, Observer, Publisher, Stream, StreamExt, SubscriptionHandle,
};
