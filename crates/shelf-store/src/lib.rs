//! # shelf-store
//!
//! Embedded, session-scoped document store.
//!
//! Entities are encoded with [`shelf_codec`] and kept one blob per entity
//! in a [`StorageBackend`](shelf_backend::StorageBackend):
//!
//! ```text
//! Sessions/{session}/{entity type}/{entity id}.bin
//! ```
//!
//! [`Store`] runs add/query/update/delete directly against the backend.
//! [`Session`] adds a per-session cache of typed collections on top and
//! saves it back as a whole.
//!
//! ```
//! use shelf_backend::InMemoryBackend;
//! use shelf_codec::persist_record;
//! use shelf_store::{impl_entity, Store};
//!
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct User {
//!     id: String,
//!     name: String,
//! }
//!
//! persist_record!(User { id, name });
//! impl_entity!(User, id);
//!
//! let store = Store::new(InMemoryBackend::new());
//! store.add("s1", &User { id: "u1".into(), name: "Ann".into() }).unwrap();
//! store
//!     .update::<User, _, _>("s1", |u| u.id == "u1", |u| u.name = "Bea".into())
//!     .unwrap();
//! let found = store.query::<User, _>("s1", |u| u.id == "u1").unwrap();
//! assert_eq!(found[0].name, "Bea");
//! ```

mod collection;
pub mod config;
pub mod entity;
pub mod error;
pub mod keys;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::{BackendKind, StoreConfig};
pub use entity::{Entity, IdentityValue};
pub use error::{StoreError, StoreResult};
pub use session::Session;
pub use store::Store;

pub use shelf_codec as codec;
