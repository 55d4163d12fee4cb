//! Key/blob storage backends for the Shelf document store.
//!
//! A backend stores opaque byte blobs under `/`-separated keys and groups
//! them into containers (key prefixes). It never interprets blob contents.
//!
//! # Backends
//!
//! All backends implement the [`StorageBackend`] trait:
//!
//! - [`InMemoryBackend`] -- `BTreeMap`-based store for tests and embedding
//! - [`LocalBackend`] -- one file per blob under a root directory
//!
//! Remote object stores plug in by implementing the same trait.

pub mod error;
pub mod key;
pub mod local;
pub mod memory;
pub mod traits;

pub use error::{BackendError, BackendResult};
pub use local::LocalBackend;
pub use memory::InMemoryBackend;
pub use traits::{copy_container, StorageBackend};
