//! Durable key-value storage for Speakerbob.
//!
//! This crate provides the bottom layer every domain entity is persisted
//! through: a hierarchical key scheme and a uniform interface over an
//! embedded key-value engine.
//!
//! # Keys
//!
//! - [`TypeKey`] -- an entity type; its object prefix scans all records of the type
//! - [`ObjectKey`] -- one record's metadata
//! - [`FieldKey`] -- one lazily stored blob field of a record
//!
//! # Storage Backends
//!
//! All backends implement the [`DurableStore`] trait:
//!
//! - [`InMemoryStore`] -- `BTreeMap`-based store for tests and embedding
//! - [`RedbStore`] -- redb database file with MVCC read snapshots
//!
//! # Design Rules
//!
//! 1. Keys are opaque: they are compared by equality and prefix, never decoded.
//! 2. Multi-key writes and deletes are atomic.
//! 3. Reads may run concurrently with writes; isolation is the engine's job.
//! 4. The store never interprets values.
//! 5. All I/O errors are propagated, never retried or silently ignored.
//! 6. One store handle per process, shared by reference; no globals.

pub mod config;
pub mod error;
pub mod key;
pub mod memory;
pub mod redb_store;
pub mod traits;
pub mod version;

pub use config::{open_store, Backend, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use key::{FieldKey, Key, ObjectKey, TypeKey};
pub use memory::InMemoryStore;
pub use redb_store::RedbStore;
pub use traits::{DurableStore, Visitor};
pub use version::{ensure_schema_version, read_schema_version, write_schema_version};
