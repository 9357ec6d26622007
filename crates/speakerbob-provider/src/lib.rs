//! Generic persistence orchestrator for Speakerbob entities.
//!
//! Each entity type implements [`Record`], a compile-time descriptor of its
//! primary key, searchable text, lookup fields and lazy blob fields. A
//! [`Provider<T>`] then keeps an authoritative in-memory mirror of every
//! record of that type, consistent with the durable store under concurrent
//! access.
//!
//! # Key Types
//!
//! - [`Provider`] -- cache, prefix search and lookups over one record type
//! - [`Record`] -- per-type field descriptor
//! - [`LookupField`] -- a single- or multi-valued secondary key
//! - [`ProviderError`] -- store, decode and declaration errors
//!
//! # Locking
//!
//! Each provider owns exactly one reader/writer lock over its cache, index
//! and lookup maps. Reads take it shared and never do I/O. Writes take it
//! exclusively for their full duration, store I/O included. Providers of
//! different types never contend with each other.

pub mod error;
pub mod provider;
pub mod record;

pub use error::{ProviderError, ProviderResult};
pub use provider::Provider;
pub use record::{LookupField, Record};
