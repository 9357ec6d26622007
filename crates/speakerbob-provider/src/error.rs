//! Error types for the provider crate.

use speakerbob_store::StoreError;

/// Errors that can occur during provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The durable store failed; propagated unchanged.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Stored bytes could not be decoded into a record.
    #[error("cannot decode stored {type_name}: {reason}")]
    Deserialization { type_name: String, reason: String },

    /// A record could not be encoded for storage.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The record's primary key is empty.
    #[error("{type_name} record has an empty key")]
    MissingKey { type_name: String },

    /// The named lazy field is not declared by the record type.
    #[error("unknown lazy field: {0}")]
    UnknownLazyField(String),

    /// The named lookup field is not declared by the record type.
    #[error("unknown lookup field: {0}")]
    UnknownLookupField(String),

    /// A single-valued lookup field produced more than one value.
    #[error("lookup field {field} is single-valued but has {count} values")]
    LookupArity { field: &'static str, count: usize },

    /// The record is not in the provider's cache.
    #[error("{type_name} record {id} is not saved")]
    NotCached { type_name: String, id: String },
}

impl ProviderError {
    /// Returns `true` if the underlying store reported a missing key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_not_found())
    }
}

/// Convenience alias for provider results.
pub type ProviderResult<T> = Result<T, ProviderError>;
