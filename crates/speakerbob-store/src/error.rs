use crate::key::Key;

/// Errors from durable store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested key is absent from the store.
    #[error("key not found: {0:?}")]
    NotFound(Key),

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from a reader, writer, or the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by the underlying storage engine.
    #[error("backend error: {0}")]
    Backend(String),

    /// A key component cannot be encoded (e.g. exceeds its length field).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The store has been closed and no longer accepts operations.
    #[error("store is closed")]
    Closed,

    /// The store configuration is unreadable or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// The store was written by an incompatible schema version.
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: u32, found: u32 },
}

impl StoreError {
    /// Returns `true` for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

macro_rules! backend_error {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for StoreError {
                fn from(err: $source) -> Self {
                    StoreError::Backend(err.to_string())
                }
            }
        )+
    };
}

backend_error!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
