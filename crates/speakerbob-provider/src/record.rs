//! Per-entity descriptors: which fields are the key, searchable, looked up,
//! or stored lazily.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ProviderError, ProviderResult};

/// A secondary field indexed for O(1) retrieval by value.
///
/// `values` extracts the field's current values from a record. Single-valued
/// fields must yield at most one non-empty value, and saving a record that
/// breaks this fails. Multi-valued fields (e.g. a user's bound external
/// identities) yield one entry per value, each mapping back to the same
/// record. Empty strings are never indexed.
pub struct LookupField<T> {
    pub name: &'static str,
    pub multi: bool,
    pub values: fn(&T) -> Vec<String>,
}

impl<T> LookupField<T> {
    pub const fn single(name: &'static str, values: fn(&T) -> Vec<String>) -> Self {
        Self {
            name,
            multi: false,
            values,
        }
    }

    pub const fn multi(name: &'static str, values: fn(&T) -> Vec<String>) -> Self {
        Self {
            name,
            multi: true,
            values,
        }
    }
}

impl<T> LookupField<T> {
    /// The non-empty values of this field in `record`.
    pub fn values_of(&self, record: &T) -> Vec<String> {
        let mut values = (self.values)(record);
        values.retain(|value| !value.is_empty());
        values
    }

    /// Fails if a single-valued field yields more than one value for `record`.
    pub fn check(&self, record: &T) -> ProviderResult<()> {
        if self.multi {
            return Ok(());
        }
        let count = self.values_of(record).len();
        if count > 1 {
            return Err(ProviderError::LookupArity {
                field: self.name,
                count,
            });
        }
        Ok(())
    }
}

impl<T> std::fmt::Debug for LookupField<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupField")
            .field("name", &self.name)
            .field("multi", &self.multi)
            .finish()
    }
}

/// A domain type persisted through a [`Provider`](crate::Provider).
///
/// Records are serialized by field name (JSON), so reordering struct fields
/// never corrupts stored data. Lazy fields are not part of the serialized
/// record: they live under their own field keys and are streamed on demand.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Package half of the type key, e.g. `"sound"`.
    const PACKAGE: &'static str;
    /// Type half of the type key, e.g. `"Sound"`.
    const TYPE_NAME: &'static str;
    /// Declared lookup fields.
    const LOOKUPS: &'static [LookupField<Self>] = &[];
    /// Declared lazy blob fields.
    const LAZY_FIELDS: &'static [&'static str] = &[];

    /// The primary id. Assigned at creation and never changed.
    fn key(&self) -> &str;

    /// Text indexed for prefix search, if the type has a searchable field.
    fn searchable(&self) -> Option<&str> {
        None
    }
}
