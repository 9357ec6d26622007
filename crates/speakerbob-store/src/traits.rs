use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::error::StoreResult;
use crate::key::{FieldKey, Key};

/// Callback invoked once per raw value during a prefix scan.
pub type Visitor<'a> = dyn FnMut(&[u8]) -> StoreResult<()> + 'a;

/// Durable, crash-consistent key-value storage.
///
/// All implementations must satisfy these invariants:
/// - `bulk_save` and `delete` are atomic: either every key is affected or
///   none is.
/// - `get`, `list` and `read_lazy` may run concurrently with writes and
///   observe a consistent snapshot; isolation is the engine's job, not the
///   caller's.
/// - Errors are propagated verbatim; the store performs no retries on the
///   caller's behalf.
/// - The store never interprets values. It is a pure key-value store.
pub trait DurableStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns [`StoreError::NotFound`](crate::StoreError::NotFound) if the
    /// key is absent.
    fn get(&self, key: &Key) -> StoreResult<Vec<u8>>;

    /// Visit every value whose key starts with `prefix`.
    ///
    /// Order is engine-defined. The scan stops at the first error returned
    /// by `visit`, and that error is returned unchanged.
    fn list(&self, prefix: &[u8], visit: &mut Visitor<'_>) -> StoreResult<()>;

    /// Insert or overwrite a single value.
    fn save(&self, key: &Key, value: &[u8]) -> StoreResult<()> {
        let mut entries = BTreeMap::new();
        entries.insert(key.clone(), value.to_vec());
        self.bulk_save(&entries)
    }

    /// Insert or overwrite several values atomically.
    fn bulk_save(&self, entries: &BTreeMap<Key, Vec<u8>>) -> StoreResult<()>;

    /// Remove several keys atomically. Absent keys are ignored.
    fn delete(&self, keys: &[Key]) -> StoreResult<()>;

    /// Stream a lazy field into `writer`. Returns the number of bytes written.
    fn read_lazy(&self, key: &FieldKey, writer: &mut dyn Write) -> StoreResult<u64>;

    /// Store the full contents of `reader` as a lazy field. Returns the
    /// number of bytes stored.
    fn write_lazy(&self, key: &FieldKey, reader: &mut dyn Read) -> StoreResult<u64>;

    /// Flush and release the underlying engine. Later calls fail with
    /// [`StoreError::Closed`](crate::StoreError::Closed).
    fn close(&self) -> StoreResult<()>;
}
