//! Schema version marker kept in the meta region.

use crate::error::{StoreError, StoreResult};
use crate::key::Key;
use crate::traits::DurableStore;

const VERSION_KEY: &str = "schema_version";

/// Record the schema version the store's contents were written with.
pub fn write_schema_version(store: &dyn DurableStore, version: u32) -> StoreResult<()> {
    store.save(&Key::meta(VERSION_KEY), &version.to_be_bytes())
}

/// Read the recorded schema version, or `None` for a store that has never
/// been stamped.
pub fn read_schema_version(store: &dyn DurableStore) -> StoreResult<Option<u32>> {
    let bytes = match store.get(&Key::meta(VERSION_KEY)) {
        Ok(bytes) => bytes,
        Err(err) if err.is_not_found() => return Ok(None),
        Err(err) => return Err(err),
    };
    let raw: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
        StoreError::Serialization(format!("schema version is {} bytes", bytes.len()))
    })?;
    Ok(Some(u32::from_be_bytes(raw)))
}

/// Stamp an unstamped store with `expected`, or verify that the recorded
/// version matches it.
pub fn ensure_schema_version(store: &dyn DurableStore, expected: u32) -> StoreResult<()> {
    match read_schema_version(store)? {
        None => write_schema_version(store, expected),
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(StoreError::SchemaMismatch { expected, found }),
    }
}
