use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::key::{FieldKey, Key};
use crate::traits::{DurableStore, Visitor};

/// In-memory, `BTreeMap`-based store.
///
/// Intended for tests and embedding. Entries are held behind a `RwLock`;
/// multi-key writes happen under a single write guard, which makes them
/// atomic. Prefix scans copy the matching range before visiting so that a
/// visitor never runs while the lock is held. Data is lost on drop.
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    closed: AtomicBool,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of entries currently stored, across all regions.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored values.
    pub fn total_bytes(&self) -> u64 {
        self.entries
            .read()
            .expect("lock poisoned")
            .values()
            .map(|value| value.len() as u64)
            .sum()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableStore for InMemoryStore {
    fn get(&self, key: &Key) -> StoreResult<Vec<u8>> {
        self.ensure_open()?;
        let map = self.entries.read().expect("lock poisoned");
        map.get(key.as_bytes())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    fn list(&self, prefix: &[u8], visit: &mut Visitor<'_>) -> StoreResult<()> {
        self.ensure_open()?;
        let snapshot: Vec<Vec<u8>> = {
            let map = self.entries.read().expect("lock poisoned");
            map.range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
                .take_while(|(key, _)| key.starts_with(prefix))
                .map(|(_, value)| value.clone())
                .collect()
        };
        for value in &snapshot {
            visit(value)?;
        }
        Ok(())
    }

    fn bulk_save(&self, entries: &BTreeMap<Key, Vec<u8>>) -> StoreResult<()> {
        self.ensure_open()?;
        let mut map = self.entries.write().expect("lock poisoned");
        for (key, value) in entries {
            map.insert(key.as_bytes().to_vec(), value.clone());
        }
        Ok(())
    }

    fn delete(&self, keys: &[Key]) -> StoreResult<()> {
        self.ensure_open()?;
        let mut map = self.entries.write().expect("lock poisoned");
        for key in keys {
            map.remove(key.as_bytes());
        }
        Ok(())
    }

    fn read_lazy(&self, key: &FieldKey, writer: &mut dyn Write) -> StoreResult<u64> {
        self.ensure_open()?;
        let map = self.entries.read().expect("lock poisoned");
        let value = map
            .get(key.as_bytes())
            .ok_or_else(|| StoreError::NotFound(key.as_key().clone()))?;
        writer.write_all(value)?;
        Ok(value.len() as u64)
    }

    fn write_lazy(&self, key: &FieldKey, reader: &mut dyn Read) -> StoreResult<u64> {
        self.ensure_open()?;
        let mut value = Vec::new();
        reader.read_to_end(&mut value)?;
        let len = value.len() as u64;
        self.entries
            .write()
            .expect("lock poisoned")
            .insert(key.as_bytes().to_vec(), value);
        Ok(len)
    }

    fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("entry_count", &self.len())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}
