//! [`DurableStore`] backed by a redb database file.
//!
//! All keys share one table. The key scheme's region tags keep object,
//! field and meta keys apart, so a single ordered table is enough for both
//! point lookups and prefix scans. Every write is one redb write
//! transaction; reads use read transactions, which see a stable MVCC
//! snapshot while writers commit.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use redb::{Database, TableDefinition};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::key::{FieldKey, Key};
use crate::traits::{DurableStore, Visitor};

/// Key: encoded store key, Value: raw record or blob bytes.
const ENTRIES_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entries");

/// A redb-backed store. `None` once closed.
pub struct RedbStore {
    db: RwLock<Option<Database>>,
    path: PathBuf,
}

impl RedbStore {
    /// Create or open a database at `path`.
    ///
    /// The parent directory must already exist; see
    /// [`StoreConfig`](crate::StoreConfig) for directory creation.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let db = Database::create(&path)?;

        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(ENTRIES_TABLE)?;
        }
        write_txn.commit()?;

        info!(path = %path.display(), "opened redb store");
        Ok(Self {
            db: RwLock::new(Some(db)),
            path,
        })
    }

    /// Path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_db<R>(&self, f: impl FnOnce(&Database) -> StoreResult<R>) -> StoreResult<R> {
        let guard = self.db.read().expect("lock poisoned");
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        f(db)
    }
}

impl DurableStore for RedbStore {
    fn get(&self, key: &Key) -> StoreResult<Vec<u8>> {
        self.with_db(|db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(ENTRIES_TABLE)?;
            let value = table.get(key.as_bytes())?;
            match value {
                Some(value) => Ok(value.value().to_vec()),
                None => Err(StoreError::NotFound(key.clone())),
            }
        })
    }

    fn list(&self, prefix: &[u8], visit: &mut Visitor<'_>) -> StoreResult<()> {
        self.with_db(|db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(ENTRIES_TABLE)?;

            for item in table.range::<&[u8]>(prefix..)? {
                let (key, value) = item?;
                // Keys are ordered, so the first miss ends the prefix range.
                if !key.value().starts_with(prefix) {
                    break;
                }
                visit(value.value())?;
            }
            Ok(())
        })
    }

    fn bulk_save(&self, entries: &BTreeMap<Key, Vec<u8>>) -> StoreResult<()> {
        self.with_db(|db| {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(ENTRIES_TABLE)?;
                for (key, value) in entries {
                    table.insert(key.as_bytes(), value.as_slice())?;
                }
            }
            write_txn.commit()?;
            debug!(count = entries.len(), "committed bulk save");
            Ok(())
        })
    }

    fn delete(&self, keys: &[Key]) -> StoreResult<()> {
        self.with_db(|db| {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(ENTRIES_TABLE)?;
                for key in keys {
                    table.remove(key.as_bytes())?;
                }
            }
            write_txn.commit()?;
            debug!(count = keys.len(), "committed delete");
            Ok(())
        })
    }

    fn read_lazy(&self, key: &FieldKey, writer: &mut dyn Write) -> StoreResult<u64> {
        self.with_db(|db| {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(ENTRIES_TABLE)?;
            let value = table
                .get(key.as_bytes())?
                .ok_or_else(|| StoreError::NotFound(key.as_key().clone()))?;
            let bytes = value.value();
            writer.write_all(bytes)?;
            Ok(bytes.len() as u64)
        })
    }

    fn write_lazy(&self, key: &FieldKey, reader: &mut dyn Read) -> StoreResult<u64> {
        // redb stores values contiguously, so the blob is buffered once here.
        let mut value = Vec::new();
        reader.read_to_end(&mut value)?;

        self.with_db(|db| {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(ENTRIES_TABLE)?;
                table.insert(key.as_bytes(), value.as_slice())?;
            }
            write_txn.commit()?;
            Ok(value.len() as u64)
        })
    }

    fn close(&self) -> StoreResult<()> {
        let db = self.db.write().expect("lock poisoned").take();
        if db.is_some() {
            info!(path = %self.path.display(), "closed redb store");
        }
        Ok(())
    }
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let open = self.db.read().map(|db| db.is_some()).unwrap_or(false);
        f.debug_struct("RedbStore")
            .field("path", &self.path)
            .field("open", &open)
            .finish()
    }
}
