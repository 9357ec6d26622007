//! The generic per-entity orchestrator.
//!
//! A [`Provider`] composes the key scheme, the durable store, a search index
//! and lookup maps into one lockable unit. After [`Provider::initialize`]
//! the in-memory cache is authoritative: reads never touch the store.
//!
//! Every write takes the provider's exclusive lock for its whole duration,
//! store I/O included. The durable write happens before the cache mutation
//! and both happen before the lock is released, so no reader can see a
//! record that is not yet durable, or miss one that is.

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use speakerbob_index::{tokenize, SearchIndex};
use speakerbob_store::{DurableStore, FieldKey, Key, ObjectKey, StoreError, TypeKey};
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::record::{LookupField, Record};

/// Cache, search index and lookup maps, guarded together by one lock.
struct State<T> {
    cache: HashMap<String, Arc<T>>,
    index: SearchIndex<String>,
    /// Lookup field name -> field value -> owning record id.
    lookups: HashMap<&'static str, HashMap<String, String>>,
}

impl<T: Record> State<T> {
    fn new() -> Self {
        Self {
            cache: HashMap::new(),
            index: SearchIndex::new(),
            lookups: T::LOOKUPS
                .iter()
                .map(|field| (field.name, HashMap::new()))
                .collect(),
        }
    }

    /// Make `record` visible, retracting whatever the previously cached
    /// version of it had indexed.
    fn insert(&mut self, record: Arc<T>) {
        let id = record.key().to_string();
        if let Some(previous) = self.cache.get(&id).cloned() {
            self.retract(&previous);
        }

        if let Some(text) = record.searchable() {
            self.index.write(tokenize(text), &id);
        }
        for field in T::LOOKUPS {
            let map = self.lookups.entry(field.name).or_default();
            for value in field.values_of(record.as_ref()) {
                // Last write wins on collision.
                map.insert(value, id.clone());
            }
        }
        self.cache.insert(id, record);
    }

    fn remove(&mut self, id: &str) -> Option<Arc<T>> {
        let record = self.cache.remove(id)?;
        self.retract(&record);
        Some(record)
    }

    /// Drop `record`'s tokens and lookup values. A value `record` owned
    /// passes to the other cached holder that hydration would pick, so the
    /// live maps stay equal to a fresh scan of the store.
    fn retract(&mut self, record: &T) {
        let id = record.key();
        self.index.delete(&id.to_string());
        for field in T::LOOKUPS {
            let Some(map) = self.lookups.get_mut(field.name) else {
                continue;
            };
            for value in field.values_of(record) {
                // A later record may have claimed this value; leave it alone.
                if map.get(&value).map(String::as_str) != Some(id) {
                    continue;
                }
                match successor(&self.cache, field, &value, id) {
                    Some(heir) => map.insert(value, heir),
                    None => map.remove(&value),
                };
            }
        }
    }
}

/// Among cached records other than `retracted` that carry `value` in
/// `field`, the one whose object key sorts last. Keys order by id length,
/// then id bytes, which is the order hydration applies saves in.
fn successor<T: Record>(
    cache: &HashMap<String, Arc<T>>,
    field: &LookupField<T>,
    value: &str,
    retracted: &str,
) -> Option<String> {
    cache
        .iter()
        .filter(|(id, _)| id.as_str() != retracted)
        .filter(|(_, record)| field.values_of(record).iter().any(|v| v == value))
        .map(|(id, _)| id)
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .cloned()
}

/// Cache-plus-index front for all records of one type `T`.
pub struct Provider<T: Record> {
    store: Arc<dyn DurableStore>,
    type_key: TypeKey,
    state: RwLock<State<T>>,
}

impl<T: Record> Provider<T> {
    /// Create an empty provider over `store`. Call [`initialize`] before
    /// sharing it with other threads.
    ///
    /// [`initialize`]: Provider::initialize
    pub fn new(store: Arc<dyn DurableStore>) -> ProviderResult<Self> {
        Ok(Self {
            store,
            type_key: TypeKey::new(T::PACKAGE, T::TYPE_NAME)?,
            state: RwLock::new(State::new()),
        })
    }

    pub fn type_key(&self) -> &TypeKey {
        &self.type_key
    }

    /// Hydrate the cache, search index and lookup maps from the store.
    ///
    /// Fails on the first record that cannot be decoded and leaves the
    /// provider's previous state untouched: a partial mirror is never
    /// installed. Must complete before the provider sees concurrent traffic.
    pub fn initialize(&self) -> ProviderResult<()> {
        let mut state = self.write_state();

        let mut fresh = State::<T>::new();
        let mut failure = None;
        let scan = self.store.list(&self.type_key.object_prefix(), &mut |bytes| {
            match serde_json::from_slice::<T>(bytes) {
                Ok(record) => {
                    fresh.insert(Arc::new(record));
                    Ok(())
                }
                Err(err) => {
                    let reason = err.to_string();
                    failure = Some(ProviderError::Deserialization {
                        type_name: self.type_key.to_string(),
                        reason: reason.clone(),
                    });
                    Err(StoreError::Serialization(reason))
                }
            }
        });
        if let Some(err) = failure {
            return Err(err);
        }
        scan?;

        info!(
            type_key = %self.type_key,
            records = fresh.cache.len(),
            "hydrated provider"
        );
        *state = fresh;
        Ok(())
    }

    /// The cached record with primary id `id`.
    pub fn get(&self, id: &str) -> Option<Arc<T>> {
        self.read_state().cache.get(id).cloned()
    }

    /// A snapshot of every cached record, in no particular order.
    pub fn list(&self) -> Vec<Arc<T>> {
        self.read_state().cache.values().cloned().collect()
    }

    /// Records with a searchable token starting with `query`.
    ///
    /// Matching is case-insensitive prefix matching against single tokens:
    /// `"hel"` finds "Hello World" but `"ello"` and `"hello world"` do not.
    /// The empty query returns every record with searchable text.
    pub fn search(&self, query: &str) -> Vec<Arc<T>> {
        let query = query.to_lowercase();
        let state = self.read_state();
        let records = state
            .index
            .search(query.as_bytes())
            .into_iter()
            .filter_map(|id| state.cache.get(id).cloned())
            .collect();
        records
    }

    /// The record currently owning `value` in lookup field `field`.
    pub fn get_by(&self, field: &str, value: &str) -> ProviderResult<Option<Arc<T>>> {
        let state = self.read_state();
        let map = state
            .lookups
            .get(field)
            .ok_or_else(|| ProviderError::UnknownLookupField(field.to_string()))?;
        Ok(map.get(value).and_then(|id| state.cache.get(id).cloned()))
    }

    /// Persist `record`, then make it visible to readers.
    pub fn save(&self, record: &T) -> ProviderResult<()> {
        let mut state = self.write_state();

        let key = self.object_key(record)?;
        check_lookups(record)?;
        let body = encode(record)?;
        self.store.save(key.as_key(), &body)?;

        state.insert(Arc::new(record.clone()));
        debug!(type_key = %self.type_key, id = record.key(), "saved record");
        Ok(())
    }

    /// Persist `record` together with the full contents of lazy field
    /// `field` in one atomic write, then make the record visible.
    pub fn save_with_lazy(&self, record: &T, field: &str, reader: &mut dyn Read) -> ProviderResult<()> {
        let key = self.object_key(record)?;
        let field_key = self.field_key(&key, field)?;
        check_lookups(record)?;
        let mut blob = Vec::new();
        reader.read_to_end(&mut blob).map_err(StoreError::from)?;

        let mut state = self.write_state();

        let mut entries = BTreeMap::new();
        entries.insert(Key::from(key), encode(record)?);
        entries.insert(Key::from(field_key), blob);
        self.store.bulk_save(&entries)?;

        state.insert(Arc::new(record.clone()));
        debug!(type_key = %self.type_key, id = record.key(), field, "saved record with lazy field");
        Ok(())
    }

    /// Delete `records` and all of their lazy fields.
    ///
    /// Each record is resolved against the cache first; only its primary id
    /// is taken from the argument, since the caller's copy may be stale.
    /// Records that are not cached are skipped.
    pub fn delete(&self, records: &[T]) -> ProviderResult<()> {
        let ids: Vec<&str> = records.iter().map(|record| record.key()).collect();
        self.delete_ids(&ids)
    }

    /// Delete the records with the given primary ids.
    pub fn delete_ids(&self, ids: &[&str]) -> ProviderResult<()> {
        let mut state = self.write_state();

        let mut keys = Vec::new();
        let mut doomed = Vec::new();
        for id in ids {
            let Some(cached) = state.cache.get(*id) else {
                continue;
            };
            let object = self.type_key.object(cached.key())?;
            for field in T::LAZY_FIELDS {
                keys.push(Key::from(object.field(field)?));
            }
            keys.push(Key::from(object));
            doomed.push(cached.key().to_string());
        }
        if doomed.is_empty() {
            return Ok(());
        }

        self.store.delete(&keys)?;

        for id in &doomed {
            state.remove(id);
        }
        debug!(type_key = %self.type_key, count = doomed.len(), "deleted records");
        Ok(())
    }

    /// Stream lazy field `field` of `record` into `writer`, bypassing the
    /// cache. Returns the number of bytes written.
    pub fn read_field(&self, record: &T, field: &str, writer: &mut dyn Write) -> ProviderResult<u64> {
        let key = self.object_key(record)?;
        let field_key = self.field_key(&key, field)?;
        Ok(self.store.read_lazy(&field_key, writer)?)
    }

    /// Store the contents of `reader` as lazy field `field` of `record`.
    /// Returns the number of bytes stored.
    ///
    /// The record must already be saved. The write holds the provider lock,
    /// so it cannot interleave with a delete of the same record and leave a
    /// blob behind that nothing cleans up.
    pub fn write_field(&self, record: &T, field: &str, reader: &mut dyn Read) -> ProviderResult<u64> {
        let key = self.object_key(record)?;
        let field_key = self.field_key(&key, field)?;

        let state = self.write_state();
        if !state.cache.contains_key(record.key()) {
            return Err(ProviderError::NotCached {
                type_name: self.type_key.to_string(),
                id: record.key().to_string(),
            });
        }
        Ok(self.store.write_lazy(&field_key, reader)?)
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.read_state().cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_state().cache.is_empty()
    }

    fn object_key(&self, record: &T) -> ProviderResult<ObjectKey> {
        if record.key().is_empty() {
            return Err(ProviderError::MissingKey {
                type_name: self.type_key.to_string(),
            });
        }
        Ok(self.type_key.object(record.key())?)
    }

    fn field_key(&self, key: &ObjectKey, field: &str) -> ProviderResult<FieldKey> {
        if !T::LAZY_FIELDS.iter().any(|declared| *declared == field) {
            return Err(ProviderError::UnknownLazyField(field.to_string()));
        }
        Ok(key.field(field)?)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, State<T>> {
        self.state.read().expect("provider lock poisoned")
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State<T>> {
        self.state.write().expect("provider lock poisoned")
    }
}

impl<T: Record> std::fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("type_key", &self.type_key)
            .field("records", &self.len())
            .finish()
    }
}

fn check_lookups<T: Record>(record: &T) -> ProviderResult<()> {
    T::LOOKUPS.iter().try_for_each(|field| field.check(record))
}

fn encode<T: Record>(record: &T) -> ProviderResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| ProviderError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use speakerbob_store::{InMemoryStore, RedbStore};
    use std::thread;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Clip {
        id: String,
        title: String,
        slug: String,
        tags: Vec<String>,
    }

    fn clip_slug(c: &Clip) -> Vec<String> {
        vec![c.slug.clone()]
    }

    fn clip_tags(c: &Clip) -> Vec<String> {
        c.tags.clone()
    }

    impl Record for Clip {
        const PACKAGE: &'static str = "test";
        const TYPE_NAME: &'static str = "Clip";
        const LOOKUPS: &'static [LookupField<Self>] = &[
            LookupField::single("slug", clip_slug),
            LookupField::multi("tags", clip_tags),
        ];
        const LAZY_FIELDS: &'static [&'static str] = &["audio"];

        fn key(&self) -> &str {
            &self.id
        }

        fn searchable(&self) -> Option<&str> {
            Some(&self.title)
        }
    }

    fn clip(id: &str, title: &str) -> Clip {
        Clip {
            id: id.to_string(),
            title: title.to_string(),
            slug: format!("slug-{id}"),
            tags: Vec::new(),
        }
    }

    fn make_provider() -> (Arc<dyn DurableStore>, Provider<Clip>) {
        let store: Arc<dyn DurableStore> = Arc::new(InMemoryStore::new());
        let provider = Provider::new(Arc::clone(&store)).unwrap();
        provider.initialize().unwrap();
        (store, provider)
    }

    fn ids(records: &[Arc<Clip>]) -> Vec<String> {
        let mut ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        ids.sort();
        ids
    }

    // -----------------------------------------------------------------------
    // Round trip and listing
    // -----------------------------------------------------------------------

    #[test]
    fn save_then_get_roundtrip() {
        let (_store, provider) = make_provider();
        let c = clip("c1", "Sad Trombone");
        provider.save(&c).unwrap();

        assert_eq!(*provider.get("c1").unwrap(), c);
        assert!(provider.get("c2").is_none());
    }

    #[test]
    fn lazy_field_roundtrip() {
        let (_store, provider) = make_provider();
        let c = clip("c1", "airhorn");
        provider.save(&c).unwrap();
        provider.write_field(&c, "audio", &mut &b"\xff\xfbmp3"[..]).unwrap();

        let mut out = Vec::new();
        assert_eq!(provider.read_field(&c, "audio", &mut out).unwrap(), 5);
        assert_eq!(out, b"\xff\xfbmp3");
    }

    #[test]
    fn save_with_lazy_is_visible_together() {
        let (store, provider) = make_provider();
        let c = clip("c1", "airhorn");
        provider.save_with_lazy(&c, "audio", &mut &b"blob"[..]).unwrap();

        assert!(provider.get("c1").is_some());
        let mut out = Vec::new();
        provider.read_field(&c, "audio", &mut out).unwrap();
        assert_eq!(out, b"blob");

        // A fresh provider sees the record without ever touching the blob.
        let reloaded: Provider<Clip> = Provider::new(store).unwrap();
        reloaded.initialize().unwrap();
        assert_eq!(ids(&reloaded.list()), vec!["c1"]);
    }

    #[test]
    fn list_contains_exactly_saved_records() {
        let (_store, provider) = make_provider();
        provider.save(&clip("c1", "one")).unwrap();
        provider.save(&clip("c2", "two")).unwrap();
        provider.save(&clip("c1", "one again")).unwrap();

        assert_eq!(ids(&provider.list()), vec!["c1", "c2"]);
        assert_eq!(provider.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------------

    #[test]
    fn search_by_token_prefix() {
        let (_store, provider) = make_provider();
        provider.save(&clip("c1", "Hello World")).unwrap();
        provider.save(&clip("c2", "help me")).unwrap();

        assert_eq!(ids(&provider.search("hel")), vec!["c1", "c2"]);
        assert_eq!(ids(&provider.search("WOR")), vec!["c1"]);
        assert!(provider.search("xyz").is_empty());
        assert!(provider.search("orld").is_empty());
        assert_eq!(ids(&provider.search("")), vec!["c1", "c2"]);
    }

    #[test]
    fn update_retracts_stale_tokens() {
        let (_store, provider) = make_provider();
        let mut c = clip("c1", "hello");
        provider.save(&c).unwrap();

        c.title = "goodbye".to_string();
        provider.save(&c).unwrap();

        assert!(provider.search("hel").is_empty());
        assert_eq!(ids(&provider.search("good")), vec!["c1"]);
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    #[test]
    fn delete_removes_everywhere() {
        let (store, provider) = make_provider();
        let c = clip("c1", "hello");
        provider.save_with_lazy(&c, "audio", &mut &b"blob"[..]).unwrap();

        provider.delete(&[c.clone()]).unwrap();

        assert!(provider.get("c1").is_none());
        assert!(provider.search("hel").is_empty());
        assert!(provider.get_by("slug", "slug-c1").unwrap().is_none());
        let mut out = Vec::new();
        assert!(provider.read_field(&c, "audio", &mut out).unwrap_err().is_not_found());

        let reloaded: Provider<Clip> = Provider::new(store).unwrap();
        reloaded.initialize().unwrap();
        assert!(reloaded.is_empty());
    }

    #[test]
    fn delete_uses_cached_fields_not_callers() {
        let (_store, provider) = make_provider();
        provider.save(&clip("c1", "hello")).unwrap();

        // The caller's copy carries stale searchable and lookup values.
        let mut stale = clip("c1", "unrelated");
        stale.slug = "other".to_string();
        provider.delete(&[stale]).unwrap();

        assert!(provider.search("hel").is_empty());
        assert!(provider.get_by("slug", "slug-c1").unwrap().is_none());
    }

    #[test]
    fn delete_unknown_record_is_noop() {
        let (_store, provider) = make_provider();
        provider.save(&clip("c1", "hello")).unwrap();
        provider.delete_ids(&["missing"]).unwrap();
        assert_eq!(provider.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    #[test]
    fn lookup_last_write_wins() {
        let (_store, provider) = make_provider();
        let mut first = clip("c1", "one");
        first.slug = "shared".to_string();
        let mut second = clip("c2", "two");
        second.slug = "shared".to_string();

        provider.save(&first).unwrap();
        provider.save(&second).unwrap();

        assert_eq!(provider.get_by("slug", "shared").unwrap().unwrap().id, "c2");
    }

    #[test]
    fn multi_valued_lookup_maps_each_value() {
        let (_store, provider) = make_provider();
        let mut c = clip("c1", "one");
        c.tags = vec!["meme".to_string(), "loud".to_string()];
        provider.save(&c).unwrap();

        assert_eq!(provider.get_by("tags", "meme").unwrap().unwrap().id, "c1");
        assert_eq!(provider.get_by("tags", "loud").unwrap().unwrap().id, "c1");

        c.tags = vec!["loud".to_string()];
        provider.save(&c).unwrap();
        assert!(provider.get_by("tags", "meme").unwrap().is_none());
        assert_eq!(provider.get_by("tags", "loud").unwrap().unwrap().id, "c1");
    }

    #[test]
    fn retraction_keeps_values_claimed_by_others() {
        let (_store, provider) = make_provider();
        let mut first = clip("c1", "one");
        first.slug = "shared".to_string();
        let mut second = clip("c2", "two");
        second.slug = "shared".to_string();
        provider.save(&first).unwrap();
        provider.save(&second).unwrap();

        provider.delete(&[first]).unwrap();
        assert_eq!(provider.get_by("slug", "shared").unwrap().unwrap().id, "c2");
    }

    #[test]
    fn deleting_owner_hands_lookup_to_remaining_holder() {
        let (store, provider) = make_provider();
        let mut a = clip("a", "one");
        a.slug = "shared".to_string();
        let mut b = clip("b", "two");
        b.slug = "shared".to_string();
        provider.save(&a).unwrap();
        provider.save(&b).unwrap();
        assert_eq!(provider.get_by("slug", "shared").unwrap().unwrap().id, "b");

        provider.delete_ids(&["b"]).unwrap();
        let live = provider.get_by("slug", "shared").unwrap().map(|r| r.id.clone());

        let hydrated: Provider<Clip> = Provider::new(store).unwrap();
        hydrated.initialize().unwrap();
        let fresh = hydrated.get_by("slug", "shared").unwrap().map(|r| r.id.clone());

        assert_eq!(live.as_deref(), Some("a"));
        assert_eq!(live, fresh);
    }

    #[test]
    fn changing_owner_value_hands_lookup_to_remaining_holder() {
        let (store, provider) = make_provider();
        let mut a = clip("a", "one");
        a.tags = vec!["loud".to_string()];
        let mut b = clip("b", "two");
        b.tags = vec!["loud".to_string()];
        let mut c = clip("c", "three");
        c.tags = vec!["loud".to_string()];
        provider.save(&b).unwrap();
        provider.save(&c).unwrap();
        provider.save(&a).unwrap();
        assert_eq!(provider.get_by("tags", "loud").unwrap().unwrap().id, "a");

        a.tags = vec!["quiet".to_string()];
        provider.save(&a).unwrap();

        let hydrated: Provider<Clip> = Provider::new(store).unwrap();
        hydrated.initialize().unwrap();
        for field_value in ["loud", "quiet"] {
            let live = provider.get_by("tags", field_value).unwrap().map(|r| r.id.clone());
            let fresh = hydrated.get_by("tags", field_value).unwrap().map(|r| r.id.clone());
            assert_eq!(live, fresh, "tags={field_value}");
        }
        assert_eq!(provider.get_by("tags", "loud").unwrap().unwrap().id, "c");
    }

    #[test]
    fn last_holder_removed_clears_lookup() {
        let (_store, provider) = make_provider();
        let mut a = clip("a", "one");
        a.slug = "only".to_string();
        provider.save(&a).unwrap();

        a.slug = "renamed".to_string();
        provider.save(&a).unwrap();
        assert!(provider.get_by("slug", "only").unwrap().is_none());
        assert_eq!(provider.get_by("slug", "renamed").unwrap().unwrap().id, "a");
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Badge {
        id: String,
        owners: Vec<String>,
    }

    fn badge_owners(b: &Badge) -> Vec<String> {
        b.owners.clone()
    }

    impl Record for Badge {
        const PACKAGE: &'static str = "test";
        const TYPE_NAME: &'static str = "Badge";
        const LOOKUPS: &'static [LookupField<Self>] = &[LookupField::single("owner", badge_owners)];

        fn key(&self) -> &str {
            &self.id
        }
    }

    #[test]
    fn single_valued_lookup_rejects_several_values() {
        let store: Arc<dyn DurableStore> = Arc::new(InMemoryStore::new());
        let provider: Provider<Badge> = Provider::new(Arc::clone(&store)).unwrap();
        provider.initialize().unwrap();

        let badge = Badge {
            id: "b1".to_string(),
            owners: vec!["ann".to_string(), "bob".to_string()],
        };
        let err = provider.save(&badge).unwrap_err();
        assert!(matches!(
            err,
            ProviderError::LookupArity { field: "owner", count: 2 }
        ));
        assert!(provider.is_empty());
        assert!(store.get(provider.type_key().object("b1").unwrap().as_key()).is_err());

        // Empty values do not count.
        let badge = Badge {
            id: "b1".to_string(),
            owners: vec![String::new(), "ann".to_string()],
        };
        provider.save(&badge).unwrap();
        assert_eq!(provider.get_by("owner", "ann").unwrap().unwrap().id, "b1");
    }

    #[test]
    fn unknown_lookup_field_errors() {
        let (_store, provider) = make_provider();
        assert!(matches!(
            provider.get_by("email", "x"),
            Err(ProviderError::UnknownLookupField(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn empty_key_is_rejected() {
        let (_store, provider) = make_provider();
        let result = provider.save(&clip("", "nameless"));
        assert!(matches!(result, Err(ProviderError::MissingKey { .. })));
        assert!(provider.is_empty());
    }

    #[test]
    fn unknown_lazy_field_is_rejected() {
        let (_store, provider) = make_provider();
        let c = clip("c1", "one");
        let result = provider.write_field(&c, "video", &mut &b"x"[..]);
        assert!(matches!(result, Err(ProviderError::UnknownLazyField(_))));
    }

    #[test]
    fn write_field_requires_saved_record() {
        let (_store, provider) = make_provider();
        let c = clip("c1", "one");
        let err = provider.write_field(&c, "audio", &mut &b"x"[..]).unwrap_err();
        assert!(matches!(err, ProviderError::NotCached { .. }));

        provider.save(&c).unwrap();
        provider.write_field(&c, "audio", &mut &b"x"[..]).unwrap();
        provider.delete_ids(&["c1"]).unwrap();

        let err = provider.write_field(&c, "audio", &mut &b"y"[..]).unwrap_err();
        assert!(matches!(err, ProviderError::NotCached { .. }));
        let mut out = Vec::new();
        let orphan = provider.read_field(&c, "audio", &mut out).unwrap_err();
        assert!(orphan.is_not_found());
    }

    // -----------------------------------------------------------------------
    // Hydration
    // -----------------------------------------------------------------------

    #[test]
    fn initialize_rebuilds_index_and_lookups() {
        let (store, provider) = make_provider();
        provider.save(&clip("c1", "hello")).unwrap();

        let reloaded: Provider<Clip> = Provider::new(store).unwrap();
        reloaded.initialize().unwrap();
        assert_eq!(ids(&reloaded.search("hel")), vec!["c1"]);
        assert_eq!(reloaded.get_by("slug", "slug-c1").unwrap().unwrap().id, "c1");
    }

    #[test]
    fn initialize_fails_fast_on_corrupt_record() {
        let (store, provider) = make_provider();
        provider.save(&clip("c1", "hello")).unwrap();
        let bad = provider.type_key().object("c2").unwrap();
        store.save(bad.as_key(), b"not json").unwrap();

        let reloaded: Provider<Clip> = Provider::new(Arc::clone(&store)).unwrap();
        let err = reloaded.initialize().unwrap_err();
        assert!(matches!(err, ProviderError::Deserialization { .. }));
        assert!(reloaded.is_empty());
    }

    #[test]
    fn initialize_ignores_other_types() {
        let (store, provider) = make_provider();
        provider.save(&clip("c1", "hello")).unwrap();
        let other = TypeKey::new("test", "ClipGroup").unwrap();
        store.save(other.object("g1").unwrap().as_key(), b"{}").unwrap();

        provider.initialize().unwrap();
        assert_eq!(ids(&provider.list()), vec!["c1"]);
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_writers_on_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn DurableStore> =
            Arc::new(RedbStore::open(dir.path().join("clips.redb")).unwrap());
        let provider: Arc<Provider<Clip>> = Arc::new(Provider::new(Arc::clone(&store)).unwrap());
        provider.initialize().unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let provider = Arc::clone(&provider);
                thread::spawn(move || {
                    provider.save(&clip(&format!("c{i}"), "concurrent clip")).unwrap();
                    assert!(provider.get(&format!("c{i}")).is_some());
                })
            })
            .collect();
        for h in handles {
            h.join().expect("writer should not panic");
        }

        assert_eq!(provider.len(), 16);
        assert_eq!(provider.search("conc").len(), 16);

        let reloaded: Provider<Clip> = Provider::new(store).unwrap();
        reloaded.initialize().unwrap();
        assert_eq!(ids(&reloaded.list()), ids(&provider.list()));
    }

    #[test]
    fn very_long_searchable_token_survives_resave_and_delete() {
        let (_store, provider) = make_provider();
        let mut c = clip("c1", &"a".repeat(100_000));
        provider.save(&c).unwrap();
        assert_eq!(ids(&provider.search("aaa")), vec!["c1"]);

        c.title = "b".repeat(100_000);
        provider.save(&c).unwrap();
        assert!(provider.search("a").is_empty());
        assert_eq!(ids(&provider.search("bbb")), vec!["c1"]);

        provider.delete(&[c]).unwrap();
        assert!(provider.search("").is_empty());
        assert!(provider.is_empty());
    }

    #[test]
    fn scenario_save_search_delete() {
        let (_store, provider) = make_provider();
        provider.save(&clip("s1", "hello")).unwrap();
        assert_eq!(ids(&provider.search("hel")), vec!["s1"]);

        provider.delete_ids(&["s1"]).unwrap();
        assert!(provider.search("hel").is_empty());
        assert!(provider.get("s1").is_none());
    }
}
