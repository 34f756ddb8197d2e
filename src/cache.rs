//! Request caching for registry lookups
//!
//! Every remote lookup the composer makes (editions lists, publications,
//! form bodies, components) goes through a [`FetchCache`] for its kind. The
//! cache sits in front of a pluggable [`CacheStore`]:
//!
//! - on a hit, the stored value is returned without calling the registry;
//! - on a miss, or when the store fails to answer, the registry is called;
//! - a found value is written back on a best-effort basis, so a failing
//!   store never fails the lookup itself;
//! - a not-found answer is only written back when negative caching is
//!   enabled, so a transient upstream gap is not remembered.
//!
//! Stores are shared between concurrently running resolution passes and must
//! be `Send + Sync`. [`MemoryStore`] is the in-process implementation.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Cache key combining the lookup kind and its query tuple
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: String,
    pub query: Vec<String>,
}

impl CacheKey {
    pub fn new(kind: &str, query: &[&str]) -> Self {
        Self {
            kind: kind.to_string(),
            query: query.iter().map(|part| part.to_string()).collect(),
        }
    }

    /// Deterministic string form of the key, usable by stores that need a
    /// flat key. Parts are JSON-quoted so separators inside a part cannot
    /// collide with the delimiter.
    pub fn encoded(&self) -> String {
        let parts: Vec<String> = std::iter::once(&self.kind)
            .chain(self.query.iter())
            .map(|part| Value::String(part.clone()).to_string())
            .collect();
        parts.join(":")
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.query.join(", "))
    }
}

/// What a store remembers about a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum CacheEntry {
    Found(Value),
    NotFound,
}

/// Pluggable key-value storage behind a [`FetchCache`].
pub trait CacheStore: Send + Sync {
    /// Look up a key. `Ok(None)` is a miss.
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Remember an entry for a key.
    fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<()>;
}

/// In-process cache store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<CacheKey, CacheEntry>>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of cached entries
    pub fn len(&self) -> Result<usize> {
        let entries = self.entries.lock().map_err(|_| Error::LockPoisoned {
            context: "memory cache store".to_string(),
        })?;
        Ok(entries.len())
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Clear all cached entries
    pub fn clear(&self) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| Error::LockPoisoned {
            context: "memory cache store".to_string(),
        })?;
        entries.clear();
        Ok(())
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let entries = self.entries.lock().map_err(|_| Error::LockPoisoned {
            context: "memory cache store".to_string(),
        })?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| Error::LockPoisoned {
            context: "memory cache store".to_string(),
        })?;
        entries.insert(key.clone(), entry);
        Ok(())
    }
}

/// Get-or-fetch wrapper for one kind of lookup returning `T`.
pub struct FetchCache<T> {
    kind: &'static str,
    store: Option<Arc<dyn CacheStore>>,
    cache_not_found: bool,
    _value: PhantomData<fn() -> T>,
}

impl<T> Clone for FetchCache<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            store: self.store.clone(),
            cache_not_found: self.cache_not_found,
            _value: PhantomData,
        }
    }
}

impl<T> fmt::Debug for FetchCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchCache")
            .field("kind", &self.kind)
            .field("enabled", &self.store.is_some())
            .field("cache_not_found", &self.cache_not_found)
            .finish()
    }
}

impl<T> FetchCache<T>
where
    T: Serialize + DeserializeOwned,
{
    /// A cache for `kind` backed by `store`. Without a store every lookup
    /// goes to the registry.
    pub fn new(kind: &'static str, store: Option<Arc<dyn CacheStore>>) -> Self {
        Self {
            kind,
            store,
            cache_not_found: false,
            _value: PhantomData,
        }
    }

    /// Also remember not-found answers.
    pub fn with_cache_not_found(mut self, enabled: bool) -> Self {
        self.cache_not_found = enabled;
        self
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Return the cached answer for `query`, or call `fetch` and remember
    /// what it returns.
    pub fn get_or_fetch<F>(&self, query: &[&str], fetch: F) -> Result<Option<T>>
    where
        F: FnOnce() -> Result<Option<T>>,
    {
        let Some(store) = &self.store else {
            return fetch();
        };
        let key = CacheKey::new(self.kind, query);

        match store.get(&key) {
            Ok(Some(CacheEntry::Found(value))) => match serde_json::from_value(value) {
                Ok(data) => {
                    debug!("Cache hit for {}", key);
                    return Ok(Some(data));
                }
                Err(e) => warn!("Ignoring undecodable cache entry for {}: {}", key, e),
            },
            Ok(Some(CacheEntry::NotFound)) if self.cache_not_found => {
                debug!("Cache hit (not found) for {}", key);
                return Ok(None);
            }
            Ok(_) => debug!("Cache miss for {}", key),
            Err(e) => warn!("Cache read failed for {}, fetching: {}", key, e),
        }

        let fetched = fetch()?;

        let entry = match &fetched {
            Some(data) => match serde_json::to_value(data) {
                Ok(value) => Some(CacheEntry::Found(value)),
                Err(e) => {
                    warn!("Not caching {}: {}", key, e);
                    None
                }
            },
            None if self.cache_not_found => Some(CacheEntry::NotFound),
            None => None,
        };
        if let Some(entry) = entry {
            if let Err(e) = store.put(&key, entry) {
                warn!("Cache write failed for {}: {}", key, e);
            }
        }

        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that counts operations and can be told to fail.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        gets: AtomicUsize,
        puts: AtomicUsize,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl CacheStore for CountingStore {
        fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads {
                return Err(Error::Cache {
                    message: "read refused".to_string(),
                });
            }
            self.inner.get(key)
        }

        fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                return Err(Error::Cache {
                    message: "write refused".to_string(),
                });
            }
            self.inner.put(key, entry)
        }
    }

    #[test]
    fn test_cache_key() {
        let key1 = CacheKey::new("forms", &["api.example.com", "abc"]);
        let key2 = CacheKey::new("forms", &["api.example.com", "abc"]);
        let key3 = CacheKey::new("publications", &["api.example.com", "abc"]);

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
        assert_eq!(key1.encoded(), r#""forms":"api.example.com":"abc""#);
    }

    #[test]
    fn test_encoded_key_does_not_collide_on_separators() {
        let a = CacheKey::new("k", &["a:b", "c"]);
        let b = CacheKey::new("k", &["a", "b:c"]);
        assert_ne!(a.encoded(), b.encoded());
    }

    #[test]
    fn test_successful_fetch_is_stored_once_and_reused() {
        let store = Arc::new(CountingStore::default());
        let cache: FetchCache<Vec<String>> = FetchCache::new("editions", Some(store.clone() as Arc<dyn CacheStore>));
        let fetches = AtomicUsize::new(0);

        for _ in 0..2 {
            let editions = cache
                .get_or_fetch(&["repo", "pub", "proj"], || {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(vec!["1e".to_string()]))
                })
                .unwrap();
            assert_eq!(editions, Some(vec!["1e".to_string()]));
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_not_found_is_not_stored_by_default() {
        let store = Arc::new(CountingStore::default());
        let cache: FetchCache<String> = FetchCache::new("forms", Some(store.clone() as Arc<dyn CacheStore>));

        let result = cache.get_or_fetch(&["repo", "missing"], || Ok(None)).unwrap();
        assert_eq!(result, None);
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_not_found_is_stored_when_enabled() {
        let store = Arc::new(CountingStore::default());
        let cache: FetchCache<String> =
            FetchCache::new("forms", Some(store.clone() as Arc<dyn CacheStore>)).with_cache_not_found(true);
        let fetches = AtomicUsize::new(0);

        for _ in 0..2 {
            let result = cache
                .get_or_fetch(&["repo", "missing"], || {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                })
                .unwrap();
            assert_eq!(result, None);
        }

        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_store_errors_fall_back_to_fetch() {
        let store = Arc::new(CountingStore {
            fail_reads: true,
            fail_writes: true,
            ..CountingStore::default()
        });
        let cache: FetchCache<String> = FetchCache::new("forms", Some(store.clone() as Arc<dyn CacheStore>));

        let result = cache
            .get_or_fetch(&["repo", "abc"], || Ok(Some("body".to_string())))
            .unwrap();
        assert_eq!(result, Some("body".to_string()));
        assert_eq!(store.gets.load(Ordering::SeqCst), 1);
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fetch_errors_are_propagated_and_not_stored() {
        let store = Arc::new(CountingStore::default());
        let cache: FetchCache<String> = FetchCache::new("forms", Some(store.clone() as Arc<dyn CacheStore>));

        let error = cache
            .get_or_fetch(&["repo", "abc"], || {
                Err(Error::Transport {
                    url: "https://repo/forms/abc".to_string(),
                    message: "HTTP 502".to_string(),
                    path: None,
                })
            })
            .unwrap_err();
        assert!(matches!(error, Error::Transport { .. }));
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_store_always_fetches() {
        let cache: FetchCache<String> = FetchCache::new("forms", None);
        let fetches = AtomicUsize::new(0);
        for _ in 0..3 {
            cache
                .get_or_fetch(&["repo", "abc"], || {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(Some("body".to_string()))
                })
                .unwrap();
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_memory_store_operations() {
        let store = MemoryStore::new();
        let key = CacheKey::new("forms", &["repo", "abc"]);

        assert!(store.is_empty().unwrap());
        store
            .put(&key, CacheEntry::Found(Value::String("x".to_string())))
            .unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(
            store.get(&key).unwrap(),
            Some(CacheEntry::Found(Value::String("x".to_string())))
        );

        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_memory_store_is_shared_between_clones() {
        let store = MemoryStore::new();
        let clone = store.clone();
        clone
            .put(&CacheKey::new("forms", &["a"]), CacheEntry::NotFound)
            .unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }
}
