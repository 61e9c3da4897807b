//! Cache contract for compiled definitions plus the stock implementations.

use super::CompiledViews;
use crate::core::Result;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Keyed store for compiled definitions.
///
/// Every operation is scoped to a tag set; flushing a tag drops every entry
/// stored under it. Implementations must tolerate concurrent callers.
pub trait DefinitionCache: Send + Sync {
    fn supports_tags(&self) -> bool;

    fn get(&self, tags: &[String], key: &str) -> Result<Option<CompiledViews>>;

    fn put(&self, tags: &[String], key: &str, views: CompiledViews, ttl: Duration) -> Result<()>;

    fn has(&self, tags: &[String], key: &str) -> Result<bool> {
        Ok(self.get(tags, key)?.is_some())
    }

    fn flush(&self, tags: &[String]) -> Result<()>;
}

/// A cache handle bound to a tag set.
pub struct TaggedCache<'a> {
    cache: &'a dyn DefinitionCache,
    tags: Vec<String>,
}

impl<'a> TaggedCache<'a> {
    pub fn new(cache: &'a dyn DefinitionCache, tags: &[&str]) -> Self {
        Self {
            cache,
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<CompiledViews>> {
        self.cache.get(&self.tags, key)
    }

    pub fn put(&self, key: &str, views: CompiledViews, ttl: Duration) -> Result<()> {
        self.cache.put(&self.tags, key, views, ttl)
    }

    pub fn has(&self, key: &str) -> Result<bool> {
        self.cache.has(&self.tags, key)
    }

    pub fn flush(&self) -> Result<()> {
        self.cache.flush(&self.tags)
    }
}

struct CacheEntry {
    views: CompiledViews,
    tags: Vec<String>,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

/// Process-local LRU cache with per-entry TTL and tag flushing.
pub struct InMemoryDefinitionCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl InMemoryDefinitionCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Entries live in a namespace derived from their tag set.
    fn namespaced(tags: &[String], key: &str) -> String {
        format!("{}:{}", tags.join("|"), key)
    }
}

impl DefinitionCache for InMemoryDefinitionCache {
    fn supports_tags(&self) -> bool {
        true
    }

    fn get(&self, tags: &[String], key: &str) -> Result<Option<CompiledViews>> {
        let key = Self::namespaced(tags, key);
        let mut entries = self.entries.lock()?;

        let expired = match entries.get(&key) {
            Some(entry) if entry.expires_at.is_none_or(|at| at > Instant::now()) => {
                return Ok(Some(entry.views.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.pop(&key);
        }
        Ok(None)
    }

    fn put(&self, tags: &[String], key: &str, views: CompiledViews, ttl: Duration) -> Result<()> {
        let entry = CacheEntry {
            views,
            tags: tags.to_vec(),
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.lock()?.put(Self::namespaced(tags, key), entry);
        Ok(())
    }

    fn flush(&self, tags: &[String]) -> Result<()> {
        let mut entries = self.entries.lock()?;
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.tags.iter().any(|tag| tags.contains(tag)))
            .map(|(key, _)| key.clone())
            .collect();

        for key in doomed {
            entries.pop(&key);
        }
        Ok(())
    }
}

/// Store without tag support: nothing is ever cached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDefinitionCache;

impl DefinitionCache for NullDefinitionCache {
    fn supports_tags(&self) -> bool {
        false
    }

    fn get(&self, _tags: &[String], _key: &str) -> Result<Option<CompiledViews>> {
        Ok(None)
    }

    fn put(&self, _tags: &[String], _key: &str, _views: CompiledViews, _ttl: Duration) -> Result<()> {
        Ok(())
    }

    fn flush(&self, _tags: &[String]) -> Result<()> {
        Ok(())
    }
}
