//! Merged-view cache
//!
//! Holds the listings the view is projected from:
//! - knowledge base listings keyed by `(knowledge base id, folder)`
//! - source tree listings keyed by `(connection id, parent id)`
//! - the source-id list of each knowledge base summary
//!
//! Fetches go through [`FetchTicket`]s. Writing optimistically or cancelling
//! supersedes every ticket issued for that key, so a response that resolves
//! late is discarded instead of overwriting newer data.

use ahash::AHashMap;
use dashmap::DashMap;
use kbpick_core::{path, IndexedListing, SourceListing};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Key of a knowledge base listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub knowledge_base_id: String,
    /// Normalized directory key of the folder ("" for root)
    pub folder: String,
}

impl CacheKey {
    pub fn new(knowledge_base_id: impl Into<String>, folder_path: &str) -> Self {
        Self {
            knowledge_base_id: knowledge_base_id.into(),
            folder: path::normalize(folder_path, true),
        }
    }

    /// Folder path as the knowledge base API expects it
    pub fn resource_path(&self) -> String {
        path::to_knowledge_base_path(&self.folder)
    }
}

/// Key of a source tree listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    pub connection_id: String,
    /// Parent folder id, `None` for the connection root
    pub parent_id: Option<String>,
}

impl SourceKey {
    pub fn new(connection_id: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            connection_id: connection_id.into(),
            parent_id: parent_id.map(str::to_string),
        }
    }
}

/// Permission to store the result of one fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    key: CacheKey,
    generation: u64,
}

impl FetchTicket {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

#[derive(Debug, Clone)]
struct Cached<T> {
    value: Arc<T>,
    fetched_at: Instant,
    stale: bool,
}

impl<T> Cached<T> {
    fn fresh(value: Arc<T>) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
            stale: false,
        }
    }

    fn is_fresh(&self, max_age: Duration) -> bool {
        !self.stale && self.fetched_at.elapsed() < max_age
    }
}

/// State needed to undo one optimistic write
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    key: CacheKey,
    /// Kept with its age and stale flag so a rollback does not refresh it
    listing: Option<Cached<IndexedListing>>,
    source_ids: Option<Vec<String>>,
}

impl CacheSnapshot {
    pub fn listing(&self) -> Option<&IndexedListing> {
        self.listing.as_ref().map(|c| c.value.as_ref())
    }

    pub fn source_ids(&self) -> Option<&[String]> {
        self.source_ids.as_deref()
    }
}

/// Shared listing cache; cheap to query from any task
#[derive(Debug, Default)]
pub struct ViewCache {
    listings: DashMap<CacheKey, Cached<IndexedListing>>,
    sources: DashMap<SourceKey, Cached<SourceListing>>,
    in_flight: DashMap<CacheKey, u64>,
    next_generation: AtomicU64,
    source_ids: RwLock<AHashMap<String, Vec<String>>>,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached listing, fresh or not
    pub fn get(&self, key: &CacheKey) -> Option<Arc<IndexedListing>> {
        self.listings.get(key).map(|c| Arc::clone(&c.value))
    }

    /// Cached listing if it is younger than `max_age` and not invalidated
    pub fn get_fresh(&self, key: &CacheKey, max_age: Duration) -> Option<Arc<IndexedListing>> {
        self.listings
            .get(key)
            .filter(|c| c.is_fresh(max_age))
            .map(|c| Arc::clone(&c.value))
    }

    /// Start a fetch for `key`
    ///
    /// A newer ticket for the same key supersedes older ones.
    pub fn begin_fetch(&self, key: &CacheKey) -> FetchTicket {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        self.in_flight.insert(key.clone(), generation);
        FetchTicket {
            key: key.clone(),
            generation,
        }
    }

    /// Store a fetch result; returns false if the ticket was superseded
    pub fn complete_fetch(&self, ticket: FetchTicket, listing: impl Into<Arc<IndexedListing>>) -> bool {
        let current = self
            .in_flight
            .remove_if(&ticket.key, |_, generation| *generation == ticket.generation);

        if current.is_none() {
            debug!(
                "Discarding stale listing for {}:{}",
                ticket.key.knowledge_base_id, ticket.key.folder
            );
            return false;
        }

        self.listings
            .insert(ticket.key, Cached::fresh(listing.into()));
        true
    }

    /// Give up on a failed fetch without touching the cached listing
    pub fn abandon_fetch(&self, ticket: FetchTicket) {
        self.in_flight
            .remove_if(&ticket.key, |_, generation| *generation == ticket.generation);
    }

    /// Supersede any fetch in flight for `key`
    pub fn cancel_in_flight(&self, key: &CacheKey) {
        if self.in_flight.remove(key).is_some() {
            debug!("Cancelled in-flight fetch for {}:{}", key.knowledge_base_id, key.folder);
        }
    }

    /// True if a fetch for `key` is outstanding
    pub fn is_fetching(&self, key: &CacheKey) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Rewrite the listing at `key`, superseding fetches in flight
    pub fn write_optimistic<F>(&self, key: &CacheKey, rewrite: F) -> Arc<IndexedListing>
    where
        F: FnOnce(Option<&IndexedListing>) -> IndexedListing,
    {
        self.cancel_in_flight(key);
        let current = self.get(key);
        let next = Arc::new(rewrite(current.as_deref()));
        self.listings
            .insert(key.clone(), Cached::fresh(Arc::clone(&next)));
        next
    }

    /// Capture what an optimistic write on `key` may change
    ///
    /// Fetches in flight for `key` are superseded first, so no response can
    /// land between the snapshot and the write that follows it.
    pub fn snapshot(&self, key: &CacheKey) -> CacheSnapshot {
        self.cancel_in_flight(key);
        CacheSnapshot {
            key: key.clone(),
            listing: self.listings.get(key).map(|c| c.value().clone()),
            source_ids: self.source_ids(&key.knowledge_base_id),
        }
    }

    /// Put back exactly what [`ViewCache::snapshot`] captured
    pub fn restore(&self, snapshot: CacheSnapshot) {
        self.cancel_in_flight(&snapshot.key);
        match snapshot.listing {
            Some(cached) => {
                self.listings.insert(snapshot.key.clone(), cached);
            }
            None => {
                self.listings.remove(&snapshot.key);
            }
        }

        let mut ids = self.source_ids.write();
        match snapshot.source_ids {
            Some(source_ids) => {
                ids.insert(snapshot.key.knowledge_base_id, source_ids);
            }
            None => {
                ids.remove(&snapshot.key.knowledge_base_id);
            }
        }
    }

    /// Mark a listing stale so the next read refetches it
    pub fn invalidate(&self, key: &CacheKey) {
        if let Some(mut cached) = self.listings.get_mut(key) {
            cached.stale = true;
        }
    }

    /// Mark every listing of a knowledge base stale
    pub fn invalidate_knowledge_base(&self, knowledge_base_id: &str) {
        let mut count = 0;
        for mut cached in self.listings.iter_mut() {
            if cached.key().knowledge_base_id == knowledge_base_id {
                cached.stale = true;
                count += 1;
            }
        }
        debug!("Invalidated {} listings of {}", count, knowledge_base_id);
    }

    /// Cached listings of folders strictly below `key`'s folder
    pub fn descendants(&self, key: &CacheKey) -> Vec<Arc<IndexedListing>> {
        self.listings
            .iter()
            .filter(|entry| {
                let other = entry.key();
                other.knowledge_base_id == key.knowledge_base_id
                    && path::is_strict_descendant(&key.folder, &other.folder)
            })
            .map(|entry| Arc::clone(&entry.value().value))
            .collect()
    }

    pub fn get_source(&self, key: &SourceKey, max_age: Duration) -> Option<Arc<SourceListing>> {
        self.sources
            .get(key)
            .filter(|c| c.is_fresh(max_age))
            .map(|c| Arc::clone(&c.value))
    }

    pub fn store_source(&self, key: SourceKey, listing: SourceListing) -> Arc<SourceListing> {
        let listing = Arc::new(listing);
        self.sources.insert(key, Cached::fresh(Arc::clone(&listing)));
        listing
    }

    /// Cached source-id list of a knowledge base summary
    pub fn source_ids(&self, knowledge_base_id: &str) -> Option<Vec<String>> {
        self.source_ids.read().get(knowledge_base_id).cloned()
    }

    pub fn set_source_ids(&self, knowledge_base_id: &str, ids: Vec<String>) {
        self.source_ids
            .write()
            .insert(knowledge_base_id.to_string(), ids);
    }

    /// Drop everything
    pub fn clear(&self) {
        self.listings.clear();
        self.sources.clear();
        self.in_flight.clear();
        self.source_ids.write().clear();
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}
