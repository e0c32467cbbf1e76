//! Fetch, cache and project the listing of one folder

use crate::config::SyncConfig;
use crate::error::BackendResult;
use crate::provider::Backend;
use kbpick_core::{project, IdSet, IndexedListing, KnowledgeBaseDirectory, Resource, SourceListing, StatusContext};
use kbpick_state::{CacheKey, PickerState, ViewScope};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Projected folder listing plus what the view needs to keep it current
#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    pub resources: Vec<Resource>,
    /// False when the knowledge base listing could not be read
    pub statuses_loaded: bool,
    /// How often to refetch while work is in flight
    pub refetch_every: Option<Duration>,
}

/// Loads folder listings through the shared cache
pub struct ViewLoader<B: Backend + ?Sized> {
    backend: Arc<B>,
    state: Arc<PickerState>,
    config: SyncConfig,
}

impl<B: Backend + ?Sized> ViewLoader<B> {
    pub fn new(backend: Arc<B>, state: Arc<PickerState>, config: SyncConfig) -> Self {
        Self {
            backend,
            state,
            config,
        }
    }

    /// Load and project the folder described by `scope`
    ///
    /// Source tree failures are returned; a failing knowledge base listing
    /// only degrades statuses to their local fallback.
    pub async fn load(&self, scope: &ViewScope) -> BackendResult<ViewSnapshot> {
        let source = self.source_listing(scope).await?;

        let (listing, statuses_loaded) = match scope.cache_key() {
            Some(key) => match self.indexed_listing(&key).await {
                Ok(listing) => (Some(listing), true),
                Err(e) => {
                    warn!("Knowledge base listing for {} unavailable: {}", key.resource_path(), e);
                    (self.state.cache.get(&key), false)
                }
            },
            None => (None, true),
        };

        let descendants = scope
            .cache_key()
            .map(|key| self.state.cache.descendants(&key))
            .unwrap_or_default();
        let pending = self.state.pending_ids();

        let ctx = StatusContext::new(listing.as_deref())
            .with_pending(&pending)
            .with_descendants(&descendants);
        let resources = project(&source.entries, &ctx);
        debug!("Projected {} resources for {}", resources.len(), scope.kb_path());

        Ok(ViewSnapshot {
            refetch_every: self.refetch_interval(&pending, listing.as_deref()),
            resources,
            statuses_loaded,
        })
    }

    /// Load ignoring the cached knowledge base listing (background refetch)
    pub async fn refetch(&self, scope: &ViewScope) -> BackendResult<ViewSnapshot> {
        if let Some(key) = scope.cache_key() {
            self.state.cache.invalidate(&key);
        }
        self.load(scope).await
    }

    /// Background refetch period: only while something is still moving
    pub fn refetch_interval(
        &self,
        pending: &IdSet,
        listing: Option<&IndexedListing>,
    ) -> Option<Duration> {
        let busy = !pending.is_empty() || listing.is_some_and(IndexedListing::has_work_in_flight);
        busy.then_some(self.config.refetch_interval)
    }

    /// Knowledge bases visible to the user
    pub async fn knowledge_bases(&self) -> BackendResult<KnowledgeBaseDirectory> {
        self.backend.list_knowledge_bases().await
    }

    /// Refresh the cached source-id list of a knowledge base
    pub async fn refresh_summary(&self, knowledge_base_id: &str) -> BackendResult<Vec<String>> {
        let summary = self.backend.get_summary(knowledge_base_id).await?;
        self.state
            .cache
            .set_source_ids(knowledge_base_id, summary.connection_source_ids.clone());
        Ok(summary.connection_source_ids)
    }

    async fn source_listing(&self, scope: &ViewScope) -> BackendResult<Arc<SourceListing>> {
        let key = scope.source_key();
        if let Some(cached) = self.state.cache.get_source(&key, self.config.stale_after) {
            debug!("Source listing cache hit for {:?}", key.parent_id);
            return Ok(cached);
        }

        let parent = scope.folder.as_ref().map(|f| f.id.as_str());
        let listing = self
            .backend
            .list_source_children(&scope.connection_id, parent)
            .await?;
        Ok(self.state.cache.store_source(key, listing))
    }

    async fn indexed_listing(&self, key: &CacheKey) -> BackendResult<Arc<IndexedListing>> {
        let cache = &self.state.cache;
        if let Some(cached) = cache.get_fresh(key, self.config.stale_after) {
            return Ok(cached);
        }

        let ticket = cache.begin_fetch(key);
        match self
            .backend
            .list_indexed_resources(&key.knowledge_base_id, &key.resource_path())
            .await
        {
            Ok(listing) => {
                let fetched = Arc::new(listing);
                if cache.complete_fetch(ticket, Arc::clone(&fetched)) {
                    Ok(fetched)
                } else {
                    // A newer write landed while we waited; show that instead
                    Ok(cache.get(key).unwrap_or(fetched))
                }
            }
            Err(e) => {
                cache.abandon_fetch(ticket);
                Err(e)
            }
        }
    }
}
