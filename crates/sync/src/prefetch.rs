//! Directory prefetch on hover
//!
//! Hovering a folder warms the cache with its source children and its
//! knowledge base listing, so opening it is instant. Only one prefetch runs
//! at a time; starting another supersedes it, and a superseded prefetch
//! never touches the cache or sends notices.

use crate::config::SyncConfig;
use crate::error::BackendResult;
use crate::provider::Backend;
use kbpick_core::Resource;
use kbpick_state::{CacheKey, Notice, PickerState, SourceKey, ViewScope};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct Running {
    key: String,
    handle: JoinHandle<()>,
}

/// Hover-triggered prefetcher
pub struct Prefetcher<B: Backend + ?Sized + 'static> {
    backend: Arc<B>,
    state: Arc<PickerState>,
    config: SyncConfig,
    notice_tx: mpsc::Sender<Notice>,
    generation: Arc<AtomicU64>,
    current: Mutex<Option<Running>>,
}

impl<B: Backend + ?Sized + 'static> Prefetcher<B> {
    pub fn new(
        backend: Arc<B>,
        state: Arc<PickerState>,
        config: SyncConfig,
        notice_tx: mpsc::Sender<Notice>,
    ) -> Self {
        Self {
            backend,
            state,
            config,
            notice_tx,
            generation: Arc::new(AtomicU64::new(0)),
            current: Mutex::new(None),
        }
    }

    /// Dedup key of a prefetch: connection, knowledge base, resource
    pub fn notice_key(scope: &ViewScope, resource: &Resource) -> String {
        format!(
            "{}:{}:{}",
            scope.connection_id,
            scope.knowledge_base_id.as_deref().unwrap_or("-"),
            resource.id
        )
    }

    /// Start prefetching `resource`; returns false when nothing was started
    pub fn hover(&self, scope: &ViewScope, resource: &Resource) -> bool {
        if !self.config.prefetch_enabled || !resource.is_directory() {
            return false;
        }

        let key = Self::notice_key(scope, resource);
        let mut current = self.current.lock();
        if let Some(running) = current.as_ref() {
            if running.key == key && !running.handle.is_finished() {
                return false;
            }
        }
        if let Some(previous) = current.take() {
            previous.handle.abort();
            debug!("Prefetch {} superseded", previous.key);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let name = resource.name.clone();

        if self.state.notices.first_time(&key) {
            self.send(
                Notice::info(format!("Preloading \"{}\" in the background…", name)).with_key(&key),
            );
        }

        let job = PrefetchJob {
            backend: Arc::clone(&self.backend),
            state: Arc::clone(&self.state),
            notice_tx: self.notice_tx.clone(),
            generation: Arc::clone(&self.generation),
            mine: generation,
            stale_after: self.config.stale_after,
            source_key: SourceKey::new(scope.connection_id.clone(), Some(&resource.id)),
            cache_key: scope
                .knowledge_base_id
                .as_ref()
                .map(|kb| CacheKey::new(kb.clone(), &resource.path)),
            key: key.clone(),
            name,
        };
        let handle = tokio::spawn(job.run());

        *current = Some(Running { key, handle });
        true
    }

    /// Abort the running prefetch, if any
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(running) = self.current.lock().take() {
            running.handle.abort();
            debug!("Prefetch {} cancelled", running.key);
        }
    }

    /// Wait for the running prefetch to finish
    pub async fn settle(&self) {
        let running = self.current.lock().take();
        if let Some(running) = running {
            if let Err(e) = running.handle.await {
                debug!("Prefetch {} ended early: {}", running.key, e);
            }
        }
    }

    fn send(&self, notice: Notice) {
        if let Err(e) = self.notice_tx.try_send(notice) {
            debug!("Dropping prefetch notice: {}", e);
        }
    }
}

struct PrefetchJob<B: Backend + ?Sized> {
    backend: Arc<B>,
    state: Arc<PickerState>,
    notice_tx: mpsc::Sender<Notice>,
    generation: Arc<AtomicU64>,
    mine: u64,
    stale_after: Duration,
    source_key: SourceKey,
    cache_key: Option<CacheKey>,
    key: String,
    name: String,
}

impl<B: Backend + ?Sized> PrefetchJob<B> {
    fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.mine
    }

    async fn run(self) {
        let result = self.fetch().await;
        if !self.is_current() {
            debug!("Prefetch {} finished after being superseded", self.key);
            return;
        }

        let notice = match result {
            Ok(()) => {
                if !self.state.notices.mark_completed(&self.key) {
                    return;
                }
                Notice::success(format!("\"{}\" is ready to open.", self.name))
            }
            Err(e) => {
                warn!("Prefetch of {} failed: {}", self.name, e);
                // Already announced as ready once; a failed refresh stays quiet
                if self.state.notices.is_completed(&self.key) {
                    return;
                }
                Notice::error(format!("Failed to preload \"{}\".", self.name))
            }
        };

        if self.notice_tx.send(notice.with_key(&self.key)).await.is_err() {
            debug!("Notice receiver gone");
        }
    }

    /// Fill whatever part of the cache is missing or stale
    async fn fetch(&self) -> BackendResult<()> {
        let cache = &self.state.cache;
        if cache.get_source(&self.source_key, self.stale_after).is_none() {
            let source = self
                .backend
                .list_source_children(&self.source_key.connection_id, self.source_key.parent_id.as_deref())
                .await?;
            if !self.is_current() {
                return Ok(());
            }
            cache.store_source(self.source_key.clone(), source);
        }

        let cache_key = self
            .cache_key
            .as_ref()
            .filter(|key| cache.get_fresh(key, self.stale_after).is_none());
        if let Some(cache_key) = cache_key {
            let ticket = cache.begin_fetch(cache_key);
            match self
                .backend
                .list_indexed_resources(&cache_key.knowledge_base_id, &cache_key.resource_path())
                .await
            {
                Ok(listing) if self.is_current() => {
                    cache.complete_fetch(ticket, listing);
                }
                Ok(_) => cache.abandon_fetch(ticket),
                Err(e) => {
                    cache.abandon_fetch(ticket);
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}
