//! Optimistic index / de-index mutations
//!
//! Each mutation follows the same shape:
//! 1. validate (no network call on failure)
//! 2. cancel fetches in flight, snapshot the cached listing and rewrite it
//!    optimistically
//! 3. dispatch the backend writes
//! 4. on failure restore the snapshot, on success accept the server state
//!
//! Successful index writes start a convergence poll that re-fetches the
//! listing until every requested id shows up, or force-clears them once the
//! poll budget is spent. Overlapping mutations are not serialized; each one
//! restores only its own snapshot.

use crate::config::SyncConfig;
use crate::error::{MutationError, Outcome};
use crate::poll::{PollFinish, PollHandle, PollReport, PollStep, RepeatingTask};
use crate::provider::Backend;
use chrono::Utc;
use kbpick_core::status::map_raw_status;
use kbpick_core::{IndexedEntry, IndexedListing, Resource, ResourceStatus, SourceEntry};
use kbpick_state::{CacheKey, Notice, PickerState, ViewScope};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use ulid::Ulid;

/// Runs mutations against a backend and the shared picker state
pub struct MutationOrchestrator<B: Backend + ?Sized + 'static> {
    backend: Arc<B>,
    state: Arc<PickerState>,
    config: SyncConfig,
    notice_tx: Option<mpsc::Sender<Notice>>,
    polls: Mutex<Vec<PollHandle>>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl<B: Backend + ?Sized + 'static> MutationOrchestrator<B> {
    pub fn new(backend: Arc<B>, state: Arc<PickerState>, config: SyncConfig) -> Self {
        Self {
            backend,
            state,
            config,
            notice_tx: None,
            polls: Mutex::new(Vec::new()),
            background: Mutex::new(Vec::new()),
        }
    }

    /// Also report every outcome as a [`Notice`]
    pub fn with_notices(mut self, notice_tx: mpsc::Sender<Notice>) -> Self {
        self.notice_tx = Some(notice_tx);
        self
    }

    pub fn state(&self) -> &Arc<PickerState> {
        &self.state
    }

    /// Index whatever is currently selected
    pub async fn index_selected(&self, scope: &ViewScope) -> Outcome {
        let mut resources = self.state.selection.lock().resources();
        resources.sort_by(|a, b| a.path.cmp(&b.path));
        self.index_resources(scope, &resources).await
    }

    /// Add `resources` to the scope's knowledge base
    pub async fn index_resources(&self, scope: &ViewScope, resources: &[Resource]) -> Outcome {
        let mutation_id = Ulid::new();
        let outcome = match self.validate(scope, resources.is_empty()) {
            Ok(key) => self.run_index(mutation_id, key, resources).await,
            Err(e) => Outcome::failure(mutation_id, e),
        };
        self.report(&outcome);
        outcome
    }

    /// Remove one resource from the scope's knowledge base
    pub async fn deindex(&self, scope: &ViewScope, resource: &Resource) -> Outcome {
        let mutation_id = Ulid::new();
        let outcome = match self.validate(scope, false) {
            Ok(key) => self.run_deindex(mutation_id, key, resource).await,
            Err(e) => Outcome::failure(mutation_id, e),
        };
        self.report(&outcome);
        outcome
    }

    /// Single-row action: de-index an indexed or in-progress resource, index
    /// anything else
    ///
    /// Refused while `statuses_loaded` is false, since the row's status may
    /// still change.
    pub async fn row_action(&self, scope: &ViewScope, resource: &Resource, statuses_loaded: bool) -> Outcome {
        if !statuses_loaded {
            let outcome = Outcome::failure(Ulid::new(), MutationError::StatusesLoading);
            self.report(&outcome);
            return outcome;
        }

        if resource.status == ResourceStatus::Indexed || resource.status.is_in_progress() {
            self.deindex(scope, resource).await
        } else {
            self.index_resources(scope, std::slice::from_ref(resource)).await
        }
    }

    /// Abort every running convergence poll
    pub fn cancel_polls(&self) {
        let polls = std::mem::take(&mut *self.polls.lock());
        for poll in &polls {
            poll.cancel();
        }
        if !polls.is_empty() {
            info!("Cancelled {} convergence polls", polls.len());
        }
    }

    /// Number of polls that have not finished yet
    pub fn active_polls(&self) -> usize {
        self.polls.lock().iter().filter(|p| !p.is_finished()).count()
    }

    /// Wait for every poll and background task started so far
    pub async fn wait_idle(&self) -> Vec<PollReport> {
        let background = std::mem::take(&mut *self.background.lock());
        for task in background {
            if let Err(e) = task.await {
                debug!("Background task ended early: {}", e);
            }
        }

        let polls = std::mem::take(&mut *self.polls.lock());
        let mut reports = Vec::with_capacity(polls.len());
        for poll in polls {
            reports.push(poll.join().await);
        }
        reports
    }

    fn validate(&self, scope: &ViewScope, empty: bool) -> Result<CacheKey, MutationError> {
        let key = scope.cache_key().ok_or(MutationError::NoKnowledgeBase)?;
        if empty {
            return Err(MutationError::EmptySelection);
        }
        Ok(key)
    }

    async fn run_index(&self, mutation_id: Ulid, key: CacheKey, resources: &[Resource]) -> Outcome {
        let kb = key.knowledge_base_id.clone();
        let mut ids: Vec<String> = Vec::with_capacity(resources.len());
        for resource in resources {
            if !ids.contains(&resource.id) {
                ids.push(resource.id.clone());
            }
        }
        info!("[{}] Indexing {} resources into {}", mutation_id, ids.len(), kb);

        let cache = &self.state.cache;
        let snapshot = cache.snapshot(&key);
        let newly_pending = self.state.pending.lock().add_new(ids.iter().cloned());

        let mut optimistic_ids = snapshot.source_ids().map(<[String]>::to_vec).unwrap_or_default();
        merge_ids(&mut optimistic_ids, &ids);
        cache.set_source_ids(&kb, optimistic_ids);
        cache.write_optimistic(&key, |previous| mark_processing(previous, resources));

        match self.backend.add_source_ids(&kb, &ids).await {
            Ok(mut returned) => {
                merge_ids(&mut returned, &ids);
                cache.set_source_ids(&kb, returned);
                self.spawn_sync_trigger(mutation_id, kb);
                self.state.selection.lock().clear();
                self.start_convergence_poll(mutation_id, key, ids);
                Outcome::success(mutation_id, "Indexing started")
            }
            Err(e) => {
                warn!("[{}] add_source_ids failed, rolling back: {}", mutation_id, e);
                cache.restore(snapshot);
                self.state.pending.lock().remove_many(&newly_pending);
                Outcome::failure(mutation_id, MutationError::Index(e))
            }
        }
    }

    async fn run_deindex(&self, mutation_id: Ulid, key: CacheKey, resource: &Resource) -> Outcome {
        let kb = key.knowledge_base_id.clone();
        info!("[{}] De-indexing {} from {}", mutation_id, resource.path, kb);

        let cache = &self.state.cache;
        let snapshot = cache.snapshot(&key);
        let was_pending = self.state.pending.lock().remove_many([&resource.id]) > 0;

        if let Some(mut ids) = snapshot.source_ids().map(<[String]>::to_vec) {
            ids.retain(|id| *id != resource.id);
            cache.set_source_ids(&kb, ids);
        }
        cache.write_optimistic(&key, |previous| {
            let mut entries = previous.map(|l| l.entries.clone()).unwrap_or_default();
            entries.retain(|e| e.id() != resource.id);
            IndexedListing::new(entries)
        });

        // Both writes are attempted; the first failure wins the report
        let deleted = self
            .backend
            .delete_indexed_resource(&kb, &resource.knowledge_base_path())
            .await;
        let removed = self.backend.remove_source_id(&kb, &resource.id).await;

        match deleted.and(removed) {
            Ok(ids) => {
                cache.set_source_ids(&kb, ids);
                cache.invalidate_knowledge_base(&kb);
                Outcome::success(mutation_id, "Resource removed from knowledge base")
            }
            Err(e) => {
                warn!("[{}] De-index of {} failed, rolling back: {}", mutation_id, resource.id, e);
                cache.restore(snapshot);
                if was_pending {
                    self.state.pending.lock().add_many([resource.id.clone()]);
                }
                Outcome::failure(mutation_id, MutationError::Deindex(e))
            }
        }
    }

    /// Fire-and-forget sync request; failures are only logged
    fn spawn_sync_trigger(&self, mutation_id: Ulid, knowledge_base_id: String) {
        let backend = Arc::clone(&self.backend);
        let task = tokio::spawn(async move {
            let result = async {
                let org = backend.current_org().await?;
                backend.trigger_sync(&knowledge_base_id, &org).await
            }
            .await;

            match result {
                Ok(()) => debug!("[{}] Sync triggered for {}", mutation_id, knowledge_base_id),
                Err(e) => warn!("[{}] Sync trigger for {} failed: {}", mutation_id, knowledge_base_id, e),
            }
        });
        self.background.lock().push(task);
    }

    fn start_convergence_poll(&self, mutation_id: Ulid, key: CacheKey, ids: Vec<String>) {
        let task = RepeatingTask::new(self.config.poll_interval, self.config.poll_max_attempts);
        let ids = Arc::new(ids);

        let step = {
            let backend = Arc::clone(&self.backend);
            let state = Arc::clone(&self.state);
            let key = key.clone();
            let ids = Arc::clone(&ids);
            move |attempt: u32| {
                let backend = Arc::clone(&backend);
                let state = Arc::clone(&state);
                let key = key.clone();
                let ids = Arc::clone(&ids);
                async move { poll_once(mutation_id, attempt, &*backend, &state, key, &ids).await }
            }
        };

        let on_finish = {
            let state = Arc::clone(&self.state);
            move |report: &PollReport| {
                if report.finish == PollFinish::Exhausted {
                    let cleared = state.pending.lock().remove_many(ids.iter());
                    warn!(
                        "[{}] Poll budget spent after {} attempts, cleared {} pending ids",
                        mutation_id, report.attempts, cleared
                    );
                } else {
                    info!("[{}] Indexing visible after {} polls", mutation_id, report.attempts);
                }
                state.cache.invalidate_knowledge_base(&key.knowledge_base_id);
            }
        };

        let handle = task.spawn(step, on_finish);
        let mut polls = self.polls.lock();
        polls.retain(|p| !p.is_finished());
        polls.push(handle);
    }

    fn report(&self, outcome: &Outcome) {
        if let Some(tx) = &self.notice_tx {
            if let Err(e) = tx.try_send(outcome.to_notice()) {
                debug!("Dropping outcome notice: {}", e);
            }
        }
    }
}

/// One convergence attempt: refetch, unmark ids that became visible
async fn poll_once<B: Backend + ?Sized>(
    mutation_id: Ulid,
    attempt: u32,
    backend: &B,
    state: &PickerState,
    key: CacheKey,
    ids: &[String],
) -> PollStep {
    let ticket = state.cache.begin_fetch(&key);
    let listing = match backend
        .list_indexed_resources(&key.knowledge_base_id, &key.resource_path())
        .await
    {
        Ok(listing) => listing,
        Err(e) => {
            warn!("[{}] Poll attempt {} failed: {}", mutation_id, attempt, e);
            state.cache.abandon_fetch(ticket);
            return PollStep::Continue;
        }
    };

    let visible: Vec<&String> = ids
        .iter()
        .filter(|id| {
            listing
                .find(id)
                .is_some_and(|e| map_raw_status(e.status.as_ref()) != ResourceStatus::NotIndexed)
        })
        .collect();
    let converged = visible.len() == ids.len();

    state.pending.lock().remove_many(visible);
    if !state.cache.complete_fetch(ticket, listing) {
        debug!("[{}] Poll result superseded", mutation_id);
    }

    debug!("[{}] Poll attempt {}: converged={}", mutation_id, attempt, converged);
    if converged {
        PollStep::Done
    } else {
        PollStep::Continue
    }
}

/// Append `extra` ids missing from `ids`, keeping order
fn merge_ids(ids: &mut Vec<String>, extra: &[String]) {
    for id in extra {
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }
}

/// Rewrite a listing so every targeted resource reads `processing`
///
/// Existing entries are replaced in place so a resource never appears twice;
/// new ones are appended.
fn mark_processing(previous: Option<&IndexedListing>, resources: &[Resource]) -> IndexedListing {
    let mut entries = previous.map(|l| l.entries.clone()).unwrap_or_default();

    for resource in resources {
        let optimistic = IndexedEntry::new(source_entry_of(resource), "processing");
        match entries.iter_mut().find(|e| e.id() == resource.id) {
            Some(existing) => *existing = optimistic,
            None => entries.push(optimistic),
        }
    }
    IndexedListing::new(entries)
}

fn source_entry_of(resource: &Resource) -> SourceEntry {
    if let Some(record) = &resource.backing_record {
        return record.entry.clone();
    }

    let mut entry = if resource.is_directory() {
        SourceEntry::directory(resource.id.clone(), resource.path.clone())
    } else {
        SourceEntry::file(resource.id.clone(), resource.path.clone())
    };
    entry.size = resource.size;
    entry.modified_at = Some(resource.modified_at.unwrap_or_else(Utc::now).to_rfc3339());
    entry
}
