//! In-memory backend driven by a JSON fixture
//!
//! Serves a fixed source tree and a set of knowledge bases. Indexing is
//! simulated with a configurable lag: added resources stay invisible for one
//! lag period, then report `processing`, then settle to `indexed` (or
//! `error` for ids listed as failing). Individual operations can be made to
//! fail and slowed down, which is how the rollback and stale-response paths
//! are exercised.

use crate::error::{BackendError, BackendResult};
use crate::provider::{
    KnowledgeBaseRegistry, KnowledgeBaseTreeProvider, SourceTreeProvider, WriteApi,
};
use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;
use kbpick_core::wire::SummaryPatch;
use kbpick_core::{
    path, IndexedEntry, IndexedListing, KnowledgeBaseDirectory, KnowledgeBaseSummary,
    SourceEntry, SourceListing,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Backend operations, used for failure injection and call accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ListSourceChildren,
    ListIndexedResources,
    GetSummary,
    UpdateSummary,
    ListKnowledgeBases,
    AddSourceIds,
    RemoveSourceId,
    DeleteIndexedResource,
    TriggerSync,
    CurrentOrg,
}

impl Operation {
    /// Operations that write to the knowledge base
    pub const WRITES: [Operation; 3] = [
        Operation::AddSourceIds,
        Operation::RemoveSourceId,
        Operation::DeleteIndexedResource,
    ];
}

fn default_org() -> String {
    "org".to_string()
}

/// Fixture file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    pub connection_id: String,
    #[serde(default = "default_org")]
    pub org_id: String,
    /// Flat list of every source entry; the tree comes from the paths
    #[serde(default)]
    pub source: Vec<SourceEntry>,
    #[serde(default)]
    pub knowledge_bases: KnowledgeBaseDirectory,
    /// Already indexed entries per knowledge base id
    #[serde(default)]
    pub indexed: BTreeMap<String, Vec<IndexedEntry>>,
    #[serde(default)]
    pub indexing_lag_ms: u64,
    /// Ids that end up in `error` once indexing settles
    #[serde(default)]
    pub failing_ids: Vec<String>,
    /// Operations that fail from the start
    #[serde(default)]
    pub fail: Vec<Operation>,
}

#[derive(Debug, Clone)]
struct Record {
    entry: IndexedEntry,
    /// `None` for fixture records, which keep their status
    timeline: Option<(Instant, Instant)>,
}

impl Record {
    fn observe(&self, now: Instant, failing: &AHashSet<String>) -> Option<IndexedEntry> {
        let Some((visible_at, ready_at)) = self.timeline else {
            return Some(self.entry.clone());
        };

        if now < visible_at {
            return None;
        }

        let status = if now < ready_at {
            "processing"
        } else if failing.contains(self.entry.id()) {
            "error"
        } else {
            "indexed"
        };
        Some(IndexedEntry::new(self.entry.entry.clone(), status))
    }
}

#[derive(Debug, Default)]
struct Inner {
    directory: KnowledgeBaseDirectory,
    records: AHashMap<String, Vec<Record>>,
    failing_ids: AHashSet<String>,
}

impl Inner {
    fn summaries_mut(&mut self, knowledge_base_id: &str) -> Vec<&mut KnowledgeBaseSummary> {
        let d = &mut self.directory;
        [&mut d.admin, &mut d.editor, &mut d.viewer]
            .into_iter()
            .flatten()
            .flatten()
            .filter(|s| s.knowledge_base_id == knowledge_base_id)
            .collect()
    }

    fn source_ids(&self, knowledge_base_id: &str) -> BackendResult<Vec<String>> {
        self.directory
            .find(knowledge_base_id)
            .map(|s| s.connection_source_ids.clone())
            .ok_or_else(|| BackendError::NotFound(format!("knowledge base {}", knowledge_base_id)))
    }

    fn set_source_ids(&mut self, knowledge_base_id: &str, ids: &[String]) {
        for summary in self.summaries_mut(knowledge_base_id) {
            summary.connection_source_ids = ids.to_vec();
        }
    }
}

/// Backend that keeps everything in process
#[derive(Debug)]
pub struct MemoryBackend {
    connection_id: String,
    org_id: String,
    source: Vec<SourceEntry>,
    lag: Duration,
    inner: Mutex<Inner>,
    failing_ops: Mutex<AHashSet<Operation>>,
    latency: Mutex<AHashMap<Operation, Duration>>,
    calls: Mutex<AHashMap<Operation, usize>>,
}

impl MemoryBackend {
    pub fn from_fixture(fixture: Fixture) -> Self {
        let records = fixture
            .indexed
            .into_iter()
            .map(|(kb, entries)| {
                let records = entries
                    .into_iter()
                    .map(|entry| Record { entry, timeline: None })
                    .collect();
                (kb, records)
            })
            .collect();

        Self {
            connection_id: fixture.connection_id,
            org_id: fixture.org_id,
            source: fixture.source,
            lag: Duration::from_millis(fixture.indexing_lag_ms),
            inner: Mutex::new(Inner {
                directory: fixture.knowledge_bases,
                records,
                failing_ids: fixture.failing_ids.into_iter().collect(),
            }),
            failing_ops: Mutex::new(fixture.fail.into_iter().collect()),
            latency: Mutex::new(AHashMap::new()),
            calls: Mutex::new(AHashMap::new()),
        }
    }

    pub fn from_json(json: &str) -> BackendResult<Self> {
        let fixture: Fixture = serde_json::from_str(json)?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Make `op` fail until healed
    pub fn fail(&self, op: Operation) {
        self.failing_ops.lock().insert(op);
    }

    pub fn heal(&self, op: Operation) {
        self.failing_ops.lock().remove(&op);
    }

    /// Delay every call of `op`
    pub fn set_latency(&self, op: Operation, delay: Duration) {
        self.latency.lock().insert(op, delay);
    }

    /// Number of calls made to `op`
    pub fn calls(&self, op: Operation) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Look up a source entry by id
    pub fn source_entry(&self, id: &str) -> Option<&SourceEntry> {
        self.source.iter().find(|e| e.resource_id == id)
    }

    async fn enter(&self, op: Operation) -> BackendResult<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;

        let delay = self.latency.lock().get(&op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_ops.lock().contains(&op) {
            debug!("Injected failure for {:?}", op);
            return Err(BackendError::Status {
                status: 503,
                message: format!("{:?} unavailable", op),
            });
        }
        Ok(())
    }

    /// The entry plus, for folders, every source entry below it
    fn expand(&self, root: &SourceEntry) -> Vec<SourceEntry> {
        if !root.is_directory() {
            return vec![root.clone()];
        }
        let key = root.key();
        self.source
            .iter()
            .filter(|e| e.resource_id == root.resource_id || path::covers(&key, &e.key()))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SourceTreeProvider for MemoryBackend {
    async fn list_source_children(
        &self,
        connection_id: &str,
        parent_id: Option<&str>,
    ) -> BackendResult<SourceListing> {
        self.enter(Operation::ListSourceChildren).await?;

        if connection_id != self.connection_id {
            return Err(BackendError::NotFound(format!("connection {}", connection_id)));
        }

        let folder = match parent_id {
            None => String::new(),
            Some(id) => self
                .source_entry(id)
                .filter(|e| e.is_directory())
                .map(SourceEntry::key)
                .ok_or_else(|| BackendError::NotFound(format!("folder {}", id)))?,
        };

        let children = self
            .source
            .iter()
            .filter(|e| path::is_direct_child(&folder, &e.key()))
            .cloned()
            .collect();
        Ok(SourceListing::new(children))
    }
}

#[async_trait]
impl KnowledgeBaseTreeProvider for MemoryBackend {
    async fn list_indexed_resources(
        &self,
        knowledge_base_id: &str,
        resource_path: &str,
    ) -> BackendResult<IndexedListing> {
        self.enter(Operation::ListIndexedResources).await?;

        let folder = path::normalize(resource_path, true);
        let now = Instant::now();
        let inner = self.inner.lock();
        inner.source_ids(knowledge_base_id)?;

        let entries = inner
            .records
            .get(knowledge_base_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| path::is_direct_child(&folder, &r.entry.key()))
                    .filter_map(|r| r.observe(now, &inner.failing_ids))
                    .collect()
            })
            .unwrap_or_default();
        Ok(IndexedListing::new(entries))
    }
}

#[async_trait]
impl KnowledgeBaseRegistry for MemoryBackend {
    async fn get_summary(&self, knowledge_base_id: &str) -> BackendResult<KnowledgeBaseSummary> {
        self.enter(Operation::GetSummary).await?;
        self.inner
            .lock()
            .directory
            .find(knowledge_base_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("knowledge base {}", knowledge_base_id)))
    }

    async fn update_summary(
        &self,
        knowledge_base_id: &str,
        patch: SummaryPatch,
    ) -> BackendResult<KnowledgeBaseSummary> {
        self.enter(Operation::UpdateSummary).await?;
        let mut inner = self.inner.lock();
        let mut summaries = inner.summaries_mut(knowledge_base_id);
        if summaries.is_empty() {
            return Err(BackendError::NotFound(format!("knowledge base {}", knowledge_base_id)));
        }

        for summary in summaries.iter_mut() {
            if let Some(name) = &patch.name {
                summary.name = name.clone();
            }
            if let Some(description) = &patch.description {
                summary.description = Some(description.clone());
            }
            if let Some(ids) = &patch.connection_source_ids {
                summary.connection_source_ids = ids.clone();
            }
        }
        Ok(summaries[0].clone())
    }

    async fn list_knowledge_bases(&self) -> BackendResult<KnowledgeBaseDirectory> {
        self.enter(Operation::ListKnowledgeBases).await?;
        Ok(self.inner.lock().directory.clone())
    }
}

#[async_trait]
impl WriteApi for MemoryBackend {
    async fn add_source_ids(
        &self,
        knowledge_base_id: &str,
        resource_ids: &[String],
    ) -> BackendResult<Vec<String>> {
        self.enter(Operation::AddSourceIds).await?;

        let mut added = Vec::new();
        for id in resource_ids {
            let root = self
                .source_entry(id)
                .ok_or_else(|| BackendError::NotFound(format!("resource {}", id)))?;
            added.extend(self.expand(root));
        }

        let now = Instant::now();
        let timeline = Some((now + self.lag, now + self.lag * 2));

        let mut inner = self.inner.lock();
        let mut ids = inner.source_ids(knowledge_base_id)?;
        for id in resource_ids {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        inner.set_source_ids(knowledge_base_id, &ids);

        let records = inner.records.entry(knowledge_base_id.to_string()).or_default();
        for entry in added {
            records.retain(|r| r.entry.id() != entry.resource_id);
            records.push(Record {
                entry: IndexedEntry::new(entry, "pending"),
                timeline,
            });
        }

        debug!("Added {} source ids to {}", resource_ids.len(), knowledge_base_id);
        Ok(ids)
    }

    async fn remove_source_id(
        &self,
        knowledge_base_id: &str,
        resource_id: &str,
    ) -> BackendResult<Vec<String>> {
        self.enter(Operation::RemoveSourceId).await?;
        let mut inner = self.inner.lock();
        let mut ids = inner.source_ids(knowledge_base_id)?;
        ids.retain(|id| id != resource_id);
        inner.set_source_ids(knowledge_base_id, &ids);
        Ok(ids)
    }

    async fn delete_indexed_resource(
        &self,
        knowledge_base_id: &str,
        resource_path: &str,
    ) -> BackendResult<()> {
        self.enter(Operation::DeleteIndexedResource).await?;
        let is_directory = resource_path.ends_with('/');
        let target = path::normalize(resource_path, is_directory);

        let mut inner = self.inner.lock();
        inner.source_ids(knowledge_base_id)?;
        if let Some(records) = inner.records.get_mut(knowledge_base_id) {
            records.retain(|r| {
                let key = r.entry.key();
                if is_directory {
                    !path::covers(&target, &key)
                } else {
                    key != target
                }
            });
        }
        Ok(())
    }

    async fn trigger_sync(&self, knowledge_base_id: &str, org_id: &str) -> BackendResult<()> {
        self.enter(Operation::TriggerSync).await?;
        debug!("Sync requested for {} in {}", knowledge_base_id, org_id);
        Ok(())
    }

    async fn current_org(&self) -> BackendResult<String> {
        self.enter(Operation::CurrentOrg).await?;
        Ok(self.org_id.clone())
    }
}
