//! Common utilities for sync integration tests

#![allow(dead_code)]

use kbpick_core::{Resource, ResourceStatus};
use kbpick_state::{CacheKey, Notice, PickerState, ViewScope};
use kbpick_sync::{MemoryBackend, MutationOrchestrator, SyncConfig, ViewLoader, ViewSnapshot};
use std::sync::Arc;
use tokio::sync::mpsc;

pub const CONNECTION: &str = "conn";
pub const KB: &str = "kb-main";

/// Small drive: a docs folder with a nested folder, two top-level files
pub const FIXTURE: &str = r#"{
    "connection_id": "conn",
    "org_id": "org-1",
    "indexing_lag_ms": 3000,
    "source": [
        {"resource_id": "d-docs", "inode_type": "directory", "inode_path": {"path": "docs/"}},
        {"resource_id": "f-readme", "inode_type": "file", "inode_path": {"path": "docs/readme.txt"}},
        {"resource_id": "f-guide", "inode_type": "file", "inode_path": {"path": "docs/guide.md"}},
        {"resource_id": "d-nested", "inode_type": "directory", "inode_path": {"path": "docs/nested/"}},
        {"resource_id": "f-deep", "inode_type": "file", "inode_path": {"path": "docs/nested/deep.txt"}},
        {"resource_id": "f-a", "inode_type": "file", "inode_path": {"path": "a.txt"}, "size": 10},
        {"resource_id": "f-report", "inode_type": "file", "inode_path": {"path": "report.pdf"},
         "modified_at": "2024-01-14T15:45:00Z"}
    ],
    "knowledge_bases": {
        "admin": [{"knowledge_base_id": "kb-main", "name": "Main", "connection_source_ids": ["f-report", "f-guide"]}],
        "editor": [{"knowledge_base_id": "kb-other", "name": "Other"}]
    },
    "indexed": {
        "kb-main": [
            {"resource_id": "f-report", "inode_type": "file", "inode_path": {"path": "report.pdf"}, "status": "indexed"},
            {"resource_id": "f-guide", "inode_type": "file", "inode_path": {"path": "docs/guide.md"}, "status": "error"}
        ]
    }
}"#;

pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub state: Arc<PickerState>,
    pub orchestrator: MutationOrchestrator<MemoryBackend>,
    pub loader: ViewLoader<MemoryBackend>,
    pub outcomes: mpsc::Receiver<Notice>,
}

impl Harness {
    pub fn new() -> Self {
        let backend = Arc::new(MemoryBackend::from_json(FIXTURE).expect("fixture parses"));
        let state = Arc::new(PickerState::new());
        let config = SyncConfig::default();
        let (tx, outcomes) = mpsc::channel(16);

        let orchestrator =
            MutationOrchestrator::new(Arc::clone(&backend), Arc::clone(&state), config).with_notices(tx);
        let loader = ViewLoader::new(Arc::clone(&backend), Arc::clone(&state), config);

        Self {
            backend,
            state,
            orchestrator,
            loader,
            outcomes,
        }
    }

    pub async fn load_root(&self) -> ViewSnapshot {
        self.loader.load(&root_scope()).await.expect("root loads")
    }
}

pub fn root_scope() -> ViewScope {
    ViewScope::root(CONNECTION).with_knowledge_base(KB)
}

pub fn docs_scope() -> ViewScope {
    ViewScope::root(CONNECTION)
        .in_folder("d-docs", "/docs/")
        .with_knowledge_base(KB)
}

pub fn root_key() -> CacheKey {
    root_scope().cache_key().expect("scope has a knowledge base")
}

pub fn resource(snapshot: &ViewSnapshot, id: &str) -> Resource {
    snapshot
        .resources
        .iter()
        .find(|r| r.id == id)
        .cloned()
        .unwrap_or_else(|| panic!("{} not in listing", id))
}

pub fn status(snapshot: &ViewSnapshot, id: &str) -> ResourceStatus {
    resource(snapshot, id).status
}
