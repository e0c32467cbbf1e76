//! Picker session over a fixture-backed backend

use anyhow::{Context, Result};
use kbpick_core::project::project_entry;
use kbpick_core::{path, Resource, StatusContext};
use kbpick_state::{Notice, PickerState, ViewScope};
use kbpick_sync::{
    MemoryBackend, MutationOrchestrator, Operation, Prefetcher, SyncConfig, ViewLoader,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub struct Session {
    pub backend: Arc<MemoryBackend>,
    pub state: Arc<PickerState>,
    pub loader: ViewLoader<MemoryBackend>,
    pub orchestrator: MutationOrchestrator<MemoryBackend>,
    pub prefetcher: Prefetcher<MemoryBackend>,
    notices: mpsc::Receiver<Notice>,
}

impl Session {
    /// Load `fixture` and wire up a fresh session
    pub fn open(fixture: &Path, config: SyncConfig) -> Result<Self> {
        let text = std::fs::read_to_string(fixture)
            .with_context(|| format!("Failed to read fixture {}", fixture.display()))?;
        let backend = MemoryBackend::from_json(&text)
            .with_context(|| format!("Invalid fixture {}", fixture.display()))?;
        info!("Opened fixture {} ({})", fixture.display(), backend.connection_id());

        let backend = Arc::new(backend);
        let state = Arc::new(PickerState::new());
        let (tx, notices) = mpsc::channel(64);

        Ok(Self {
            loader: ViewLoader::new(Arc::clone(&backend), Arc::clone(&state), config),
            orchestrator: MutationOrchestrator::new(Arc::clone(&backend), Arc::clone(&state), config),
            prefetcher: Prefetcher::new(Arc::clone(&backend), Arc::clone(&state), config, tx),
            backend,
            state,
            notices,
        })
    }

    /// Make every knowledge base write fail
    pub fn fail_writes(&self) {
        for op in Operation::WRITES {
            self.backend.fail(op);
        }
    }

    /// Build the scope for `folder`, targeting `kb` or the default knowledge base
    pub async fn scope(&self, kb: Option<&str>, folder: Option<&str>) -> Result<ViewScope> {
        let mut scope = ViewScope::root(self.backend.connection_id());

        if let Some(folder_id) = folder {
            let folder = self.resource(folder_id)?;
            if !folder.is_directory() {
                anyhow::bail!("'{}' is not a folder", folder_id);
            }
            scope = scope.in_folder(folder.id, folder.path);
        }

        let directory = self
            .loader
            .knowledge_bases()
            .await
            .context("Failed to list knowledge bases")?;
        let kb = match kb {
            Some(id) => {
                directory
                    .find(id)
                    .with_context(|| format!("Unknown knowledge base: {}", id))?;
                Some(id.to_string())
            }
            None => directory.default_id(),
        };

        match kb {
            Some(id) => {
                debug!("Targeting knowledge base {}", id);
                Ok(scope.with_knowledge_base(id))
            }
            None => Ok(scope),
        }
    }

    /// Resource for a source id, without status
    pub fn resource(&self, id: &str) -> Result<Resource> {
        let entry = self
            .backend
            .source_entry(id)
            .with_context(|| format!("Unknown resource: {}", id))?;
        Ok(project_entry(entry, &StatusContext::new(None)))
    }

    /// Resource for a source id that sits directly in the scope's folder
    ///
    /// Polls only re-list the scope's folder, so anything deeper could never
    /// be seen converging.
    pub fn resource_in(&self, scope: &ViewScope, id: &str) -> Result<Resource> {
        let resource = self.resource(id)?;
        let folder = path::normalize(&scope.kb_path(), true);
        if !path::is_direct_child(&folder, &resource.key()) {
            anyhow::bail!(
                "'{}' is not in {} (pass its folder with --folder)",
                id,
                path::to_absolute(&folder)
            );
        }
        Ok(resource)
    }

    /// Notices sent since the last call
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        let mut out = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            out.push(notice);
        }
        out
    }
}
