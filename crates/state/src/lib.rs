//! kbpick state - session state shared by the picker
//!
//! This crate provides:
//! - Selection store with folder containment
//! - Pending-operation set for dispatched writes
//! - Merged-view cache with stale-response protection
//! - Scoped notice dedup log
//!
//! Nothing here talks to the network; `kbpick-sync` drives these types.

pub mod cache;
pub mod notice;
pub mod pending;
pub mod selection;

// Re-exports
pub use cache::{CacheKey, CacheSnapshot, FetchTicket, SourceKey, ViewCache};
pub use notice::{Notice, NoticeLevel, NoticeLog};
pub use pending::PendingSet;
pub use selection::{SelectionChange, SelectionStore};

use kbpick_core::{path, IdSet};
use parking_lot::Mutex;
use tracing::info;

/// Folder being browsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    pub id: String,
    pub path: String,
}

/// Where the picker is looking: connection, folder, target knowledge base
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewScope {
    pub connection_id: String,
    /// `None` at the connection root
    pub folder: Option<FolderRef>,
    pub knowledge_base_id: Option<String>,
}

impl ViewScope {
    pub fn root(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            folder: None,
            knowledge_base_id: None,
        }
    }

    pub fn in_folder(mut self, id: impl Into<String>, path: impl Into<String>) -> Self {
        self.folder = Some(FolderRef {
            id: id.into(),
            path: path.into(),
        });
        self
    }

    pub fn with_knowledge_base(mut self, knowledge_base_id: impl Into<String>) -> Self {
        self.knowledge_base_id = Some(knowledge_base_id.into());
        self
    }

    /// Folder path in knowledge base form ("/" at the root)
    pub fn kb_path(&self) -> String {
        match &self.folder {
            Some(folder) => path::to_knowledge_base_path(&folder.path),
            None => "/".to_string(),
        }
    }

    /// Key of the knowledge base listing for this scope
    pub fn cache_key(&self) -> Option<CacheKey> {
        self.knowledge_base_id
            .as_ref()
            .map(|kb| CacheKey::new(kb.clone(), &self.kb_path()))
    }

    /// Key of the source listing for this scope
    pub fn source_key(&self) -> SourceKey {
        SourceKey::new(
            self.connection_id.clone(),
            self.folder.as_ref().map(|f| f.id.as_str()),
        )
    }
}

/// Everything one picker session owns
///
/// Locks are short-lived and never held across an `.await`.
#[derive(Debug, Default)]
pub struct PickerState {
    pub selection: Mutex<SelectionStore>,
    pub pending: Mutex<PendingSet>,
    pub cache: ViewCache,
    pub notices: NoticeLog,
}

impl PickerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the pending ids
    pub fn pending_ids(&self) -> IdSet {
        self.pending.lock().snapshot()
    }

    /// Drop all session state when the user switches integration
    pub fn reset_for_integration_switch(&self) {
        self.selection.lock().clear();
        self.pending.lock().clear();
        self.cache.clear();
        self.notices.clear();
        info!("Picker state reset");
    }
}
