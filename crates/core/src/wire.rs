//! Wire shapes returned by the source tree and knowledge base providers
//!
//! These mirror the remote API closely and are never shown to users
//! directly; [`crate::project`] turns them into [`crate::Resource`]s.

use crate::resource::ResourceKind;
use crate::status::RawStatus;
use serde::{Deserialize, Serialize};

/// Path wrapper used by the remote API (`{"path": "/docs/"}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InodePath {
    pub path: String,
}

/// Loader-provided metadata attached to source entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataloaderMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
}

/// One entry of a connection (source tree) listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Stable identity from the source system
    pub resource_id: String,
    pub inode_type: ResourceKind,
    pub inode_path: InodePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataloader_metadata: Option<DataloaderMetadata>,
}

impl SourceEntry {
    /// Create a file entry
    pub fn file(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(id, ResourceKind::File, path)
    }

    /// Create a directory entry
    pub fn directory(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(id, ResourceKind::Directory, path)
    }

    fn new(id: impl Into<String>, kind: ResourceKind, path: impl Into<String>) -> Self {
        Self {
            resource_id: id.into(),
            inode_type: kind,
            inode_path: InodePath { path: path.into() },
            modified_at: None,
            size: None,
            dataloader_metadata: None,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.inode_type == ResourceKind::Directory
    }

    /// Normalized comparison key of this entry's path
    pub fn key(&self) -> String {
        crate::path::normalize(&self.inode_path.path, self.is_directory())
    }

    /// Last modification time, preferring the loader's timestamp
    pub fn last_modified(&self) -> Option<&str> {
        self.dataloader_metadata
            .as_ref()
            .and_then(|m| m.last_modified_at.as_deref())
            .or(self.modified_at.as_deref())
    }
}

/// One entry of a knowledge base listing: a source entry plus its raw status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedEntry {
    #[serde(flatten)]
    pub entry: SourceEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RawStatus>,
}

impl IndexedEntry {
    pub fn new(entry: SourceEntry, status: impl Into<RawStatus>) -> Self {
        Self {
            entry,
            status: Some(status.into()),
        }
    }

    pub fn id(&self) -> &str {
        &self.entry.resource_id
    }

    pub fn key(&self) -> String {
        self.entry.key()
    }
}

/// A listing response (`{"data": [...]}` on the wire)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing<T> {
    #[serde(rename = "data", alias = "entries", default = "Vec::new")]
    pub entries: Vec<T>,
}

impl<T> Listing<T> {
    pub fn new(entries: Vec<T>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

pub type SourceListing = Listing<SourceEntry>;
pub type IndexedListing = Listing<IndexedEntry>;

impl IndexedListing {
    /// Find an entry by resource id
    pub fn find(&self, id: &str) -> Option<&IndexedEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    /// True if any entry is still pending or processing on the backend
    pub fn has_work_in_flight(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.status.as_ref().is_some_and(RawStatus::is_in_flight))
    }
}

/// Knowledge base summary as listed by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBaseSummary {
    pub knowledge_base_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Source resource ids the knowledge base indexes
    #[serde(default)]
    pub connection_source_ids: Vec<String>,
}

/// Partial update sent to the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_source_ids: Option<Vec<String>>,
}

/// Knowledge bases visible to the user, grouped by role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBaseDirectory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<Vec<KnowledgeBaseSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<Vec<KnowledgeBaseSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer: Option<Vec<KnowledgeBaseSummary>>,
}

/// Selectable knowledge base (id + display name)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeBaseOption {
    pub id: String,
    pub name: String,
}

impl KnowledgeBaseDirectory {
    /// Iterate summaries in role order: admin, editor, viewer
    pub fn summaries(&self) -> impl Iterator<Item = &KnowledgeBaseSummary> {
        [&self.admin, &self.editor, &self.viewer]
            .into_iter()
            .flatten()
            .flatten()
    }

    /// Flatten into options; a knowledge base listed under several roles
    /// appears once
    pub fn flatten(&self) -> Vec<KnowledgeBaseOption> {
        let mut seen = ahash::AHashSet::new();
        self.summaries()
            .filter(|s| seen.insert(s.knowledge_base_id.as_str()))
            .map(|s| KnowledgeBaseOption {
                id: s.knowledge_base_id.clone(),
                name: s.name.clone(),
            })
            .collect()
    }

    /// Find the first summary with the given id
    pub fn find(&self, knowledge_base_id: &str) -> Option<&KnowledgeBaseSummary> {
        self.summaries()
            .find(|s| s.knowledge_base_id == knowledge_base_id)
    }

    /// Default knowledge base when the user has not chosen one
    pub fn default_id(&self) -> Option<String> {
        self.flatten().into_iter().next().map(|o| o.id)
    }
}
