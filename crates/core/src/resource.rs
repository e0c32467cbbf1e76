//! View resources produced by projection

use crate::path;
use crate::status::ResourceStatus;
use crate::wire::IndexedEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Type of resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Regular file
    File,
    /// Folder
    Directory,
}

/// A file or folder as shown to the user
///
/// Resources carry no identity beyond one projection: they are rebuilt on
/// every fetch of either tree, so `status` is never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Stable identity from the source system
    pub id: String,
    pub kind: ResourceKind,
    /// Absolute path; directories end in `/`, files never do
    pub path: String,
    /// Last path segment
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub status: ResourceStatus,
    /// Knowledge base entry the status was derived from, for tracing only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backing_record: Option<IndexedEntry>,
}

impl Resource {
    /// Create a resource with no timestamps and `not_indexed` status
    pub fn new(id: impl Into<String>, kind: ResourceKind, raw_path: &str) -> Self {
        let key = path::normalize(raw_path, kind == ResourceKind::Directory);
        let name = path::name_of(&key);
        Self {
            id: id.into(),
            kind,
            path: path::to_absolute(&key),
            name,
            modified_at: None,
            size: None,
            status: ResourceStatus::NotIndexed,
            backing_record: None,
        }
    }

    /// Create a file resource
    pub fn file(id: impl Into<String>, raw_path: &str) -> Self {
        Self::new(id, ResourceKind::File, raw_path)
    }

    /// Create a directory resource
    pub fn directory(id: impl Into<String>, raw_path: &str) -> Self {
        Self::new(id, ResourceKind::Directory, raw_path)
    }

    pub fn is_directory(&self) -> bool {
        self.kind == ResourceKind::Directory
    }

    /// Normalized comparison key (`/docs/` -> `docs/`)
    pub fn key(&self) -> String {
        path::normalize(&self.path, self.is_directory())
    }

    /// Path to use when addressing this resource in the knowledge base
    pub fn knowledge_base_path(&self) -> String {
        path::to_knowledge_base_path(&self.path)
    }

    /// Check whether this resource, as a directory, covers `other`
    ///
    /// A file never covers anything; a directory covers itself and every
    /// descendant path.
    pub fn covers(&self, other: &Resource) -> bool {
        self.is_directory() && (self.id == other.id || path::covers(&self.key(), &other.key()))
    }
}

/// Parse an ISO 8601 timestamp, dropping values the backend mangled
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!("Ignoring unparseable timestamp {:?}: {}", raw, e);
            None
        }
    }
}
