//! Status resolution against the knowledge base tree
//!
//! A resource's status is derived, never stored: it is recomputed from the
//! knowledge base snapshot, any previously fetched nested listings and the
//! locally tracked pending ids every time a listing changes.

use crate::path;
use crate::wire::{IndexedEntry, IndexedListing, SourceEntry};
use crate::IdSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Indexing status shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    NotIndexed,
    /// Write dispatched locally, backend has no record yet
    Pending,
    Processing,
    Indexed,
    Error,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::NotIndexed => "not_indexed",
            ResourceStatus::Pending => "pending",
            ResourceStatus::Processing => "processing",
            ResourceStatus::Indexed => "indexed",
            ResourceStatus::Error => "error",
        }
    }

    /// Pending and processing are indistinguishable to the user
    pub fn is_in_progress(&self) -> bool {
        matches!(self, ResourceStatus::Pending | ResourceStatus::Processing)
    }

    /// Badge text
    pub fn label(&self) -> &'static str {
        match self {
            ResourceStatus::NotIndexed => "Not indexed",
            ResourceStatus::Pending | ResourceStatus::Processing => "Processing",
            ResourceStatus::Indexed => "Indexed",
            ResourceStatus::Error => "Error",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw status string reported by the knowledge base
///
/// The backend adds statuses without notice, so unknown values are carried
/// verbatim in `Other` and resolve to `not_indexed`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RawStatus {
    Indexed,
    Processing,
    Pending,
    Error,
    Other(String),
}

impl RawStatus {
    /// Map to the user-facing status
    pub fn to_status(&self) -> ResourceStatus {
        match self {
            RawStatus::Indexed => ResourceStatus::Indexed,
            RawStatus::Processing | RawStatus::Pending => ResourceStatus::Processing,
            RawStatus::Error => ResourceStatus::Error,
            RawStatus::Other(_) => ResourceStatus::NotIndexed,
        }
    }

    /// True while the backend is still working on the entry
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RawStatus::Processing | RawStatus::Pending)
    }

    pub fn as_str(&self) -> &str {
        match self {
            RawStatus::Indexed => "indexed",
            RawStatus::Processing => "processing",
            RawStatus::Pending => "pending",
            RawStatus::Error => "error",
            RawStatus::Other(s) => s,
        }
    }
}

impl From<String> for RawStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "indexed" => RawStatus::Indexed,
            "processing" => RawStatus::Processing,
            "pending" => RawStatus::Pending,
            "error" => RawStatus::Error,
            _ => RawStatus::Other(raw),
        }
    }
}

impl From<&str> for RawStatus {
    fn from(raw: &str) -> Self {
        RawStatus::from(raw.to_string())
    }
}

impl From<RawStatus> for String {
    fn from(status: RawStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Map an optional raw status; missing values count as not indexed
pub fn map_raw_status(raw: Option<&RawStatus>) -> ResourceStatus {
    raw.map(RawStatus::to_status)
        .unwrap_or(ResourceStatus::NotIndexed)
}

/// Everything status resolution reads
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusContext<'a> {
    /// Knowledge base listing for the folder being viewed
    pub snapshot: Option<&'a IndexedListing>,
    /// Ids with a dispatched but unconfirmed index write
    pub pending: Option<&'a IdSet>,
    /// Previously fetched listings of nested folders
    pub descendants: &'a [Arc<IndexedListing>],
}

impl<'a> StatusContext<'a> {
    pub fn new(snapshot: Option<&'a IndexedListing>) -> Self {
        Self {
            snapshot,
            pending: None,
            descendants: &[],
        }
    }

    pub fn with_pending(mut self, pending: &'a IdSet) -> Self {
        self.pending = Some(pending);
        self
    }

    pub fn with_descendants(mut self, descendants: &'a [Arc<IndexedListing>]) -> Self {
        self.descendants = descendants;
        self
    }

    fn is_pending(&self, id: &str) -> bool {
        self.pending.is_some_and(|p| p.contains(id))
    }

    /// Status to use when the knowledge base has nothing to say
    fn fallback(&self, id: &str) -> ResourceStatus {
        if self.is_pending(id) {
            ResourceStatus::Pending
        } else {
            ResourceStatus::NotIndexed
        }
    }
}

/// Result of resolving one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution<'a> {
    pub status: ResourceStatus,
    /// Entry the status came from; absent for aggregates and fallbacks
    pub matched: Option<&'a IndexedEntry>,
}

impl<'a> Resolution<'a> {
    fn unmatched(status: ResourceStatus) -> Self {
        Self { status, matched: None }
    }

    fn from_entry(entry: &'a IndexedEntry) -> Self {
        Self {
            status: map_raw_status(entry.status.as_ref()),
            matched: Some(entry),
        }
    }
}

/// Resolve the indexing status of a source entry
///
/// Files are looked up by id. Directories use an explicit directory entry
/// when the knowledge base has one, otherwise the most urgent status among
/// their descendants: error, then in-progress, then indexed.
pub fn resolve_status<'a>(entry: &SourceEntry, ctx: &StatusContext<'a>) -> Resolution<'a> {
    let id = entry.resource_id.as_str();
    let snapshot = match ctx.snapshot {
        Some(snapshot) => snapshot,
        None => return Resolution::unmatched(ctx.fallback(id)),
    };

    if !entry.is_directory() {
        return match snapshot.find(id) {
            Some(found) => Resolution::from_entry(found),
            None => Resolution::unmatched(ctx.fallback(id)),
        };
    }

    let dir_key = entry.key();
    if let Some(exact) = snapshot
        .entries
        .iter()
        .find(|e| e.entry.is_directory() && e.key() == dir_key)
    {
        return Resolution::from_entry(exact);
    }

    Resolution::unmatched(aggregate_descendants(&dir_key, id, snapshot, ctx))
}

fn aggregate_descendants(
    dir_key: &str,
    id: &str,
    snapshot: &IndexedListing,
    ctx: &StatusContext<'_>,
) -> ResourceStatus {
    let mut seen = ahash::AHashSet::new();
    let mut in_progress = false;
    let mut indexed = false;

    let candidates = snapshot
        .entries
        .iter()
        .chain(ctx.descendants.iter().flat_map(|l| l.entries.iter()));

    for candidate in candidates {
        if !seen.insert(candidate.id()) {
            continue;
        }
        if !path::is_strict_descendant(dir_key, &candidate.key()) {
            continue;
        }

        match map_raw_status(candidate.status.as_ref()) {
            ResourceStatus::Error => return ResourceStatus::Error,
            s if s.is_in_progress() => in_progress = true,
            ResourceStatus::Indexed => indexed = true,
            _ => {}
        }
    }

    if in_progress {
        ResourceStatus::Processing
    } else if indexed {
        ResourceStatus::Indexed
    } else {
        ctx.fallback(id)
    }
}
