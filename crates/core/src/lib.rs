//! kbpick core - resource model and status reconciliation
//!
//! This crate provides the pure layer of the picker:
//! - Wire shapes for the source tree and knowledge base listings
//! - Path normalization shared by both trees
//! - Status resolution (exact matches, descendant aggregation, pending ids)
//! - Projection of raw entries into view resources
//! - Sorting and filtering helpers for presentation layers

pub mod path;
pub mod project;
pub mod resource;
pub mod status;
pub mod view;
pub mod wire;

// Re-export main types for convenience
pub use project::project;
pub use resource::{Resource, ResourceKind};
pub use status::{resolve_status, RawStatus, Resolution, ResourceStatus, StatusContext};
pub use wire::{
    IndexedEntry, IndexedListing, KnowledgeBaseDirectory, KnowledgeBaseOption,
    KnowledgeBaseSummary, SourceEntry, SourceListing,
};

/// Set of resource ids, used for pending and source-id bookkeeping
pub type IdSet = ahash::AHashSet<String>;
