//! Contracts for the remote services the picker talks to
//!
//! Transport, auth and retries live behind these traits. Every method is a
//! suspension point; implementations must be cheap to share across tasks.

use crate::error::BackendResult;
use async_trait::async_trait;
use kbpick_core::wire::SummaryPatch;
use kbpick_core::{IndexedListing, KnowledgeBaseDirectory, KnowledgeBaseSummary, SourceListing};

/// Lists the connection (cloud drive) tree
#[async_trait]
pub trait SourceTreeProvider: Send + Sync {
    /// Children of `parent_id`, or the connection root when `None`
    async fn list_source_children(
        &self,
        connection_id: &str,
        parent_id: Option<&str>,
    ) -> BackendResult<SourceListing>;
}

/// Lists what a knowledge base has indexed
#[async_trait]
pub trait KnowledgeBaseTreeProvider: Send + Sync {
    /// Entries under `resource_path` ("/" for the root)
    async fn list_indexed_resources(
        &self,
        knowledge_base_id: &str,
        resource_path: &str,
    ) -> BackendResult<IndexedListing>;
}

#[async_trait]
pub trait KnowledgeBaseRegistry: Send + Sync {
    async fn get_summary(&self, knowledge_base_id: &str) -> BackendResult<KnowledgeBaseSummary>;

    async fn update_summary(
        &self,
        knowledge_base_id: &str,
        patch: SummaryPatch,
    ) -> BackendResult<KnowledgeBaseSummary>;

    /// Knowledge bases visible to the user, grouped by role
    async fn list_knowledge_bases(&self) -> BackendResult<KnowledgeBaseDirectory>;
}

#[async_trait]
pub trait WriteApi: Send + Sync {
    /// Add source ids to a knowledge base; returns the resulting id list
    async fn add_source_ids(
        &self,
        knowledge_base_id: &str,
        resource_ids: &[String],
    ) -> BackendResult<Vec<String>>;

    /// Remove one source id; returns the resulting id list
    async fn remove_source_id(
        &self,
        knowledge_base_id: &str,
        resource_id: &str,
    ) -> BackendResult<Vec<String>>;

    /// Delete indexed content at `resource_path`
    async fn delete_indexed_resource(
        &self,
        knowledge_base_id: &str,
        resource_path: &str,
    ) -> BackendResult<()>;

    /// Ask the backend to re-sync the knowledge base (best-effort)
    async fn trigger_sync(&self, knowledge_base_id: &str, org_id: &str) -> BackendResult<()>;

    /// Organisation of the signed-in user
    async fn current_org(&self) -> BackendResult<String>;
}

/// Everything the picker needs from the remote side
pub trait Backend:
    SourceTreeProvider + KnowledgeBaseTreeProvider + KnowledgeBaseRegistry + WriteApi
{
}

impl<T> Backend for T where
    T: SourceTreeProvider + KnowledgeBaseTreeProvider + KnowledgeBaseRegistry + WriteApi
{
}
