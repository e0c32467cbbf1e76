//! kbpick sync - mutations, polling and fetching against the remote side
//!
//! This crate provides:
//! - Provider traits for the source tree, knowledge base tree, registry and writes
//! - Optimistic index / de-index with rollback and a bounded convergence poll
//! - A cancellable repeating task used by the poll
//! - The view loader (fetch, cache, project, refetch policy)
//! - Hover prefetch of folders with deduplicated notices
//! - An in-memory backend fed from JSON fixtures

pub mod config;
pub mod error;
pub mod loader;
pub mod memory;
pub mod orchestrator;
pub mod poll;
pub mod prefetch;
pub mod provider;

// Re-exports
pub use config::SyncConfig;
pub use error::{BackendError, BackendResult, MutationError, Outcome};
pub use loader::{ViewLoader, ViewSnapshot};
pub use memory::{Fixture, MemoryBackend, Operation};
pub use orchestrator::MutationOrchestrator;
pub use poll::{PollFinish, PollHandle, PollReport, PollStep, RepeatingTask};
pub use prefetch::Prefetcher;
pub use provider::{
    Backend, KnowledgeBaseRegistry, KnowledgeBaseTreeProvider, SourceTreeProvider, WriteApi,
};
