//! Backend errors and mutation outcomes

use kbpick_state::Notice;
use thiserror::Error;
use ulid::Ulid;

/// Failure reported by a provider
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Why a mutation did not go through
///
/// The display text is what the user sees.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("Select a knowledge base first.")]
    NoKnowledgeBase,
    #[error("Select at least one file or folder")]
    EmptySelection,
    #[error("Please wait for statuses to finish loading.")]
    StatusesLoading,
    #[error("Failed to start indexing. Please try again.")]
    Index(#[source] BackendError),
    #[error("Failed to de-index resource.")]
    Deindex(#[source] BackendError),
}

impl MutationError {
    /// Rejected before any network call
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MutationError::NoKnowledgeBase | MutationError::EmptySelection | MutationError::StatusesLoading
        )
    }
}

/// Result of a mutation as reported to the caller
#[derive(Debug)]
pub struct Outcome {
    pub mutation_id: Ulid,
    pub result: Result<String, MutationError>,
}

impl Outcome {
    pub fn success(mutation_id: Ulid, message: impl Into<String>) -> Self {
        Self {
            mutation_id,
            result: Ok(message.into()),
        }
    }

    pub fn failure(mutation_id: Ulid, error: MutationError) -> Self {
        Self {
            mutation_id,
            result: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// User-facing message
    pub fn message(&self) -> String {
        match &self.result {
            Ok(message) => message.clone(),
            Err(e) => e.to_string(),
        }
    }

    pub fn error(&self) -> Option<&MutationError> {
        self.result.as_ref().err()
    }

    pub fn to_notice(&self) -> Notice {
        match &self.result {
            Ok(message) => Notice::success(message.clone()),
            Err(MutationError::StatusesLoading) => Notice::info(self.message()),
            Err(e) => Notice::error(e.to_string()),
        }
    }
}
