//! Ids with a dispatched but unconfirmed write

use kbpick_core::IdSet;
use tracing::debug;

/// Pending-operation set
///
/// An id enters when an index write is dispatched and leaves once a poll
/// shows it past `not_indexed`, when the poll budget runs out, or when the
/// mutation fails.
#[derive(Debug, Clone, Default)]
pub struct PendingSet {
    ids: IdSet,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_many<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            self.ids.insert(id.into());
        }
        debug!("Pending ids: {}", self.ids.len());
    }

    /// Add ids, returning the ones that were not pending yet
    ///
    /// A failed mutation hands exactly these back to [`PendingSet::remove_many`]
    /// so it never clears ids another mutation is still tracking.
    pub fn add_new<I, S>(&mut self, ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let added: Vec<String> = ids
            .into_iter()
            .map(Into::into)
            .filter(|id| self.ids.insert(id.clone()))
            .collect();
        debug!("Pending ids: {} ({} new)", self.ids.len(), added.len());
        added
    }

    /// Remove ids, returning how many were actually pending
    pub fn remove_many<I, S>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter()
            .filter(|id| self.ids.remove(id.as_ref()))
            .count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Copy of the current ids, for projection outside the lock
    pub fn snapshot(&self) -> IdSet {
        self.ids.clone()
    }
}
