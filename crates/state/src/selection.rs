//! Selection store with hierarchical containment
//!
//! Selecting a folder covers everything below it, so the store never holds a
//! folder together with one of its descendants:
//! - selecting a folder prunes previously selected descendants
//! - selecting something already under a selected folder is a no-op
//! - deselecting only removes the entry itself

use ahash::AHashMap;
use kbpick_core::{path, Resource};
use tracing::debug;

/// What a toggle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    /// Inserted; `pruned` descendants were absorbed
    Selected { pruned: usize },
    /// Removed an existing entry
    Deselected,
    /// Already covered by a selected folder, nothing changed
    AlreadyCovered,
}

/// Selected resources keyed by id
#[derive(Debug, Clone, Default)]
pub struct SelectionStore {
    items: AHashMap<String, Resource>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.items.values()
    }

    /// Ids of the selected resources (unordered)
    pub fn ids(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }

    /// Snapshot of the selected resources (unordered)
    pub fn resources(&self) -> Vec<Resource> {
        self.items.values().cloned().collect()
    }

    /// Select or deselect a resource
    pub fn toggle(&mut self, resource: Resource) -> SelectionChange {
        if self.items.remove(&resource.id).is_some() {
            debug!("Deselected {}", resource.path);
            return SelectionChange::Deselected;
        }

        if let Some(folder) = self.covering(&resource) {
            debug!("{} already covered by {}", resource.path, folder.path);
            return SelectionChange::AlreadyCovered;
        }

        let pruned = self.insert_pruning(resource);
        SelectionChange::Selected { pruned }
    }

    /// Select several resources in order, skipping covered ones
    ///
    /// Returns how many resources were inserted.
    pub fn add_many<I>(&mut self, resources: I) -> usize
    where
        I: IntoIterator<Item = Resource>,
    {
        let mut added = 0;
        for resource in resources {
            if self.items.contains_key(&resource.id) || self.covering(&resource).is_some() {
                continue;
            }
            self.insert_pruning(resource);
            added += 1;
        }
        added
    }

    /// Drop every selection
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// True if the resource is selected directly or through a selected folder
    pub fn is_selected(&self, resource: &Resource) -> bool {
        self.items.contains_key(&resource.id) || self.covering(resource).is_some()
    }

    /// True if the id itself is selected
    ///
    /// A bare id has no path, so folder coverage cannot be checked here.
    pub fn contains_id(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// True when `resources` is non-empty and every entry is selected
    pub fn all_selected(&self, resources: &[Resource]) -> bool {
        !resources.is_empty() && resources.iter().all(|r| self.is_selected(r))
    }

    /// Check the containment invariant: no entry covers another
    pub fn holds_containment(&self) -> bool {
        self.items.values().all(|a| {
            self.items
                .values()
                .all(|b| a.id == b.id || !a.covers(b))
        })
    }

    /// Selected folder covering `resource`, if any
    fn covering(&self, resource: &Resource) -> Option<&Resource> {
        self.items.values().find(|selected| selected.covers(resource))
    }

    fn insert_pruning(&mut self, resource: Resource) -> usize {
        let mut pruned = 0;
        if resource.is_directory() {
            let key = resource.key();
            let before = self.items.len();
            self.items.retain(|_, selected| !path::covers(&key, &selected.key()));
            pruned = before - self.items.len();
        }

        debug!("Selected {} (pruned {})", resource.path, pruned);
        self.items.insert(resource.id.clone(), resource);
        debug_assert!(self.holds_containment());
        pruned
    }
}
