//! Sorting and filtering of projected resources

use crate::resource::Resource;
use crate::status::ResourceStatus;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Name,
    ModifiedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Status filter offered by the picker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Indexed,
    NotIndexed,
    /// Matches both pending and processing
    Processing,
    Error,
}

impl StatusFilter {
    pub fn matches(&self, status: ResourceStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Indexed => status == ResourceStatus::Indexed,
            StatusFilter::NotIndexed => status == ResourceStatus::NotIndexed,
            StatusFilter::Processing => status.is_in_progress(),
            StatusFilter::Error => status == ResourceStatus::Error,
        }
    }
}

/// Filtering options for a listing
#[derive(Debug, Clone, Default)]
pub struct ViewFilter {
    /// Case-insensitive substring matched against names
    pub text: String,
    pub status: StatusFilter,
    /// While statuses load the status filter is ignored
    pub statuses_loading: bool,
}

impl ViewFilter {
    pub fn apply(&self, resources: Vec<Resource>) -> Vec<Resource> {
        let needle = self.text.trim().to_lowercase();
        resources
            .into_iter()
            .filter(|r| needle.is_empty() || r.name.to_lowercase().contains(&needle))
            .filter(|r| self.statuses_loading || self.status.matches(r.status))
            .collect()
    }
}

/// Sort resources: directories first, then by the chosen field
pub fn sort_resources(resources: &mut [Resource], field: SortField, direction: SortDirection) {
    resources.sort_by(|a, b| {
        match (a.is_directory(), b.is_directory()) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }

        let ordering = match field {
            SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortField::ModifiedAt => a.modified_at.cmp(&b.modified_at),
        };

        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}
