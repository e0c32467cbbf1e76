//! Projection of raw source entries into view resources

use crate::path;
use crate::resource::{parse_timestamp, Resource};
use crate::status::{resolve_status, StatusContext};
use crate::wire::SourceEntry;

/// Project raw source entries into resources with resolved status
///
/// Side-effect free: the same inputs always produce the same output, so
/// callers re-derive the view after every cache change instead of patching
/// it. Output order follows the input; sorting is left to the caller.
pub fn project(entries: &[SourceEntry], ctx: &StatusContext<'_>) -> Vec<Resource> {
    entries.iter().map(|entry| project_entry(entry, ctx)).collect()
}

/// Project a single entry
pub fn project_entry(entry: &SourceEntry, ctx: &StatusContext<'_>) -> Resource {
    let key = entry.key();
    let resolution = resolve_status(entry, ctx);

    Resource {
        id: entry.resource_id.clone(),
        kind: entry.inode_type,
        name: path::name_of(&key),
        path: path::to_absolute(&key),
        modified_at: entry.last_modified().and_then(parse_timestamp),
        size: entry.size,
        status: resolution.status,
        backing_record: resolution.matched.cloned(),
    }
}
