//! Path normalization shared by the source tree and the knowledge base tree
//!
//! The two trees disagree on slash conventions (`/docs`, `docs/`, `/docs//`),
//! so every comparison goes through [`normalize`] first. Normalized keys:
//! - never start with `/`
//! - directories end with exactly one `/`, the root is `""`
//! - files never end with `/`
//! - interior runs of `/` collapse to a single separator

/// Normalize a path for comparison
///
/// Pure and total: every input yields a key, and normalizing a key again
/// returns it unchanged.
pub fn normalize(path: &str, is_directory: bool) -> String {
    let mut key = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(segment);
    }

    if is_directory && !key.is_empty() {
        key.push('/');
    }
    key
}

/// Render a normalized key as an absolute display path (`docs/` -> `/docs/`)
pub fn to_absolute(key: &str) -> String {
    format!("/{}", key.trim_start_matches('/'))
}

/// Check whether `candidate` lies strictly below the directory `dir_key`
///
/// Both arguments must already be normalized. The root key `""` contains
/// every non-root key.
pub fn is_strict_descendant(dir_key: &str, candidate: &str) -> bool {
    candidate.len() > dir_key.len() && covers(dir_key, candidate)
}

/// Check whether the directory `dir_key` covers `candidate` (itself included)
pub fn covers(dir_key: &str, candidate: &str) -> bool {
    debug_assert!(dir_key.is_empty() || dir_key.ends_with('/'));
    candidate.starts_with(dir_key)
}

/// Check whether `candidate` sits directly inside the directory `dir_key`
pub fn is_direct_child(dir_key: &str, candidate: &str) -> bool {
    is_strict_descendant(dir_key, candidate)
        && !candidate[dir_key.len()..].trim_end_matches('/').contains('/')
}

/// Convert a source-tree path into the `resource_path` the knowledge base
/// listing expects
///
/// Empty and `/` map to `/`; everything else gets exactly one leading slash.
pub fn to_knowledge_base_path(resource_path: &str) -> String {
    if resource_path.is_empty() || resource_path == "/" {
        return "/".to_string();
    }
    format!("/{}", resource_path.trim_start_matches('/'))
}

/// Extract the display name (last non-empty segment) of a path
pub fn name_of(path: &str) -> String {
    match path.split('/').filter(|s| !s.is_empty()).last() {
        Some(name) => name.to_string(),
        None if path.is_empty() => "Untitled".to_string(),
        None => path.to_string(),
    }
}
