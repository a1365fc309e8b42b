//! Pure helpers over slash-delimited store paths.
//!
//! Paths are absolute (leading `/`); a trailing `/` marks a directory and is
//! the only directory/leaf discriminator. Callers validate untrusted input
//! with [`validate`] before handing it to the other helpers.

use crate::error::{AppError, Result};

/// The root entry point.
pub const ROOT: &str = "/";
/// The public entry point, always materialized next to the root.
pub const PUBLIC_ROOT: &str = "/public/";

/// Reject paths that are not absolute.
pub fn validate(path: &str) -> Result<()> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(AppError::InvalidPath(path.to_string()))
    }
}

/// True iff `path` names a directory.
pub fn is_directory(path: &str) -> bool {
    path.ends_with('/')
}

/// Longest proper prefix of `path` ending in `/`, or `None` for the root.
pub fn parent_of(path: &str) -> Option<&str> {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return None;
    }
    trimmed.rfind('/').map(|idx| &path[..=idx])
}

/// Non-empty components between the leading and (for directories) trailing slash.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Display label: the final segment, or the path itself for the root.
pub fn name_of(path: &str) -> String {
    segments(path)
        .last()
        .map(|s| s.to_string())
        .unwrap_or_else(|| path.to_string())
}

/// Child path for a listing entry of `dir` (entry names keep their trailing `/`).
pub fn join(dir: &str, item: &str) -> String {
    format!("{}{}", dir, item)
}

/// Directory prefixes from the first segment down to `path`, root-to-leaf.
///
/// `/a/b/` yields `/a/`, `/a/b/`. A leaf yields only its containing directories.
pub fn ancestors(path: &str) -> Vec<String> {
    let parts = segments(path);
    let dir_count = if is_directory(path) {
        parts.len()
    } else {
        parts.len().saturating_sub(1)
    };

    let mut current = String::from(ROOT);
    let mut out = Vec::with_capacity(dir_count);
    for part in parts.into_iter().take(dir_count) {
        current.push_str(part);
        current.push('/');
        out.push(current.clone());
    }
    out
}

/// True iff `path` is `of` or lies below it.
pub fn is_self_or_descendant(path: &str, of: &str) -> bool {
    path.starts_with(of)
}

/// The entry point whose subtree contains `path`.
pub fn entry_point_for(path: &str) -> &'static str {
    if path.starts_with(PUBLIC_ROOT) {
        PUBLIC_ROOT
    } else {
        ROOT
    }
}

/// True for the two always-present entry points.
pub fn is_entry_point(path: &str) -> bool {
    path == ROOT || path == PUBLIC_ROOT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_discriminator_is_trailing_slash() {
        assert!(is_directory("/"));
        assert!(is_directory("/docs/"));
        assert!(!is_directory("/docs/a.txt"));
    }

    #[test]
    fn parent_of_directories_and_leaves() {
        assert_eq!(parent_of("/"), None);
        assert_eq!(parent_of("/docs/"), Some("/"));
        assert_eq!(parent_of("/docs/a.txt"), Some("/docs/"));
        assert_eq!(parent_of("/a/b/c/"), Some("/a/b/"));
    }

    #[test]
    fn segments_skip_slashes() {
        assert!(segments("/").is_empty());
        assert_eq!(segments("/a/b/"), vec!["a", "b"]);
        assert_eq!(segments("/a/b.txt"), vec!["a", "b.txt"]);
    }

    #[test]
    fn validate_rejects_relative_paths() {
        assert!(validate("/ok/").is_ok());
        assert!(matches!(validate("docs/"), Err(AppError::InvalidPath(_))));
        assert!(validate("").is_err());
    }

    #[test]
    fn name_of_root_is_root() {
        assert_eq!(name_of("/"), "/");
        assert_eq!(name_of("/public/"), "public");
        assert_eq!(name_of("/docs/a.txt"), "a.txt");
    }

    #[test]
    fn ancestors_walk_root_to_leaf() {
        assert!(ancestors("/").is_empty());
        assert_eq!(ancestors("/a/b/"), vec!["/a/", "/a/b/"]);
        assert_eq!(ancestors("/a/b/c.txt"), vec!["/a/", "/a/b/"]);
    }

    #[test]
    fn descendant_match_respects_directory_boundary() {
        assert!(is_self_or_descendant("/a/", "/a/"));
        assert!(is_self_or_descendant("/a/b/", "/a/"));
        assert!(!is_self_or_descendant("/ab/", "/a/"));
    }

    #[test]
    fn entry_point_selection() {
        assert_eq!(entry_point_for("/public/x/"), PUBLIC_ROOT);
        assert_eq!(entry_point_for("/docs/"), ROOT);
        assert!(is_entry_point("/"));
        assert!(is_entry_point("/public/"));
        assert!(!is_entry_point("/docs/"));
    }
}
