//! Materialized path arithmetic.
//!
//! A root folder's path is `/name`; a child's path is its parent's path,
//! the separator, and its own name. Ancestor and descendant sets are
//! computed from these strings alone.

use docvault_core::error::AppError;
use docvault_core::result::AppResult;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// Maximum length of a single folder name.
pub const MAX_NAME_LEN: usize = 255;

/// Validate a folder name: non-blank, bounded, and free of separators.
pub fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::validation("Folder name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "Folder name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(AppError::validation(format!(
            "Folder name cannot contain '{PATH_SEPARATOR}'"
        )));
    }
    Ok(())
}

/// Path of a folder named `name` under `parent_path` (None for a root).
pub fn child_path(parent_path: Option<&str>, name: &str) -> String {
    match parent_path {
        Some(parent) => format!("{parent}{PATH_SEPARATOR}{name}"),
        None => format!("{PATH_SEPARATOR}{name}"),
    }
}

/// Path of the parent folder, or `None` for a root path.
pub fn parent_path(path: &str) -> Option<&str> {
    match path.rfind(PATH_SEPARATOR) {
        Some(0) | None => None,
        Some(idx) => Some(&path[..idx]),
    }
}

/// The prefix every descendant path of `path` starts with.
pub fn descendant_prefix(path: &str) -> String {
    format!("{path}{PATH_SEPARATOR}")
}

/// Whether `candidate` lies strictly below `ancestor`.
pub fn is_descendant_path(candidate: &str, ancestor: &str) -> bool {
    candidate
        .strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with(PATH_SEPARATOR))
}

/// Ancestor paths of `path`, nearest first, obtained by repeatedly stripping
/// the trailing segment. A root path has no ancestors.
pub fn ancestor_paths(path: &str) -> Vec<String> {
    let mut ancestors = Vec::new();
    let mut current = path;
    while let Some(idx) = current.rfind(PATH_SEPARATOR) {
        if idx == 0 {
            break;
        }
        current = &current[..idx];
        ancestors.push(current.to_string());
    }
    ancestors
}

/// Depth of a path: 0 for `/name`, 1 for `/a/b`, and so on.
pub fn depth(path: &str) -> i64 {
    path.matches(PATH_SEPARATOR).count().saturating_sub(1) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_path() {
        assert_eq!(child_path(None, "Projects"), "/Projects");
        assert_eq!(child_path(Some("/Projects"), "2024"), "/Projects/2024");
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("/Projects/2024"), Some("/Projects"));
        assert_eq!(parent_path("/Projects"), None);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Reports").is_ok());
        assert!(validate_name("").unwrap_err().is_validation());
        assert!(validate_name("   ").unwrap_err().is_validation());
        assert!(validate_name("a/b").unwrap_err().is_validation());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_descendant_requires_separator_boundary() {
        assert!(is_descendant_path("/A/B", "/A"));
        assert!(is_descendant_path("/A/B/C", "/A"));
        assert!(!is_descendant_path("/A", "/A"));
        assert!(!is_descendant_path("/AB", "/A"));
        assert!(!is_descendant_path("/B/A", "/A"));
    }

    #[test]
    fn test_ancestor_paths_nearest_first() {
        assert_eq!(
            ancestor_paths("/a/b/c"),
            vec!["/a/b".to_string(), "/a".to_string()]
        );
        assert!(ancestor_paths("/root").is_empty());
    }

    #[test]
    fn test_depth() {
        assert_eq!(depth("/a"), 0);
        assert_eq!(depth("/a/b/c"), 2);
    }
}
