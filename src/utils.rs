use sha2::{Digest, Sha256};
use std::path::Path;

const WORKTREE_NAME_MAX_LEN: usize = 50;

/// Replace characters that are unsafe in a single path component.
pub fn sanitize_path_component(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

/// Suggest a worktree directory name for a branch (`feature/Auth` -> `feature-auth`).
pub fn suggest_worktree_name(branch: &str) -> String {
    let sanitized: String = branch
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();

    let collapsed = sanitized
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    let truncated = if collapsed.len() > WORKTREE_NAME_MAX_LEN {
        &collapsed[..WORKTREE_NAME_MAX_LEN]
    } else {
        &collapsed
    };

    let result = truncated
        .trim_matches(|c| c == '-' || c == '.')
        .to_string();

    if result.is_empty() {
        "unnamed".to_string()
    } else {
        result
    }
}

/// Truncates a string to max_chars characters, appending "..." if truncated.
/// Safe for UTF-8 multi-byte characters.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncate_at = max_chars.saturating_sub(3);
        let byte_index = s
            .char_indices()
            .nth(truncate_at)
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        format!("{}...", &s[..byte_index])
    }
}

/// Compute a deterministic 8-char hex hash from a path.
/// Canonicalizes when the path exists so symlinked spellings agree.
pub fn compute_path_hash(path: &Path) -> String {
    let abs_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let path_str = abs_path.to_string_lossy();

    let mut hasher = Sha256::new();
    hasher.update(path_str.as_bytes());
    let result = hasher.finalize();

    hex::encode(&result[..4])
}

/// Stable worktree id derived from its checkout path.
pub fn worktree_id_for_path(path: &Path) -> String {
    format!("wt-{}", compute_path_hash(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_str_short_string() {
        assert_eq!(truncate_str("short", 20), "short");
    }

    #[test]
    fn truncate_str_specific_truncation() {
        assert_eq!(truncate_str("hello world", 8), "hello...");
    }

    #[test]
    fn truncate_str_utf8_safe() {
        let japanese = "こんにちは世界";
        assert_eq!(truncate_str(japanese, 10), japanese);
        assert_eq!(truncate_str(japanese, 5), "こん...");
    }

    #[test]
    fn sanitize_path_component_replaces_separators() {
        assert_eq!(
            sanitize_path_component("feature/auth:v2"),
            "feature_auth_v2",
            "sanitize_path_component: separators and colons should become underscores"
        );
    }

    #[test]
    fn sanitize_path_component_strips_leading_dots() {
        assert_eq!(
            sanitize_path_component("..hidden."),
            "hidden",
            "sanitize_path_component: leading/trailing dots should be stripped"
        );
    }

    #[test]
    fn sanitize_path_component_keeps_spaces_and_unicode() {
        assert_eq!(sanitize_path_component("my project ü"), "my project ü");
    }

    #[test]
    fn suggest_worktree_name_from_slashed_branch() {
        assert_eq!(
            suggest_worktree_name("feature/Add-Auth"),
            "feature-add-auth",
            "suggest_worktree_name: slashes and case should be normalized"
        );
    }

    #[test]
    fn suggest_worktree_name_collapses_hyphens() {
        assert_eq!(suggest_worktree_name("fix  --  bug"), "fix-bug");
    }

    #[test]
    fn suggest_worktree_name_keeps_version_dots() {
        assert_eq!(suggest_worktree_name("release/v1.2"), "release-v1.2");
    }

    #[test]
    fn suggest_worktree_name_empty_returns_unnamed() {
        assert_eq!(suggest_worktree_name("///"), "unnamed");
    }

    #[test]
    fn suggest_worktree_name_truncates_long_input() {
        let long = "a".repeat(100);
        assert!(suggest_worktree_name(&long).len() <= 50);
    }

    #[test]
    fn compute_path_hash_is_deterministic() {
        let hash1 = compute_path_hash(Path::new("/tmp/test"));
        let hash2 = compute_path_hash(Path::new("/tmp/test"));
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 8);
    }

    #[test]
    fn compute_path_hash_differs_for_different_paths() {
        assert_ne!(
            compute_path_hash(Path::new("/tmp/project1")),
            compute_path_hash(Path::new("/tmp/project2"))
        );
    }

    #[test]
    fn worktree_id_has_prefix() {
        let id = worktree_id_for_path(Path::new("/nonexistent/wt"));
        assert!(id.starts_with("wt-"));
        assert_eq!(id.len(), "wt-".len() + 8);
    }
}
