//! Key helpers for the `"<namespace>:<identifier>"` convention.

/// Separator between namespace and identifier.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Builds `"<namespace>:<id>"`.
pub fn namespaced_key(namespace: &str, id: impl std::fmt::Display) -> String {
    format!("{namespace}{NAMESPACE_SEPARATOR}{id}")
}

/// Returns the namespace part of a key, if the key has one.
pub fn namespace_of(key: &str) -> Option<&str> {
    key.split_once(NAMESPACE_SEPARATOR).map(|(ns, _)| ns)
}

/// True when `key` belongs to `namespace`.
///
/// Matches on the full `"<namespace>:"` prefix, so `posts` never matches
/// `postLists:...`.
pub fn in_namespace(key: &str, namespace: &str) -> bool {
    key.strip_prefix(namespace)
        .is_some_and(|rest| rest.starts_with(NAMESPACE_SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_key() {
        assert_eq!(namespaced_key("posts", 7), "posts:7");
        assert_eq!(namespaced_key("messages", "A"), "messages:A");
    }

    #[test]
    fn test_namespace_of() {
        assert_eq!(namespace_of("profiles:42"), Some("profiles"));
        assert_eq!(namespace_of("avatars:https://x/y.png"), Some("avatars"));
        assert_eq!(namespace_of("plain"), None);
    }

    #[test]
    fn test_in_namespace_requires_separator() {
        assert!(in_namespace("posts:7", "posts"));
        assert!(!in_namespace("postLists:recent", "posts"));
        assert!(!in_namespace("posts", "posts"));
        assert!(!in_namespace("myposts:1", "posts"));
    }
}
