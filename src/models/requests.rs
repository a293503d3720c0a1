//! Request validation for the diagnostics API
//!
//! Path parameters name cache keys and namespaces; both are checked before
//! they reach the cache.

use crate::cache::{MAX_KEY_LENGTH, NAMESPACE_SEPARATOR};

/// Validates a cache key taken from a request.
///
/// Returns an error message if validation fails, None if valid.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        ));
    }
    None
}

/// Validates a namespace taken from a request.
pub fn validate_namespace(namespace: &str) -> Option<String> {
    if namespace.is_empty() {
        return Some("Namespace cannot be empty".to_string());
    }
    if namespace.contains(NAMESPACE_SEPARATOR) {
        return Some(format!(
            "Namespace cannot contain '{}'",
            NAMESPACE_SEPARATOR
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_empty_key() {
        assert!(validate_key("").is_some());
    }

    #[test]
    fn test_validate_long_key() {
        assert!(validate_key(&"x".repeat(MAX_KEY_LENGTH + 1)).is_some());
    }

    #[test]
    fn test_validate_valid_key() {
        assert!(validate_key("posts:7").is_none());
    }

    #[test]
    fn test_validate_namespace() {
        assert!(validate_namespace("posts").is_none());
        assert!(validate_namespace("").is_some());
        assert!(validate_namespace("posts:7").is_some());
    }
}
