//! Request key generation for the asset cache.

use sha2::{Digest, Sha256};

/// Compute the cache key of a request from its method and canonical URL.
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let key1 = compute_request_key("GET", "https://calc.example/index.html");
        let key2 = compute_request_key("get", "https://calc.example/index.html");
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_different_url() {
        let root = compute_request_key("GET", "https://calc.example/");
        let index = compute_request_key("GET", "https://calc.example/index.html");
        assert_ne!(root, index);
    }

    #[test]
    fn test_key_format() {
        let key = compute_request_key("GET", "https://calc.example/styles.css");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
