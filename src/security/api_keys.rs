use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Length of an API key in hex characters (32 random bytes).
pub const API_KEY_LENGTH: usize = 64;

/// The configured API key allow-list. Immutable after startup.
///
/// An empty set puts the gate in open mode: keys are still required and
/// format-checked, but any well-formed key is accepted.
#[derive(Clone, Debug, Default)]
pub struct ApiKeySet {
    keys: Vec<String>,
}

impl ApiKeySet {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Membership check. Every configured key is compared so the time taken
    /// does not reveal which entry matched.
    pub fn contains(&self, candidate: &str) -> bool {
        self.keys
            .iter()
            .fold(false, |found, key| found | constant_time_equal(key, candidate))
    }
}

/// Checks that a key is exactly 64 hex characters, either case.
pub fn is_valid_api_key_format(key: &str) -> bool {
    key.len() == API_KEY_LENGTH && key.chars().all(|c| c.is_ascii_hexdigit())
}

/// Generates a new API key using cryptographically secure random bytes
///
/// # Returns
/// * `String` - A 64-character hex-encoded string (32 random bytes)
pub fn generate_api_key() -> String {
    let mut key_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut key_bytes);
    hex::encode(key_bytes)
}

/// Short stable identifier for a key, safe to log and to use as a store key.
pub fn key_fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..8])
}

/// Compares two strings in constant time to prevent timing attacks
pub fn constant_time_equal(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_api_key_length() {
        let key = generate_api_key();
        assert_eq!(key.len(), 64, "Generated key should be 64 characters long");
    }

    #[test]
    fn test_generate_api_key_uniqueness() {
        let key1 = generate_api_key();
        let key2 = generate_api_key();
        assert_ne!(key1, key2, "Generated keys should be unique");
    }

    #[test]
    fn test_generated_key_passes_format_check() {
        assert!(is_valid_api_key_format(&generate_api_key()));
    }

    #[test]
    fn test_format_check() {
        assert!(is_valid_api_key_format(&"a".repeat(64)));
        assert!(is_valid_api_key_format(&"AbCdEf0123456789".repeat(4)));
        assert!(!is_valid_api_key_format(&"a".repeat(63)));
        assert!(!is_valid_api_key_format(&"a".repeat(65)));
        assert!(!is_valid_api_key_format(&format!("{}g", "a".repeat(63))));
        assert!(!is_valid_api_key_format(""));
    }

    #[test]
    fn test_key_set_membership() {
        let known = "1".repeat(64);
        let set = ApiKeySet::new(vec![known.clone(), "2".repeat(64)]);
        assert!(set.contains(&known));
        assert!(!set.contains(&"3".repeat(64)));
        assert!(!ApiKeySet::default().contains(&known));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let key = "c".repeat(64);
        assert_eq!(key_fingerprint(&key), key_fingerprint(&key));
        assert_eq!(key_fingerprint(&key).len(), 16);
        assert_ne!(key_fingerprint(&key), key_fingerprint(&"d".repeat(64)));
    }

    #[test]
    fn test_constant_time_equal() {
        assert!(constant_time_equal("hello", "hello"));
        assert!(!constant_time_equal("hello", "world"));
        assert!(!constant_time_equal("hello", "hello!"));
    }
}
