// API keys for programmatic access to the admin plane. This workspace has
// no user/API-key directory table (see `middleware.rs`), so there is a
// single admin-managed key rather than per-user issuance: `AuthConfig`
// holds its hash (`AUTH_API_KEY_HASH`), minted once with `generate_api_key`
// and checked on every request via `hash_api_key`.

use rand::Rng;
use sha2::{Digest, Sha256};

pub const API_KEY_PREFIX: &str = "asst_";
const API_KEY_LENGTH: usize = 32; // 32 random bytes = 64 hex chars

#[derive(Debug)]
pub struct GeneratedApiKey {
    /// Full key (`asst_<random>`), returned to the caller exactly once.
    pub key: String,
    /// SHA-256 hash, what actually gets stored.
    pub key_hash: String,
    /// First 8 hex chars after the prefix, for display in key lists.
    pub key_prefix: String,
}

pub fn generate_api_key() -> GeneratedApiKey {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..API_KEY_LENGTH).map(|_| rng.gen()).collect();
    let random_hex = hex::encode(&random_bytes);

    let key = format!("{}{}", API_KEY_PREFIX, random_hex);
    let key_hash = hash_api_key(&key);
    let key_prefix = format!("{}{}...", API_KEY_PREFIX, &random_hex[..8]);

    GeneratedApiKey { key, key_hash, key_prefix }
}

pub fn hash_api_key(key: &str) -> String {
    let hash = Sha256::digest(key.as_bytes());
    hex::encode(hash)
}

pub fn is_valid_api_key_format(key: &str) -> bool {
    if !key.starts_with(API_KEY_PREFIX) {
        return false;
    }
    let key_part = &key[API_KEY_PREFIX.len()..];
    if key_part.len() != API_KEY_LENGTH * 2 {
        return false;
    }
    key_part.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_round_trips_through_format_and_hash_checks() {
        let key = generate_api_key();
        assert!(key.key.starts_with(API_KEY_PREFIX));
        assert!(is_valid_api_key_format(&key.key));
        assert_eq!(key.key_hash, hash_api_key(&key.key));
        assert!(key.key_prefix.starts_with(API_KEY_PREFIX));
        assert!(key.key_prefix.ends_with("..."));
    }

    #[test]
    fn two_generated_keys_are_distinct() {
        let key1 = generate_api_key();
        let key2 = generate_api_key();
        assert_ne!(key1.key, key2.key);
        assert_ne!(key1.key_hash, key2.key_hash);
    }

    #[test]
    fn format_validation_rejects_wrong_prefix_length_and_charset() {
        let key = generate_api_key();
        assert!(is_valid_api_key_format(&key.key));
        assert!(!is_valid_api_key_format(
            "sk_1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef"
        ));
        assert!(!is_valid_api_key_format("asst_1234"));
        assert!(!is_valid_api_key_format(
            "asst_gggggggggggggggggggggggggggggggggggggggggggggggggggggggggggggggg"
        ));
    }

    #[test]
    fn hash_is_deterministic() {
        let key = "asst_1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef";
        assert_eq!(hash_api_key(key), hash_api_key(key));
    }
}
