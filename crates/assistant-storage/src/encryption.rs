// Envelope encryption with key rotation support for credential blobs
// (spec.md §4.6: "all credential blobs are encrypted at rest using a
// process-wide key"). AES-256-GCM with per-value DEKs wrapped by a
// versioned KEK.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const DEK_SIZE: usize = 32;
const PAYLOAD_VERSION: u8 = 1;
const ALGORITHM: &str = "AES-256-GCM";

/// Encrypted payload stored in the database as the `credentials_encrypted`
/// / `client_secret_encrypted` column bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub version: u8,
    pub alg: String,
    /// Key ID of the KEK used to wrap the DEK.
    pub key_id: String,
    pub dek_wrapped: String,
    pub nonce: String,
    pub ciphertext: String,
}

#[derive(Clone)]
struct VersionedKey {
    id: String,
    cipher: Aes256Gcm,
}

/// Envelope-encryption service. Thread-safe, clone-cheap (internally `Arc`'d),
/// safe to share as process-wide state.
#[derive(Clone)]
pub struct EncryptionService {
    primary_key: Arc<VersionedKey>,
    keys: Arc<HashMap<String, Aes256Gcm>>,
}

impl EncryptionService {
    /// Builds from versioned key strings in `"key_id:base64_key"` format.
    /// The first key is used for new encryptions; all keys remain available
    /// for decrypting data written under a previous key.
    pub fn new(primary_key: &str, previous_keys: &[&str]) -> Result<Self> {
        let (primary_id, primary_cipher) = Self::parse_versioned_key(primary_key)?;

        let mut keys = HashMap::new();
        keys.insert(primary_id.clone(), primary_cipher.clone());

        for key_str in previous_keys {
            let (id, cipher) = Self::parse_versioned_key(key_str)?;
            if keys.contains_key(&id) {
                anyhow::bail!("Duplicate key ID: {}", id);
            }
            keys.insert(id, cipher);
        }

        Ok(Self {
            primary_key: Arc::new(VersionedKey {
                id: primary_id,
                cipher: primary_cipher,
            }),
            keys: Arc::new(keys),
        })
    }

    /// Builds from `CREDENTIALS_ENCRYPTION_KEY` (required, primary) and
    /// `CREDENTIALS_ENCRYPTION_KEY_PREVIOUS` (optional, rotation).
    pub fn from_env() -> Result<Self> {
        let primary = std::env::var("CREDENTIALS_ENCRYPTION_KEY")
            .context("CREDENTIALS_ENCRYPTION_KEY environment variable not set")?;

        let previous_keys: Vec<String> = std::env::var("CREDENTIALS_ENCRYPTION_KEY_PREVIOUS")
            .ok()
            .into_iter()
            .collect();
        let previous_refs: Vec<&str> = previous_keys.iter().map(|s| s.as_str()).collect();

        Self::new(&primary, &previous_refs)
    }

    fn parse_versioned_key(key_str: &str) -> Result<(String, Aes256Gcm)> {
        let parts: Vec<&str> = key_str.splitn(2, ':').collect();
        if parts.len() != 2 {
            anyhow::bail!("Invalid key format, expected 'key_id:base64_key'");
        }

        let key_id = parts[0].to_string();
        let key_bytes = BASE64
            .decode(parts[1])
            .context("Failed to decode key from base64")?;

        if key_bytes.len() != KEY_SIZE {
            anyhow::bail!(
                "Key must be {} bytes, got {} bytes for key_id '{}'",
                KEY_SIZE,
                key_bytes.len(),
                key_id
            );
        }

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| anyhow::anyhow!("Failed to create cipher for key '{}': {}", key_id, e))?;

        Ok((key_id, cipher))
    }

    /// Encrypts plaintext using envelope encryption. Returns JSON-encoded
    /// `EncryptedPayload` bytes, ready to store in a `bytea` column.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut dek_bytes = [0u8; DEK_SIZE];
        rand::thread_rng().fill_bytes(&mut dek_bytes);

        let mut dek_nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut dek_nonce_bytes);
        let dek_nonce = Nonce::from_slice(&dek_nonce_bytes);

        let wrapped_dek = self
            .primary_key
            .cipher
            .encrypt(dek_nonce, dek_bytes.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to wrap DEK: {}", e))?;

        let dek_cipher = Aes256Gcm::new_from_slice(&dek_bytes)
            .map_err(|e| anyhow::anyhow!("Failed to create DEK cipher: {}", e))?;

        let mut data_nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut data_nonce_bytes);
        let data_nonce = Nonce::from_slice(&data_nonce_bytes);

        let ciphertext = dek_cipher
            .encrypt(data_nonce, plaintext)
            .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

        let mut dek_wrapped_bytes = Vec::with_capacity(NONCE_SIZE + wrapped_dek.len());
        dek_wrapped_bytes.extend_from_slice(&dek_nonce_bytes);
        dek_wrapped_bytes.extend_from_slice(&wrapped_dek);

        let payload = EncryptedPayload {
            version: PAYLOAD_VERSION,
            alg: ALGORITHM.to_string(),
            key_id: self.primary_key.id.clone(),
            dek_wrapped: BASE64.encode(&dek_wrapped_bytes),
            nonce: BASE64.encode(data_nonce_bytes),
            ciphertext: BASE64.encode(&ciphertext),
        };

        serde_json::to_vec(&payload).context("Failed to serialize encrypted payload")
    }

    /// Decrypts using whichever key the payload's `key_id` names.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let payload: EncryptedPayload =
            serde_json::from_slice(data).context("Failed to parse encrypted payload")?;

        if payload.version != PAYLOAD_VERSION {
            anyhow::bail!("Unsupported payload version: {}", payload.version);
        }
        if payload.alg != ALGORITHM {
            anyhow::bail!("Unsupported algorithm: {}", payload.alg);
        }

        let kek_cipher = self
            .keys
            .get(&payload.key_id)
            .ok_or_else(|| anyhow::anyhow!("Unknown key_id '{}'", payload.key_id))?;

        let dek_wrapped_bytes = BASE64
            .decode(&payload.dek_wrapped)
            .context("Failed to decode wrapped DEK")?;
        if dek_wrapped_bytes.len() < NONCE_SIZE {
            anyhow::bail!("Wrapped DEK too short");
        }
        let (dek_nonce_bytes, wrapped_dek) = dek_wrapped_bytes.split_at(NONCE_SIZE);
        let dek_nonce = Nonce::from_slice(dek_nonce_bytes);

        let dek_bytes = kek_cipher
            .decrypt(dek_nonce, wrapped_dek)
            .map_err(|e| anyhow::anyhow!("Failed to unwrap DEK: {}", e))?;
        if dek_bytes.len() != DEK_SIZE {
            anyhow::bail!("Invalid DEK size after unwrap");
        }

        let dek_cipher = Aes256Gcm::new_from_slice(&dek_bytes)
            .map_err(|e| anyhow::anyhow!("Failed to create DEK cipher: {}", e))?;

        let data_nonce_bytes = BASE64.decode(&payload.nonce).context("Failed to decode nonce")?;
        let data_nonce = Nonce::from_slice(&data_nonce_bytes);

        let ciphertext = BASE64
            .decode(&payload.ciphertext)
            .context("Failed to decode ciphertext")?;

        dek_cipher
            .decrypt(data_nonce, ciphertext.as_ref())
            .map_err(|e| anyhow::anyhow!("Decryption failed (data may be corrupted): {}", e))
    }

    pub fn encrypt_string(&self, plaintext: &str) -> Result<Vec<u8>> {
        self.encrypt(plaintext.as_bytes())
    }

    pub fn decrypt_to_string(&self, data: &[u8]) -> Result<String> {
        let plaintext = self.decrypt(data)?;
        String::from_utf8(plaintext).context("Decrypted data is not valid UTF-8")
    }

    pub fn get_key_id(data: &[u8]) -> Result<String> {
        let payload: EncryptedPayload =
            serde_json::from_slice(data).context("Failed to parse encrypted payload")?;
        Ok(payload.key_id)
    }

    pub fn is_current_key(&self, data: &[u8]) -> Result<bool> {
        Ok(Self::get_key_id(data)? == self.primary_key.id)
    }

    /// Re-encrypts under the current primary key. Returns `None` if the
    /// payload is already current (used by the `reencrypt_secrets`
    /// maintenance binary in `assistant-api` during key rotation).
    pub fn reencrypt(&self, data: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.is_current_key(data)? {
            return Ok(None);
        }
        let plaintext = self.decrypt(data)?;
        Ok(Some(self.encrypt(&plaintext)?))
    }

    pub fn primary_key_id(&self) -> &str {
        &self.primary_key.id
    }
}

/// Generates a new random key in `"key_id:base64_key"` format, for seeding
/// `CREDENTIALS_ENCRYPTION_KEY` or rotating into `..._PREVIOUS`.
pub fn generate_encryption_key(key_id: &str) -> String {
    let mut key = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut key);
    format!("{}:{}", key_id, BASE64.encode(key))
}

/// One encrypted `bytea` column, for tools that need to enumerate every
/// encrypted-at-rest value in the schema (key-rotation maintenance jobs).
pub struct EncryptedColumn {
    pub table: &'static str,
    pub id_column: &'static str,
    pub column: &'static str,
}

/// Registry of every column encrypted with this service's keys. Kept here,
/// next to the service that writes them, rather than duplicated in each
/// maintenance tool that needs to walk them.
pub const ENCRYPTED_COLUMNS: &[EncryptedColumn] = &[
    EncryptedColumn {
        table: "connectors",
        id_column: "id",
        column: "credentials_encrypted",
    },
    EncryptedColumn {
        table: "oauth_providers",
        id_column: "id",
        column: "client_secret_encrypted",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(id: &str) -> String {
        generate_encryption_key(id)
    }

    #[test]
    fn encrypt_decrypt_round_trips() {
        let service = EncryptionService::new(&test_key("kek-v1"), &[]).unwrap();
        let plaintext = "sk-test-api-key-12345";
        let encrypted = service.encrypt_string(plaintext).unwrap();
        assert_eq!(plaintext, service.decrypt_to_string(&encrypted).unwrap());
    }

    #[test]
    fn same_plaintext_yields_different_ciphertext() {
        let service = EncryptionService::new(&test_key("kek-v1"), &[]).unwrap();
        let a = service.encrypt_string("same").unwrap();
        let b = service.encrypt_string("same").unwrap();
        assert_ne!(a, b);
        assert_eq!("same", service.decrypt_to_string(&a).unwrap());
        assert_eq!("same", service.decrypt_to_string(&b).unwrap());
    }

    #[test]
    fn key_rotation_still_decrypts_old_ciphertext() {
        let key_v1 = test_key("kek-v1");
        let key_v2 = test_key("kek-v2");

        let service_v1 = EncryptionService::new(&key_v1, &[]).unwrap();
        let encrypted_v1 = service_v1.encrypt_string("secret").unwrap();

        let service_v2 = EncryptionService::new(&key_v2, &[&key_v1]).unwrap();
        assert_eq!("secret", service_v2.decrypt_to_string(&encrypted_v1).unwrap());

        let encrypted_v2 = service_v2.encrypt_string("secret").unwrap();
        assert_eq!(EncryptionService::get_key_id(&encrypted_v2).unwrap(), "kek-v2");
    }

    #[test]
    fn reencrypt_moves_to_current_key_and_is_idempotent() {
        let key_v1 = test_key("kek-v1");
        let key_v2 = test_key("kek-v2");

        let service_v1 = EncryptionService::new(&key_v1, &[]).unwrap();
        let encrypted_v1 = service_v1.encrypt_string("secret").unwrap();

        let service_v2 = EncryptionService::new(&key_v2, &[&key_v1]).unwrap();
        let encrypted_v2 = service_v2.reencrypt(&encrypted_v1).unwrap().unwrap();
        assert_eq!(EncryptionService::get_key_id(&encrypted_v2).unwrap(), "kek-v2");
        assert!(service_v2.reencrypt(&encrypted_v2).unwrap().is_none());
    }

    #[test]
    fn invalid_key_formats_are_rejected() {
        assert!(EncryptionService::new("no-colon-here", &[]).is_err());
        assert!(EncryptionService::new("kek-v1:not-valid-base64!!!", &[]).is_err());
        let short_key = format!("kek-v1:{}", BASE64.encode([0u8; 16]));
        assert!(EncryptionService::new(&short_key, &[]).is_err());
    }

    #[test]
    fn duplicate_key_id_is_rejected() {
        let key1 = test_key("kek-v1");
        let key2 = test_key("kek-v1");
        assert!(EncryptionService::new(&key1, &[&key2]).is_err());
    }

    #[test]
    fn decrypting_with_unknown_key_id_fails() {
        let service_v1 = EncryptionService::new(&test_key("kek-v1"), &[]).unwrap();
        let encrypted = service_v1.encrypt_string("test").unwrap();

        let service_v2 = EncryptionService::new(&test_key("kek-v2"), &[]).unwrap();
        assert!(service_v2.decrypt(&encrypted).is_err());
    }
}
