// ── Backup: Snapshot Crypto ────────────────────────────────────────────────
// Authenticated symmetric encryption of snapshot payloads.
//
// Two serialisations of the same document, each used on both sides:
//   payload_json   — UTF-8, 2-space indent, non-ASCII preserved; this is
//                    what gets encrypted
//   canonical_json — compact, keys sorted; the SHA-256 checksum input
//
// serde_json orders object keys (BTreeMap-backed maps), so both forms are
// stable across encrypt and restore. Ciphertext is packed nonce(12) ‖
// ciphertext+tag, raw bytes on disk.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use rand::RngCore;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::atoms::error::{CoreError, CoreResult};
use crate::keys::BackupKey;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Compact serialisation with sorted keys — the checksum input.
pub fn canonical_json(doc: &Value) -> String {
    doc.to_string()
}

/// Indented serialisation — the encrypted payload.
pub fn payload_json(doc: &Value) -> CoreResult<String> {
    Ok(serde_json::to_string_pretty(doc)?)
}

/// SHA-256 hex over the canonical serialisation.
pub fn checksum(doc: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(doc).as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Encrypt a snapshot document. Returns nonce ‖ ciphertext+tag.
pub fn encrypt(doc: &Value, key: &BackupKey) -> CoreResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.bytes())
        .map_err(|_| CoreError::integrity("AES key must be 32 bytes"))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let plaintext = payload_json(doc)?;
    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| CoreError::integrity(format!("Snapshot encryption failed: {}", e)))?;

    let mut packed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    packed.extend_from_slice(&nonce_bytes);
    packed.extend_from_slice(&ciphertext);
    Ok(packed)
}

/// Decrypt and parse a snapshot artifact. Any authentication failure is an
/// integrity error — no partial restore is attempted.
pub fn decrypt(packed: &[u8], key: &BackupKey) -> CoreResult<Value> {
    if packed.len() < NONCE_LEN + TAG_LEN {
        return Err(CoreError::integrity("Snapshot ciphertext too short"));
    }

    let (nonce_bytes, ciphertext) = packed.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key.bytes())
        .map_err(|_| CoreError::integrity("AES key must be 32 bytes"))?;

    let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|_| {
        CoreError::integrity("Snapshot decryption failed — wrong key or corrupted artifact")
    })?;

    let doc = serde_json::from_slice(&plaintext)?;
    Ok(doc)
}

/// Build the companion metadata for a snapshot document.
pub fn build_metadata(doc: &Value) -> Value {
    serde_json::json!({
        "timestamp": doc["timestamp"],
        "statistics": doc["statistics"],
        "encrypted": true,
        "version": crate::atoms::constants::BACKUP_VERSION,
        "checksum": checksum(doc),
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use serde_json::json;

    fn key() -> BackupKey {
        let encoded = base64::engine::general_purpose::URL_SAFE.encode([7u8; 32]);
        BackupKey::from_encoded(&encoded).unwrap()
    }

    fn doc() -> Value {
        json!({
            "timestamp": "2026-08-27T00:00:00Z",
            "tables": {"user_memories": [{"user_uuid": "u1", "user_name": "日本語テスト"}]},
            "statistics": {"user_memories": 1},
        })
    }

    #[test]
    fn canonical_form_sorts_keys() {
        let value = json!({"zeta": 1, "alpha": 2, "mid": {"b": 1, "a": 2}});
        assert_eq!(canonical_json(&value), r#"{"alpha":2,"mid":{"a":2,"b":1},"zeta":1}"#);
    }

    #[test]
    fn payload_preserves_non_ascii() {
        let payload = payload_json(&doc()).unwrap();
        assert!(payload.contains("日本語テスト"));
        assert!(payload.contains("  \"statistics\""));
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = key();
        let original = doc();
        let packed = encrypt(&original, &key).unwrap();
        assert_ne!(&packed[NONCE_LEN..], payload_json(&original).unwrap().as_bytes());

        let restored = decrypt(&packed, &key).unwrap();
        assert_eq!(restored, original);
        assert_eq!(checksum(&restored), checksum(&original));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let key = key();
        let mut packed = encrypt(&doc(), &key).unwrap();
        let mid = packed.len() / 2;
        packed[mid] ^= 0x01;
        assert!(matches!(decrypt(&packed, &key), Err(CoreError::Integrity(_))));
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let packed = encrypt(&doc(), &key()).unwrap();
        let other =
            BackupKey::from_encoded(&base64::engine::general_purpose::URL_SAFE.encode([9u8; 32]))
                .unwrap();
        assert!(matches!(decrypt(&packed, &other), Err(CoreError::Integrity(_))));
    }

    #[test]
    fn mutated_document_changes_checksum() {
        let original = doc();
        let mut mutated = original.clone();
        mutated["tables"]["user_memories"][0]["user_name"] = json!("mallory");
        assert_ne!(checksum(&original), checksum(&mutated));
    }

    #[test]
    fn metadata_carries_matching_checksum() {
        let original = doc();
        let metadata = build_metadata(&original);
        assert_eq!(metadata["version"].as_str().unwrap(), "2.0");
        assert_eq!(metadata["encrypted"].as_bool().unwrap(), true);
        assert_eq!(metadata["checksum"].as_str().unwrap(), checksum(&original));
        assert_eq!(metadata["timestamp"], original["timestamp"]);
    }

    #[test]
    fn truncated_artifact_is_rejected() {
        assert!(matches!(
            decrypt(&[0u8; 10], &key()),
            Err(CoreError::Integrity(_))
        ));
    }
}
