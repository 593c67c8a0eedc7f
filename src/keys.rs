// ── Key Vault ──────────────────────────────────────────────────────────────
// Fetches and validates the symmetric backup key at startup.
//
// The configured value must be exactly 44 UTF-8 bytes — the canonical length
// of a url-safe base64-encoded 32-byte key. Catastrophic misconfiguration
// must not defer until the first snapshot attempt, at which point
// irreversible state would already exist.

use base64::Engine;
use log::info;

use crate::atoms::constants::{BACKUP_KEY_B64_LEN, BACKUP_KEY_BYTES};
use crate::atoms::error::{CoreError, CoreResult};
use crate::secrets::SecretProvider;

pub const BACKUP_KEY_SECRET: &str = "BACKUP_ENCRYPTION_KEY";

/// The validated 32-byte AES-256 key. Constructed once at startup, cloned
/// into each subsystem that seals or opens snapshots.
#[derive(Clone)]
pub struct BackupKey {
    key: [u8; BACKUP_KEY_BYTES],
}

impl BackupKey {
    /// Resolve and validate the backup key. Fatal if the key is absent,
    /// its encoded length is not exactly 44 bytes, or it does not decode
    /// to 32 key bytes.
    pub fn load(secrets: &SecretProvider) -> CoreResult<Self> {
        let encoded = secrets.resolve(BACKUP_KEY_SECRET).ok_or_else(|| {
            CoreError::config(format!("'{}' is not set — backups cannot be encrypted", BACKUP_KEY_SECRET))
        })?;
        Self::from_encoded(&encoded)
    }

    /// Validate an already-resolved encoded key.
    pub fn from_encoded(encoded: &str) -> CoreResult<Self> {
        if encoded.len() != BACKUP_KEY_B64_LEN {
            return Err(CoreError::config(format!(
                "'{}' must be {} bytes of url-safe base64 (a 32-byte key), got {} bytes",
                BACKUP_KEY_SECRET,
                BACKUP_KEY_B64_LEN,
                encoded.len()
            )));
        }

        let decoded = base64::engine::general_purpose::URL_SAFE
            .decode(encoded)
            .map_err(|e| {
                CoreError::config(format!("'{}' is not valid url-safe base64: {}", BACKUP_KEY_SECRET, e))
            })?;

        let key: [u8; BACKUP_KEY_BYTES] = decoded.as_slice().try_into().map_err(|_| {
            CoreError::config(format!(
                "'{}' decodes to {} bytes, expected {}",
                BACKUP_KEY_SECRET,
                decoded.len(),
                BACKUP_KEY_BYTES
            ))
        })?;

        info!("[keys] Backup encryption key validated");
        Ok(Self { key })
    }

    pub fn bytes(&self) -> &[u8; BACKUP_KEY_BYTES] {
        &self.key
    }
}

// Keep key material out of debug output.
impl std::fmt::Debug for BackupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BackupKey(..)")
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
