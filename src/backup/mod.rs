// ── Backup ─────────────────────────────────────────────────────────────────
// Encrypted, version-controlled snapshots of the relational state.
//
//   export  — canonical in-memory snapshot document with statistics
//   crypto  — AES-256-GCM over canonical JSON + SHA-256 checksum
//   commit  — artifact write + git publish (the durable commit point)
//   restore — pull, decrypt, verify, re-materialise rows non-destructively
//
// Local disk is not durable on the ephemeral host: only a successful git
// push counts as committed.

use std::path::PathBuf;

pub mod commit;
pub mod crypto;
pub mod export;
pub mod restore;

use crate::atoms::constants::{BACKUP_CIPHERTEXT_FILE, BACKUP_METADATA_FILE};

/// Where artifacts live and which working tree publishes them.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Scratch directory the artifact pair is written to first.
    pub backup_dir: PathBuf,
    /// Working tree of the version-controlled repository (the durable store).
    pub repo_dir: PathBuf,
    /// Committer identity for the publish step.
    pub git_name: String,
    pub git_email: String,
}

impl BackupConfig {
    pub fn new(backup_dir: impl Into<PathBuf>, repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            repo_dir: repo_dir.into(),
            git_name: "mochiko-backup".to_string(),
            git_email: "backup@mochiko.local".to_string(),
        }
    }

    pub fn ciphertext_path(&self) -> PathBuf {
        self.backup_dir.join(BACKUP_CIPHERTEXT_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.backup_dir.join(BACKUP_METADATA_FILE)
    }

    pub fn repo_ciphertext_path(&self) -> PathBuf {
        self.repo_dir.join(BACKUP_CIPHERTEXT_FILE)
    }

    pub fn repo_metadata_path(&self) -> PathBuf {
        self.repo_dir.join(BACKUP_METADATA_FILE)
    }
}
