// ── Secret Provider ────────────────────────────────────────────────────────
// Resolves named secrets from a file-drop directory first, then the process
// environment. File read errors are logged and treated as absent so the
// environment fallback still applies. Logs which source answered — never
// the value.

use log::{info, warn};
use std::path::PathBuf;

use crate::atoms::constants::SECRETS_DIR;
use crate::atoms::error::{CoreError, CoreResult};

pub struct SecretProvider {
    dir: PathBuf,
}

impl Default for SecretProvider {
    fn default() -> Self {
        Self::new(SECRETS_DIR)
    }
}

impl SecretProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Resolve a secret by name. Lookup order: `<dir>/<name>` file, then
    /// the `<name>` environment variable. Values are trimmed.
    pub fn resolve(&self, name: &str) -> Option<String> {
        let path = self.dir.join(name);
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => {
                    let value = contents.trim().to_string();
                    if !value.is_empty() {
                        info!("[secrets] '{}' resolved from file drop", name);
                        return Some(value);
                    }
                    warn!("[secrets] '{}' file is empty, falling back to env", name);
                }
                Err(e) => {
                    warn!("[secrets] Failed to read '{}' file: {}", name, e);
                }
            }
        }

        match std::env::var(name) {
            Ok(value) if !value.trim().is_empty() => {
                info!("[secrets] '{}' resolved from environment", name);
                Some(value.trim().to_string())
            }
            _ => None,
        }
    }

    /// Resolve a secret that the process cannot start without.
    pub fn require(&self, name: &str) -> CoreResult<String> {
        self.resolve(name)
            .ok_or_else(|| CoreError::config(format!("Required secret '{}' is not set", name)))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_drop_wins_over_environment() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("MOCHIKO_TEST_SECRET_A"), "from-file\n").unwrap();
        std::env::set_var("MOCHIKO_TEST_SECRET_A", "from-env");

        let provider = SecretProvider::new(dir.path());
        assert_eq!(
            provider.resolve("MOCHIKO_TEST_SECRET_A").as_deref(),
            Some("from-file")
        );
        std::env::remove_var("MOCHIKO_TEST_SECRET_A");
    }

    #[test]
    fn falls_back_to_environment() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("MOCHIKO_TEST_SECRET_B", "env-only");

        let provider = SecretProvider::new(dir.path());
        assert_eq!(
            provider.resolve("MOCHIKO_TEST_SECRET_B").as_deref(),
            Some("env-only")
        );
        std::env::remove_var("MOCHIKO_TEST_SECRET_B");
    }

    #[test]
    fn absent_secret_is_none_and_require_fails() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SecretProvider::new(dir.path());
        assert!(provider.resolve("MOCHIKO_TEST_SECRET_MISSING").is_none());
        assert!(matches!(
            provider.require("MOCHIKO_TEST_SECRET_MISSING"),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn values_are_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("MOCHIKO_TEST_SECRET_C"), "  padded  \n").unwrap();
        let provider = SecretProvider::new(dir.path());
        assert_eq!(
            provider.resolve("MOCHIKO_TEST_SECRET_C").as_deref(),
            Some("padded")
        );
    }
}
