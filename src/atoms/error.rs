// ── Mochiko Atoms: Error Types ─────────────────────────────────────────────
// Single canonical error enum for the core, built with `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by domain (I/O, DB, Network, Config…).
//   • The `#[from]` attribute wires std/external error conversions automatically.
//   • No variant carries secret material (keys, tokens) in its message.
//
// Mapping onto the operational taxonomy:
//   Config    — fatal misconfiguration, abort the process at startup
//   Integrity — checksum/auth failure on restore, abort the operation
//   Process   — subprocess (git) failure, report and keep local artifacts
//   Auth      — admin gate rejection

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CoreError {
    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP / network failure (reqwest layer).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// SQLite / rusqlite database failure.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Required secret missing or malformed, unwritable directory, DB
    /// unreachable. The process must not continue past startup with one
    /// of these.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot integrity violation: AEAD authentication failure on decrypt
    /// or checksum mismatch against the companion metadata. The restore
    /// operation aborts and existing rows are left untouched.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// External process (git) returned a non-zero exit or timed out.
    #[error("Process error: {0}")]
    Process(String),

    /// Authentication / authorization failure at the admin gate.
    #[error("Auth error: {0}")]
    Auth(String),

    /// Requested artifact or row does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Catch-all for errors that do not yet have a dedicated variant.
    /// Prefer adding a specific variant over using this in new code.
    #[error("{0}")]
    Other(String),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl CoreError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::Process(message.into())
    }
}

// ── Migration bridge: String → CoreError ───────────────────────────────────
// Allows `?` on helpers returning `Result<T, String>` inside functions that
// return `CoreResult<T>`.

impl From<String> for CoreError {
    fn from(s: String) -> Self {
        CoreError::Other(s)
    }
}

impl From<&str> for CoreError {
    fn from(s: &str) -> Self {
        CoreError::Other(s.to_string())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All core operations should return this type.
pub type CoreResult<T> = Result<T, CoreError>;
