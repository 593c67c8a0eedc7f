// ── Mochiko Atoms: Constants ───────────────────────────────────────────────
// All named constants for the crate live here.
// Rationale: collecting constants in one place eliminates magic strings,
// makes auditing easier, and keeps every layer's code self-documenting.

// ── Secret resolution ──────────────────────────────────────────────────────
// File-drop directory consulted before the process environment.
pub const SECRETS_DIR: &str = "/etc/secrets";

// ── Backup key material ────────────────────────────────────────────────────
// Canonical length of a url-safe base64-encoded 32-byte symmetric key.
// A key of any other length is a fatal misconfiguration at startup.
pub const BACKUP_KEY_B64_LEN: usize = 44;
pub const BACKUP_KEY_BYTES: usize = 32;

// ── Connection pool sizing ─────────────────────────────────────────────────
// File-backed profile: single shared handle, long busy wait so concurrent
// writers queue instead of failing.
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 20;
// Networked profile knobs (kept on PoolOptions; the active backend is
// SQLite, see store::pool).
pub const POOL_SIZE: usize = 10;
pub const POOL_MAX_OVERFLOW: usize = 20;
pub const POOL_RECYCLE_SECS: u64 = 300;
pub const POOL_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const POOL_STATEMENT_TIMEOUT_SECS: u64 = 30;

// ── Conversation history ───────────────────────────────────────────────────
// At most this many most-recent rows are ever exported; cleanup may evict
// rows beyond the same window.
pub const HISTORY_EXPORT_CAP: usize = 5_000;

// ── Retry fetcher ──────────────────────────────────────────────────────────
pub const FETCH_MAX_RETRIES: u32 = 3;
pub const FETCH_TIMEOUT_SECS: u64 = 15;
pub const FETCH_RETRY_DELAY_SECS: u64 = 2;

// ── TTL cache ──────────────────────────────────────────────────────────────
pub const NEWS_CACHE_TTL_SECS: u64 = 600;

// ── Backup artifacts ───────────────────────────────────────────────────────
pub const BACKUP_CIPHERTEXT_FILE: &str = "database_backup.json.encrypted";
pub const BACKUP_METADATA_FILE: &str = "backup_metadata.json";
pub const BACKUP_VERSION: &str = "2.0";

// Every git subprocess step is bounded by this wall clock; an expired call
// aborts the whole snapshot or restore operation.
pub const GIT_STEP_TIMEOUT_SECS: u64 = 60;

// ── Background worker pool ─────────────────────────────────────────────────
pub const WORKER_POOL_SIZE: usize = 5;

// ── Scheduler cadence ──────────────────────────────────────────────────────
pub const SCHEDULER_TICK_SECS: u64 = 60;
// Daily jobs fire at a fixed UTC hour. Snapshot is registered before cleanup
// so a tick where both are due snapshots the soon-to-be-evicted rows first.
pub const SNAPSHOT_HOUR_UTC: u32 = 18;
pub const CLEANUP_HOUR_UTC: u32 = 2;

// ── Voice output ───────────────────────────────────────────────────────────
// Synthesized audio is written here by the (out-of-core) TTS path; the
// lifecycle check only verifies the directory exists and is writable.
pub const VOICE_DIR: &str = "/tmp/voices";
