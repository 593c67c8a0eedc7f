// ── Store ──────────────────────────────────────────────────────────────────
// SQLite-backed relational state, in the sessions-store layout:
//
//   pool        — scheme-dispatched connection pool (checkout/checkin)
//   schema      — idempotent table + index creation
//   users       — UserMemory upsert/lookup
//   psychology  — UserPsychology profiles (clamped trait scores)
//   history     — append-only ConversationHistory + cap-and-trim
//   news        — HololiveNews / SpecializedNews hash-dedup + NewsCache
//   wiki        — HolomemWiki upsert + member reconciliation
//   tasks       — BackgroundTask lifecycle
//
// Repository operations are small functions that check a session out of the
// pool, perform idempotent work, and return it. No connection reference
// escapes an operation.

pub mod history;
pub mod news;
pub mod pool;
pub mod psychology;
pub mod schema;
pub mod tasks;
pub mod users;
pub mod wiki;

pub use pool::ConnectionPool;

/// Current UTC time serialised the way every table stores timestamps.
pub(crate) fn now_utc() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
