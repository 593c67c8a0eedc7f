// ── Backup: Snapshot Exporter ──────────────────────────────────────────────
// Traverses the exported entity set and produces the snapshot document:
//
//   { timestamp: <ISO-8601 UTC>,
//     tables: { <table-name>: [ {column: value, ...}, ... ] },
//     statistics: { <table-name>: <row-count> } }
//
// Conversation history is limited to the 5,000 most-recent rows by
// descending timestamp; the other tables are exported whole. Timestamps are
// already stored as ISO-8601 strings, so scalars pass through verbatim.

use serde_json::{json, Map, Value};

use crate::atoms::error::CoreResult;
use crate::store::{history, psychology, users, wiki, ConnectionPool};

/// Tables included in a snapshot, in export order.
pub const EXPORTED_TABLES: &[&str] = &[
    "user_memories",
    "holomem_wiki",
    "user_psychology",
    "conversation_history",
];

/// Build the snapshot document from one borrowed session. Snapshots are
/// point-in-time within the session, eventually consistent across writers.
pub fn export_snapshot(pool: &ConnectionPool) -> CoreResult<Value> {
    let session = pool.session()?;

    let mut tables = Map::new();
    let mut statistics = Map::new();
    for &name in EXPORTED_TABLES {
        let rows = match name {
            "user_memories" => users::export_rows(&session)?,
            "holomem_wiki" => wiki::export_rows(&session)?,
            "user_psychology" => psychology::export_rows(&session)?,
            "conversation_history" => history::export_rows(&session)?,
            _ => unreachable!("unknown export table"),
        };
        statistics.insert(name.to_string(), json!(rows.len()));
        tables.insert(name.to_string(), Value::Array(rows));
    }

    Ok(json!({
        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true),
        "tables": tables,
        "statistics": statistics,
    }))
}

// ── Tests ──────────────────────────────────────────────────────────────────
