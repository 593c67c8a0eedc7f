// ── Store: Conversation History ────────────────────────────────────────────
// Append-only log keyed by `user_uuid`. Ordering is preserved by
// (user, timestamp); appenders never backdate. At most the 5,000 most-recent
// rows are exported, and the daily cleanup evicts rows beyond that window.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{now_utc, ConnectionPool};
use crate::atoms::constants::HISTORY_EXPORT_CAP;
use crate::atoms::error::CoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRow {
    pub id: i64,
    pub user_uuid: String,
    pub role: String,
    pub content: String,
    pub timestamp: String,
}

/// Append one turn. The timestamp is taken here, so per-user ordering holds
/// as long as a user's turns arrive on one request thread.
pub fn append(pool: &ConnectionPool, user_uuid: &str, role: Role, content: &str) -> CoreResult<()> {
    let session = pool.session()?;
    session.execute(
        "INSERT INTO conversation_history (user_uuid, role, content, timestamp)
         VALUES (?1, ?2, ?3, ?4)",
        params![user_uuid, role.as_str(), content, now_utc()],
    )?;
    Ok(())
}

/// Most recent turns for one user, newest first.
pub fn recent(pool: &ConnectionPool, user_uuid: &str, limit: usize) -> CoreResult<Vec<HistoryRow>> {
    let session = pool.session()?;
    let mut stmt = session.prepare(
        "SELECT id, user_uuid, role, content, timestamp FROM conversation_history
         WHERE user_uuid = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![user_uuid, limit as i64], row_to_history)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Evict rows beyond the most-recent window. Returns rows deleted.
pub fn trim_to_window(pool: &ConnectionPool) -> CoreResult<usize> {
    let session = pool.session()?;
    let deleted = session.execute(
        "DELETE FROM conversation_history WHERE id NOT IN (
             SELECT id FROM conversation_history
             ORDER BY timestamp DESC, id DESC LIMIT ?1
         )",
        params![HISTORY_EXPORT_CAP as i64],
    )?;
    Ok(deleted)
}

fn row_to_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRow> {
    Ok(HistoryRow {
        id: row.get(0)?,
        user_uuid: row.get(1)?,
        role: row.get(2)?,
        content: row.get(3)?,
        timestamp: row.get(4)?,
    })
}

// ── Snapshot export / import ───────────────────────────────────────────────

/// The most recent `HISTORY_EXPORT_CAP` rows, descending by timestamp.
pub fn export_rows(conn: &Connection) -> CoreResult<Vec<Value>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_uuid, role, content, timestamp FROM conversation_history
         ORDER BY timestamp DESC, id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![HISTORY_EXPORT_CAP as i64], |row| {
            let h = row_to_history(row)?;
            Ok(json!({
                "id": h.id,
                "user_uuid": h.user_uuid,
                "role": h.role,
                "content": h.content,
                "timestamp": h.timestamp,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// History has no surrogate-free unique key, so a row "exists" when the same
/// (user, role, content, timestamp) tuple is already present.
pub fn import_row(conn: &Connection, row: &Value) -> CoreResult<bool> {
    let inserted = conn.execute(
        "INSERT INTO conversation_history (user_uuid, role, content, timestamp)
         SELECT ?1, ?2, ?3, ?4
         WHERE NOT EXISTS (
             SELECT 1 FROM conversation_history
             WHERE user_uuid = ?1 AND role = ?2 AND content = ?3 AND timestamp = ?4
         )",
        params![
            row["user_uuid"].as_str().unwrap_or_default(),
            row["role"].as_str().unwrap_or_default(),
            row["content"].as_str().unwrap_or_default(),
            row["timestamp"].as_str().unwrap_or_default(),
        ],
    )?;
    Ok(inserted > 0)
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::schema_for_testing;

    fn test_pool() -> ConnectionPool {
        let pool = ConnectionPool::open_in_memory().unwrap();
        schema_for_testing(&pool.session().unwrap());
        pool
    }

    #[test]
    fn append_preserves_per_user_order() {
        let pool = test_pool();
        append(&pool, "u1", Role::User, "first").unwrap();
        append(&pool, "u1", Role::Assistant, "second").unwrap();
        append(&pool, "u1", Role::User, "third").unwrap();

        let rows = recent(&pool, "u1", 10).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].content, "third");
        assert_eq!(rows[2].content, "first");
    }

    #[test]
    fn export_caps_at_window_keeping_newest() {
        let pool = test_pool();
        let session = pool.session().unwrap();
        // Bulk insert with synthetic increasing timestamps — going through
        // append() 7,000 times would dominate the test run.
        let mut stmt = session
            .prepare(
                "INSERT INTO conversation_history (user_uuid, role, content, timestamp)
                 VALUES ('u1', 'user', ?1, ?2)",
            )
            .unwrap();
        for i in 0..(HISTORY_EXPORT_CAP + 2_000) {
            stmt.execute(params![format!("msg {i}"), format!("2026-01-01T00:00:00.{i:07}Z")])
                .unwrap();
        }
        drop(stmt);

        let rows = export_rows(&session).unwrap();
        assert_eq!(rows.len(), HISTORY_EXPORT_CAP);
        // Newest row first
        assert_eq!(
            rows[0]["content"].as_str().unwrap(),
            format!("msg {}", HISTORY_EXPORT_CAP + 1_999)
        );
        // Oldest exported row is exactly at the window edge
        assert_eq!(
            rows[HISTORY_EXPORT_CAP - 1]["content"].as_str().unwrap(),
            "msg 2000"
        );
    }

    #[test]
    fn trim_evicts_beyond_window() {
        let pool = test_pool();
        {
            let session = pool.session().unwrap();
            let mut stmt = session
                .prepare(
                    "INSERT INTO conversation_history (user_uuid, role, content, timestamp)
                     VALUES ('u1', 'user', ?1, ?2)",
                )
                .unwrap();
            for i in 0..(HISTORY_EXPORT_CAP + 10) {
                stmt.execute(params![format!("m{i}"), format!("2026-01-01T00:00:00.{i:07}Z")])
                    .unwrap();
            }
        }
        let deleted = trim_to_window(&pool).unwrap();
        assert_eq!(deleted, 10);

        let remaining: i64 = pool
            .session()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM conversation_history", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, HISTORY_EXPORT_CAP as i64);
    }

    #[test]
    fn import_row_is_idempotent() {
        let pool = test_pool();
        let session = pool.session().unwrap();
        let row = json!({
            "user_uuid": "u1", "role": "user",
            "content": "hello", "timestamp": "2026-01-01T00:00:00Z",
        });
        assert!(import_row(&session, &row).unwrap());
        assert!(!import_row(&session, &row).unwrap());
    }
}
