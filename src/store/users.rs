// ── Store: User Memories ───────────────────────────────────────────────────
// One row per visitor, keyed by `user_uuid`. Created on first contact,
// mutated on each chat turn, never deleted automatically.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{now_utc, ConnectionPool};
use crate::atoms::error::CoreResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMemory {
    pub id: i64,
    pub user_uuid: String,
    pub user_name: String,
    pub interaction_count: i64,
    pub last_interaction: Option<String>,
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserMemory> {
    Ok(UserMemory {
        id: row.get(0)?,
        user_uuid: row.get(1)?,
        user_name: row.get(2)?,
        interaction_count: row.get(3)?,
        last_interaction: row.get(4)?,
    })
}

const SELECT_COLS: &str = "id, user_uuid, user_name, interaction_count, last_interaction";

/// Upsert the visitor row for one chat turn: insert on first contact, else
/// bump the interaction counter and refresh name + last-interaction stamp.
pub fn record_interaction(pool: &ConnectionPool, user_uuid: &str, user_name: &str) -> CoreResult<UserMemory> {
    let session = pool.session()?;
    let now = now_utc();
    session.execute(
        "INSERT INTO user_memories (user_uuid, user_name, interaction_count, last_interaction)
         VALUES (?1, ?2, 1, ?3)
         ON CONFLICT(user_uuid) DO UPDATE SET
             user_name = excluded.user_name,
             interaction_count = user_memories.interaction_count + 1,
             last_interaction = excluded.last_interaction",
        params![user_uuid, user_name, now],
    )?;
    let user = session.query_row(
        &format!("SELECT {SELECT_COLS} FROM user_memories WHERE user_uuid = ?1"),
        params![user_uuid],
        row_to_user,
    )?;
    Ok(user)
}

pub fn get_user(pool: &ConnectionPool, user_uuid: &str) -> CoreResult<Option<UserMemory>> {
    let session = pool.session()?;
    let user = session
        .query_row(
            &format!("SELECT {SELECT_COLS} FROM user_memories WHERE user_uuid = ?1"),
            params![user_uuid],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

pub fn count(conn: &Connection) -> CoreResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM user_memories", [], |row| row.get(0))?)
}

// ── Snapshot export / import ───────────────────────────────────────────────

pub fn export_rows(conn: &Connection) -> CoreResult<Vec<Value>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {SELECT_COLS} FROM user_memories ORDER BY id"))?;
    let rows = stmt
        .query_map([], |row| {
            let user = row_to_user(row)?;
            Ok(json!({
                "id": user.id,
                "user_uuid": user.user_uuid,
                "user_name": user.user_name,
                "interaction_count": user.interaction_count,
                "last_interaction": user.last_interaction,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Insert a snapshot row unless a row with the same `user_uuid` exists.
/// Returns whether a row was inserted.
pub fn import_row(conn: &Connection, row: &Value) -> CoreResult<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO user_memories
             (user_uuid, user_name, interaction_count, last_interaction)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            row["user_uuid"].as_str().unwrap_or_default(),
            row["user_name"].as_str().unwrap_or_default(),
            row["interaction_count"].as_i64().unwrap_or(0),
            row["last_interaction"].as_str(),
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
    fn first_contact_creates_then_increments() {
        let pool = test_pool();
        let first = record_interaction(&pool, "u1", "alice").unwrap();
        assert_eq!(first.interaction_count, 1);

        let second = record_interaction(&pool, "u1", "alice").unwrap();
        assert_eq!(second.interaction_count, 2);
        assert_eq!(second.id, first.id);
        assert!(second.last_interaction.is_some());
    }

    #[test]
    fn rename_is_applied_on_upsert() {
        let pool = test_pool();
        record_interaction(&pool, "u1", "alice").unwrap();
        let renamed = record_interaction(&pool, "u1", "alicia").unwrap();
        assert_eq!(renamed.user_name, "alicia");
    }

    #[test]
    fn import_skips_existing_uuid() {
        let pool = test_pool();
        record_interaction(&pool, "u1", "alice").unwrap();

        let session = pool.session().unwrap();
        let dup = json!({"user_uuid": "u1", "user_name": "other", "interaction_count": 9});
        assert!(!import_row(&session, &dup).unwrap());

        let fresh = json!({"user_uuid": "u2", "user_name": "bob", "interaction_count": 3});
        assert!(import_row(&session, &fresh).unwrap());
        drop(session);

        let bob = get_user(&pool, "u2").unwrap().unwrap();
        assert_eq!(bob.interaction_count, 3);
        let alice = get_user(&pool, "u1").unwrap().unwrap();
        assert_eq!(alice.user_name, "alice");
    }
}
