// ── Store: Talent Wiki ─────────────────────────────────────────────────────
// Catalogue keyed uniquely by `member_name`, upserted by the wiki scraper.
// Reconciliation: after a full scan, members absent from the source site are
// flipped inactive — except rows that already carry a graduation date, which
// stay inactive permanently (graduations are monotonic).

use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{now_utc, ConnectionPool};
use crate::atoms::error::CoreResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiMember {
    pub id: i64,
    pub member_name: String,
    pub generation: Option<String>,
    /// Serialised JSON list of tags.
    pub tags: String,
    pub debut_date: Option<String>,
    pub graduation_date: Option<String>,
    pub profile_url: Option<String>,
    pub is_active: bool,
    pub last_updated: String,
}

/// A member as seen on the source site during one scan.
#[derive(Debug, Clone, Default)]
pub struct ScannedMember {
    pub member_name: String,
    pub generation: Option<String>,
    pub tags: Vec<String>,
    pub debut_date: Option<String>,
    pub graduation_date: Option<String>,
    pub profile_url: Option<String>,
}

const SELECT_COLS: &str = "id, member_name, generation, tags, debut_date, graduation_date,
                           profile_url, is_active, last_updated";

fn row_to_member(row: &rusqlite::Row<'_>) -> rusqlite::Result<WikiMember> {
    Ok(WikiMember {
        id: row.get(0)?,
        member_name: row.get(1)?,
        generation: row.get(2)?,
        tags: row.get(3)?,
        debut_date: row.get(4)?,
        graduation_date: row.get(5)?,
        profile_url: row.get(6)?,
        is_active: row.get::<_, i64>(7)? != 0,
        last_updated: row.get(8)?,
    })
}

/// Upsert one scanned member and mark it active — unless a graduation date
/// (incoming or already stored) pins it inactive.
pub fn upsert_member(pool: &ConnectionPool, member: &ScannedMember) -> CoreResult<()> {
    let session = pool.session()?;
    let tags = serde_json::to_string(&member.tags)?;
    session.execute(
        "INSERT INTO holomem_wiki
             (member_name, generation, tags, debut_date, graduation_date,
              profile_url, is_active, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, CASE WHEN ?5 IS NULL THEN 1 ELSE 0 END, ?7)
         ON CONFLICT(member_name) DO UPDATE SET
             generation = excluded.generation,
             tags = excluded.tags,
             debut_date = excluded.debut_date,
             graduation_date = COALESCE(holomem_wiki.graduation_date, excluded.graduation_date),
             profile_url = excluded.profile_url,
             is_active = CASE
                 WHEN COALESCE(holomem_wiki.graduation_date, excluded.graduation_date) IS NULL
                 THEN 1 ELSE 0 END,
             last_updated = excluded.last_updated",
        params![
            member.member_name,
            member.generation,
            tags,
            member.debut_date,
            member.graduation_date,
            member.profile_url,
            now_utc(),
        ],
    )?;
    Ok(())
}

/// After a full scan: flip rows not seen this scan to inactive, leaving
/// graduated rows untouched. Returns rows deactivated.
pub fn reconcile_absent(pool: &ConnectionPool, seen_names: &[String]) -> CoreResult<usize> {
    let session = pool.session()?;
    // rusqlite has no array binding; the name list is small (tens of rows)
    // so a parameterised placeholder list is fine.
    let placeholders = (1..=seen_names.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = if seen_names.is_empty() {
        "UPDATE holomem_wiki SET is_active = 0
         WHERE graduation_date IS NULL AND is_active = 1"
            .to_string()
    } else {
        format!(
            "UPDATE holomem_wiki SET is_active = 0
             WHERE graduation_date IS NULL AND is_active = 1
               AND member_name NOT IN ({placeholders})"
        )
    };
    let deactivated = session.execute(
        &sql,
        rusqlite::params_from_iter(seen_names.iter().map(|s| s.as_str())),
    )?;
    if deactivated > 0 {
        info!("[wiki] Reconciliation deactivated {} absent member(s)", deactivated);
    }
    Ok(deactivated)
}

pub fn get_member(pool: &ConnectionPool, member_name: &str) -> CoreResult<Option<WikiMember>> {
    let session = pool.session()?;
    let member = session
        .query_row(
            &format!("SELECT {SELECT_COLS} FROM holomem_wiki WHERE member_name = ?1"),
            params![member_name],
            row_to_member,
        )
        .optional()?;
    Ok(member)
}

pub fn member_count(pool: &ConnectionPool) -> CoreResult<i64> {
    let session = pool.session()?;
    Ok(session.query_row("SELECT COUNT(*) FROM holomem_wiki", [], |row| row.get(0))?)
}

// ── Snapshot export / import ───────────────────────────────────────────────

pub fn export_rows(conn: &Connection) -> CoreResult<Vec<Value>> {
    let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLS} FROM holomem_wiki ORDER BY id"))?;
    let rows = stmt
        .query_map([], |row| {
            let m = row_to_member(row)?;
            Ok(json!({
                "id": m.id,
                "member_name": m.member_name,
                "generation": m.generation,
                "tags": m.tags,
                "debut_date": m.debut_date,
                "graduation_date": m.graduation_date,
                "profile_url": m.profile_url,
                "is_active": m.is_active,
                "last_updated": m.last_updated,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Insert a snapshot row unless the member already exists.
pub fn import_row(conn: &Connection, row: &Value) -> CoreResult<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO holomem_wiki
             (member_name, generation, tags, debut_date, graduation_date,
              profile_url, is_active, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            row["member_name"].as_str().unwrap_or_default(),
            row["generation"].as_str(),
            row["tags"].as_str().unwrap_or("[]"),
            row["debut_date"].as_str(),
            row["graduation_date"].as_str(),
            row["profile_url"].as_str(),
            row["is_active"].as_bool().unwrap_or(true) as i64,
            row["last_updated"].as_str().unwrap_or_default(),
        ],
    )?;
    Ok(inserted > 0)
}

// ── Tests ──────────────────────────────────────────────────────────────────
