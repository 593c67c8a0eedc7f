// ── Store: Scraped News + NewsCache ────────────────────────────────────────
// Article rows deduplicated by `news_hash` — md5 over the title plus the
// first 100 characters of the content. Re-running a scrape is side-effect
// free: the second insert of the same article is swallowed.
//
// NewsCache binds a per-user natural number to a specific news row, scoped
// by news kind, so "read me number 3" stays stable between the listing and
// the follow-up request.

use md5::{Digest, Md5};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{now_utc, ConnectionPool};
use crate::atoms::error::CoreResult;

// ── Dedup hash ─────────────────────────────────────────────────────────────

/// md5 hex over `title ++ content[0..100]` (characters, not bytes).
pub fn news_hash(title: &str, content: &str) -> String {
    let head: String = content.chars().take(100).collect();
    let mut hasher = Md5::new();
    hasher.update(title.as_bytes());
    hasher.update(head.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

// ── Article rows ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub content: String,
    pub url: String,
}

/// Insert a primary-source article unless its hash already exists.
/// Returns whether a row was inserted.
pub fn insert_hololive(pool: &ConnectionPool, article: &NewsArticle) -> CoreResult<bool> {
    let session = pool.session()?;
    let hash = news_hash(&article.title, &article.content);
    let inserted = session.execute(
        "INSERT OR IGNORE INTO hololive_news (title, content, url, news_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![article.title, article.content, article.url, hash, now_utc()],
    )?;
    Ok(inserted > 0)
}

/// Insert a specialised-site article unless its hash already exists.
pub fn insert_specialized(pool: &ConnectionPool, site_name: &str, article: &NewsArticle) -> CoreResult<bool> {
    let session = pool.session()?;
    let hash = news_hash(&article.title, &article.content);
    let inserted = session.execute(
        "INSERT OR IGNORE INTO specialized_news
             (site_name, title, content, url, news_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![site_name, article.title, article.content, article.url, hash, now_utc()],
    )?;
    Ok(inserted > 0)
}

pub fn hololive_count(conn: &Connection) -> CoreResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM hololive_news", [], |row| row.get(0))?)
}

// ── NewsCache ──────────────────────────────────────────────────────────────

/// Bind (user, kind, number) → news row id, replacing any previous binding.
pub fn cache_bind(
    pool: &ConnectionPool,
    user_uuid: &str,
    news_kind: &str,
    news_number: i64,
    news_id: i64,
) -> CoreResult<()> {
    let session = pool.session()?;
    session.execute(
        "INSERT INTO news_cache (user_uuid, news_kind, news_number, news_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_uuid, news_kind, news_number) DO UPDATE SET
             news_id = excluded.news_id,
             created_at = excluded.created_at",
        params![user_uuid, news_kind, news_number, news_id, now_utc()],
    )?;
    Ok(())
}

pub fn cache_lookup(
    pool: &ConnectionPool,
    user_uuid: &str,
    news_kind: &str,
    news_number: i64,
) -> CoreResult<Option<i64>> {
    let session = pool.session()?;
    let id = session
        .query_row(
            "SELECT news_id FROM news_cache
             WHERE user_uuid = ?1 AND news_kind = ?2 AND news_number = ?3",
            params![user_uuid, news_kind, news_number],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Purge cache bindings older than `max_age_secs`. Returns rows deleted.
pub fn cache_purge_expired(pool: &ConnectionPool, max_age_secs: i64) -> CoreResult<usize> {
    let session = pool.session()?;
    let cutoff = (chrono::Utc::now() - chrono::Duration::seconds(max_age_secs))
        .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
    let deleted = session.execute(
        "DELETE FROM news_cache WHERE created_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}

// ── Tests ──────────────────────────────────────────────────────────────────
