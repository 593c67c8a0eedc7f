// ── Store: Schema ──────────────────────────────────────────────────────────
// Declarative entity definitions and index set. Missing tables are created
// at startup; every statement is idempotent (CREATE IF NOT EXISTS) so the
// migration can run on each boot.
//
// Natural unique keys (restore-time row matching):
//   user_memories.user_uuid, user_psychology.user_uuid,
//   holomem_wiki.member_name, hololive_news.news_hash,
//   specialized_news.news_hash, background_tasks.task_id

use log::info;
use rusqlite::Connection;

use crate::atoms::error::CoreResult;

/// Create missing tables and indexes.
pub fn run_migrations(conn: &Connection) -> CoreResult<()> {
    info!("[schema] Running schema migrations");
    conn.execute_batch(SCHEMA)?;
    info!("[schema] Schema migrations complete");
    Ok(())
}

const SCHEMA: &str = "
    -- ═══════════════════════════════════════════════════════════════
    -- User memories — one row per visitor, created on first contact.
    -- ═══════════════════════════════════════════════════════════════
    CREATE TABLE IF NOT EXISTS user_memories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_uuid TEXT NOT NULL UNIQUE,
        user_name TEXT NOT NULL,
        interaction_count INTEGER NOT NULL DEFAULT 0,
        last_interaction TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_user_memories_uuid ON user_memories(user_uuid);

    -- ═══════════════════════════════════════════════════════════════
    -- Conversation history — append-only, trimmed by daily cleanup.
    -- ═══════════════════════════════════════════════════════════════
    CREATE TABLE IF NOT EXISTS conversation_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_uuid TEXT NOT NULL,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_history_user_ts
        ON conversation_history(user_uuid, timestamp);

    -- ═══════════════════════════════════════════════════════════════
    -- Scraped news — news_hash is the global dedup key.
    -- ═══════════════════════════════════════════════════════════════
    CREATE TABLE IF NOT EXISTS hololive_news (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        url TEXT NOT NULL DEFAULT '',
        news_hash TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS specialized_news (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        site_name TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        url TEXT NOT NULL DEFAULT '',
        news_hash TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_specialized_site ON specialized_news(site_name);

    -- ═══════════════════════════════════════════════════════════════
    -- Talent catalogue — graduations are monotonic: a row with a
    -- graduation_date keeps is_active = 0 permanently.
    -- ═══════════════════════════════════════════════════════════════
    CREATE TABLE IF NOT EXISTS holomem_wiki (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        member_name TEXT NOT NULL UNIQUE,
        generation TEXT,
        tags TEXT NOT NULL DEFAULT '[]',
        debut_date TEXT,
        graduation_date TEXT,
        profile_url TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        last_updated TEXT NOT NULL
    );

    -- ═══════════════════════════════════════════════════════════════
    -- Detached background work items.
    -- ═══════════════════════════════════════════════════════════════
    CREATE TABLE IF NOT EXISTS background_tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id TEXT NOT NULL UNIQUE,
        kind TEXT NOT NULL DEFAULT 'search',
        user_uuid TEXT NOT NULL,
        query TEXT NOT NULL,
        result TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL,
        completed_at TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_tasks_user ON background_tasks(user_uuid);

    -- ═══════════════════════════════════════════════════════════════
    -- Per-user transient news-number bindings.
    -- ═══════════════════════════════════════════════════════════════
    CREATE TABLE IF NOT EXISTS news_cache (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_uuid TEXT NOT NULL,
        news_kind TEXT NOT NULL,
        news_number INTEGER NOT NULL,
        news_id INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(user_uuid, news_kind, news_number)
    );

    -- ═══════════════════════════════════════════════════════════════
    -- Personality profiles — trait scores clamped to [0, 100].
    -- ═══════════════════════════════════════════════════════════════
    CREATE TABLE IF NOT EXISTS user_psychology (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_uuid TEXT NOT NULL UNIQUE,
        user_name TEXT NOT NULL,
        openness INTEGER NOT NULL DEFAULT 50,
        conscientiousness INTEGER NOT NULL DEFAULT 50,
        extraversion INTEGER NOT NULL DEFAULT 50,
        agreeableness INTEGER NOT NULL DEFAULT 50,
        neuroticism INTEGER NOT NULL DEFAULT 50,
        interests TEXT NOT NULL DEFAULT '[]',
        favorite_topics TEXT NOT NULL DEFAULT '[]',
        conversation_style TEXT,
        emotional_tendency TEXT,
        total_messages INTEGER NOT NULL DEFAULT 0,
        avg_message_length REAL NOT NULL DEFAULT 0,
        summary TEXT,
        confidence INTEGER NOT NULL DEFAULT 0,
        last_analyzed TEXT
    );
";

/// Initialise an already-open connection with the full schema.
/// Used by integration tests that create in-memory databases.
pub fn schema_for_testing(conn: &Connection) {
    run_migrations(conn).expect("schema_for_testing: migrations failed");
}

// ── Tests ──────────────────────────────────────────────────────────────────
