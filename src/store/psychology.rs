// ── Store: User Psychology ─────────────────────────────────────────────────
// Per-user personality profile produced by the (out-of-core) analyser.
// Trait scores and confidence are clamped to [0, 100] at this boundary so
// the invariant holds no matter what the producer sends.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{now_utc, ConnectionPool};
use crate::atoms::error::CoreResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsychologyProfile {
    pub user_uuid: String,
    pub user_name: String,
    pub openness: i64,
    pub conscientiousness: i64,
    pub extraversion: i64,
    pub agreeableness: i64,
    pub neuroticism: i64,
    /// Serialised JSON lists.
    pub interests: String,
    pub favorite_topics: String,
    pub conversation_style: Option<String>,
    pub emotional_tendency: Option<String>,
    pub total_messages: i64,
    pub avg_message_length: f64,
    pub summary: Option<String>,
    pub confidence: i64,
}

fn clamp_score(score: i64) -> i64 {
    score.clamp(0, 100)
}

const SELECT_COLS: &str = "user_uuid, user_name, openness, conscientiousness, extraversion,
                           agreeableness, neuroticism, interests, favorite_topics,
                           conversation_style, emotional_tendency, total_messages,
                           avg_message_length, summary, confidence, last_analyzed";

/// Write (or rewrite) a profile, clamping every score to its valid range
/// and stamping the analysis time.
pub fn upsert_profile(pool: &ConnectionPool, profile: &PsychologyProfile) -> CoreResult<()> {
    let session = pool.session()?;
    session.execute(
        "INSERT INTO user_psychology
             (user_uuid, user_name, openness, conscientiousness, extraversion,
              agreeableness, neuroticism, interests, favorite_topics,
              conversation_style, emotional_tendency, total_messages,
              avg_message_length, summary, confidence, last_analyzed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
         ON CONFLICT(user_uuid) DO UPDATE SET
             user_name = excluded.user_name,
             openness = excluded.openness,
             conscientiousness = excluded.conscientiousness,
             extraversion = excluded.extraversion,
             agreeableness = excluded.agreeableness,
             neuroticism = excluded.neuroticism,
             interests = excluded.interests,
             favorite_topics = excluded.favorite_topics,
             conversation_style = excluded.conversation_style,
             emotional_tendency = excluded.emotional_tendency,
             total_messages = excluded.total_messages,
             avg_message_length = excluded.avg_message_length,
             summary = excluded.summary,
             confidence = excluded.confidence,
             last_analyzed = excluded.last_analyzed",
        params![
            profile.user_uuid,
            profile.user_name,
            clamp_score(profile.openness),
            clamp_score(profile.conscientiousness),
            clamp_score(profile.extraversion),
            clamp_score(profile.agreeableness),
            clamp_score(profile.neuroticism),
            profile.interests,
            profile.favorite_topics,
            profile.conversation_style,
            profile.emotional_tendency,
            profile.total_messages,
            profile.avg_message_length,
            profile.summary,
            clamp_score(profile.confidence),
            now_utc(),
        ],
    )?;
    Ok(())
}

pub fn get_profile(pool: &ConnectionPool, user_uuid: &str) -> CoreResult<Option<PsychologyProfile>> {
    let session = pool.session()?;
    let profile = session
        .query_row(
            &format!("SELECT {SELECT_COLS} FROM user_psychology WHERE user_uuid = ?1"),
            params![user_uuid],
            row_to_profile,
        )
        .optional()?;
    Ok(profile)
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<PsychologyProfile> {
    Ok(PsychologyProfile {
        user_uuid: row.get(0)?,
        user_name: row.get(1)?,
        openness: row.get(2)?,
        conscientiousness: row.get(3)?,
        extraversion: row.get(4)?,
        agreeableness: row.get(5)?,
        neuroticism: row.get(6)?,
        interests: row.get(7)?,
        favorite_topics: row.get(8)?,
        conversation_style: row.get(9)?,
        emotional_tendency: row.get(10)?,
        total_messages: row.get(11)?,
        avg_message_length: row.get(12)?,
        summary: row.get(13)?,
        confidence: row.get(14)?,
    })
}

// ── Snapshot export / import ───────────────────────────────────────────────

pub fn export_rows(conn: &Connection) -> CoreResult<Vec<Value>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, {SELECT_COLS} FROM user_psychology ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(json!({
                "id": row.get::<_, i64>(0)?,
                "user_uuid": row.get::<_, String>(1)?,
                "user_name": row.get::<_, String>(2)?,
                "openness": row.get::<_, i64>(3)?,
                "conscientiousness": row.get::<_, i64>(4)?,
                "extraversion": row.get::<_, i64>(5)?,
                "agreeableness": row.get::<_, i64>(6)?,
                "neuroticism": row.get::<_, i64>(7)?,
                "interests": row.get::<_, String>(8)?,
                "favorite_topics": row.get::<_, String>(9)?,
                "conversation_style": row.get::<_, Option<String>>(10)?,
                "emotional_tendency": row.get::<_, Option<String>>(11)?,
                "total_messages": row.get::<_, i64>(12)?,
                "avg_message_length": row.get::<_, f64>(13)?,
                "summary": row.get::<_, Option<String>>(14)?,
                "confidence": row.get::<_, i64>(15)?,
                "last_analyzed": row.get::<_, Option<String>>(16)?,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Insert a snapshot row unless a profile with the same `user_uuid` exists.
pub fn import_row(conn: &Connection, row: &Value) -> CoreResult<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO user_psychology
             (user_uuid, user_name, openness, conscientiousness, extraversion,
              agreeableness, neuroticism, interests, favorite_topics,
              conversation_style, emotional_tendency, total_messages,
              avg_message_length, summary, confidence, last_analyzed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            row["user_uuid"].as_str().unwrap_or_default(),
            row["user_name"].as_str().unwrap_or_default(),
            clamp_score(row["openness"].as_i64().unwrap_or(50)),
            clamp_score(row["conscientiousness"].as_i64().unwrap_or(50)),
            clamp_score(row["extraversion"].as_i64().unwrap_or(50)),
            clamp_score(row["agreeableness"].as_i64().unwrap_or(50)),
            clamp_score(row["neuroticism"].as_i64().unwrap_or(50)),
            row["interests"].as_str().unwrap_or("[]"),
            row["favorite_topics"].as_str().unwrap_or("[]"),
            row["conversation_style"].as_str(),
            row["emotional_tendency"].as_str(),
            row["total_messages"].as_i64().unwrap_or(0),
            row["avg_message_length"].as_f64().unwrap_or(0.0),
            row["summary"].as_str(),
            clamp_score(row["confidence"].as_i64().unwrap_or(0)),
            row["last_analyzed"].as_str(),
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

    fn profile(uuid: &str) -> PsychologyProfile {
        PsychologyProfile {
            user_uuid: uuid.to_string(),
            user_name: "alice".into(),
            openness: 50,
            conscientiousness: 50,
            extraversion: 50,
            agreeableness: 50,
            neuroticism: 50,
            interests: "[]".into(),
            favorite_topics: "[]".into(),
            conversation_style: None,
            emotional_tendency: None,
            total_messages: 0,
            avg_message_length: 0.0,
            summary: None,
            confidence: 0,
        }
    }

    #[test]
    fn scores_are_clamped_on_write() {
        let pool = test_pool();
        let mut p = profile("u1");
        p.openness = 250;
        p.neuroticism = -30;
        p.confidence = 101;
        upsert_profile(&pool, &p).unwrap();

        let stored = get_profile(&pool, "u1").unwrap().unwrap();
        assert_eq!(stored.openness, 100);
        assert_eq!(stored.neuroticism, 0);
        assert_eq!(stored.confidence, 100);
    }

    #[test]
    fn upsert_replaces_existing_profile() {
        let pool = test_pool();
        upsert_profile(&pool, &profile("u1")).unwrap();
        let mut updated = profile("u1");
        updated.conversation_style = Some("casual".into());
        updated.confidence = 80;
        upsert_profile(&pool, &updated).unwrap();

        let stored = get_profile(&pool, "u1").unwrap().unwrap();
        assert_eq!(stored.conversation_style.as_deref(), Some("casual"));
        assert_eq!(stored.confidence, 80);
    }

    #[test]
    fn import_defaults_unknown_scores_to_50() {
        let pool = test_pool();
        let session = pool.session().unwrap();
        let row = json!({"user_uuid": "u9", "user_name": "bob"});
        assert!(import_row(&session, &row).unwrap());
        drop(session);

        let stored = get_profile(&pool, "u9").unwrap().unwrap();
        assert_eq!(stored.openness, 50);
        assert_eq!(stored.confidence, 0);
    }
}
