// ── Store: Background Tasks ────────────────────────────────────────────────
// Work-item rows for the detachable worker pool. Lifecycle:
//   pending → running → done | failed
// A completed task consumed by a poll is deleted so it is never re-delivered.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{now_utc, ConnectionPool};
use crate::atoms::error::CoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundTask {
    pub task_id: String,
    pub kind: String,
    pub user_uuid: String,
    pub query: String,
    pub result: Option<String>,
    pub status: String,
    pub created_at: String,
    pub completed_at: Option<String>,
}

/// Create a pending task row and return its id.
pub fn create(pool: &ConnectionPool, kind: &str, user_uuid: &str, query: &str) -> CoreResult<String> {
    let session = pool.session()?;
    let task_id = Uuid::new_v4().to_string();
    session.execute(
        "INSERT INTO background_tasks (task_id, kind, user_uuid, query, status, created_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
        params![task_id, kind, user_uuid, query, now_utc()],
    )?;
    Ok(task_id)
}

/// Mark a task as picked up by a worker.
pub fn mark_running(pool: &ConnectionPool, task_id: &str) -> CoreResult<()> {
    let session = pool.session()?;
    session.execute(
        "UPDATE background_tasks SET status = 'running' WHERE task_id = ?1",
        params![task_id],
    )?;
    Ok(())
}

/// Store the result and stamp completion.
pub fn complete(pool: &ConnectionPool, task_id: &str, result: &str) -> CoreResult<()> {
    finish(pool, task_id, TaskStatus::Done, Some(result))
}

/// Record a failure; the error text goes in the result column for polling.
pub fn fail(pool: &ConnectionPool, task_id: &str, error: &str) -> CoreResult<()> {
    finish(pool, task_id, TaskStatus::Failed, Some(error))
}

fn finish(pool: &ConnectionPool, task_id: &str, status: TaskStatus, result: Option<&str>) -> CoreResult<()> {
    let session = pool.session()?;
    session.execute(
        "UPDATE background_tasks
         SET status = ?2, result = ?3, completed_at = ?4
         WHERE task_id = ?1",
        params![task_id, status.as_str(), result, now_utc()],
    )?;
    Ok(())
}

pub fn get(pool: &ConnectionPool, task_id: &str) -> CoreResult<Option<BackgroundTask>> {
    let session = pool.session()?;
    let task = session
        .query_row(
            "SELECT task_id, kind, user_uuid, query, result, status, created_at, completed_at
             FROM background_tasks WHERE task_id = ?1",
            params![task_id],
            row_to_task,
        )
        .optional()?;
    Ok(task)
}

/// If the task is done, consume it: return the result and delete the row so
/// a later poll cannot re-deliver it.
pub fn take_completed(pool: &ConnectionPool, task_id: &str) -> CoreResult<Option<String>> {
    let session = pool.session()?;
    let result: Option<Option<String>> = session
        .query_row(
            "SELECT result FROM background_tasks WHERE task_id = ?1 AND status = 'done'",
            params![task_id],
            |row| row.get(0),
        )
        .optional()?;
    match result {
        Some(result) => {
            session.execute(
                "DELETE FROM background_tasks WHERE task_id = ?1",
                params![task_id],
            )?;
            Ok(Some(result.unwrap_or_default()))
        }
        None => Ok(None),
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<BackgroundTask> {
    Ok(BackgroundTask {
        task_id: row.get(0)?,
        kind: row.get(1)?,
        user_uuid: row.get(2)?,
        query: row.get(3)?,
        result: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
        completed_at: row.get(7)?,
    })
}

pub fn count(conn: &Connection) -> CoreResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM background_tasks", [], |row| row.get(0))?)
}

// ── Tests ──────────────────────────────────────────────────────────────────
