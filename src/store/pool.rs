// ── Connection Pool ────────────────────────────────────────────────────────
// Exclusive owner of the backing SQLite handles. Behaviour is selected by
// the `DATABASE_URL` scheme:
//
//   sqlite://<path>      — file-backed store: WAL journal, 20 s busy wait,
//                          handles shared across threads via checkout
//   sqlite://:memory:    — single shared in-memory handle (tests, dev)
//
// Any other scheme is a fatal misconfiguration: this build carries only the
// rusqlite backend. The networked-profile knobs (size 10, overflow 20,
// recycle 300 s, pre-ping) are still honoured by the checkout logic so the
// pool degrades gracefully under a larger connection budget.
//
// A one-shot `SELECT 1` liveness probe runs at construction.

use log::{info, warn};
use parking_lot::{Condvar, Mutex};
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::atoms::constants::{
    POOL_MAX_OVERFLOW, POOL_RECYCLE_SECS, POOL_SIZE, SQLITE_BUSY_TIMEOUT_SECS,
};
use crate::atoms::error::{CoreError, CoreResult};

// ── Backend selection ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Backend {
    File(PathBuf),
    Memory,
}

fn parse_database_url(url: &str) -> CoreResult<Backend> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .ok_or_else(|| {
            CoreError::config(format!(
                "Unsupported DATABASE_URL scheme in '{}' — this build supports sqlite:// only",
                url
            ))
        })?;

    if rest == ":memory:" || rest.is_empty() {
        return Ok(Backend::Memory);
    }
    // SQLAlchemy slash convention: the slash after the empty authority is a
    // separator, so sqlite:///mochiko.db is the relative path "mochiko.db"
    // and sqlite:////var/lib/mochiko.db is the absolute "/var/lib/mochiko.db".
    let path = rest.strip_prefix('/').unwrap_or(rest);
    Ok(Backend::File(PathBuf::from(path)))
}

// ── Pool options ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Connections kept open under steady state.
    pub size: usize,
    /// Additional connections allowed under burst load.
    pub max_overflow: usize,
    /// Connections older than this are reopened at checkout.
    pub recycle: Duration,
    /// Probe `SELECT 1` at checkout and reopen dead handles.
    pub pre_ping: bool,
    /// SQLite busy wait before a locked statement fails.
    pub busy_timeout: Duration,
}

impl PoolOptions {
    /// File-backed profile: one writer at a time, long busy wait.
    pub fn file_backed() -> Self {
        Self {
            size: 1,
            max_overflow: 4,
            recycle: Duration::from_secs(POOL_RECYCLE_SECS),
            pre_ping: false,
            busy_timeout: Duration::from_secs(SQLITE_BUSY_TIMEOUT_SECS),
        }
    }

    /// Networked profile sizing, kept for a future non-SQLite backend.
    pub fn networked() -> Self {
        Self {
            size: POOL_SIZE,
            max_overflow: POOL_MAX_OVERFLOW,
            recycle: Duration::from_secs(POOL_RECYCLE_SECS),
            pre_ping: true,
            busy_timeout: Duration::from_secs(SQLITE_BUSY_TIMEOUT_SECS),
        }
    }
}

// ── Pool internals ─────────────────────────────────────────────────────────

struct PooledConn {
    conn: Connection,
    opened_at: Instant,
}

struct PoolState {
    idle: Vec<PooledConn>,
    /// Total connections currently alive (idle + checked out).
    total: usize,
}

pub struct ConnectionPool {
    backend: Backend,
    options: PoolOptions,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl ConnectionPool {
    /// Open a pool for the given `DATABASE_URL` and probe liveness.
    pub fn open(url: &str) -> CoreResult<Self> {
        let backend = parse_database_url(url)?;
        let options = PoolOptions::file_backed();
        Self::open_with(backend, options)
    }

    /// In-memory pool for tests. The single handle is shared by checkout,
    /// so every session sees the same database.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with(Backend::Memory, PoolOptions::file_backed())
    }

    fn open_with(backend: Backend, options: PoolOptions) -> CoreResult<Self> {
        let first = Self::connect(&backend, &options)?;

        // Liveness probe — fail construction, not the first repository op.
        first
            .conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| CoreError::config(format!("Database liveness probe failed: {}", e)))?;

        info!("[pool] Connected ({})", match &backend {
            Backend::File(path) => format!("file: {}", path.display()),
            Backend::Memory => "in-memory".to_string(),
        });

        Ok(Self {
            backend,
            options,
            state: Mutex::new(PoolState { idle: vec![first], total: 1 }),
            available: Condvar::new(),
        })
    }

    fn connect(backend: &Backend, options: &PoolOptions) -> CoreResult<PooledConn> {
        let conn = match backend {
            Backend::File(path) => {
                let conn = Connection::open(path)?;
                conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
                conn
            }
            Backend::Memory => Connection::open_in_memory()?,
        };
        conn.busy_timeout(options.busy_timeout)?;
        Ok(PooledConn { conn, opened_at: Instant::now() })
    }

    fn max_total(&self) -> usize {
        match self.backend {
            // An in-memory database is per-connection; opening a second
            // handle would see an empty database.
            Backend::Memory => 1,
            Backend::File(_) => self.options.size + self.options.max_overflow,
        }
    }

    /// Check a session out of the pool. Blocks until a handle is free.
    pub fn session(&self) -> CoreResult<Session<'_>> {
        let mut state = self.state.lock();
        loop {
            if let Some(mut pooled) = state.idle.pop() {
                drop(state);
                if self.should_recycle(&pooled) {
                    match Self::connect(&self.backend, &self.options) {
                        Ok(fresh) => pooled = fresh,
                        Err(e) => {
                            warn!("[pool] Recycle reopen failed, keeping stale handle: {}", e);
                            pooled.opened_at = Instant::now();
                        }
                    }
                }
                return Ok(Session { pool: self, conn: Some(pooled) });
            }
            if state.total < self.max_total() {
                state.total += 1;
                drop(state);
                let pooled = Self::connect(&self.backend, &self.options).inspect_err(|_| {
                    self.state.lock().total -= 1;
                })?;
                return Ok(Session { pool: self, conn: Some(pooled) });
            }
            self.available.wait(&mut state);
        }
    }

    fn should_recycle(&self, pooled: &PooledConn) -> bool {
        if self.backend == Backend::Memory {
            return false;
        }
        if pooled.opened_at.elapsed() > self.options.recycle {
            return true;
        }
        if self.options.pre_ping {
            return pooled
                .conn
                .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .is_err();
        }
        false
    }

    fn checkin(&self, pooled: PooledConn) {
        let mut state = self.state.lock();
        state.idle.push(pooled);
        drop(state);
        self.available.notify_one();
    }
}

// ── Session ────────────────────────────────────────────────────────────────

/// A short-lived borrow of one pooled connection. Returned to the pool on
/// drop; never held across an await point.
pub struct Session<'a> {
    pool: &'a ConnectionPool,
    conn: Option<PooledConn>,
}

impl Deref for Session<'_> {
    type Target = Connection;
    fn deref(&self) -> &Connection {
        &self.conn.as_ref().expect("session already returned").conn
    }
}

impl DerefMut for Session<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.conn.as_mut().expect("session already returned").conn
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if let Some(pooled) = self.conn.take() {
            self.pool.checkin(pooled);
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sqlite_urls() {
        assert_eq!(
            parse_database_url("sqlite://:memory:").unwrap(),
            Backend::Memory
        );
        assert_eq!(
            parse_database_url("sqlite:///./test.db").unwrap(),
            Backend::File(PathBuf::from("./test.db"))
        );
        assert_eq!(
            parse_database_url("sqlite://mochiko.db").unwrap(),
            Backend::File(PathBuf::from("mochiko.db"))
        );
    }

    #[test]
    fn four_slashes_keep_an_absolute_path_absolute() {
        assert_eq!(
            parse_database_url("sqlite:////var/lib/mochiko.db").unwrap(),
            Backend::File(PathBuf::from("/var/lib/mochiko.db"))
        );
        // Three slashes name a relative path, per the separator convention.
        assert_eq!(
            parse_database_url("sqlite:///mochiko.db").unwrap(),
            Backend::File(PathBuf::from("mochiko.db"))
        );
    }

    #[test]
    fn rejects_non_sqlite_scheme() {
        assert!(matches!(
            parse_database_url("postgresql://host/db"),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn memory_pool_shares_one_database() {
        let pool = ConnectionPool::open_in_memory().unwrap();
        {
            let session = pool.session().unwrap();
            session
                .execute_batch("CREATE TABLE probe (n INTEGER); INSERT INTO probe VALUES (7);")
                .unwrap();
        }
        let session = pool.session().unwrap();
        let n: i64 = session
            .query_row("SELECT n FROM probe", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 7);
    }

    #[test]
    fn file_pool_survives_sequential_sessions() {
        let dir = tempfile::tempdir().unwrap();
        // tempdir paths are absolute, so the URL needs the extra separator
        // slash: sqlite:////tmp/....
        let url = format!("sqlite:///{}", dir.path().join("t.db").display());
        let pool = ConnectionPool::open(&url).unwrap();
        {
            let session = pool.session().unwrap();
            session
                .execute_batch("CREATE TABLE probe (n INTEGER); INSERT INTO probe VALUES (1);")
                .unwrap();
        }
        let session = pool.session().unwrap();
        let count: i64 = session
            .query_row("SELECT COUNT(*) FROM probe", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
