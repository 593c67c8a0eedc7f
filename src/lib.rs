// Mochiko Core — durable state and encrypted backup backend.
//
// Layers, bottom-up:
//   atoms      — error enum, named constants
//   secrets    — file-drop → environment secret resolution
//   keys       — backup key validation (fail-fast at startup)
//   store      — SQLite pool, schema, entity repositories
//   cache      — process-local TTL cache
//   fetch      — outbound HTTP with bounded retry
//   scrape     — news / talent roster producers
//   backup     — encrypted snapshot export, commit, restore
//   workers    — detached background job pool
//   scheduler  — minute-tick calendar driving the periodic jobs
//   server     — admin HTTP surface

pub mod atoms;
pub mod backup;
pub mod cache;
pub mod fetch;
pub mod keys;
pub mod scheduler;
pub mod scrape;
pub mod secrets;
pub mod server;
pub mod store;
pub mod workers;

use log::{info, warn};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use atoms::error::CoreResult;
use backup::BackupConfig;
use cache::TtlCache;
use fetch::Fetcher;
use keys::BackupKey;
use secrets::SecretProvider;
use server::admin::AdminGate;
use store::{schema, ConnectionPool};
use workers::WorkerPool;

/// Everything the long-running services share. Built once at startup.
pub struct App {
    pub pool: Arc<ConnectionPool>,
    pub backup_key: BackupKey,
    pub backup_config: BackupConfig,
    pub fetcher: Arc<Fetcher>,
    pub news_cache: Arc<TtlCache<String>>,
    pub workers: Arc<WorkerPool>,
    /// The conversational AI upstream is configured. Absent means the
    /// durable core still runs; only reply generation is degraded.
    pub ai_available: bool,
    pub stop: Arc<AtomicBool>,
}

impl App {
    /// Resolve configuration, open the database, and start the worker pool.
    /// Fatal on a missing `DATABASE_URL` or an invalid backup key.
    pub fn bootstrap(secrets: &SecretProvider) -> CoreResult<Self> {
        let database_url = secrets.require("DATABASE_URL")?;
        let backup_key = BackupKey::load(secrets)?;

        let ai_available = secrets.resolve("GROQ_API_KEY").is_some();
        if !ai_available {
            warn!("[app] GROQ_API_KEY not set — running without reply generation");
        }

        let pool = Arc::new(ConnectionPool::open(&database_url)?);
        let session = pool.session()?;
        schema::run_migrations(&session)?;
        drop(session);
        info!("[app] Schema ready");

        let backup_dir = std::env::var("BACKUP_DIR").unwrap_or_else(|_| "backups".to_string());
        let repo_dir =
            std::env::var("BACKUP_REPO_DIR").unwrap_or_else(|_| "backup_repo".to_string());
        let backup_config = BackupConfig::new(backup_dir, repo_dir);

        Ok(Self {
            workers: Arc::new(WorkerPool::start_default(Arc::clone(&pool))),
            pool,
            backup_key,
            backup_config,
            fetcher: Arc::new(Fetcher::default()),
            news_cache: Arc::new(TtlCache::new()),
            ai_available,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Admin gate from `ADMIN_TOKEN` and the optional `ALLOWED_ADMIN_IPS`
    /// list, both resolved through the secret provider.
    pub fn admin_gate(secrets: &SecretProvider) -> AdminGate {
        let token = secrets.resolve("ADMIN_TOKEN");
        if token.is_none() {
            warn!("[app] ADMIN_TOKEN not set — /admin routes will answer 500");
        }
        let allowlist = secrets
            .resolve("ALLOWED_ADMIN_IPS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        AdminGate::new(token, allowlist)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_gate_reads_token_and_allowlist_from_the_provider() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ADMIN_TOKEN"), "sesame\n").unwrap();
        std::fs::write(dir.path().join("ALLOWED_ADMIN_IPS"), "10.0.0.1, 10.0.0.2\n").unwrap();
        let gate = App::admin_gate(&SecretProvider::new(dir.path()));

        let allowed: std::net::IpAddr = "10.0.0.2".parse().unwrap();
        assert!(gate
            .authorize(allowed, "GET /admin/backup_status HTTP/1.1\r\nAuthorization: Bearer sesame\r\n\r\n")
            .is_ok());

        let outsider: std::net::IpAddr = "192.168.1.9".parse().unwrap();
        let denial = gate
            .authorize(outsider, "GET /admin/backup_status HTTP/1.1\r\nAuthorization: Bearer sesame\r\n\r\n")
            .unwrap_err();
        assert_eq!(denial.status, 403);
    }

    #[test]
    fn admin_gate_without_token_denies_with_500() {
        let dir = tempfile::tempdir().unwrap();
        let gate = App::admin_gate(&SecretProvider::new(dir.path()));
        let peer: std::net::IpAddr = "127.0.0.1".parse().unwrap();
        let denial = gate
            .authorize(peer, "POST /admin/backup HTTP/1.1\r\nAuthorization: Bearer anything\r\n\r\n")
            .unwrap_err();
        assert_eq!(denial.status, 500);
    }
}
