// ── Scheduler ──────────────────────────────────────────────────────────────
// One tokio task ticking once a minute. Each tick computes the jobs due for
// that UTC minute and runs them serially, in registration order; a failing
// job is logged and the tick continues. A minute guard stops a slow tick
// from double-firing the same slot.
//
// Calendar:
//   :00 every hour        — news refresh, then wiki scan
//   :00 every third hour  — specialised-site fan-out
//   18:00 UTC daily       — encrypted snapshot commit
//   02:00 UTC daily       — cleanup (history window trim, cache purge)
//
// The snapshot slot is registered before cleanup so a day's snapshot can
// never observe that day's trim.

use chrono::{DateTime, Timelike, Utc};
use log::{error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::atoms::constants::{
    CLEANUP_HOUR_UTC, NEWS_CACHE_TTL_SECS, SCHEDULER_TICK_SECS, SNAPSHOT_HOUR_UTC,
};
use crate::backup::{commit, BackupConfig};
use crate::cache::TtlCache;
use crate::fetch::Fetcher;
use crate::keys::BackupKey;
use crate::store::{history, news, ConnectionPool};
use crate::{atoms::error::CoreResult, scrape};

// ── Calendar ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    NewsRefresh,
    WikiScan,
    SpecializedRefresh,
    Snapshot,
    Cleanup,
}

/// Jobs due at `now`, in execution order.
pub fn due_jobs(now: DateTime<Utc>) -> Vec<JobKind> {
    let mut jobs = Vec::new();
    if now.minute() == 0 {
        jobs.push(JobKind::NewsRefresh);
        jobs.push(JobKind::WikiScan);
        if now.hour() % 3 == 0 {
            jobs.push(JobKind::SpecializedRefresh);
        }
        if now.hour() == SNAPSHOT_HOUR_UTC {
            jobs.push(JobKind::Snapshot);
        }
        if now.hour() == CLEANUP_HOUR_UTC {
            jobs.push(JobKind::Cleanup);
        }
    }
    jobs
}

// ── Runner ─────────────────────────────────────────────────────────────────

pub struct Scheduler {
    pub pool: Arc<ConnectionPool>,
    pub fetcher: Arc<Fetcher>,
    pub backup_key: BackupKey,
    pub backup_config: BackupConfig,
    pub news_cache: Arc<TtlCache<String>>,
}

impl Scheduler {
    /// Spawn the tick loop. Flipping `stop` ends it at the next tick.
    pub fn spawn(self, stop: Arc<AtomicBool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("[scheduler] Started (tick {}s)", SCHEDULER_TICK_SECS);
            let mut last_slot: Option<(u32, u32)> = None;
            let mut ticker = tokio::time::interval(Duration::from_secs(SCHEDULER_TICK_SECS));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            while !stop.load(Ordering::SeqCst) {
                ticker.tick().await;
                if stop.load(Ordering::SeqCst) {
                    break;
                }

                let now = Utc::now();
                let slot = (now.hour(), now.minute());
                if last_slot == Some(slot) {
                    continue;
                }
                last_slot = Some(slot);

                for job in due_jobs(now) {
                    if let Err(e) = self.run_job(job).await {
                        error!("[scheduler] Job {:?} failed: {}", job, e);
                    }
                }
            }
            info!("[scheduler] Stopped");
        })
    }

    async fn run_job(&self, job: JobKind) -> CoreResult<()> {
        match job {
            JobKind::NewsRefresh => {
                scrape::refresh_hololive_news(&self.fetcher, &self.pool).await?;
            }
            JobKind::WikiScan => {
                scrape::scan_wiki(&self.fetcher, &self.pool).await?;
            }
            JobKind::SpecializedRefresh => {
                let inserted = scrape::refresh_all_specialized(&self.fetcher, &self.pool).await;
                info!("[scheduler] Specialised refresh inserted {} article(s)", inserted);
            }
            JobKind::Snapshot => {
                commit::commit_snapshot(&self.pool, &self.backup_key, &self.backup_config).await?;
            }
            JobKind::Cleanup => {
                let trimmed = history::trim_to_window(&self.pool)?;
                let purged = news::cache_purge_expired(&self.pool, NEWS_CACHE_TTL_SECS as i64)?;
                let dropped = self.news_cache.purge_expired();
                info!(
                    "[scheduler] Cleanup: {} history row(s) trimmed, {} binding(s) purged, {} cache entr(ies) dropped",
                    trimmed, purged, dropped
                );
            }
        }
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 27, hour, minute, 0).unwrap()
    }

    #[test]
    fn nothing_fires_off_the_hour() {
        assert!(due_jobs(at(10, 30)).is_empty());
        assert!(due_jobs(at(18, 1)).is_empty());
    }

    #[test]
    fn hourly_slot_runs_news_then_wiki() {
        let jobs = due_jobs(at(10, 0));
        assert_eq!(jobs, vec![JobKind::NewsRefresh, JobKind::WikiScan]);
    }

    #[test]
    fn every_third_hour_adds_specialized() {
        let jobs = due_jobs(at(9, 0));
        assert_eq!(
            jobs,
            vec![JobKind::NewsRefresh, JobKind::WikiScan, JobKind::SpecializedRefresh]
        );
        assert!(!due_jobs(at(10, 0)).contains(&JobKind::SpecializedRefresh));
    }

    #[test]
    fn snapshot_fires_at_1800_utc() {
        let jobs = due_jobs(at(18, 0));
        assert!(jobs.contains(&JobKind::Snapshot));
        // 18 % 3 == 0: the specialised refresh shares the slot and is
        // ordered before the snapshot.
        let spec = jobs.iter().position(|j| *j == JobKind::SpecializedRefresh).unwrap();
        let snap = jobs.iter().position(|j| *j == JobKind::Snapshot).unwrap();
        assert!(spec < snap);
        assert!(!due_jobs(at(17, 0)).contains(&JobKind::Snapshot));
    }

    #[test]
    fn cleanup_fires_at_0200_utc() {
        assert!(due_jobs(at(2, 0)).contains(&JobKind::Cleanup));
        assert!(!due_jobs(at(3, 0)).contains(&JobKind::Cleanup));
    }

    #[test]
    fn snapshot_is_never_ordered_after_cleanup() {
        // The two dailies live in different slots, but if the calendar ever
        // collapses them the ordering must hold.
        for hour in 0..24 {
            let jobs = due_jobs(at(hour, 0));
            let snap = jobs.iter().position(|j| *j == JobKind::Snapshot);
            let cleanup = jobs.iter().position(|j| *j == JobKind::Cleanup);
            if let (Some(snap), Some(cleanup)) = (snap, cleanup) {
                assert!(snap < cleanup);
            }
        }
    }
}
