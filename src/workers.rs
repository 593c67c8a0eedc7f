// ── Background Worker Pool ─────────────────────────────────────────────────
// A fixed set of detached workers draining one shared queue. Each accepted
// job already has a pending row in `background_tasks`; a worker flips it to
// running, drives the job future, and records done/failed with the result.
// Callers poll the task table — nothing is returned in-band.
//
// Shutdown closes the intake first (new submissions are refused), then the
// queue drains: every job already accepted still runs to completion before
// the workers exit.

use log::{info, warn};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::atoms::constants::WORKER_POOL_SIZE;
use crate::atoms::error::{CoreError, CoreResult};
use crate::store::{tasks, ConnectionPool};

/// A queued unit of work. The Ok value is stored as the task result.
pub type Job = Pin<Box<dyn Future<Output = CoreResult<String>> + Send + 'static>>;

struct QueuedJob {
    task_id: String,
    kind: String,
    job: Job,
}

pub struct WorkerPool {
    /// `None` once shutdown has begun — the channel closing is what lets
    /// workers exit after the backlog empties.
    tx: parking_lot::Mutex<Option<mpsc::UnboundedSender<QueuedJob>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    pool: Arc<ConnectionPool>,
}

impl WorkerPool {
    /// Spawn the worker set. `size` is normally [`WORKER_POOL_SIZE`].
    pub fn start(pool: Arc<ConnectionPool>, size: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<QueuedJob>();
        let rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(size);
        for worker_id in 0..size {
            let rx = Arc::clone(&rx);
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                loop {
                    // Single receiver shared by all workers; the lock is held
                    // only for the dequeue, never while a job runs.
                    let queued = { rx.lock().await.recv().await };
                    let Some(queued) = queued else { break };
                    run_one(&pool, worker_id, queued).await;
                }
            }));
        }

        info!("[workers] Started {} worker(s)", size);
        Self {
            tx: parking_lot::Mutex::new(Some(tx)),
            handles: Mutex::new(handles),
            pool,
        }
    }

    pub fn start_default(pool: Arc<ConnectionPool>) -> Self {
        Self::start(pool, WORKER_POOL_SIZE)
    }

    /// Record a pending task and queue its job. Returns the task id the
    /// caller polls. Refused once shutdown has begun.
    pub fn submit(&self, kind: &str, user_uuid: &str, query: &str, job: Job) -> CoreResult<String> {
        let tx = self.tx.lock();
        let Some(tx) = tx.as_ref() else {
            return Err(CoreError::Other("Worker pool is shutting down".to_string()));
        };
        let task_id = tasks::create(&self.pool, kind, user_uuid, query)?;
        let queued = QueuedJob {
            task_id: task_id.clone(),
            kind: kind.to_string(),
            job,
        };
        tx.send(queued)
            .map_err(|_| CoreError::Other("Worker pool is shutting down".to_string()))?;
        Ok(task_id)
    }

    /// Stop intake and wait for the queue to drain.
    pub async fn shutdown(&self) {
        drop(self.tx.lock().take());
        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!("[workers] Worker task panicked during drain: {}", e);
            }
        }
        info!("[workers] Drained and stopped");
    }
}

async fn run_one(pool: &Arc<ConnectionPool>, worker_id: usize, queued: QueuedJob) {
    if let Err(e) = tasks::mark_running(pool, &queued.task_id) {
        warn!("[workers] Could not mark task {} running: {}", queued.task_id, e);
    }
    match queued.job.await {
        Ok(result) => {
            if let Err(e) = tasks::complete(pool, &queued.task_id, &result) {
                warn!("[workers] Could not record result for {}: {}", queued.task_id, e);
            }
        }
        Err(e) => {
            let message = e.to_string();
            warn!(
                "[workers] Worker {} job '{}' ({}) failed: {}",
                worker_id, queued.kind, queued.task_id, message
            );
            if let Err(e) = tasks::fail(pool, &queued.task_id, &message) {
                warn!("[workers] Could not record failure for {}: {}", queued.task_id, e);
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::schema::schema_for_testing;
    use std::time::Duration;

    fn test_pool() -> Arc<ConnectionPool> {
        let pool = ConnectionPool::open_in_memory().unwrap();
        schema_for_testing(&pool.session().unwrap());
        Arc::new(pool)
    }

    async fn wait_for_status(pool: &Arc<ConnectionPool>, task_id: &str, status: &str) {
        for _ in 0..200 {
            if let Some(task) = tasks::get(pool, task_id).unwrap() {
                if task.status == status {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} never reached status {}", task_id, status);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn successful_job_is_recorded_done() {
        let pool = test_pool();
        let workers = WorkerPool::start(Arc::clone(&pool), 2);

        let task_id = workers
            .submit("search", "u1", "q", Box::pin(async { Ok("answer".to_string()) }))
            .unwrap();
        wait_for_status(&pool, &task_id, "done").await;

        assert_eq!(
            tasks::take_completed(&pool, &task_id).unwrap().as_deref(),
            Some("answer")
        );
        workers.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failing_job_is_recorded_failed() {
        let pool = test_pool();
        let workers = WorkerPool::start(Arc::clone(&pool), 2);

        let task_id = workers
            .submit(
                "search",
                "u1",
                "q",
                Box::pin(async { Err(CoreError::Other("boom".to_string())) }),
            )
            .unwrap();
        wait_for_status(&pool, &task_id, "failed").await;

        let task = tasks::get(&pool, &task_id).unwrap().unwrap();
        assert_eq!(task.result.as_deref(), Some("boom"));
        workers.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn shutdown_drains_accepted_jobs_and_refuses_new_ones() {
        let pool = test_pool();
        let workers = WorkerPool::start(Arc::clone(&pool), 1);

        let slow = workers
            .submit(
                "search",
                "u1",
                "slow",
                Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok("slow done".to_string())
                }),
            )
            .unwrap();

        workers.shutdown().await;

        // Accepted before shutdown — must have completed during the drain.
        let task = tasks::get(&pool, &slow).unwrap().unwrap();
        assert_eq!(task.status, "done");

        // Intake is closed now.
        let refused = workers.submit("search", "u1", "late", Box::pin(async { Ok(String::new()) }));
        assert!(refused.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_slow_job_does_not_block_other_workers() {
        let pool = test_pool();
        let workers = WorkerPool::start(Arc::clone(&pool), 2);

        let _slow = workers
            .submit(
                "search",
                "u1",
                "slow",
                Box::pin(async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Ok(String::new())
                }),
            )
            .unwrap();
        let fast = workers
            .submit("search", "u2", "fast", Box::pin(async { Ok("fast".to_string()) }))
            .unwrap();

        // The fast job finishes on the second worker well before the slow one.
        wait_for_status(&pool, &fast, "done").await;
    }
}
