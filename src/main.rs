// Mochiko backend entrypoint: bootstrap, seed, run, drain.

use log::{error, info, warn};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use mochiko_core::atoms::constants::VOICE_DIR;
use mochiko_core::atoms::error::{CoreError, CoreResult};
use mochiko_core::scheduler::Scheduler;
use mochiko_core::secrets::SecretProvider;
use mochiko_core::server::{AdminServer, AdminState};
use mochiko_core::store::wiki;
use mochiko_core::{scrape, App};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        error!("[main] Fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> CoreResult<()> {
    let secrets = SecretProvider::default();
    let app = Arc::new(App::bootstrap(&secrets)?);

    ensure_voice_dir(std::path::Path::new(VOICE_DIR))?;
    seed_wiki_if_empty(&app);

    // Scheduler
    let scheduler = Scheduler {
        pool: Arc::clone(&app.pool),
        fetcher: Arc::clone(&app.fetcher),
        backup_key: app.backup_key.clone(),
        backup_config: app.backup_config.clone(),
        news_cache: Arc::clone(&app.news_cache),
    };
    let scheduler_handle = scheduler.spawn(Arc::clone(&app.stop));

    // Admin HTTP surface
    let bind_address =
        std::env::var("MOCHIKO_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("MOCHIKO_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000u16);
    let state = Arc::new(AdminState {
        pool: Arc::clone(&app.pool),
        backup_key: app.backup_key.clone(),
        backup_config: app.backup_config.clone(),
        gate: App::admin_gate(&secrets),
        ai_available: app.ai_available,
    });
    let server = AdminServer::bind(&bind_address, port, state).await?;
    let server_handle = tokio::spawn(server.serve(Arc::clone(&app.stop)));

    info!("[main] Running — Ctrl-C or SIGTERM to stop");
    wait_for_shutdown_signal().await;

    // Drain: stop the periodic work first, then the queue, then the pool.
    info!("[main] Shutting down");
    app.stop.store(true, Ordering::SeqCst);
    scheduler_handle.await.ok();
    app.workers.shutdown().await;
    server_handle.await.ok();
    info!("[main] Bye");
    Ok(())
}

/// The TTS path writes synthesized audio here. The directory must exist and
/// accept writes before anything else starts; proving that with a scratch
/// file now beats failing on the first synthesis request later.
fn ensure_voice_dir(dir: &std::path::Path) -> CoreResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| {
        CoreError::config(format!("Voice dir {} cannot be created: {}", dir.display(), e))
    })?;
    let scratch = dir.join(".write_check");
    std::fs::write(&scratch, b"ok").map_err(|e| {
        CoreError::config(format!("Voice dir {} is not writable: {}", dir.display(), e))
    })?;
    std::fs::remove_file(&scratch).ok();
    Ok(())
}

/// First boot on a fresh database: fill the talent catalogue in the
/// background so the API is not held up by a slow scrape.
fn seed_wiki_if_empty(app: &Arc<App>) {
    match wiki::member_count(&app.pool) {
        Ok(0) => {
            let pool = Arc::clone(&app.pool);
            let fetcher = Arc::clone(&app.fetcher);
            let submitted = app.workers.submit(
                "wiki_seed",
                "system",
                "initial talent catalogue scan",
                Box::pin(async move {
                    let seen = scrape::scan_wiki(&fetcher, &pool).await?;
                    Ok(format!("{} members", seen))
                }),
            );
            match submitted {
                Ok(task_id) => info!("[main] Wiki catalogue empty — seeding (task {})", task_id),
                Err(e) => warn!("[main] Could not queue wiki seed: {}", e),
            }
        }
        Ok(_) => {}
        Err(e) => warn!("[main] Wiki count check failed: {}", e),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────


async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                warn!("[main] SIGTERM handler unavailable: {}", e);
                tokio::signal::ctrl_c().await.ok();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("[main] SIGINT received"),
            _ = term.recv() => info!("[main] SIGTERM received"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
        info!("[main] Ctrl-C received");
    }
}
