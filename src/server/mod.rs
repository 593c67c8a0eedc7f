// ── Admin HTTP Surface ─────────────────────────────────────────────────────
// A small hand-rolled HTTP listener for operator actions. Accepts with a 1 s
// timeout so the stop flag is observed promptly; each connection is one
// request, answered and closed.
//
// Routes:
//   GET  /health               — liveness, ungated
//   POST /admin/backup         — snapshot now, returns the metadata document
//   POST /admin/restore        — restore from the latest artifact
//   GET  /admin/backup_status  — metadata of the last local artifact

pub mod admin;

use log::{info, warn};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::atoms::error::{CoreError, CoreResult};
use crate::backup::{commit, restore, BackupConfig};
use crate::keys::BackupKey;
use crate::store::ConnectionPool;
use admin::AdminGate;

const MAX_REQUEST_BYTES: usize = 16 * 1024;

pub struct AdminState {
    pub pool: Arc<ConnectionPool>,
    pub backup_key: BackupKey,
    pub backup_config: BackupConfig,
    pub gate: AdminGate,
    /// Reported by /health; the durable core runs either way.
    pub ai_available: bool,
}

pub struct AdminServer {
    listener: TcpListener,
    state: Arc<AdminState>,
}

impl AdminServer {
    /// Bind the listener. Port 0 selects an ephemeral port.
    pub async fn bind(bind_address: &str, port: u16, state: Arc<AdminState>) -> CoreResult<Self> {
        let addr = format!("{}:{}", bind_address, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| CoreError::config(format!("Bind {} failed: {}", addr, e)))?;
        info!("[admin] Listening on http://{}", listener.local_addr()?);
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> CoreResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Returns once `stop` is flipped.
    pub async fn serve(self, stop: Arc<AtomicBool>) {
        loop {
            if stop.load(Ordering::Relaxed) {
                break;
            }

            // Accept with timeout so we can check the stop flag
            let accept = tokio::time::timeout(
                std::time::Duration::from_secs(1),
                self.listener.accept(),
            )
            .await;

            match accept {
                Ok(Ok((stream, peer))) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, state).await {
                            warn!("[admin] Connection error from {}: {}", peer, e);
                        }
                    });
                }
                Ok(Err(e)) => warn!("[admin] Accept error: {}", e),
                Err(_) => { /* timeout — loop to check stop flag */ }
            }
        }
        info!("[admin] Stopped");
    }
}

// ── Connection handling ────────────────────────────────────────────────────

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    state: Arc<AdminState>,
) -> CoreResult<()> {
    let mut buf = vec![0u8; MAX_REQUEST_BYTES];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Ok(());
    }
    buf.truncate(n);

    let head = String::from_utf8_lossy(&buf).into_owned();
    let first_line = head.lines().next().unwrap_or("");
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("");

    let (status, body) = route(&state, peer, &head, method, path).await;
    write_json(&mut stream, status, &body).await
}

async fn route(
    state: &AdminState,
    peer: SocketAddr,
    head: &str,
    method: &str,
    path: &str,
) -> (u16, Value) {
    if method == "GET" && path == "/health" {
        return (
            200,
            json!({
                "status": "ok",
                "services": {
                    "database": database_status(&state.pool),
                    "groq_ai": if state.ai_available { "available" } else { "unavailable" },
                },
            }),
        );
    }

    if path.starts_with("/admin/") {
        if let Err(denial) = state.gate.authorize(peer.ip(), head) {
            warn!("[admin] {} {} denied ({}) from {}", method, path, denial.status, peer);
            return (denial.status, json!({"status": "error", "message": denial.reason}));
        }
    }

    match (method, path) {
        ("POST", "/admin/backup") => {
            match commit::commit_snapshot(&state.pool, &state.backup_key, &state.backup_config)
                .await
            {
                Ok(metadata) => (200, json!({"status": "success", "metadata": metadata})),
                Err(e) => {
                    warn!("[admin] Backup failed: {}", e);
                    (500, json!({"status": "error", "message": e.to_string()}))
                }
            }
        }
        ("POST", "/admin/restore") => {
            match restore::restore_latest(&state.pool, &state.backup_key, &state.backup_config)
                .await
            {
                Ok(report) => (
                    200,
                    json!({
                        "status": "success",
                        "timestamp": report.timestamp,
                        "statistics": report.imported,
                    }),
                ),
                // Nothing to restore from is the operator's 404, not a crash.
                Err(CoreError::NotFound(message)) => {
                    warn!("[admin] Restore found no artifact: {}", message);
                    (404, json!({"status": "error", "message": message}))
                }
                Err(e) => {
                    warn!("[admin] Restore failed: {}", e);
                    (500, json!({"status": "error", "message": e.to_string()}))
                }
            }
        }
        ("GET", "/admin/backup_status") => match commit::read_local_metadata(&state.backup_config) {
            Ok(Some(metadata)) => (200, json!({"exists": true, "metadata": metadata})),
            Ok(None) => (404, json!({"exists": false})),
            Err(e) => (500, json!({"status": "error", "message": e.to_string()})),
        },
        _ => (404, json!({"status": "error", "message": "Not found"})),
    }
}

/// One `SELECT 1` against a checked-out session.
fn database_status(pool: &ConnectionPool) -> &'static str {
    let probe = pool.session().and_then(|session| {
        session
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(CoreError::from)
    });
    match probe {
        Ok(1) => "connected",
        _ => "error",
    }
}

async fn write_json(stream: &mut TcpStream, status: u16, body: &Value) -> CoreResult<()> {
    let reason = match status {
        200 => "OK",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        _ => "Internal Server Error",
    };
    let payload = body.to_string();
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        payload.len(),
        payload
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await.ok();
    Ok(())
}
