// ── Backup: Durable Commit ─────────────────────────────────────────────────
// Persists ciphertext + metadata to disk and publishes both through git.
// Sequence (any failing step aborts the whole operation; partial artifacts
// may remain on disk but are never advertised via metadata):
//
//   1. export → metadata → encrypt
//   2. write artifacts to the backup dir
//   3. mirror both files into the git working tree
//   4. git: identity config, stage, commit (timestamped message), push
//
// "nothing to commit" counts as success — the previous push already holds
// this exact state. Every subprocess call is bounded by a 60 s wall clock.

use log::{info, warn};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

use super::{crypto, export, BackupConfig};
use crate::atoms::constants::{
    BACKUP_CIPHERTEXT_FILE, BACKUP_METADATA_FILE, GIT_STEP_TIMEOUT_SECS,
};
use crate::atoms::error::{CoreError, CoreResult};
use crate::keys::BackupKey;
use crate::store::ConnectionPool;

/// Run one git subcommand in the repo working tree under the step timeout.
pub(crate) async fn run_git(repo: &Path, args: &[&str]) -> CoreResult<std::process::Output> {
    let future = Command::new("git").arg("-C").arg(repo).args(args).output();
    match tokio::time::timeout(Duration::from_secs(GIT_STEP_TIMEOUT_SECS), future).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(CoreError::process(format!("git {}: {}", args.join(" "), e))),
        Err(_) => Err(CoreError::process(format!(
            "git {} timed out after {}s",
            args.join(" "),
            GIT_STEP_TIMEOUT_SECS
        ))),
    }
}

fn require_success(step: &str, output: &std::process::Output) -> CoreResult<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(CoreError::process(format!("git {} failed: {}", step, stderr.trim())))
}

/// Export, encrypt, write the artifact pair and publish it. Returns the
/// metadata document on success.
pub async fn commit_snapshot(
    pool: &ConnectionPool,
    key: &BackupKey,
    config: &BackupConfig,
) -> CoreResult<Value> {
    // 1. Export and seal
    let doc = export::export_snapshot(pool)?;
    let metadata = crypto::build_metadata(&doc);
    let ciphertext = crypto::encrypt(&doc, key)?;

    // 2. Local artifact pair
    std::fs::create_dir_all(&config.backup_dir)?;
    std::fs::write(config.ciphertext_path(), &ciphertext)?;
    std::fs::write(
        config.metadata_path(),
        serde_json::to_string_pretty(&metadata)?,
    )?;
    info!(
        "[backup] Wrote artifact pair ({} bytes ciphertext)",
        ciphertext.len()
    );

    // 3. Mirror into the working tree
    std::fs::create_dir_all(&config.repo_dir)?;
    std::fs::copy(config.ciphertext_path(), config.repo_ciphertext_path())?;
    std::fs::copy(config.metadata_path(), config.repo_metadata_path())?;

    // 4. Publish
    publish(config, metadata["timestamp"].as_str().unwrap_or("unknown")).await?;

    info!("[backup] Snapshot published, checksum {}", &metadata["checksum"]);
    Ok(metadata)
}

async fn publish(config: &BackupConfig, timestamp: &str) -> CoreResult<()> {
    let repo = &config.repo_dir;

    let identity_email = run_git(repo, &["config", "user.email", &config.git_email]).await?;
    require_success("config user.email", &identity_email)?;
    let identity_name = run_git(repo, &["config", "user.name", &config.git_name]).await?;
    require_success("config user.name", &identity_name)?;

    let add = run_git(repo, &["add", BACKUP_CIPHERTEXT_FILE, BACKUP_METADATA_FILE]).await?;
    require_success("add", &add)?;

    let message = format!("Database backup {}", timestamp);
    let commit = run_git(repo, &["commit", "-m", &message]).await?;
    if !commit.status.success() {
        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&commit.stdout),
            String::from_utf8_lossy(&commit.stderr)
        );
        if combined.contains("nothing to commit") {
            info!("[backup] Nothing to commit — artifact already current");
        } else {
            return Err(CoreError::process(format!(
                "git commit failed: {}",
                combined.trim()
            )));
        }
    }

    let push = run_git(repo, &["push"]).await?;
    if !push.status.success() {
        // Local artifacts stay in place for the next attempt.
        let stderr = String::from_utf8_lossy(&push.stderr);
        warn!("[backup] Push failed, artifact kept locally: {}", stderr.trim());
        return Err(CoreError::process(format!("git push failed: {}", stderr.trim())));
    }

    Ok(())
}

/// Read the companion metadata of the last written artifact, if any.
pub fn read_local_metadata(config: &BackupConfig) -> CoreResult<Option<Value>> {
    for path in [config.metadata_path(), config.repo_metadata_path()] {
        if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            return Ok(Some(serde_json::from_str(&raw)?));
        }
    }
    Ok(None)
}
