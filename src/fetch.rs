// ── Retry Fetcher ──────────────────────────────────────────────────────────
// Outbound HTTP with bounded retry and a status-aware policy:
//
//   connect/transport failure or 5xx  — sleep delay × attempt, retry
//   429                               — sleep delay × attempt × 2, retry
//   any other 4xx                     — give up immediately (client error)
//
// A user agent is rotated per attempt and one warm client is kept for
// connection reuse; it is thread-safe for the GET-only usage here.

use log::{info, warn};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

use crate::atoms::constants::{FETCH_MAX_RETRIES, FETCH_RETRY_DELAY_SECS, FETCH_TIMEOUT_SECS};

// ── User agents ────────────────────────────────────────────────────────────

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

// ── Status policy ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    RetryServer,
    RetryRateLimited,
    GiveUp,
}

fn classify_status(status: StatusCode) -> Outcome {
    if status.is_success() {
        Outcome::Success
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Outcome::RetryRateLimited
    } else if status.is_server_error() {
        Outcome::RetryServer
    } else if status.is_client_error() {
        Outcome::GiveUp
    } else {
        // Redirect loops and informational responses surface here after
        // reqwest's automatic redirect handling — treat as non-retryable.
        Outcome::GiveUp
    }
}

// ── Fetcher ────────────────────────────────────────────────────────────────

pub struct Fetcher {
    client: Client,
    max_retries: u32,
    delay: Duration,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new(FETCH_MAX_RETRIES, Duration::from_secs(FETCH_RETRY_DELAY_SECS))
    }
}

impl Fetcher {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .cookie_store(true)
            .build()
            .expect("Failed to build reqwest::Client");
        Self { client, max_retries, delay }
    }

    /// GET with the default per-attempt timeout.
    pub async fn fetch(&self, url: &str) -> Option<Response> {
        self.fetch_with_timeout(url, Duration::from_secs(FETCH_TIMEOUT_SECS))
            .await
    }

    /// GET with bounded retry. Returns the response on 2xx, `None` once the
    /// policy gives up.
    pub async fn fetch_with_timeout(&self, url: &str, timeout: Duration) -> Option<Response> {
        for attempt in 1..=self.max_retries {
            let ua = USER_AGENTS[(attempt as usize - 1) % USER_AGENTS.len()];
            let result = self
                .client
                .get(url)
                .header(reqwest::header::USER_AGENT, ua)
                .timeout(timeout)
                .send()
                .await;

            let backoff = match result {
                Ok(response) => match classify_status(response.status()) {
                    Outcome::Success => return Some(response),
                    Outcome::RetryServer => {
                        warn!(
                            "[fetch] {} returned {} (attempt {}/{})",
                            url,
                            response.status(),
                            attempt,
                            self.max_retries
                        );
                        self.delay * attempt
                    }
                    Outcome::RetryRateLimited => {
                        warn!(
                            "[fetch] {} rate limited (attempt {}/{})",
                            url, attempt, self.max_retries
                        );
                        self.delay * attempt * 2
                    }
                    Outcome::GiveUp => {
                        info!("[fetch] {} returned client error {} — not retrying", url, response.status());
                        return None;
                    }
                },
                Err(e) => {
                    warn!("[fetch] {} failed: {} (attempt {}/{})", url, e, attempt, self.max_retries);
                    self.delay * attempt
                }
            };

            if attempt < self.max_retries {
                tokio::time::sleep(backoff).await;
            }
        }
        warn!("[fetch] {} gave up after {} attempts", url, self.max_retries);
        None
    }

    /// Convenience: fetch and read the body as text.
    pub async fn fetch_text(&self, url: &str) -> Option<String> {
        let response = self.fetch(url).await?;
        response.text().await.ok()
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
// The full retry policy (429-then-200, permanent-404) is exercised against a
// local listener in tests/integration.rs; here only the pure classification.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(StatusCode::OK), Outcome::Success);
        assert_eq!(classify_status(StatusCode::CREATED), Outcome::Success);
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Outcome::RetryRateLimited
        );
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Outcome::RetryServer
        );
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), Outcome::RetryServer);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), Outcome::GiveUp);
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED), Outcome::GiveUp);
    }

    #[test]
    fn user_agent_rotation_wraps() {
        let first = USER_AGENTS[0];
        let wrapped = USER_AGENTS[(USER_AGENTS.len()) % USER_AGENTS.len()];
        assert_eq!(first, wrapped);
        assert!(USER_AGENTS.len() >= 2);
    }
}
