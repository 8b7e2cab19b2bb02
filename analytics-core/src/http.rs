//! Shared reqwest plumbing: bounded timeouts and retry for idempotent GETs.

use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result, Service};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the HTTP client every upstream call goes through.
///
/// The timeout covers the whole request, so no call can hang indefinitely.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .user_agent(concat!("campaign-dashboard/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))
}

/// Bounded exponential backoff for idempotent GET requests.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Send a GET, repeating it on timeouts, connection errors and 5xx answers.
    ///
    /// Returns the last response as-is once retries are exhausted, so callers
    /// still see the upstream status and body.
    pub async fn send(
        &self,
        service: Service,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let mut attempt = 0;
        loop {
            let Some(this_try) = request.try_clone() else {
                // Streaming bodies cannot be cloned; fall back to a single shot.
                return request.send().await.map_err(|e| Error::transport(service, &e));
            };

            match this_try.send().await {
                Ok(resp) if resp.status().is_server_error() && attempt < self.max_retries => {
                    warn!(
                        service = %service,
                        status = resp.status().as_u16(),
                        attempt,
                        "upstream returned server error, retrying"
                    );
                }
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    let err = Error::transport(service, &e);
                    if !(is_retryable(&e) && attempt < self.max_retries) {
                        return Err(err);
                    }
                    warn!(service = %service, error = %e, attempt, "upstream request failed, retrying");
                }
            }

            tokio::time::sleep(self.delay_for(attempt)).await;
            attempt += 1;
        }
    }
}

/// Transport failures worth repeating. Builder errors (bad URL, bad header)
/// fail the same way every time.
fn is_retryable(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

/// Read a response body for diagnostics, truncated so logs stay readable.
pub(crate) async fn body_snippet(resp: reqwest::Response) -> String {
    const MAX: usize = 2048;
    match resp.text().await {
        Ok(mut text) => {
            if text.len() > MAX {
                let mut cut = MAX;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
                text.push('…');
            }
            text
        }
        Err(e) => format!("<unreadable body: {e}>"),
    }
}
