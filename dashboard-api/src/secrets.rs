//! Bitwarden Secrets Manager client.
//!
//! Credentials for the upstream APIs are looked up in Bitwarden Secrets
//! Manager when `BWS_ACCESS_TOKEN` is set. The secret id for a setting named
//! `NAME` is read from `BWS_NAME_ID`. Without an access token, or when a
//! lookup fails, the plain environment variable `NAME` is used instead.

use std::time::Duration;

use analytics_core::http::{build_client, DEFAULT_TIMEOUT};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

/// Client for Bitwarden Secrets Manager.
pub struct SecretsClient {
    /// BWS machine-account access token.
    access_token: Option<String>,
    /// Base URL for the Bitwarden Secrets Manager API.
    api_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct BwsSecretResponse {
    value: String,
}

impl SecretsClient {
    /// Configure from `BWS_ACCESS_TOKEN` / `BWS_API_URL`.
    pub fn new() -> Result<Self> {
        Self::with_api(
            std::env::var("BWS_ACCESS_TOKEN").ok(),
            std::env::var("BWS_API_URL").unwrap_or_else(|_| "https://api.bitwarden.com".to_string()),
            DEFAULT_TIMEOUT,
        )
    }

    /// Every Bitwarden call is bounded by `timeout`; a stalled lookup falls
    /// back to the environment instead of blocking startup.
    pub fn with_api(access_token: Option<String>, api_url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            access_token,
            api_url,
            http: build_client(timeout).context("Failed to build Bitwarden HTTP client")?,
        })
    }

    /// Resolve the setting `name`, or `None` when it is set nowhere.
    ///
    /// Resolution order:
    /// 1. Bitwarden secret whose id is in `BWS_<name>_ID` (if `BWS_ACCESS_TOKEN` is set)
    /// 2. Plain environment variable `name`
    pub async fn lookup(&self, name: &str) -> Option<String> {
        let secret_id = std::env::var(format!("BWS_{name}_ID")).ok();
        match secret_id {
            Some(id) => self.get_secret(&id, name).await.ok(),
            None => std::env::var(name).ok(),
        }
    }

    /// Retrieve a secret by Bitwarden id, falling back to `env_fallback`.
    pub async fn get_secret(&self, secret_id: &str, env_fallback: &str) -> Result<String> {
        if let Some(token) = &self.access_token {
            match self.fetch_from_bitwarden(token, secret_id).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!(
                        secret_id,
                        error = %e,
                        "Failed to fetch secret from Bitwarden, falling back to env var"
                    );
                }
            }
        }

        std::env::var(env_fallback).with_context(|| {
            format!(
                "Secret '{secret_id}' not found in Bitwarden and env var '{env_fallback}' is not set"
            )
        })
    }

    async fn fetch_from_bitwarden(&self, token: &str, secret_id: &str) -> Result<String> {
        let url = format!("{}/secrets/{}", self.api_url.trim_end_matches('/'), secret_id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("HTTP request to Bitwarden Secrets Manager failed")?;

        if !resp.status().is_success() {
            return Err(anyhow!("Bitwarden API returned status {}", resp.status()));
        }

        let body: BwsSecretResponse = resp.json().await.context("Failed to parse Bitwarden response")?;
        Ok(body.value)
    }
}
