//! Hotjar session-recordings client.
//!
//! Authenticates with the client-credentials grant through a [`TokenCache`]
//! owned by the client, then lists the most recent recordings for one site.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{error, info, warn};

use crate::error::{Error, Result, Service};
use crate::http::{body_snippet, RetryPolicy};
use crate::models::{OAuthTokenResponse, Recording, RecordingsPage};
use crate::token_cache::{TokenCache, TokenGrant, TokenSource};

pub const DEFAULT_API_URL: &str = "https://api.hotjar.io";
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Logged whenever the recordings endpoint answers 403.
const SCOPE_HINT: &str =
    "Hotjar API returned 403 Forbidden; check that the API credential has the \"recordings:read\" scope enabled";

#[derive(Debug, Clone, Default)]
pub struct RecordingsSettings {
    pub api_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub site_id: Option<String>,
}

// ------------------------------------------------------------------ //
//  OAuth token source                                                 //
// ------------------------------------------------------------------ //

/// `POST {api}/v1/oauth/token` with a form-encoded client-credentials grant.
pub struct HotjarTokenSource {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl HotjarTokenSource {
    pub fn new(http: reqwest::Client, api_url: &str, client_id: String, client_secret: String) -> Self {
        Self {
            http,
            token_url: format!("{}/v1/oauth/token", api_url.trim_end_matches('/')),
            client_id,
            client_secret,
        }
    }
}

#[async_trait]
impl TokenSource for HotjarTokenSource {
    async fn request_token(&self) -> Result<TokenGrant> {
        info!("fetching new Hotjar access token");

        // Never retried: a rejected client stays rejected.
        let resp = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Hotjar token endpoint unreachable");
                Error::Auth {
                    service: Service::Recordings,
                    detail: e.to_string(),
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = body_snippet(resp).await;
            error!(status = status.as_u16(), body = %body, "Hotjar token request rejected");
            return Err(Error::Auth {
                service: Service::Recordings,
                detail: format!("token endpoint returned {status}"),
            });
        }

        let token: OAuthTokenResponse = resp.json().await.map_err(|e| Error::Auth {
            service: Service::Recordings,
            detail: format!("malformed token response: {e}"),
        })?;

        Ok(TokenGrant {
            access_token: token.access_token,
            expires_in: token.expires_in,
        })
    }
}

// ------------------------------------------------------------------ //
//  Recordings client                                                  //
// ------------------------------------------------------------------ //

pub struct RecordingsClient {
    http: reqwest::Client,
    retry: RetryPolicy,
    api_url: String,
    site_id: String,
    tokens: TokenCache,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RecordingsClient {
    /// Fails with [`Error::Config`] when the client id, secret or site id is unset.
    pub fn new(settings: RecordingsSettings, http: reqwest::Client, retry: RetryPolicy) -> Result<Self> {
        let (Some(client_id), Some(client_secret), Some(site_id)) = (
            required(settings.client_id),
            required(settings.client_secret),
            required(settings.site_id),
        ) else {
            return Err(Error::Config(
                "Hotjar credentials or Site ID are not configured.".to_string(),
            ));
        };

        let source = HotjarTokenSource::new(http.clone(), &settings.api_url, client_id, client_secret);
        Ok(Self::with_token_cache(
            http,
            retry,
            &settings.api_url,
            site_id,
            TokenCache::new(Arc::new(source)),
        ))
    }

    /// Build a client around an existing cache (alternate token sources, tests).
    pub fn with_token_cache(
        http: reqwest::Client,
        retry: RetryPolicy,
        api_url: &str,
        site_id: String,
        tokens: TokenCache,
    ) -> Self {
        Self {
            http,
            retry,
            api_url: api_url.trim_end_matches('/').to_string(),
            site_id,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    /// The `limit` most recent recordings (clamped to `1..=MAX_LIMIT`).
    pub async fn fetch_recordings(&self, limit: u32) -> Result<Vec<Recording>> {
        let limit = limit.clamp(1, MAX_LIMIT);
        let token = self.tokens.get_token().await?;

        let url = format!("{}/v1/sites/{}/recordings", self.api_url, self.site_id);
        let request = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("limit", limit)]);

        let resp = self
            .retry
            .send(Service::Recordings, request)
            .await
            .inspect_err(|e| error!(error = %e, "Hotjar recordings request failed"))?;

        let status = resp.status();
        match status {
            s if s.is_success() => {}
            StatusCode::FORBIDDEN => {
                let body = body_snippet(resp).await;
                warn!(site_id = %self.site_id, body = %body, "{SCOPE_HINT}");
                return Err(Error::Forbidden {
                    service: Service::Recordings,
                    detail: body,
                });
            }
            StatusCode::UNAUTHORIZED => {
                // The token was revoked or expired early; re-authenticate next time.
                self.tokens.invalidate().await;
                let body = body_snippet(resp).await;
                error!(body = %body, "Hotjar rejected the cached access token");
                return Err(Error::upstream(Service::Recordings, Some(401), body));
            }
            _ => {
                let body = body_snippet(resp).await;
                error!(status = status.as_u16(), body = %body, "Hotjar recordings request rejected");
                return Err(Error::upstream(Service::Recordings, Some(status.as_u16()), body));
            }
        }

        let page: RecordingsPage = resp
            .json()
            .await
            .map_err(|e| Error::upstream(Service::Recordings, Some(status.as_u16()), e.to_string()))?;

        info!(count = page.data.len(), limit, "recordings fetched");
        Ok(page.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{build_client, DEFAULT_TIMEOUT};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(api_url: String) -> RecordingsSettings {
        RecordingsSettings {
            api_url,
            client_id: Some("cid".into()),
            client_secret: Some("secret".into()),
            site_id: Some("777".into()),
        }
    }

    fn client(server: &MockServer) -> RecordingsClient {
        RecordingsClient::new(
            settings(server.uri()),
            build_client(DEFAULT_TIMEOUT).unwrap(),
            RetryPolicy::none(),
        )
        .unwrap()
    }

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/oauth/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=cid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "hj-token",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[test]
    fn missing_site_id_is_config_error() {
        let mut s = settings("http://unused".into());
        s.site_id = None;
        let err = RecordingsClient::new(s, reqwest::Client::new(), RetryPolicy::none())
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn lists_recordings_and_reuses_token() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v1/sites/777/recordings"))
            .and(query_param("limit", "10"))
            .and(header("authorization", "Bearer hj-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": 1, "duration": 30}, {"id": 2, "duration": 45}]
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(client.fetch_recordings(DEFAULT_LIMIT).await.unwrap().len(), 2);
        assert_eq!(client.fetch_recordings(DEFAULT_LIMIT).await.unwrap().len(), 2);
        // Mock expectations (one token call, two list calls) are verified on drop.
    }

    #[tokio::test]
    async fn forbidden_is_distinguished() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/v1/sites/777/recordings"))
            .respond_with(ResponseTemplate::new(403).set_body_string("missing scope"))
            .mount(&server)
            .await;

        let err = client(&server).fetch_recordings(5).await.unwrap_err();
        match err {
            Error::Forbidden { service, detail } => {
                assert_eq!(service, Service::Recordings);
                assert_eq!(detail, "missing scope");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn token_rejection_is_auth_error_and_skips_listing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_client"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server).fetch_recordings(10).await.unwrap_err();
        assert!(matches!(err, Error::Auth { .. }));
    }

    #[tokio::test]
    async fn unauthorized_listing_drops_cached_token() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client.fetch_recordings(10).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { status: Some(401), .. }));
        assert!(client.tokens().current().await.is_none());
    }

    #[tokio::test]
    async fn server_error_is_upstream_error() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client(&server).fetch_recordings(10).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { status: Some(502), .. }));
    }

    #[tokio::test]
    async fn limit_is_clamped() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("GET"))
            .and(query_param("limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"recordings": []})))
            .expect(1)
            .mount(&server)
            .await;

        assert!(client(&server).fetch_recordings(5000).await.unwrap().is_empty());
    }
}
