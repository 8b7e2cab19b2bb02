//! Conversion of every failure into the documented `{ "error": … }` responses.

use analytics_core::Error as UpstreamError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, info, warn};

pub const HOTJAR_FAILURE: &str = "Failed to fetch data from Hotjar API.";
pub const META_FAILURE: &str = "Failed to fetch data from Facebook Marketing API.";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing credentials or identifiers; the message is safe to show.
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// A third-party call failed. Only `public` reaches the client.
    #[error("{public}")]
    Upstream {
        public: &'static str,
        #[source]
        source: UpstreamError,
    },

    /// Storage or other internal failure. Only `public` reaches the client.
    #[error("{public}")]
    Internal {
        public: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    /// Wrap an upstream client error, answering with `public` for anything
    /// that is not a configuration or validation problem.
    pub fn upstream(public: &'static str, err: UpstreamError) -> Self {
        match err {
            UpstreamError::Config(msg) => ApiError::Config(msg),
            UpstreamError::Validation(msg) => ApiError::Validation(msg),
            source => ApiError::Upstream { public, source },
        }
    }

    pub fn internal(public: &'static str, source: anyhow::Error) -> Self {
        ApiError::Internal { public, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Config(_) | ApiError::Upstream { .. } | ApiError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn log(&self) {
        match self {
            ApiError::Config(msg) => error!(kind = "config", error = %msg, "request rejected: missing configuration"),
            ApiError::Validation(msg) => info!(kind = "validation", error = %msg, "invalid request"),
            ApiError::NotFound(msg) => info!(kind = "not_found", error = %msg, "resource not found"),
            ApiError::Upstream { source, .. } => match source {
                UpstreamError::Forbidden { service, detail } => warn!(
                    kind = "forbidden",
                    service = %service,
                    detail = %detail,
                    hint = "the API credential is probably missing a read scope",
                    "upstream denied access"
                ),
                UpstreamError::Auth { service, detail } => {
                    error!(kind = "auth", service = %service, detail = %detail, "upstream authentication failed")
                }
                other => error!(kind = "upstream", error = %other, "upstream request failed"),
            },
            ApiError::Internal { source, .. } => {
                error!(kind = "internal", error = %format!("{source:#}"), "internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analytics_core::Service;

    #[test]
    fn upstream_details_stay_private() {
        let err = ApiError::upstream(
            HOTJAR_FAILURE,
            UpstreamError::Forbidden {
                service: Service::Recordings,
                detail: "token abc lacks recordings:read".into(),
            },
        );
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), HOTJAR_FAILURE);
    }

    #[test]
    fn config_and_validation_pass_through() {
        let cfg = ApiError::upstream(META_FAILURE, UpstreamError::Config("not configured".into()));
        assert!(matches!(cfg, ApiError::Config(ref m) if m == "not configured"));
        assert_eq!(cfg.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bad = ApiError::upstream(META_FAILURE, UpstreamError::Validation("bad period".into()));
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn forbidden_and_network_failures_differ_only_internally() {
        let forbidden = ApiError::upstream(
            HOTJAR_FAILURE,
            UpstreamError::Forbidden {
                service: Service::Recordings,
                detail: String::new(),
            },
        );
        let network = ApiError::upstream(
            HOTJAR_FAILURE,
            UpstreamError::upstream(Service::Recordings, None, "connection reset"),
        );

        assert_eq!(forbidden.status(), network.status());
        assert_eq!(forbidden.to_string(), network.to_string());
        assert!(matches!(
            forbidden,
            ApiError::Upstream { source: UpstreamError::Forbidden { .. }, .. }
        ));
        assert!(matches!(
            network,
            ApiError::Upstream { source: UpstreamError::Upstream { .. }, .. }
        ));
    }
}
