//! Campaign dashboard backend: HTTP API over the ads insights, session
//! recordings and purchase ledger.

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod secrets;
pub mod subscriptions;
pub mod webhook;

use std::sync::Arc;

use analytics_core::http::build_client;
use analytics_core::insights::InsightsClient;
use analytics_core::recordings::RecordingsClient;
use anyhow::Result;
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use purchase_ledger::PurchaseLedger;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{Settings, VapidKeys};
use crate::subscriptions::SubscriptionStore;

// ------------------------------------------------------------------ //
//  Shared application state                                           //
// ------------------------------------------------------------------ //

/// Shared state injected into every Axum handler via `State`.
pub struct AppState {
    /// Insights client, or the reason it could not be configured.
    pub insights: std::result::Result<InsightsClient, String>,
    /// Recordings client (owns its token cache), or the reason it could not be configured.
    pub recordings: std::result::Result<RecordingsClient, String>,
    pub ledger: Arc<dyn PurchaseLedger>,
    pub subscriptions: SubscriptionStore,
    pub vapid: Option<VapidKeys>,
}

fn config_message(err: analytics_core::Error) -> String {
    match err {
        analytics_core::Error::Config(msg) => msg,
        other => other.to_string(),
    }
}

impl AppState {
    /// Build the upstream clients from `settings`.
    ///
    /// Missing credentials disable the affected routes instead of failing startup.
    pub fn from_settings(settings: &Settings, ledger: Arc<dyn PurchaseLedger>) -> Result<Self> {
        let http = build_client(settings.upstream_timeout)?;

        let insights = InsightsClient::new(settings.insights.clone(), http.clone(), settings.retry)
            .map_err(config_message)
            .inspect_err(|reason| warn!(reason = %reason, "insights routes disabled"));
        let recordings = RecordingsClient::new(settings.recordings.clone(), http, settings.retry)
            .map_err(config_message)
            .inspect_err(|reason| warn!(reason = %reason, "recordings route disabled"));

        info!(
            insights = insights.is_ok(),
            recordings = recordings.is_ok(),
            push_keys = settings.vapid.is_some(),
            "application state ready"
        );

        Ok(Self {
            insights,
            recordings,
            ledger,
            subscriptions: SubscriptionStore::new(),
            vapid: settings.vapid.clone(),
        })
    }
}

// ------------------------------------------------------------------ //
//  Router                                                             //
// ------------------------------------------------------------------ //

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(handlers::health))
        // Upstream analytics
        .route("/api/recordings", get(handlers::recordings))
        .route("/api/insights", get(handlers::insights))
        .route("/api/data", get(handlers::account_summary))
        .route("/api/account-summary", get(handlers::account_summary))
        // Purchase ledger
        .route(
            "/api/purchases",
            get(handlers::list_purchases)
                .post(handlers::create_purchase)
                .delete(handlers::delete_purchase),
        )
        // Push notifications
        .route("/api/subscribe", post(handlers::subscribe))
        .route("/api/push/public-key", get(handlers::push_public_key))
        .route("/api/webhook", post(handlers::webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
