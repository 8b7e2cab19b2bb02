//! Axum HTTP handlers for the dashboard API.

use std::sync::Arc;

use analytics_core::insights::DatePreset;
use analytics_core::models::{AccountSummary, InsightRecord, Recording};
use analytics_core::recordings::DEFAULT_LIMIT;
use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use purchase_ledger::{total_revenue, NewPurchase};
use tracing::{info, warn};

use crate::{
    error::{ApiError, HOTJAR_FAILURE, META_FAILURE},
    models::{
        DeletePurchaseParams, HealthResponse, InsightsParams, MessageResponse, PublicKeyResponse,
        PurchaseCreated, PurchaseDeleted, PurchasesResponse, RecordingsParams, SummaryParams,
    },
    subscriptions::PushSubscription,
    webhook::conversion_notification,
    AppState,
};

type ApiResult<T> = Result<T, ApiError>;

fn configured<T>(client: &Result<T, String>) -> ApiResult<&T> {
    client.as_ref().map_err(|reason| ApiError::Config(reason.clone()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    params
        .map(|Query(p)| p)
        .map_err(|e| ApiError::Validation(e.body_text()))
}

fn parse_period(period: Option<&str>, default: &str) -> ApiResult<DatePreset> {
    DatePreset::from_period(period.unwrap_or(default))
        .map_err(|e| ApiError::upstream(META_FAILURE, e))
}

// ------------------------------------------------------------------ //
//  GET /health                                                        //
// ------------------------------------------------------------------ //

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// ------------------------------------------------------------------ //
//  Upstream analytics                                                 //
// ------------------------------------------------------------------ //

pub async fn recordings(
    State(state): State<Arc<AppState>>,
    params: Result<Query<RecordingsParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Recording>>> {
    let params = query(params)?;
    let client = configured(&state.recordings)?;

    let recordings = client
        .fetch_recordings(params.limit.unwrap_or(DEFAULT_LIMIT))
        .await
        .map_err(|e| ApiError::upstream(HOTJAR_FAILURE, e))?;

    info!(count = recordings.len(), "GET /api/recordings");
    Ok(Json(recordings))
}

pub async fn insights(
    State(state): State<Arc<AppState>>,
    params: Result<Query<InsightsParams>, QueryRejection>,
) -> ApiResult<Json<Vec<InsightRecord>>> {
    let params = query(params)?;
    let preset = parse_period(params.period.as_deref(), "week")?;
    let client = configured(&state.insights)?;

    let records = client
        .campaign_insights(preset)
        .await
        .map_err(|e| ApiError::upstream(META_FAILURE, e))?;

    info!(rows = records.len(), preset = preset.as_graph_param(), "GET /api/insights");
    Ok(Json(records))
}

/// Serves both `/api/data` and `/api/account-summary`.
pub async fn account_summary(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SummaryParams>, QueryRejection>,
) -> ApiResult<Json<AccountSummary>> {
    let params = query(params)?;
    let preset = parse_period(params.period.as_deref(), "today")?;
    let client = configured(&state.insights)?;

    let summary = client
        .account_summary(preset, params.with_details())
        .await
        .map_err(|e| ApiError::upstream(META_FAILURE, e))?;

    Ok(Json(summary))
}

// ------------------------------------------------------------------ //
//  /api/purchases                                                     //
// ------------------------------------------------------------------ //

pub async fn list_purchases(State(state): State<Arc<AppState>>) -> ApiResult<Json<PurchasesResponse>> {
    let purchases = state
        .ledger
        .list()
        .await
        .map_err(|e| ApiError::internal("Failed to retrieve purchases.", e))?;

    Ok(Json(PurchasesResponse {
        success: true,
        total_revenue: total_revenue(&purchases),
        count: purchases.len(),
        purchases,
    }))
}

pub async fn create_purchase(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewPurchase>, JsonRejection>,
) -> ApiResult<Json<PurchaseCreated>> {
    let Json(new) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    let record = new
        .into_record(Utc::now())
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    state
        .ledger
        .append(record.clone())
        .await
        .map_err(|e| ApiError::internal("Failed to record purchase.", e))?;

    info!(
        order_id = %record.order_id,
        amount = record.amount,
        campaign = %record.campaign_name,
        "purchase recorded"
    );
    Ok(Json(PurchaseCreated {
        success: true,
        message: "Purchase recorded successfully",
        data: record,
    }))
}

pub async fn delete_purchase(
    State(state): State<Arc<AppState>>,
    params: Result<Query<DeletePurchaseParams>, QueryRejection>,
) -> ApiResult<Json<PurchaseDeleted>> {
    let order_id = query(params)?
        .order_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::Validation("Missing \"orderId\" query parameter.".to_string()))?;

    if order_id == "all" {
        state
            .ledger
            .clear()
            .await
            .map_err(|e| ApiError::internal("Failed to delete purchases.", e))?;
        info!("all purchases cleared");
        return Ok(Json(PurchaseDeleted {
            success: true,
            message: "All purchases cleared.".to_string(),
        }));
    }

    let removed = state
        .ledger
        .remove(&order_id)
        .await
        .map_err(|e| ApiError::internal("Failed to delete purchase.", e))?;
    if !removed {
        return Err(ApiError::NotFound(format!("Purchase \"{order_id}\" not found.")));
    }

    info!(order_id = %order_id, "purchase deleted");
    Ok(Json(PurchaseDeleted {
        success: true,
        message: format!("Purchase \"{order_id}\" deleted."),
    }))
}

// ------------------------------------------------------------------ //
//  Push notifications                                                 //
// ------------------------------------------------------------------ //

pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PushSubscription>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(subscription) = body.map_err(|e| ApiError::Validation(e.body_text()))?;
    subscription.validate().map_err(ApiError::Validation)?;

    let (key, is_new) = state.subscriptions.upsert(subscription).await;
    info!(key = %key, is_new, "push subscription stored");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Subscription received.",
        }),
    ))
}

pub async fn push_public_key(State(state): State<Arc<AppState>>) -> ApiResult<Json<PublicKeyResponse>> {
    let keys = state
        .vapid
        .as_ref()
        .ok_or_else(|| ApiError::Config("VAPID keys are not configured.".to_string()))?;
    Ok(Json(PublicKeyResponse {
        public_key: keys.public_key.clone(),
    }))
}

/// Always acknowledges, so the provider never retries a delivery.
pub async fn webhook(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(payload) => match conversion_notification(&payload) {
            Some(notification) => {
                let subscribers = state.subscriptions.len().await;
                info!(
                    title = %notification.title,
                    body = %notification.body,
                    subscribers = subscribers,
                    vapid_configured = state.vapid.is_some(),
                    "conversion notification prepared (push delivery not performed)"
                )
            }
            None => info!("webhook event carried no conversion value"),
        },
        Err(e) => warn!(error = %e, bytes = body.len(), "webhook body is not valid JSON"),
    }

    (StatusCode::OK, "EVENT_RECEIVED")
}
