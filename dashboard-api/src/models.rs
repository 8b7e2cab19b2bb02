//! HTTP request/response models for the dashboard's public REST API.

use purchase_ledger::PurchaseRecord;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------ //
//  Inbound (query strings)                                            //
// ------------------------------------------------------------------ //

/// Query for `GET /api/recordings`.
#[derive(Debug, Default, Deserialize)]
pub struct RecordingsParams {
    pub limit: Option<u32>,
}

/// Query for `GET /api/insights`.
#[derive(Debug, Default, Deserialize)]
pub struct InsightsParams {
    pub period: Option<String>,
}

/// Query for `GET /api/data` and `GET /api/account-summary`.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryParams {
    pub period: Option<String>,
    /// Only the literal `true` turns per-campaign details on.
    pub details: Option<String>,
}

impl SummaryParams {
    pub fn with_details(&self) -> bool {
        self.details.as_deref() == Some("true")
    }
}

/// Query for `DELETE /api/purchases`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePurchaseParams {
    /// An order id, or `all` to clear the ledger.
    pub order_id: Option<String>,
}

// ------------------------------------------------------------------ //
//  Outbound                                                           //
// ------------------------------------------------------------------ //

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasesResponse {
    pub success: bool,
    pub total_revenue: f64,
    pub purchases: Vec<PurchaseRecord>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct PurchaseCreated {
    pub success: bool,
    pub message: &'static str,
    pub data: PurchaseRecord,
}

#[derive(Debug, Serialize)]
pub struct PurchaseDeleted {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    pub public_key: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
