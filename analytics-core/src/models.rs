//! Wire types for the upstream APIs and the reshaped records served to clients.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ------------------------------------------------------------------ //
//  Upstream: Meta insights                                            //
// ------------------------------------------------------------------ //

/// A numeric field as the insights API sends it: usually a decimal string,
/// occasionally a JSON number, sometimes something else entirely.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl Numeric {
    /// Finite float value, or `None` when the field cannot be read as a number.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            Numeric::Number(n) => *n,
            Numeric::Text(s) => s.trim().parse::<f64>().ok()?,
            Numeric::Other(_) => return None,
        };
        v.is_finite().then_some(v)
    }

    /// Non-negative whole count (fractions truncated), or `None`.
    pub fn as_count(&self) -> Option<u64> {
        let v = self.as_f64()?;
        (v >= 0.0).then(|| v.trunc() as u64)
    }
}

impl From<&str> for Numeric {
    fn from(s: &str) -> Self {
        Numeric::Text(s.to_string())
    }
}

/// One `{action_type, value}` entry of `actions` or `purchase_roas`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ActionValue {
    #[serde(default, deserialize_with = "lenient_string_or_empty")]
    pub action_type: String,
    #[serde(default)]
    pub value: Option<Numeric>,
}

impl ActionValue {
    pub fn new(action_type: &str, value: impl Into<Numeric>) -> Self {
        Self {
            action_type: action_type.to_string(),
            value: Some(value.into()),
        }
    }
}

// Upstream rows are read field by field: a malformed field degrades to
// "absent" instead of rejecting the row (or the page it arrived on).

fn text(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(text(Value::deserialize(d)?))
}

fn lenient_string_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(text(Value::deserialize(d)?).unwrap_or_default())
}

/// Keep the array entries that parse as `T`; anything that is not an array is `None`.
fn lenient_list<T: DeserializeOwned>(value: Value) -> Option<Vec<T>> {
    match value {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        ),
        _ => None,
    }
}

fn lenient_actions<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<ActionValue>>, D::Error> {
    Ok(lenient_list(Value::deserialize(d)?))
}

fn lenient_rows<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<RawInsight>, D::Error> {
    Ok(lenient_list(Value::deserialize(d)?).unwrap_or_default())
}

/// One row of an insights response: a (date, campaign) pair at campaign
/// level, or a single rollup at account level.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawInsight {
    #[serde(default, deserialize_with = "lenient_string")]
    pub date_start: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date_stop: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub campaign_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub campaign_name: Option<String>,

    pub spend: Option<Numeric>,
    pub impressions: Option<Numeric>,
    pub clicks: Option<Numeric>,
    pub ctr: Option<Numeric>,
    pub cpc: Option<Numeric>,
    pub cpm: Option<Numeric>,
    pub reach: Option<Numeric>,
    pub frequency: Option<Numeric>,

    #[serde(default, deserialize_with = "lenient_actions")]
    pub actions: Option<Vec<ActionValue>>,
    #[serde(default, deserialize_with = "lenient_actions")]
    pub purchase_roas: Option<Vec<ActionValue>>,
}

/// `GET /act_<id>/insights` response body.
#[derive(Debug, Deserialize)]
pub(crate) struct InsightsPage {
    #[serde(default, deserialize_with = "lenient_rows")]
    pub data: Vec<RawInsight>,
    pub paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Paging {
    pub next: Option<String>,
}

/// Graph API error envelope: `{"error": {"message": ..., "type": ..., "code": ...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct GraphErrorBody {
    pub error: GraphError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphError {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub code: Option<i64>,
}

// ------------------------------------------------------------------ //
//  Upstream: Hotjar recordings                                        //
// ------------------------------------------------------------------ //

/// A session recording. Only a handful of fields are interpreted; everything
/// else the API returns is passed through untouched.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Recording {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Recordings list envelope. v1 nests items under `data`, the older v2
/// endpoint used `recordings`.
#[derive(Debug, Deserialize)]
pub(crate) struct RecordingsPage {
    #[serde(default, alias = "recordings")]
    pub data: Vec<Recording>,
}

/// `POST /v1/oauth/token` success body.
#[derive(Debug, Deserialize)]
pub(crate) struct OAuthTokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

// ------------------------------------------------------------------ //
//  Outbound (to dashboard clients)                                    //
// ------------------------------------------------------------------ //

/// Conversion counts pulled out of an `actions` list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCounters {
    pub lpv: u64,
    pub searches: u64,
    pub atc: u64,
    pub ic: u64,
    pub add_payment_info: u64,
    pub purchases: u64,
}

/// Stage-to-stage conversion rates, in percent.
///
/// The payment-info stages are only present for the five-stage funnel;
/// `ic_to_purchase_rate` is always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelMetrics {
    pub lpv_to_search_rate: f64,
    pub search_to_atc_rate: f64,
    pub atc_to_ic_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ic_to_api_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_to_purchase_rate: Option<f64>,
    pub ic_to_purchase_rate: f64,
}

/// A raw insight row after metrics derivation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightRecord {
    pub date: Option<String>,
    pub campaign_id: Option<String>,
    pub campaign_name: String,
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub ctr: f64,
    pub cpc: f64,
    pub cpm: f64,
    pub reach: u64,
    pub frequency: f64,
    pub roas: f64,
    pub revenue: f64,
    pub cost_per_purchase: f64,
    #[serde(flatten)]
    pub counters: ActionCounters,
    #[serde(flatten)]
    pub funnel: FunnelMetrics,
}

/// Static description of the property an account-level summary is reported for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyProfile {
    pub name: String,
    pub location: String,
}

impl Default for PropertyProfile {
    fn default() -> Self {
        Self {
            name: "Home Place Suites".to_string(),
            location: "Bartlesville".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelSummary {
    pub name: String,
    pub location: String,
    pub cpa: f64,
    pub ctr: f64,
    pub reach: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<InsightRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub total_revenue: f64,
    pub hotels: Vec<HotelSummary>,
}
