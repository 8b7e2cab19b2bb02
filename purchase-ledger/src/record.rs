//! Purchase records and validation of inbound purchase webhooks.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A purchase as stored in the ledger and returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRecord {
    pub amount: f64,
    pub order_id: String,
    /// Caller-supplied purchase time, kept verbatim.
    pub timestamp: String,
    pub campaign_name: String,
    /// When this service accepted the record.
    pub received: DateTime<Utc>,
}

/// Body of `POST /api/purchases`. `amount` may be a JSON number or a numeric
/// string; the text fields accept numbers too, since webhook senders map them
/// from whatever their source system holds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPurchase {
    pub amount: Option<serde_json::Value>,
    pub order_id: Option<serde_json::Value>,
    pub timestamp: Option<serde_json::Value>,
    pub campaign_name: Option<serde_json::Value>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing \"amount\" field.")]
    MissingAmount,
    #[error("Invalid \"amount\" field. Must be a valid number.")]
    InvalidAmount,
}

/// Scalar as text; blank strings, null, arrays and objects count as unset.
fn non_empty(value: Option<serde_json::Value>) -> Option<String> {
    use serde_json::Value;

    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_amount(value: Option<&serde_json::Value>) -> Result<f64, ValidationError> {
    use serde_json::Value;

    let amount = match value {
        None | Some(Value::Null) => return Err(ValidationError::MissingAmount),
        Some(Value::String(s)) if s.trim().is_empty() => return Err(ValidationError::MissingAmount),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    amount
        .filter(|a| a.is_finite())
        .ok_or(ValidationError::InvalidAmount)
}

impl NewPurchase {
    /// Validate and fill defaults, stamping the record as received at `now`.
    pub fn into_record(self, now: DateTime<Utc>) -> Result<PurchaseRecord, ValidationError> {
        let amount = parse_amount(self.amount.as_ref())?;

        Ok(PurchaseRecord {
            amount,
            order_id: non_empty(self.order_id)
                .unwrap_or_else(|| format!("order_{}", Uuid::new_v4().simple())),
            timestamp: non_empty(self.timestamp)
                .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true)),
            campaign_name: non_empty(self.campaign_name).unwrap_or_else(|| "Unknown".to_string()),
            received: now,
        })
    }
}

/// Sum of all amounts.
pub fn total_revenue(records: &[PurchaseRecord]) -> f64 {
    records.iter().map(|r| r.amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    fn parse(body: serde_json::Value) -> Result<PurchaseRecord, ValidationError> {
        serde_json::from_value::<NewPurchase>(body).unwrap().into_record(now())
    }

    #[test]
    fn numeric_string_amount_is_accepted() {
        let rec = parse(json!({"amount": "129.99", "orderId": "A-1"})).unwrap();
        assert_eq!(rec.amount, 129.99);
        assert_eq!(rec.order_id, "A-1");
    }

    #[test]
    fn defaults_are_filled() {
        let rec = parse(json!({"amount": 50})).unwrap();
        assert!(rec.order_id.starts_with("order_"));
        assert_eq!(rec.timestamp, "2024-05-01T09:30:00.000Z");
        assert_eq!(rec.campaign_name, "Unknown");
        assert_eq!(rec.received, now());
    }

    #[test]
    fn generated_order_ids_are_unique() {
        let a = parse(json!({"amount": 1})).unwrap();
        let b = parse(json!({"amount": 1})).unwrap();
        assert_ne!(a.order_id, b.order_id);
    }

    #[test]
    fn missing_amount() {
        assert_eq!(parse(json!({})), Err(ValidationError::MissingAmount));
        assert_eq!(parse(json!({"amount": null})), Err(ValidationError::MissingAmount));
        assert_eq!(parse(json!({"amount": " "})), Err(ValidationError::MissingAmount));
    }

    #[test]
    fn invalid_amount() {
        assert_eq!(parse(json!({"amount": "abc"})), Err(ValidationError::InvalidAmount));
        assert_eq!(parse(json!({"amount": [1]})), Err(ValidationError::InvalidAmount));
        assert_eq!(parse(json!({"amount": "NaN"})), Err(ValidationError::InvalidAmount));
    }

    #[test]
    fn numeric_text_fields_are_kept_as_strings() {
        let body = json!({"amount": 10, "orderId": 12345, "campaignName": 7, "timestamp": 1714555800});
        let new: NewPurchase = serde_json::from_value(body).unwrap();
        let rec = new.into_record(now()).unwrap();
        assert_eq!(rec.order_id, "12345");
        assert_eq!(rec.campaign_name, "7");
        assert_eq!(rec.timestamp, "1714555800");
    }

    #[test]
    fn structured_text_fields_fall_back_to_defaults() {
        let rec = parse(json!({"amount": 1, "orderId": {"id": 1}, "campaignName": null})).unwrap();
        assert!(rec.order_id.starts_with("order_"));
        assert_eq!(rec.campaign_name, "Unknown");
    }

    #[test]
    fn zero_is_a_valid_amount() {
        assert_eq!(parse(json!({"amount": 0})).unwrap().amount, 0.0);
    }

    #[test]
    fn wire_format_is_camel_case() {
        let rec = parse(json!({"amount": 10, "orderId": "X", "campaignName": "OKC"})).unwrap();
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["orderId"], "X");
        assert_eq!(v["campaignName"], "OKC");
        assert!(v.get("received").is_some());
    }

    #[test]
    fn revenue_sums_amounts() {
        let a = parse(json!({"amount": 10.5})).unwrap();
        let b = parse(json!({"amount": "4.5"})).unwrap();
        assert_eq!(total_revenue(&[a, b]), 15.0);
        assert_eq!(total_revenue(&[]), 0.0);
    }
}
