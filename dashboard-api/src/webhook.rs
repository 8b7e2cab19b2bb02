//! Conversion webhook payloads → push notification content.

use serde::Serialize;
use serde_json::Value;

/// Where the ads provider puts the conversion value in a change event.
const CONVERSION_VALUE_POINTER: &str = "/entry/0/changes/0/value/value";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

/// Build the "new conversion" notification, or `None` when the payload carries no value.
pub fn conversion_notification(payload: &Value) -> Option<Notification> {
    let value = match payload.pointer(CONVERSION_VALUE_POINTER)? {
        Value::Number(n) => n.to_string(),
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => return None,
    };

    Some(Notification {
        title: "New Conversion! 💸".to_string(),
        body: format!("Cha-ching! You just got a conversion worth ${value}!"),
    })
}
