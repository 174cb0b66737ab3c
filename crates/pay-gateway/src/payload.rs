//! # Notification Payload
//!
//! The single payload-extraction boundary. The HTTP edge decodes the
//! form body into plain key/value pairs and hands them here; nothing
//! below this type ever reaches into request state. Raw parameters are
//! kept verbatim for signing and audit logging, typed accessors are
//! defensive: a missing or malformed field is `None`, never a panic.

use pay_core::Currency;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Separator between order id and attempt timestamp in `order_id`
pub const ORDER_SEPARATOR: char = '#';

/// Payload keys that describe the signature rather than signed content
const SIGNATURE_KEYS: [&str; 2] = ["signature", "response_signature_string"];

/// Raw gateway order status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    Approved,
    Processing,
    Declined,
    Expired,
    Reversed,
    /// Unrecognized status (passthrough, kept for audit)
    Unknown(String),
}

impl GatewayStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => GatewayStatus::Approved,
            "processing" => GatewayStatus::Processing,
            "declined" => GatewayStatus::Declined,
            "expired" => GatewayStatus::Expired,
            "reversed" => GatewayStatus::Reversed,
            other => GatewayStatus::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GatewayStatus::Approved => "approved",
            GatewayStatus::Processing => "processing",
            GatewayStatus::Declined => "declined",
            GatewayStatus::Expired => "expired",
            GatewayStatus::Reversed => "reversed",
            GatewayStatus::Unknown(s) => s,
        }
    }
}

/// The composite order reference echoed back by the gateway.
///
/// Sent as `<orderId>#<unix-timestamp>` so retried checkout sessions
/// for the same order stay unique on the gateway side. Parsing splits
/// on the first separator and discards the suffix; records are keyed
/// on `(order_id, remote_id)` to make up for the lost attempt
/// disambiguation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOrderReference {
    /// The true order identifier
    pub order_id: String,
    /// The reference exactly as received
    pub raw: String,
}

impl SessionOrderReference {
    /// Compose an outbound reference for a fresh checkout attempt
    pub fn compose(order_id: &str) -> String {
        format!(
            "{}{}{}",
            order_id,
            ORDER_SEPARATOR,
            chrono::Utc::now().timestamp()
        )
    }

    /// Parse an inbound reference, splitting on the first separator
    pub fn parse(raw: &str) -> Self {
        let order_id = raw
            .split_once(ORDER_SEPARATOR)
            .map(|(id, _)| id)
            .unwrap_or(raw);
        Self {
            order_id: order_id.to_string(),
            raw: raw.to_string(),
        }
    }
}

/// Capture metadata nested in the `additional_info` JSON blob
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdditionalInfo {
    /// Capture status reported by the gateway (`hold`, `captured`)
    pub capture_status: Option<String>,
    /// Captured amount, major units, as the gateway sent it
    pub capture_amount: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAdditionalInfo {
    #[serde(default)]
    capture_status: Option<String>,
    #[serde(default)]
    capture_amount: Option<serde_json::Value>,
}

impl AdditionalInfo {
    fn from_json(json: &str) -> Option<Self> {
        let raw: RawAdditionalInfo = serde_json::from_str(json).ok()?;
        let capture_amount = raw.capture_amount.and_then(|v| match v {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        Some(Self {
            capture_status: raw.capture_status.filter(|s| !s.is_empty()),
            capture_amount: capture_amount.filter(|s| !s.is_empty()),
        })
    }
}

/// An inbound signed status report, webhook or browser-return.
///
/// Ephemeral: lives for one verification + reconciliation call and is
/// never persisted as-is.
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    params: BTreeMap<String, String>,
}

impl NotificationPayload {
    /// Build from decoded form parameters
    pub fn from_params<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Raw parameter lookup; empty values read as absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }

    pub fn merchant_id(&self) -> Option<&str> {
        self.get("merchant_id")
    }

    pub fn payment_id(&self) -> Option<&str> {
        self.get("payment_id")
    }

    pub fn signature(&self) -> Option<&str> {
        self.get("signature")
    }

    pub fn order_reference(&self) -> Option<SessionOrderReference> {
        self.get("order_id").map(SessionOrderReference::parse)
    }

    /// Amount in minor units (the gateway scales by 100)
    pub fn amount_minor(&self) -> Option<i64> {
        self.get("amount")?.parse().ok()
    }

    /// Reversal amount in minor units, when present
    pub fn reversal_amount_minor(&self) -> Option<i64> {
        self.get("reversal_amount")?.parse().ok()
    }

    pub fn currency(&self) -> Option<Currency> {
        Currency::parse(self.get("currency")?)
    }

    pub fn order_status(&self) -> Option<GatewayStatus> {
        self.get("order_status").map(GatewayStatus::parse)
    }

    /// Parsed capture metadata; `None` when absent or undecodable
    pub fn additional_info(&self) -> Option<AdditionalInfo> {
        AdditionalInfo::from_json(self.get("additional_info")?)
    }

    /// Non-empty capture status, when any was reported
    pub fn capture_status(&self) -> Option<String> {
        self.additional_info()?.capture_status
    }

    /// Signed content: every parameter except the signature metadata
    pub fn signed_params(&self) -> BTreeMap<String, String> {
        self.params
            .iter()
            .filter(|(k, _)| !SIGNATURE_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// The payload verbatim, for audit logging of rejections
    pub fn raw(&self) -> &BTreeMap<String, String> {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(pairs: &[(&str, &str)]) -> NotificationPayload {
        NotificationPayload::from_params(pairs.iter().copied())
    }

    #[test]
    fn test_order_reference_split_on_first_separator() {
        let reference = SessionOrderReference::parse("42#1700000000");
        assert_eq!(reference.order_id, "42");
        assert_eq!(reference.raw, "42#1700000000");

        // Only the first separator matters
        let reference = SessionOrderReference::parse("42#17#extra");
        assert_eq!(reference.order_id, "42");

        // No separator: the whole value is the order id
        let reference = SessionOrderReference::parse("42");
        assert_eq!(reference.order_id, "42");
    }

    #[test]
    fn test_compose_appends_timestamp() {
        let raw = SessionOrderReference::compose("42");
        assert!(raw.starts_with("42#"));
        assert_eq!(SessionOrderReference::parse(&raw).order_id, "42");
    }

    #[test]
    fn test_typed_accessors() {
        let p = payload(&[
            ("merchant_id", "M1"),
            ("order_id", "42#1700000000"),
            ("amount", "10000"),
            ("currency", "EUR"),
            ("order_status", "approved"),
            ("payment_id", "P1"),
            ("signature", "deadbeef"),
        ]);

        assert_eq!(p.merchant_id(), Some("M1"));
        assert_eq!(p.amount_minor(), Some(10000));
        assert_eq!(p.currency(), Some(Currency::EUR));
        assert_eq!(p.order_status(), Some(GatewayStatus::Approved));
        assert_eq!(p.order_reference().unwrap().order_id, "42");
    }

    #[test]
    fn test_missing_fields_are_none() {
        let p = payload(&[("amount", "not_a_number"), ("currency", "ZZZ")]);
        assert!(p.amount_minor().is_none());
        assert!(p.currency().is_none());
        assert!(p.merchant_id().is_none());
        assert!(p.order_status().is_none());
    }

    #[test]
    fn test_unknown_status_passthrough() {
        let p = payload(&[("order_status", "created")]);
        assert_eq!(
            p.order_status(),
            Some(GatewayStatus::Unknown("created".to_string()))
        );
    }

    #[test]
    fn test_signed_params_strip_signature_metadata() {
        let p = payload(&[
            ("amount", "10000"),
            ("signature", "deadbeef"),
            ("response_signature_string", "secret|10000"),
        ]);

        let signed = p.signed_params();
        assert_eq!(signed.len(), 1);
        assert!(signed.contains_key("amount"));
    }

    #[test]
    fn test_additional_info_parsing() {
        let p = payload(&[(
            "additional_info",
            r#"{"capture_status":"captured","capture_amount":"60.00"}"#,
        )]);
        let info = p.additional_info().unwrap();
        assert_eq!(info.capture_status.as_deref(), Some("captured"));
        assert_eq!(info.capture_amount.as_deref(), Some("60.00"));

        // Numeric capture_amount is accepted too
        let p = payload(&[("additional_info", r#"{"capture_amount":60}"#)]);
        assert_eq!(
            p.additional_info().unwrap().capture_amount.as_deref(),
            Some("60")
        );

        // Undecodable blob reads as absent metadata
        let p = payload(&[("additional_info", "not json")]);
        assert!(p.additional_info().is_none());
    }

    #[test]
    fn test_empty_values_read_as_absent() {
        let p = payload(&[("reversal_amount", ""), ("merchant_id", "M1")]);
        assert!(p.reversal_amount_minor().is_none());
        assert_eq!(p.merchant_id(), Some("M1"));
    }
}
