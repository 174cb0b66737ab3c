//! # Notification Validator
//!
//! Decides whether an inbound payload may be trusted and matches the
//! order it claims to settle. Pure function, no side effects; callers
//! own the audit logging of rejected attempts.

use crate::config::GatewayConfig;
use crate::payload::NotificationPayload;
use crate::signature;
use pay_core::{Order, ValidationError};

/// Validate an inbound notification against a known order.
///
/// Checks run in a fixed order and short-circuit on first failure.
/// The order matters for diagnosability, not security:
///
/// 1. payload non-empty
/// 2. merchant id equality
/// 3. currency equality
/// 4. amount equality (minor units, exact integer comparison)
/// 5. signature over the payload minus the signature metadata
///
/// Missing fields read as mismatches, never as panics.
pub fn validate(
    payload: &NotificationPayload,
    order: &Order,
    config: &GatewayConfig,
) -> Result<(), ValidationError> {
    if payload.is_empty() {
        return Err(ValidationError::EmptyPayload);
    }

    if payload.merchant_id() != Some(config.merchant_id.as_str()) {
        return Err(ValidationError::MerchantMismatch);
    }

    if payload.currency() != Some(order.total.currency) {
        return Err(ValidationError::CurrencyMismatch);
    }

    // The gateway reports minor units; the order total already is
    if payload.amount_minor() != Some(order.total.amount) {
        return Err(ValidationError::AmountMismatch);
    }

    let Some(expected) = payload.signature() else {
        return Err(ValidationError::SignatureMismatch);
    };
    if !signature::verify(&payload.signed_params(), &config.secret_key, expected) {
        return Err(ValidationError::SignatureMismatch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::sign;
    use pay_core::{Currency, Price};
    use std::collections::BTreeMap;

    const SECRET: &str = "testkey";

    fn order() -> Order {
        Order::with_id("42", Price::from_minor(10000, Currency::EUR))
    }

    fn config() -> GatewayConfig {
        GatewayConfig::new("M1", SECRET)
    }

    fn signed_payload(overrides: &[(&str, &str)]) -> NotificationPayload {
        let mut params: BTreeMap<String, String> = [
            ("merchant_id", "M1"),
            ("order_id", "42#1700000000"),
            ("amount", "10000"),
            ("currency", "EUR"),
            ("order_status", "approved"),
            ("payment_id", "P1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        for (k, v) in overrides {
            params.insert(k.to_string(), v.to_string());
        }

        let digest = sign(&params, SECRET);
        params.insert("signature".to_string(), digest);
        NotificationPayload::from_params(params)
    }

    #[test]
    fn test_valid_payload_passes() {
        assert!(validate(&signed_payload(&[]), &order(), &config()).is_ok());
    }

    #[test]
    fn test_empty_payload() {
        let p = NotificationPayload::from_params(std::iter::empty::<(String, String)>());
        assert_eq!(
            validate(&p, &order(), &config()),
            Err(ValidationError::EmptyPayload)
        );
    }

    #[test]
    fn test_merchant_mismatch() {
        let p = signed_payload(&[("merchant_id", "M2")]);
        assert_eq!(
            validate(&p, &order(), &config()),
            Err(ValidationError::MerchantMismatch)
        );
    }

    #[test]
    fn test_currency_mismatch() {
        let p = signed_payload(&[("currency", "USD")]);
        assert_eq!(
            validate(&p, &order(), &config()),
            Err(ValidationError::CurrencyMismatch)
        );
    }

    #[test]
    fn test_amount_mismatch() {
        let p = signed_payload(&[("amount", "9999")]);
        assert_eq!(
            validate(&p, &order(), &config()),
            Err(ValidationError::AmountMismatch)
        );
    }

    #[test]
    fn test_tampered_signature() {
        // Signed correctly, then a field altered afterwards
        let mut params = signed_payload(&[]).raw().clone();
        params.insert("payment_id".to_string(), "P2".to_string());
        let p = NotificationPayload::from_params(params);

        assert_eq!(
            validate(&p, &order(), &config()),
            Err(ValidationError::SignatureMismatch)
        );
    }

    #[test]
    fn test_missing_signature_field() {
        let mut params = signed_payload(&[]).raw().clone();
        params.remove("signature");
        let p = NotificationPayload::from_params(params);

        assert_eq!(
            validate(&p, &order(), &config()),
            Err(ValidationError::SignatureMismatch)
        );
    }

    #[test]
    fn test_response_signature_string_ignored_for_signing() {
        // Gateways attach the canonical string for debugging; it must
        // not take part in verification
        let mut params = signed_payload(&[]).raw().clone();
        params.insert(
            "response_signature_string".to_string(),
            "testkey|10000|EUR".to_string(),
        );
        let p = NotificationPayload::from_params(params);

        assert!(validate(&p, &order(), &config()).is_ok());
    }
}
