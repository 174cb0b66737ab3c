//! # Redirect Request Builder
//!
//! Builds the outbound signed form that opens a payment session on the
//! gateway's hosted page. The browser posts these fields; the gateway
//! echoes most of them back through the return and webhook paths, so
//! the field naming must line up with [`crate::payload`].

use crate::config::GatewayConfig;
use crate::payload::SessionOrderReference;
use crate::signature;
use pay_core::{Order, PaymentResult};
use serde::Serialize;
use std::collections::BTreeMap;

/// A ready-to-post checkout redirect
#[derive(Debug, Clone, Serialize)]
pub struct RedirectRequest {
    /// Gateway endpoint the form posts to
    pub url: String,
    /// Signed form fields
    pub fields: BTreeMap<String, String>,
}

/// Builder for the signed redirect payload
pub struct RedirectRequestBuilder<'a> {
    config: &'a GatewayConfig,
    response_url: String,
    callback_url: String,
    merchant_data: Option<serde_json::Value>,
}

impl<'a> RedirectRequestBuilder<'a> {
    pub fn new(
        config: &'a GatewayConfig,
        response_url: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        Self {
            config,
            response_url: response_url.into(),
            callback_url: callback_url.into(),
            merchant_data: None,
        }
    }

    /// Attach free-form merchant metadata (serialized as a JSON blob)
    pub fn with_merchant_data(mut self, data: serde_json::Value) -> Self {
        self.merchant_data = Some(data);
        self
    }

    /// Build the signed form for one order.
    ///
    /// The `order_id` field carries the composite reference with a
    /// fresh timestamp suffix, so a retried checkout for the same
    /// order is a distinct session on the gateway side.
    pub fn build(&self, order: &Order) -> PaymentResult<RedirectRequest> {
        let mut fields = BTreeMap::new();
        fields.insert(
            "merchant_id".to_string(),
            self.config.merchant_id.clone(),
        );
        fields.insert(
            "order_id".to_string(),
            SessionOrderReference::compose(&order.id),
        );
        fields.insert(
            "order_desc".to_string(),
            format!("Order #{}", order.id),
        );
        fields.insert("amount".to_string(), order.total.amount.to_string());
        fields.insert(
            "currency".to_string(),
            order.total.currency.as_str().to_string(),
        );
        fields.insert("response_url".to_string(), self.response_url.clone());
        fields.insert(
            "server_callback_url".to_string(),
            self.callback_url.clone(),
        );
        fields.insert("lang".to_string(), self.config.language.clone());
        fields.insert(
            "preauth".to_string(),
            self.config.capture_mode.preauth_flag().to_string(),
        );
        fields.insert(
            "sender_email".to_string(),
            order.customer_email.clone().unwrap_or_default(),
        );
        if let Some(ref data) = self.merchant_data {
            fields.insert(
                "merchant_data".to_string(),
                serde_json::to_string(data).map_err(|e| {
                    pay_core::PaymentError::Internal(format!(
                        "merchant_data serialization failed: {}",
                        e
                    ))
                })?,
            );
        }

        let digest = signature::sign(&fields, &self.config.secret_key);
        fields.insert("signature".to_string(), digest);

        Ok(RedirectRequest {
            url: self.config.checkout_url.clone(),
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureMode;
    use crate::payload::NotificationPayload;
    use pay_core::{Currency, Price};

    fn config() -> GatewayConfig {
        GatewayConfig::new("M1", "testkey")
    }

    fn order() -> Order {
        Order::with_id("42", Price::from_minor(10000, Currency::EUR))
            .with_email("buyer@example.com")
    }

    #[test]
    fn test_build_signs_fields() {
        let config = config();
        let builder = RedirectRequestBuilder::new(
            &config,
            "https://shop.example/checkout/return",
            "https://shop.example/webhook/gateway",
        );
        let request = builder.build(&order()).unwrap();

        assert_eq!(request.url, config.checkout_url);
        assert_eq!(request.fields.get("merchant_id").unwrap(), "M1");
        assert_eq!(request.fields.get("amount").unwrap(), "10000");
        assert_eq!(request.fields.get("currency").unwrap(), "EUR");
        assert_eq!(request.fields.get("preauth").unwrap(), "N");

        // Signature verifies over the fields minus the signature itself
        let payload = NotificationPayload::from_params(request.fields.clone());
        let expected = payload.signature().unwrap();
        assert!(signature::verify(
            &payload.signed_params(),
            "testkey",
            expected
        ));
    }

    #[test]
    fn test_order_reference_is_fresh_per_build() {
        let config = config();
        let builder = RedirectRequestBuilder::new(&config, "https://r", "https://c");
        let request = builder.build(&order()).unwrap();

        let reference = request.fields.get("order_id").unwrap();
        assert!(reference.starts_with("42#"));
    }

    #[test]
    fn test_preauth_flag_follows_capture_mode() {
        let config = config().with_capture_mode(CaptureMode::Preauth);
        let builder = RedirectRequestBuilder::new(&config, "https://r", "https://c");
        let request = builder.build(&order()).unwrap();

        assert_eq!(request.fields.get("preauth").unwrap(), "Y");
    }

    #[test]
    fn test_merchant_data_blob() {
        let config = config();
        let builder = RedirectRequestBuilder::new(&config, "https://r", "https://c")
            .with_merchant_data(serde_json::json!({ "subscriber_id": "c77" }));
        let request = builder.build(&order()).unwrap();

        let blob = request.fields.get("merchant_data").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(blob).unwrap();
        assert_eq!(parsed["subscriber_id"], "c77");
    }
}
