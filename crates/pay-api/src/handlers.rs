//! # Request Handlers
//!
//! Axum request handlers for the payment API. The webhook and
//! browser-return handlers are thin: they decode the form body into a
//! `NotificationPayload` (the only place request data enters the
//! system) and translate the reconciliation outcome into the gateway's
//! acknowledgement contract.

use crate::state::AppState;
use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    Json,
};
use pay_core::{Currency, Order, OrderStore, PaymentError, Price, ValidationError};
use pay_gateway::{
    NotificationPayload, RedirectRequestBuilder, RejectAck, ReconcileOutcome,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info, instrument};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Create checkout request
#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Order total in major units (e.g. "100.00")
    pub amount: String,
    /// ISO 4217 currency code
    pub currency: String,
    /// Customer email (optional, prefilled on the payment page)
    #[serde(default)]
    pub customer_email: Option<String>,
}

/// Create checkout response: the form the storefront posts to the
/// gateway's hosted payment page
#[derive(Debug, Serialize)]
pub struct CreateCheckoutResponse {
    /// Our order ID
    pub order_id: String,
    /// Gateway endpoint to post to
    pub checkout_url: String,
    /// Signed form fields
    pub fields: std::collections::BTreeMap<String, String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
        }
    }
}

fn payment_error_to_response(err: PaymentError) -> (StatusCode, Json<ErrorResponse>) {
    let code = err.status_code();
    let response = ErrorResponse::new(err.to_string(), code);
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "offsite-pay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Create an order and the signed redirect that opens its payment
/// session on the gateway's hosted page
#[instrument(skip(state, request), fields(amount = %request.amount, currency = %request.currency))]
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<Json<CreateCheckoutResponse>, (StatusCode, Json<ErrorResponse>)> {
    let currency = Currency::parse(&request.currency).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                format!("Unsupported currency: {}", request.currency),
                400,
            )),
        )
    })?;

    let total = Price::parse_major(&request.amount, currency).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                format!("Invalid amount: {}", request.amount),
                400,
            )),
        )
    })?;

    let mut order = Order::new(total);
    if let Some(email) = request.customer_email {
        order = order.with_email(email);
    }
    state
        .orders
        .save(&order)
        .await
        .map_err(payment_error_to_response)?;

    let redirect = RedirectRequestBuilder::new(
        state.engine.config(),
        state.config.response_url(),
        state.config.callback_url(),
    )
    .build(&order)
    .map_err(payment_error_to_response)?;

    info!(order_id = %order.id, total = %order.total.display(), "checkout created");

    Ok(Json(CreateCheckoutResponse {
        order_id: order.id,
        checkout_url: redirect.url,
        fields: redirect.fields,
    }))
}

/// Handle the asynchronous server-to-server notification.
///
/// Ack contract: the success token for an applied transition or an
/// idempotent redelivery, non-success when the gateway should
/// redeliver. A rejected payload never changes on redelivery, so
/// structural rejections may be acknowledged under
/// `RejectAck::AckNonRetryable` to stop the storm.
#[instrument(skip(state, params))]
pub async fn gateway_webhook(
    State(state): State<AppState>,
    Form(params): Form<HashMap<String, String>>,
) -> (StatusCode, String) {
    let payload = NotificationPayload::from_params(params);

    match state.engine.reconcile(&payload).await {
        Ok(outcome) if outcome.is_accepted() => (StatusCode::OK, "OK".to_string()),

        Ok(ReconcileOutcome::Rejected(reason)) => {
            let ack_anyway = matches!(reason, ValidationError::EmptyPayload)
                && state.engine.config().reject_ack == RejectAck::AckNonRetryable;
            if ack_anyway {
                (StatusCode::OK, "OK".to_string())
            } else {
                (StatusCode::BAD_REQUEST, reason.to_string())
            }
        }

        // is_accepted covers Applied and NoOp; this arm is unreachable
        // but the compiler cannot see through the guard
        Ok(_) => (StatusCode::OK, "OK".to_string()),

        Err(e) => {
            error!(payload = ?payload.raw(), error = %e, "webhook reconciliation failed");
            let status = if e.is_retryable() {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            };
            (status, e.to_string())
        }
    }
}

/// Handle the synchronous browser return from the payment page.
///
/// Runs the same reconciliation as the webhook (the two race; the
/// per-order lock serializes them) and renders a human-facing page.
#[instrument(skip(state, params))]
pub async fn gateway_return(
    State(state): State<AppState>,
    Form(params): Form<HashMap<String, String>>,
) -> Html<String> {
    let payload = NotificationPayload::from_params(params);
    let order_id = payload
        .order_reference()
        .map(|r| r.order_id)
        .unwrap_or_else(|| "unknown".to_string());

    match state.engine.reconcile(&payload).await {
        Ok(outcome) if outcome.is_accepted() => success_page(&order_id),
        Ok(_) => failure_page("Invalid transaction. Please try again."),
        Err(e) => {
            error!(payload = ?payload.raw(), error = %e, "return reconciliation failed");
            failure_page("Your payment could not be confirmed. Please contact us.")
        }
    }
}

fn success_page(order_id: &str) -> Html<String> {
    Html(format!(
        r#"
<!DOCTYPE html>
<html>
<head><title>Payment Successful</title></head>
<body style="font-family: system-ui; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: linear-gradient(135deg, #1a1a2e 0%, #16213e 100%);">
    <div style="background: white; padding: 60px; border-radius: 16px; text-align: center;">
        <div style="font-size: 60px;">&#9989;</div>
        <h1>Payment Successful!</h1>
        <p>Order: <code>{}</code></p>
        <p style="color: #666;">Your payment was processed successfully.</p>
    </div>
</body>
</html>
"#,
        order_id
    ))
}

fn failure_page(message: &str) -> Html<String> {
    Html(format!(
        r#"
<!DOCTYPE html>
<html>
<head><title>Payment Not Completed</title></head>
<body style="font-family: system-ui; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: linear-gradient(135deg, #1a1a2e 0%, #16213e 100%);">
    <div style="background: white; padding: 60px; border-radius: 16px; text-align: center;">
        <div style="font-size: 60px;">&#10060;</div>
        <h1>Payment Not Completed</h1>
        <p style="color: #666;">{}</p>
    </div>
</body>
</html>
"#,
        message
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::create_router;
    use crate::state::AppConfig;
    use axum_test::TestServer;
    use pay_core::OrderStatus;
    use pay_gateway::{signature, GatewayConfig};
    use std::collections::BTreeMap;

    const SECRET: &str = "testkey";

    fn test_config() -> AppConfig {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            base_url: "http://localhost:8080".to_string(),
            environment: "test".to_string(),
        }
    }

    async fn test_state() -> AppState {
        let state = AppState::with_gateway(test_config(), GatewayConfig::new("M1", SECRET));
        state
            .orders
            .insert(Order::with_id(
                "42",
                Price::from_minor(10000, Currency::EUR),
            ))
            .await;
        state
    }

    fn signed_form(overrides: &[(&str, &str)]) -> BTreeMap<String, String> {
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

        let digest = signature::sign(&params, SECRET);
        params.insert("signature".to_string(), digest);
        params
    }

    #[tokio::test]
    async fn test_health() {
        let server = TestServer::new(create_router(test_state().await)).unwrap();
        let response = server.get("/health").await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn test_webhook_accepts_signed_notification() {
        let state = test_state().await;
        let server = TestServer::new(create_router(state.clone())).unwrap();

        let response = server
            .post("/webhook/gateway")
            .form(&signed_form(&[]))
            .await;

        response.assert_status_ok();
        assert_eq!(response.text(), "OK");

        let order = state.orders.load("42").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_webhook_redelivery_still_acknowledged() {
        let server = TestServer::new(create_router(test_state().await)).unwrap();
        let form = signed_form(&[]);

        server.post("/webhook/gateway").form(&form).await;
        let response = server.post("/webhook/gateway").form(&form).await;

        response.assert_status_ok();
        assert_eq!(response.text(), "OK");
    }

    #[tokio::test]
    async fn test_webhook_rejects_tampered_payload() {
        let state = test_state().await;
        let server = TestServer::new(create_router(state.clone())).unwrap();

        let mut form = signed_form(&[]);
        form.insert("amount".to_string(), "10000".to_string());
        form.insert("currency".to_string(), "USD".to_string());

        let response = server.post("/webhook/gateway").form(&form).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        // Order untouched
        let order = state.orders.load("42").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_checkout_returns_signed_fields() {
        let state = test_state().await;
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server
            .post("/api/v1/checkout")
            .json(&serde_json::json!({
                "amount": "100.00",
                "currency": "EUR",
                "customer_email": "buyer@example.com"
            }))
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["fields"]["amount"], "10000");
        assert_eq!(body["fields"]["currency"], "EUR");
        assert!(body["fields"]["signature"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_create_checkout_rejects_bad_amount() {
        let server = TestServer::new(create_router(test_state().await)).unwrap();

        let response = server
            .post("/api/v1/checkout")
            .json(&serde_json::json!({ "amount": "abc", "currency": "EUR" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}
