//! # Gateway Configuration
//!
//! Merchant credentials and integration policy for the hosted-checkout
//! gateway. Secrets load from environment variables, with a TOML file
//! fallback for deployments that configure through files.

use pay_core::PaymentError;
use serde::{Deserialize, Serialize};
use std::env;

/// Default hosted payment page endpoint
pub const DEFAULT_CHECKOUT_URL: &str = "https://pay.gateway.example/api/checkout/redirect/";

/// Initial-state policy for a first approved notification.
///
/// Integrations historically diverged here: some treat an approved
/// notification without capture metadata as settled money, others as a
/// pre-authorized hold awaiting capture. The policy is an explicit
/// configuration choice, selected at integration setup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Approved with no capture metadata means settled (`Completed`)
    Direct,
    /// Approved with no capture metadata means a hold (`Authorized`)
    Preauth,
}

impl Default for CaptureMode {
    fn default() -> Self {
        CaptureMode::Direct
    }
}

impl CaptureMode {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "direct" => Some(CaptureMode::Direct),
            "preauth" => Some(CaptureMode::Preauth),
            _ => None,
        }
    }

    /// Value of the `preauth` field on the outbound redirect form
    pub fn preauth_flag(&self) -> &'static str {
        match self {
            CaptureMode::Direct => "N",
            CaptureMode::Preauth => "Y",
        }
    }
}

/// How to acknowledge a rejected notification.
///
/// A rejected payload never changes on redelivery, but gateways keep
/// redelivering until they see a success token. Structurally hopeless
/// deliveries (empty payload) can be acknowledged to stop the storm;
/// whether that is acceptable is deployment policy, not code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectAck {
    /// Answer non-success for every rejection so the gateway retries
    RequestRedelivery,
    /// Answer success for non-retryable structural rejections
    AckNonRetryable,
}

impl Default for RejectAck {
    fn default() -> Self {
        RejectAck::RequestRedelivery
    }
}

impl RejectAck {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "request_redelivery" | "retry" => Some(RejectAck::RequestRedelivery),
            "ack_non_retryable" | "ack" => Some(RejectAck::AckNonRetryable),
            _ => None,
        }
    }
}

/// Gateway integration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Merchant ID from the gateway portal
    pub merchant_id: String,

    /// Shared signing secret from the gateway portal
    pub secret_key: String,

    /// Hosted payment page endpoint
    #[serde(default = "default_checkout_url")]
    pub checkout_url: String,

    /// Language for the hosted card form
    #[serde(default = "default_language")]
    pub language: String,

    /// Initial-state policy for approved notifications
    #[serde(default)]
    pub capture_mode: CaptureMode,

    /// Acknowledgement policy for rejected notifications
    #[serde(default)]
    pub reject_ack: RejectAck,
}

fn default_checkout_url() -> String {
    DEFAULT_CHECKOUT_URL.to_string()
}

fn default_language() -> String {
    "en".to_string()
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `GATEWAY_MERCHANT_ID`
    /// - `GATEWAY_SECRET_KEY`
    ///
    /// Optional: `GATEWAY_CHECKOUT_URL`, `GATEWAY_LANGUAGE`,
    /// `GATEWAY_CAPTURE_MODE` (direct|preauth), `GATEWAY_REJECT_ACK`
    /// (retry|ack).
    pub fn from_env() -> Result<Self, PaymentError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let merchant_id = env::var("GATEWAY_MERCHANT_ID").map_err(|_| {
            PaymentError::Configuration("GATEWAY_MERCHANT_ID not set".to_string())
        })?;

        let secret_key = env::var("GATEWAY_SECRET_KEY").map_err(|_| {
            PaymentError::Configuration("GATEWAY_SECRET_KEY not set".to_string())
        })?;

        let capture_mode = match env::var("GATEWAY_CAPTURE_MODE") {
            Ok(v) => CaptureMode::parse(&v).ok_or_else(|| {
                PaymentError::Configuration(format!(
                    "GATEWAY_CAPTURE_MODE must be direct or preauth, got {}",
                    v
                ))
            })?,
            Err(_) => CaptureMode::default(),
        };

        let reject_ack = match env::var("GATEWAY_REJECT_ACK") {
            Ok(v) => RejectAck::parse(&v).ok_or_else(|| {
                PaymentError::Configuration(format!(
                    "GATEWAY_REJECT_ACK must be retry or ack, got {}",
                    v
                ))
            })?,
            Err(_) => RejectAck::default(),
        };

        let config = Self {
            merchant_id,
            secret_key,
            checkout_url: env::var("GATEWAY_CHECKOUT_URL")
                .unwrap_or_else(|_| default_checkout_url()),
            language: env::var("GATEWAY_LANGUAGE").unwrap_or_else(|_| default_language()),
            capture_mode,
            reject_ack,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file (`[gateway]`-less flat table)
    pub fn from_toml_file(path: &str) -> Result<Self, PaymentError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PaymentError::Configuration(format!("Failed to read {}: {}", path, e))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            PaymentError::Configuration(format!("Failed to parse {}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Environment first, then well-known config paths
    pub fn load() -> Result<Self, PaymentError> {
        if let Ok(config) = Self::from_env() {
            return Ok(config);
        }

        let config_paths = ["config/gateway.toml", "../config/gateway.toml"];
        for path in config_paths {
            if std::path::Path::new(path).exists() {
                return Self::from_toml_file(path);
            }
        }

        Err(PaymentError::Configuration(
            "No gateway configuration found (env or config/gateway.toml)".to_string(),
        ))
    }

    /// Create config with explicit values (for testing)
    pub fn new(merchant_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            secret_key: secret_key.into(),
            checkout_url: default_checkout_url(),
            language: default_language(),
            capture_mode: CaptureMode::default(),
            reject_ack: RejectAck::default(),
        }
    }

    /// Builder: set the capture mode
    pub fn with_capture_mode(mut self, mode: CaptureMode) -> Self {
        self.capture_mode = mode;
        self
    }

    /// Builder: set the rejection acknowledgement policy
    pub fn with_reject_ack(mut self, policy: RejectAck) -> Self {
        self.reject_ack = policy;
        self
    }

    fn validate(&self) -> Result<(), PaymentError> {
        if self.merchant_id.trim().is_empty() {
            return Err(PaymentError::Configuration(
                "merchant_id must not be empty".to_string(),
            ));
        }
        if self.secret_key.is_empty() {
            return Err(PaymentError::Configuration(
                "secret_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
