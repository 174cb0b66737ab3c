//! # pay-gateway
//!
//! Hosted-checkout gateway integration for offsite-pay. The gateway
//! talks to the store two ways only: a browser redirect carrying a
//! signed form, and signed status notifications delivered over a
//! server-to-server webhook and a synchronous browser return.
//!
//! This crate provides:
//! - `signature`: canonical payload digest shared by both directions
//! - `NotificationPayload`: the inbound payload boundary with typed,
//!   panic-free accessors
//! - `validator`: merchant/amount/currency/signature checks
//! - `ReconciliationEngine`: idempotent mapping of gateway events
//!   onto the payment ledger and order lifecycle
//! - `RedirectRequestBuilder`: the outbound signed checkout form
//! - `GatewayConfig`: merchant credentials and integration policy
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pay_gateway::{GatewayConfig, NotificationPayload, ReconciliationEngine};
//!
//! let config = GatewayConfig::from_env()?;
//! let engine = ReconciliationEngine::new(config, orders, payments);
//!
//! // In the webhook endpoint:
//! let payload = NotificationPayload::from_params(form_params);
//! let outcome = engine.reconcile(&payload).await?;
//! ```

pub mod config;
pub mod payload;
pub mod reconcile;
pub mod redirect;
pub mod signature;
pub mod validator;

// Re-exports
pub use config::{CaptureMode, GatewayConfig, RejectAck};
pub use payload::{
    AdditionalInfo, GatewayStatus, NotificationPayload, SessionOrderReference, ORDER_SEPARATOR,
};
pub use reconcile::{OrderEffect, ReconcileOutcome, ReconciliationEngine};
pub use redirect::{RedirectRequest, RedirectRequestBuilder};
