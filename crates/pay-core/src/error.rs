//! # Payment Error Types
//!
//! Typed error handling for offsite-pay. All operations return
//! `Result<T, PaymentError>`. The taxonomy matters for the webhook ack
//! contract: validation failures will not change on redelivery, ledger
//! failures need manual review, transient failures should be retried
//! by the gateway.

use crate::ledger::LedgerError;
use thiserror::Error;

/// Why an inbound notification was rejected.
///
/// None of these are retryable by redelivery; the payload content will
/// not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Notification carried no parameters
    #[error("notification payload is empty")]
    EmptyPayload,

    /// merchant_id does not match the configured merchant
    #[error("merchant id mismatch")]
    MerchantMismatch,

    /// Notification currency differs from the order currency
    #[error("currency mismatch")]
    CurrencyMismatch,

    /// Notification amount differs from the order total
    #[error("amount mismatch")]
    AmountMismatch,

    /// Signature does not match the canonicalized payload
    #[error("signature mismatch")]
    SignatureMismatch,
}

/// Core error type for all payment operations
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Notification failed validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Ledger transition failed (logic/ordering problem)
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Referenced order does not exist
    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    /// Notification references a transaction with no payment record
    #[error("No payment record for order {order_id} / transaction {remote_id}")]
    RecordNotFound {
        order_id: String,
        remote_id: String,
    },

    /// Structurally undecodable payload field
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Backing store unavailable (retryable)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Per-order lock could not be acquired in time (retryable)
    #[error("Lock timeout for order {order_id}")]
    LockTimeout { order_id: String },

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    /// Returns true if the gateway should redeliver the notification
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::StoreUnavailable(_) | PaymentError::LockTimeout { .. }
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::Configuration(_) => 500,
            PaymentError::Validation(_) => 400,
            PaymentError::Ledger(_) => 500,
            PaymentError::OrderNotFound { .. } => 404,
            PaymentError::RecordNotFound { .. } => 404,
            PaymentError::MalformedPayload(_) => 400,
            PaymentError::StoreUnavailable(_) => 503,
            PaymentError::LockTimeout { .. } => 503,
            PaymentError::Internal(_) => 500,
        }
    }
}

/// Result type alias for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::PaymentState;

    #[test]
    fn test_retryable_errors() {
        assert!(PaymentError::StoreUnavailable("down".into()).is_retryable());
        assert!(PaymentError::LockTimeout {
            order_id: "42".into()
        }
        .is_retryable());
        assert!(!PaymentError::Validation(ValidationError::AmountMismatch).is_retryable());
        assert!(!PaymentError::Ledger(LedgerError::InvalidStateForRefund {
            state: PaymentState::Refunded
        })
        .is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            PaymentError::Validation(ValidationError::SignatureMismatch).status_code(),
            400
        );
        assert_eq!(
            PaymentError::OrderNotFound {
                order_id: "x".into()
            }
            .status_code(),
            404
        );
        assert_eq!(
            PaymentError::StoreUnavailable("down".into()).status_code(),
            503
        );
    }
}
