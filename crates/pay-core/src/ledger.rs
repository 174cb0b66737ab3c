//! # Payment Ledger
//!
//! One payment record per gateway session and the state machine that
//! governs it. Gateways redeliver webhooks freely, so every transition
//! reports whether it changed anything: replaying a terminal event is
//! a [`Transition::NoOp`], not an error.

use crate::money::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// State of a payment record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    /// Funds held, capture outstanding
    Authorized,
    /// Gateway reported capture in flight
    Pending,
    /// Settled
    Completed,
    /// Refunded below the settled amount
    PartiallyRefunded,
    /// Fully refunded
    Refunded,
}

impl PaymentState {
    /// Terminal states accept redelivery of the event that produced
    /// them but no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentState::Refunded)
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentState::Authorized => "authorized",
            PaymentState::Pending => "pending",
            PaymentState::Completed => "completed",
            PaymentState::PartiallyRefunded => "partially_refunded",
            PaymentState::Refunded => "refunded",
        };
        write!(f, "{}", s)
    }
}

/// Errors raised by ledger transitions.
///
/// These indicate a logic or ordering problem, never a transient one;
/// callers log them with full payload context for manual review.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Capture requires an authorized record
    #[error("cannot capture payment in state {state}")]
    InvalidStateForCapture { state: PaymentState },

    /// Completion requires a pending record
    #[error("cannot complete payment in state {state}")]
    InvalidStateForCompletion { state: PaymentState },

    /// Refund requires a live record
    #[error("cannot refund payment in state {state}")]
    InvalidStateForRefund { state: PaymentState },

    /// Refund would push the refunded total past the settled amount
    #[error("refund of {requested} exceeds remaining {remaining} on payment {remote_id}")]
    RefundExceedsAmount {
        remote_id: String,
        requested: i64,
        remaining: i64,
    },

    /// A record already exists for this (order, remote transaction) pair
    #[error("payment record already exists for order {order_id} / transaction {remote_id}")]
    DuplicateRecord {
        order_id: String,
        remote_id: String,
    },
}

/// Whether a transition mutated the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The record changed and must be persisted
    Changed,
    /// Redelivered event, record untouched
    NoOp,
}

impl Transition {
    pub fn is_noop(&self) -> bool {
        matches!(self, Transition::NoOp)
    }
}

/// A payment record, 1:1 with a gateway checkout session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Owning order
    pub order_id: String,

    /// Gateway transaction identifier, immutable once set
    pub remote_id: String,

    /// Last raw gateway status string, kept for audit
    pub remote_state: String,

    /// Authorized/settled amount
    pub amount: Price,

    /// Refunded so far, monotonically non-decreasing
    pub refunded: Price,

    /// Current state
    pub state: PaymentState,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Create a record in its initial state
    pub fn new(
        order_id: impl Into<String>,
        remote_id: impl Into<String>,
        remote_state: impl Into<String>,
        amount: Price,
        state: PaymentState,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            remote_id: remote_id.into(),
            remote_state: remote_state.into(),
            amount,
            refunded: Price::from_minor(0, amount.currency),
            state,
            created_at: Utc::now(),
        }
    }

    /// Settle a previously authorized hold.
    ///
    /// The captured amount may be less than the authorized amount; it
    /// becomes the new settled amount. Re-capturing an already settled
    /// record with the same amount is a no-op.
    pub fn capture(&mut self, amount_minor: i64) -> Result<Transition, LedgerError> {
        match self.state {
            PaymentState::Authorized => {
                self.amount.amount = amount_minor;
                self.state = PaymentState::Completed;
                Ok(Transition::Changed)
            }
            PaymentState::Completed if self.amount.amount == amount_minor => Ok(Transition::NoOp),
            state => Err(LedgerError::InvalidStateForCapture { state }),
        }
    }

    /// Apply a refund.
    ///
    /// Moves to `PartiallyRefunded` while the refunded total is below
    /// the settled amount, `Refunded` once it reaches it. A refund that
    /// would breach the bound fails and leaves the record untouched;
    /// refunding an already fully refunded record is a no-op.
    pub fn refund(&mut self, amount_minor: i64) -> Result<Transition, LedgerError> {
        match self.state {
            PaymentState::Authorized
            | PaymentState::Pending
            | PaymentState::Completed
            | PaymentState::PartiallyRefunded => {}
            // Redelivered terminal refund
            PaymentState::Refunded => return Ok(Transition::NoOp),
        }

        let new_refunded = self.refunded.amount.saturating_add(amount_minor);
        if new_refunded > self.amount.amount {
            return Err(LedgerError::RefundExceedsAmount {
                remote_id: self.remote_id.clone(),
                requested: amount_minor,
                remaining: self.amount.amount - self.refunded.amount,
            });
        }

        self.refunded.amount = new_refunded;
        self.state = if new_refunded < self.amount.amount {
            PaymentState::PartiallyRefunded
        } else {
            PaymentState::Refunded
        };
        Ok(Transition::Changed)
    }

    /// Promote a pending capture to completed
    pub fn mark_completed(&mut self) -> Result<Transition, LedgerError> {
        match self.state {
            PaymentState::Pending => {
                self.state = PaymentState::Completed;
                Ok(Transition::Changed)
            }
            PaymentState::Completed => Ok(Transition::NoOp),
            state => Err(LedgerError::InvalidStateForCompletion { state }),
        }
    }

    /// Update the raw gateway status kept for audit
    pub fn record_remote_state(&mut self, remote_state: impl Into<String>) {
        self.remote_state = remote_state.into();
    }

    /// Amount still refundable
    pub fn remaining(&self) -> i64 {
        self.amount.amount - self.refunded.amount
    }
}
