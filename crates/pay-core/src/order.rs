//! # Order Types
//!
//! Order entity for offsite-pay. The order itself is owned by the
//! surrounding store; its status is mutated only through the
//! reconciliation engine's order-level effect.

use crate::money::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Awaiting payment
    Pending,
    /// Payment settled
    Completed,
    /// Declined, expired, or fully refunded
    Cancelled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

/// An order awaiting settlement through the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID (generated)
    pub id: String,

    /// Order total
    pub total: Price,

    /// Lifecycle status
    #[serde(default)]
    pub status: OrderStatus,

    /// Customer email (optional, forwarded to the payment page)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Create a new pending order with generated ID
    pub fn new(total: Price) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            total,
            status: OrderStatus::Pending,
            customer_email: None,
            created_at: Utc::now(),
        }
    }

    /// Create an order with a known ID (stores, tests)
    pub fn with_id(id: impl Into<String>, total: Price) -> Self {
        Self {
            id: id.into(),
            total,
            status: OrderStatus::Pending,
            customer_email: None,
            created_at: Utc::now(),
        }
    }

    /// Set customer email
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.customer_email = Some(email.into());
        self
    }

    /// Check whether the order is still awaiting payment
    pub fn is_pending(&self) -> bool {
        matches!(self.status, OrderStatus::Pending)
    }
}
