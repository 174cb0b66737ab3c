//! # pay-core
//!
//! Core types and the payment state machine for offsite-pay.
//!
//! This crate provides:
//! - `PaymentRecord` and its idempotent state machine (capture, refund,
//!   completion) — the ledger side of payment reconciliation
//! - `Order` with its lifecycle status, mutated only by the
//!   reconciliation engine
//! - `OrderStore` / `PaymentStore` traits as the persistence seams,
//!   with in-memory implementations
//! - `Price` / `Currency` with exact minor-unit arithmetic
//! - `PaymentError` for typed error handling
//!
//! ## Example
//!
//! ```rust
//! use pay_core::{Currency, PaymentRecord, PaymentState, Price, Transition};
//!
//! let mut record = PaymentRecord::new(
//!     "42",
//!     "P1",
//!     "approved",
//!     Price::from_minor(10_000, Currency::EUR),
//!     PaymentState::Authorized,
//! );
//!
//! // Partial capture settles the lower amount
//! record.capture(6_000).unwrap();
//! assert_eq!(record.state, PaymentState::Completed);
//!
//! // Redelivered capture is a no-op, not an error
//! assert_eq!(record.capture(6_000).unwrap(), Transition::NoOp);
//! ```

pub mod error;
pub mod ledger;
pub mod money;
pub mod order;
pub mod store;

// Re-exports for convenience
pub use error::{PaymentError, PaymentResult, ValidationError};
pub use ledger::{LedgerError, PaymentRecord, PaymentState, Transition};
pub use money::{Currency, Price};
pub use order::{Order, OrderStatus};
pub use store::{
    BoxedOrderStore, BoxedPaymentStore, InMemoryOrderStore, InMemoryPaymentStore, OrderStore,
    PaymentStore,
};
