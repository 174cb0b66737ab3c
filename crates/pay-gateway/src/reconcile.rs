//! # Reconciliation Engine
//!
//! Single entry point for both delivery paths: the asynchronous
//! server-to-server webhook and the synchronous browser return. Maps a
//! validated notification onto ledger transitions and an order-level
//! effect. Webhook and browser-return deliveries for the same order
//! routinely race, so every reconciliation serializes behind a
//! per-order lock.

use crate::config::{CaptureMode, GatewayConfig};
use crate::payload::{GatewayStatus, NotificationPayload};
use crate::validator;
use pay_core::{
    BoxedOrderStore, BoxedPaymentStore, Order, OrderStatus, PaymentError, PaymentRecord,
    PaymentResult, PaymentState, Price, Transition, ValidationError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// How long a delivery waits for the per-order lock before asking the
/// gateway to redeliver
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Capture status value that marks settled funds
const CAPTURE_STATUS_CAPTURED: &str = "captured";

/// Order-level side effect of a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEffect {
    /// Order untouched
    None,
    /// Order marked completed (first-time settlement)
    Completed,
    /// Order marked cancelled (declined, expired, or fully refunded)
    Cancelled,
}

/// Result of one reconciliation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A transition was applied
    Applied {
        payment_state: Option<PaymentState>,
        order_effect: OrderEffect,
    },
    /// Redelivered or informational notification, nothing changed
    NoOp { payment_state: Option<PaymentState> },
    /// Validation failed; no state was mutated
    Rejected(ValidationError),
}

impl ReconcileOutcome {
    /// Whether the gateway should receive the success token
    pub fn is_accepted(&self) -> bool {
        !matches!(self, ReconcileOutcome::Rejected(_))
    }
}

/// Orchestrates validation, ledger transitions, and order effects.
///
/// Collaborators are injected; the engine never reaches into ambient
/// state. Tracing carries the audit trail: every rejection and every
/// ledger failure is logged with the raw payload.
pub struct ReconciliationEngine {
    config: GatewayConfig,
    orders: BoxedOrderStore,
    payments: BoxedPaymentStore,
    /// Per-order serialization. Entries are pruned on release once no
    /// delivery holds or waits on them, so the map stays bounded by
    /// in-flight orders, not by every order ever seen.
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ReconciliationEngine {
    pub fn new(
        config: GatewayConfig,
        orders: BoxedOrderStore,
        payments: BoxedPaymentStore,
    ) -> Self {
        Self {
            config,
            orders,
            payments,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Reconcile one inbound notification.
    ///
    /// Validation failures come back as `Rejected` without touching
    /// any state. Ledger-transition failures propagate as errors and
    /// abort before anything is persisted; redelivered events come
    /// back as `NoOp`.
    #[instrument(skip(self, payload), fields(order_id, status))]
    pub async fn reconcile(&self, payload: &NotificationPayload) -> PaymentResult<ReconcileOutcome> {
        // An empty payload cannot name an order; reject it before the
        // reference parse so the caller can apply its ack policy.
        if payload.is_empty() {
            warn!("rejecting empty notification payload");
            return Ok(ReconcileOutcome::Rejected(ValidationError::EmptyPayload));
        }

        let reference = payload.order_reference().ok_or_else(|| {
            PaymentError::MalformedPayload("notification is missing order_id".to_string())
        })?;
        let order_id = reference.order_id.clone();
        tracing::Span::current().record("order_id", order_id.as_str());

        let _guard = self.acquire_order_lock(&order_id).await?;

        let mut order = self
            .orders
            .load(&order_id)
            .await?
            .ok_or_else(|| PaymentError::OrderNotFound {
                order_id: order_id.clone(),
            })?;

        if let Err(reason) = validator::validate(payload, &order, &self.config) {
            warn!(payload = ?payload.raw(), %reason, "notification rejected");
            return Ok(ReconcileOutcome::Rejected(reason));
        }

        let status = payload.order_status().ok_or_else(|| {
            PaymentError::MalformedPayload("notification is missing order_status".to_string())
        })?;
        tracing::Span::current().record("status", status.as_str());

        match status {
            GatewayStatus::Processing => {
                // Transient, informational; never terminal
                let state = self.current_state(payload, &order_id).await?;
                Ok(ReconcileOutcome::NoOp {
                    payment_state: state,
                })
            }

            GatewayStatus::Declined | GatewayStatus::Expired => {
                let state = self.current_state(payload, &order_id).await?;
                let effect = self.cancel_order(&mut order).await?;
                if effect == OrderEffect::None {
                    Ok(ReconcileOutcome::NoOp {
                        payment_state: state,
                    })
                } else {
                    info!(%order_id, status = status.as_str(), "order cancelled");
                    Ok(ReconcileOutcome::Applied {
                        payment_state: state,
                        order_effect: effect,
                    })
                }
            }

            GatewayStatus::Reversed => self.apply_reversal(payload, &mut order).await,

            GatewayStatus::Approved => self.apply_approval(payload, &mut order).await,

            GatewayStatus::Unknown(raw) => {
                warn!(payload = ?payload.raw(), status = %raw, "unrecognized gateway status, ignoring");
                let state = self.current_state(payload, &order_id).await?;
                Ok(ReconcileOutcome::NoOp {
                    payment_state: state,
                })
            }
        }
    }

    /// Gateway-initiated reversal: refund of `reversal_amount`
    async fn apply_reversal(
        &self,
        payload: &NotificationPayload,
        order: &mut Order,
    ) -> PaymentResult<ReconcileOutcome> {
        let remote_id = self.remote_id(payload)?;
        let mut record = self
            .payments
            .find(&order.id, &remote_id)
            .await?
            .ok_or_else(|| PaymentError::RecordNotFound {
                order_id: order.id.clone(),
                remote_id: remote_id.clone(),
            })?;

        let amount = payload.reversal_amount_minor().ok_or_else(|| {
            PaymentError::MalformedPayload(
                "reversed notification without reversal_amount".to_string(),
            )
        })?;

        self.refund_record(payload, order, &mut record, amount, "reversed")
            .await
    }

    /// Approved notification: create the record or advance it
    async fn apply_approval(
        &self,
        payload: &NotificationPayload,
        order: &mut Order,
    ) -> PaymentResult<ReconcileOutcome> {
        let remote_id = self.remote_id(payload)?;
        let capture_status = payload.capture_status();

        let Some(mut record) = self.payments.find(&order.id, &remote_id).await? else {
            return self.create_record(payload, order, &remote_id).await;
        };

        // Reversal amount on an approved status while still authorized
        // is a partial refund before capture
        if record.state == PaymentState::Authorized && capture_status.is_none() {
            if let Some(amount) = payload.reversal_amount_minor() {
                return self
                    .refund_record(payload, order, &mut record, amount, "approved")
                    .await;
            }
        }

        match (capture_status.as_deref(), record.state) {
            // Capture settles the hold, possibly for less
            (Some(CAPTURE_STATUS_CAPTURED), PaymentState::Authorized) => {
                let amount = self.capture_amount(payload, &record);
                let transition = record.capture(amount).map_err(|e| {
                    warn!(payload = ?payload.raw(), error = %e, "capture failed");
                    PaymentError::from(e)
                })?;
                self.finish_settlement(payload, order, record, transition)
                    .await
            }

            // A pending capture resolving (captured, or metadata gone)
            (Some(CAPTURE_STATUS_CAPTURED), PaymentState::Pending)
            | (None, PaymentState::Pending) => {
                let transition = record.mark_completed().map_err(|e| {
                    warn!(payload = ?payload.raw(), error = %e, "completion failed");
                    PaymentError::from(e)
                })?;
                self.finish_settlement(payload, order, record, transition)
                    .await
            }

            // Anything else carries no new information
            (_, state) => Ok(ReconcileOutcome::NoOp {
                payment_state: Some(state),
            }),
        }
    }

    /// First notification for this (order, transaction): create the
    /// record with its policy-derived initial state
    async fn create_record(
        &self,
        payload: &NotificationPayload,
        order: &mut Order,
        remote_id: &str,
    ) -> PaymentResult<ReconcileOutcome> {
        let capture_status = payload.capture_status();
        let state = match capture_status.as_deref() {
            Some(CAPTURE_STATUS_CAPTURED) => PaymentState::Completed,
            Some(_) => PaymentState::Pending,
            None => match self.config.capture_mode {
                CaptureMode::Direct => PaymentState::Completed,
                CaptureMode::Preauth => PaymentState::Authorized,
            },
        };

        let record = PaymentRecord::new(
            order.id.clone(),
            remote_id,
            payload
                .order_status()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            order.total,
            state,
        );
        self.payments.create(&record).await?;

        info!(
            order_id = %order.id,
            %remote_id,
            state = %state,
            "payment record created"
        );

        let order_effect = if state == PaymentState::Completed {
            self.complete_order(order).await?
        } else {
            OrderEffect::None
        };

        Ok(ReconcileOutcome::Applied {
            payment_state: Some(state),
            order_effect,
        })
    }

    /// Shared tail of capture and pending-completion paths
    async fn finish_settlement(
        &self,
        payload: &NotificationPayload,
        order: &mut Order,
        mut record: PaymentRecord,
        transition: Transition,
    ) -> PaymentResult<ReconcileOutcome> {
        if transition.is_noop() {
            return Ok(ReconcileOutcome::NoOp {
                payment_state: Some(record.state),
            });
        }

        if let Some(status) = payload.order_status() {
            record.record_remote_state(status.as_str());
        }
        self.payments.save(&record).await?;

        info!(
            order_id = %order.id,
            remote_id = %record.remote_id,
            settled = %record.amount.display(),
            "payment settled"
        );

        let order_effect = self.complete_order(order).await?;
        Ok(ReconcileOutcome::Applied {
            payment_state: Some(record.state),
            order_effect,
        })
    }

    /// Apply a refund to a record and derive the order effect
    async fn refund_record(
        &self,
        payload: &NotificationPayload,
        order: &mut Order,
        record: &mut PaymentRecord,
        amount_minor: i64,
        remote_state: &str,
    ) -> PaymentResult<ReconcileOutcome> {
        let transition = record.refund(amount_minor).map_err(|e| {
            warn!(payload = ?payload.raw(), error = %e, "refund failed");
            PaymentError::from(e)
        })?;

        if transition.is_noop() {
            return Ok(ReconcileOutcome::NoOp {
                payment_state: Some(record.state),
            });
        }

        record.record_remote_state(remote_state);
        self.payments.save(record).await?;

        info!(
            order_id = %order.id,
            remote_id = %record.remote_id,
            refunded = %record.refunded.display(),
            state = %record.state,
            "refund applied"
        );

        // A full refund cancels the order
        let order_effect = if record.state == PaymentState::Refunded {
            self.cancel_order(order).await?
        } else {
            OrderEffect::None
        };

        Ok(ReconcileOutcome::Applied {
            payment_state: Some(record.state),
            order_effect,
        })
    }

    /// Captured amount: explicit major-unit metadata, else the full
    /// recorded amount
    fn capture_amount(&self, payload: &NotificationPayload, record: &PaymentRecord) -> i64 {
        payload
            .additional_info()
            .and_then(|info| info.capture_amount)
            .and_then(|s| Price::parse_major(&s, record.amount.currency))
            .map(|p| p.amount)
            .unwrap_or(record.amount.amount)
    }

    async fn complete_order(&self, order: &mut Order) -> PaymentResult<OrderEffect> {
        // Only a first-time settlement completes the order
        if !order.is_pending() {
            return Ok(OrderEffect::None);
        }
        order.status = OrderStatus::Completed;
        self.orders.save(order).await?;
        Ok(OrderEffect::Completed)
    }

    async fn cancel_order(&self, order: &mut Order) -> PaymentResult<OrderEffect> {
        if order.status == OrderStatus::Cancelled {
            return Ok(OrderEffect::None);
        }
        order.status = OrderStatus::Cancelled;
        self.orders.save(order).await?;
        Ok(OrderEffect::Cancelled)
    }

    fn remote_id(&self, payload: &NotificationPayload) -> PaymentResult<String> {
        payload
            .payment_id()
            .map(str::to_string)
            .ok_or_else(|| {
                PaymentError::MalformedPayload("notification is missing payment_id".to_string())
            })
    }

    async fn current_state(
        &self,
        payload: &NotificationPayload,
        order_id: &str,
    ) -> PaymentResult<Option<PaymentState>> {
        let Some(remote_id) = payload.payment_id() else {
            return Ok(None);
        };
        Ok(self
            .payments
            .find(order_id, remote_id)
            .await?
            .map(|r| r.state))
    }

    async fn acquire_order_lock(&self, order_id: &str) -> PaymentResult<OrderLockGuard<'_>> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks
                .entry(order_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let guard = tokio::time::timeout(LOCK_TIMEOUT, lock.lock_owned())
            .await
            .map_err(|_| PaymentError::LockTimeout {
                order_id: order_id.to_string(),
            })?;

        Ok(OrderLockGuard {
            guard: Some(guard),
            order_id: order_id.to_string(),
            locks: &self.locks,
        })
    }
}

/// Holds the per-order lock for one reconciliation and prunes the map
/// entry on release when no other delivery is waiting on it.
struct OrderLockGuard<'a> {
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
    order_id: String,
    locks: &'a StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Drop for OrderLockGuard<'_> {
    fn drop(&mut self) {
        // Release the order lock before inspecting the map, so a
        // waiter that already cloned the Arc can proceed.
        self.guard.take();

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = locks.get(&self.order_id) {
            // The map's own handle is the only one left; no holder, no
            // waiter. A late arrival re-inserts a fresh entry.
            if Arc::strong_count(entry) == 1 {
                locks.remove(&self.order_id);
            }
        }
    }
}
