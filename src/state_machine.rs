//! Shared payment-state transition rules.
//!
//! Both the callback path and the redirect-back polling paths feed gateway
//! statuses through this module. The rules themselves are a pure decision;
//! execution is delegated to the host through the `OrderService` port, whose
//! `can_cancel` / `can_mark_paid` preconditions make repeated application of
//! the same inputs a no-op rather than a double transition.

use tracing::{debug, info};

use crate::errors::GatewayError;
use crate::orders::{Order, OrderService, PaymentState};

/// Target transition computed from a gateway status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    MarkPaid,
    Cancel,
    None,
}

/// Decide the target transition for a normalized gateway status.
///
/// * `failed` / `revoked` cancel an order that is currently paid or
///   authorized.
/// * `ok` marks paid only when the accompanying transaction status,
///   uppercased, equals `PAID`.
/// * Anything else is silently ignored - unrecognized statuses are not an
///   error.
pub fn decide(state: PaymentState, status: &str, transaction_status: &str) -> Transition {
    match status.to_ascii_lowercase().as_str() {
        "failed" | "revoked" => {
            if matches!(state, PaymentState::Paid | PaymentState::Authorized) {
                Transition::Cancel
            } else {
                Transition::None
            }
        }
        "ok" => {
            if transaction_status.to_ascii_uppercase() == "PAID" {
                Transition::MarkPaid
            } else {
                Transition::None
            }
        }
        _ => Transition::None,
    }
}

/// Apply the transition rules to an order, delegating the precondition checks
/// and the actual mutation to the host. Returns whether a transition was
/// executed. Safe to call repeatedly with the same inputs.
pub async fn apply(
    orders: &dyn OrderService,
    order: &Order,
    status: &str,
    transaction_status: &str,
) -> Result<bool, GatewayError> {
    match decide(order.payment_state, status, transaction_status) {
        Transition::Cancel => {
            if orders.can_cancel(order.token).await {
                orders.cancel(order.token).await?;
                info!(order_id = order.id, status, "Gateway status cancelled order");
                return Ok(true);
            }
            debug!(order_id = order.id, "Cancel not permitted by host, skipping");
            Ok(false)
        }
        Transition::MarkPaid => {
            if orders.can_mark_paid(order.token).await {
                orders.mark_paid(order.token).await?;
                info!(order_id = order.id, status, "Gateway status marked order paid");
                return Ok(true);
            }
            debug!(order_id = order.id, "Mark-paid not permitted by host, skipping");
            Ok(false)
        }
        Transition::None => Ok(false),
    }
}
