//! The host collaborator port for order state.
//!
//! The adapter never mutates order records directly: it resolves orders by
//! their gateway-facing token, records audit notes, and asks the host
//! whether a transition is permitted before requesting it. Those
//! `can_*` preconditions are the idempotency guards for duplicate and racing
//! gateway notifications.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::GatewayError;

/// Payment state of an order as observed from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Authorized,
    Paid,
    Cancelled,
}

/// A host order as seen by the adapter.
///
/// `token` is the globally unique identifier used in gateway-facing URLs and
/// signatures; `id` is the host's internal display id used in buyer-facing
/// redirects and descriptions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub token: Uuid,
    pub total: Decimal,
    pub currency: String,
    pub payment_state: PaymentState,
    pub created_at: DateTime<Utc>,
}

/// Port to the host's order storage and lifecycle service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Resolve an order by its gateway-facing token.
    async fn order_by_token(&self, token: Uuid) -> Option<Order>;

    /// Append a diagnostic note to the order's audit trail.
    async fn add_order_note(&self, token: Uuid, note: String) -> Result<(), GatewayError>;

    /// Whether the order currently permits a paid transition.
    async fn can_mark_paid(&self, token: Uuid) -> bool;

    async fn mark_paid(&self, token: Uuid) -> Result<(), GatewayError>;

    /// Whether the order currently permits cancellation.
    async fn can_cancel(&self, token: Uuid) -> bool;

    async fn cancel(&self, token: Uuid) -> Result<(), GatewayError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderNote {
    pub note: String,
    pub created_at: DateTime<Utc>,
}

/// In-memory order service backing tests and the standalone binary. Hosts
/// embed the adapter with their own `OrderService` implementation instead.
#[derive(Default)]
pub struct InMemoryOrderService {
    orders: DashMap<Uuid, Order>,
    notes: DashMap<Uuid, Vec<OrderNote>>,
}

impl InMemoryOrderService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Order) {
        self.orders.insert(order.token, order);
    }

    pub fn notes(&self, token: Uuid) -> Vec<OrderNote> {
        self.notes.get(&token).map(|n| n.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OrderService for InMemoryOrderService {
    async fn order_by_token(&self, token: Uuid) -> Option<Order> {
        self.orders.get(&token).map(|o| o.clone())
    }

    async fn add_order_note(&self, token: Uuid, note: String) -> Result<(), GatewayError> {
        self.notes.entry(token).or_default().push(OrderNote {
            note,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn can_mark_paid(&self, token: Uuid) -> bool {
        matches!(
            self.orders.get(&token).map(|o| o.payment_state),
            Some(PaymentState::Pending) | Some(PaymentState::Authorized)
        )
    }

    async fn mark_paid(&self, token: Uuid) -> Result<(), GatewayError> {
        let mut order = self
            .orders
            .get_mut(&token)
            .ok_or_else(|| GatewayError::OrderNotFound(token.to_string()))?;
        order.payment_state = PaymentState::Paid;
        info!(order_id = order.id, %token, "Order marked as paid");
        Ok(())
    }

    async fn can_cancel(&self, token: Uuid) -> bool {
        matches!(
            self.orders.get(&token).map(|o| o.payment_state),
            Some(PaymentState::Pending) | Some(PaymentState::Authorized) | Some(PaymentState::Paid)
        )
    }

    async fn cancel(&self, token: Uuid) -> Result<(), GatewayError> {
        let mut order = self
            .orders
            .get_mut(&token)
            .ok_or_else(|| GatewayError::OrderNotFound(token.to_string()))?;
        order.payment_state = PaymentState::Cancelled;
        info!(order_id = order.id, %token, "Order cancelled");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_order(state: PaymentState) -> Order {
    use rust_decimal_macros::dec;

    Order {
        id: 42,
        token: Uuid::new_v4(),
        total: dec!(199.90),
        currency: "RUB".into(),
        payment_state: state,
        created_at: Utc::now(),
    }
}
