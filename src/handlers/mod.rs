//! HTTP surface of the gateway adapter: the server-to-server result
//! callback plus the two buyer-facing redirect returns.

use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Redirect},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::GatewayError;
use crate::state_machine;
use crate::AppState;

pub fn gateway_routes() -> Router<AppState> {
    Router::new()
        .route("/platron/pay/:token", post(initiate_payment))
        .route("/platron/confirm", post(confirm_pay))
        .route("/platron/success", get(success_return))
        .route("/platron/cancel", get(cancel_return))
}

/// Build the signed redirect form for an order. The storefront renders the
/// returned fields as an auto-posting form aimed at the gateway.
#[instrument(skip_all)]
async fn initiate_payment(
    State(state): State<AppState>,
    Path(token): Path<Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let order = state
        .orders
        .order_by_token(token)
        .await
        .ok_or_else(|| GatewayError::OrderNotFound(token.to_string()))?;
    let request = state.processor.payment_request(&order);
    info!(order_id = order.id, "Built payment initiation form");
    Ok(Json(request))
}

/// Result callback. The gateway retries until it receives a well-formed
/// acknowledgement, so every outcome answers 200 with the XML envelope.
#[instrument(skip_all)]
async fn confirm_pay(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Form(form): Form<Vec<(String, String)>>,
) -> Result<impl IntoResponse, GatewayError> {
    let body = state.callback.process(uri.path(), &form).await?;
    Ok(([(CONTENT_TYPE, "text/xml; charset=utf-8")], body))
}

#[derive(Debug, Deserialize)]
struct ReturnQuery {
    pg_order_id: Option<String>,
}

/// Buyer returned from a completed gateway session. The redirect itself is
/// untrusted, so the order state comes from a fresh status poll.
#[instrument(skip_all)]
async fn success_return(
    State(state): State<AppState>,
    Query(query): Query<ReturnQuery>,
) -> Redirect {
    match refresh_order_state(&state, query.pg_order_id.as_deref()).await {
        Some(order_id) => Redirect::to(&format!("/orders/{}/completed", order_id)),
        None => Redirect::to("/"),
    }
}

/// Buyer came back via the failure URL. Same poll, different landing page:
/// the gateway's answer decides the state, not which door the buyer used.
#[instrument(skip_all)]
async fn cancel_return(
    State(state): State<AppState>,
    Query(query): Query<ReturnQuery>,
) -> Redirect {
    match refresh_order_state(&state, query.pg_order_id.as_deref()).await {
        Some(order_id) => Redirect::to(&format!("/orders/{}", order_id)),
        None => Redirect::to("/"),
    }
}

/// Resolve the returning order and reconcile its payment state against a
/// status poll. Returns the host order id for the landing redirect, or None
/// when the token is missing, malformed, or unknown.
async fn refresh_order_state(state: &AppState, token: Option<&str>) -> Option<u64> {
    let token = match token.map(Uuid::parse_str) {
        Some(Ok(token)) => token,
        _ => {
            warn!("Redirect return without a usable order token");
            return None;
        }
    };

    let order = state.orders.order_by_token(token).await?;

    let status = state.client.poll_status(token, &state.config.merchant).await;
    if status.is_ok() {
        match state_machine::apply(
            state.orders.as_ref(),
            &order,
            &status.transaction_status,
            &status.transaction_status,
        )
        .await
        {
            Ok(true) => info!(order_id = order.id, "Redirect return reconciled order state"),
            Ok(false) => {}
            Err(e) => warn!(order_id = order.id, error = %e, "State reconciliation failed"),
        }
    }

    Some(order.id)
}
