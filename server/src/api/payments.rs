//! Payment order endpoint.

use super::{AppError, Authenticated};
use crate::payments::{CreateOrder, OrderHandle};
use crate::server::AppState;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;

/// `POST /api/payments/orders`
///
/// Body `{amount, currency, eventId, ticketId}` with the amount in minor
/// units. Answers 201 with `{orderId, amount, currency, keyId}`.
///
/// # Errors
///
/// 400 for amount, currency or ticket mismatches, 404 for unknown tickets,
/// 409 when the ticket is not pending, 502 when the gateway fails.
pub async fn create_order(
    State(state): State<AppState>,
    Authenticated(account): Authenticated,
    body: Result<Json<CreateOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderHandle>), AppError> {
    let Json(request) = body.map_err(|e| AppError::invalid_body(&e))?;
    tracing::debug!(%account, ticket_id = %request.ticket_id, "Creating payment order");
    let handle = state.orders.create(&request).await?;
    Ok((StatusCode::CREATED, Json(handle)))
}
