//! Public claim endpoint.

use super::{AppError, ClientIp, TicketResponse};
use crate::server::AppState;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use gatepass_core::claim::ClaimRequest;

/// `POST /api/claims`
///
/// Phone-first (`{eventId, name, phone, tierId?}`) or form-first (adds
/// `email`) claim. Answers 201 with the ticket.
///
/// # Errors
///
/// 400 for input errors, 404 for unknown events, 409 for sold-out and
/// duplicate-phone conflicts, 429 with `Retry-After` when rate limited.
pub async fn claim_ticket(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    body: Result<Json<ClaimRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TicketResponse>), AppError> {
    let Json(request) = body.map_err(|e| AppError::invalid_body(&e))?;
    let record = state.issuer.claim(&request, &ip.to_string()).await?;
    Ok((StatusCode::CREATED, Json(TicketResponse::from(&record))))
}
