//! Ticket view and organizer payment actions.

use super::{AppError, Authenticated, TicketResponse, TicketStatusResponse};
use crate::server::AppState;
use crate::validation::ScanError;
use axum::Json;
use axum::extract::{Path, State};
use gatepass_core::ticket_code::TicketCode;
use gatepass_core::types::TicketId;
use uuid::Uuid;

/// `GET /api/tickets/by-code/:code`
///
/// Public ticket page data. Unpaid tickets past the booking window show as
/// `expired`.
///
/// # Errors
///
/// 400 for malformed codes, 404 for unknown ones.
pub async fn ticket_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<TicketResponse>, AppError> {
    let code = TicketCode::parse(&code).map_err(ScanError::from)?;
    let record = state.lifecycle.view_by_code(&code).await?;
    Ok(Json(TicketResponse::from(&record)))
}

/// `POST /api/tickets/:id/confirm-payment`
///
/// # Errors
///
/// 403 for non-owners, 404 for unknown tickets, 409 for paid or cancelled
/// tickets, 410 `expired` past the booking window.
pub async fn confirm_payment(
    State(state): State<AppState>,
    Authenticated(actor): Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketStatusResponse>, AppError> {
    let ticket = state
        .lifecycle
        .confirm_payment(actor, TicketId::from_uuid(id))
        .await?;
    Ok(Json(TicketStatusResponse::from(&ticket)))
}

/// `POST /api/tickets/:id/cancel`
///
/// # Errors
///
/// 403 for non-owners, 404 for unknown tickets, 409 for paid or already
/// cancelled tickets.
pub async fn cancel_ticket(
    State(state): State<AppState>,
    Authenticated(actor): Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketStatusResponse>, AppError> {
    let ticket = state.lifecycle.cancel(actor, TicketId::from_uuid(id)).await?;
    Ok(Json(TicketStatusResponse::from(&ticket)))
}
