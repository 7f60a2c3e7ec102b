//! Door scan endpoints for event owners.
//!
//! Scan outcomes are results, not errors: `valid`, `already_validated`,
//! `expired`, `payment_required` and `cancelled` are all 200 so staff devices
//! can render them. `not_found` is 404 and `unauthorized` is 403, both without
//! ticket details.

use super::{AppError, Authenticated};
use crate::server::AppState;
use crate::validation::ScanReport;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use gatepass_core::scan::ScanOutcome;
use gatepass_core::types::TicketId;
use serde::Deserialize;

/// Scan body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    /// Code read from the QR image or typed by staff
    pub ticket_code: String,
}

/// Collect-and-admit body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmScanRequest {
    /// Ticket returned by a `payment_required` scan
    pub ticket_id: TicketId,
}

/// `POST /api/scans`
///
/// # Errors
///
/// 400 `invalid_ticket_code` for malformed codes, 401 without a session,
/// 500 on storage faults.
pub async fn scan_ticket(
    State(state): State<AppState>,
    Authenticated(scanner): Authenticated,
    body: Result<Json<ScanRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ScanReport>), AppError> {
    let Json(request) = body.map_err(|e| AppError::invalid_body(&e))?;
    let report = state.validation.validate(&request.ticket_code, scanner).await?;
    Ok((status_for(report.outcome), Json(report)))
}

/// `POST /api/scans/confirm-payment`
///
/// Marks an unpaid ticket paid and admitted in one step.
///
/// # Errors
///
/// 401 without a session, 500 on storage faults.
pub async fn confirm_and_admit(
    State(state): State<AppState>,
    Authenticated(scanner): Authenticated,
    body: Result<Json<ConfirmScanRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ScanReport>), AppError> {
    let Json(request) = body.map_err(|e| AppError::invalid_body(&e))?;
    let report = state
        .validation
        .confirm_payment_and_validate(request.ticket_id, scanner)
        .await?;
    Ok((status_for(report.outcome), Json(report)))
}

const fn status_for(outcome: ScanOutcome) -> StatusCode {
    match outcome {
        ScanOutcome::NotFound => StatusCode::NOT_FOUND,
        ScanOutcome::Unauthorized => StatusCode::FORBIDDEN,
        _ => StatusCode::OK,
    }
}
