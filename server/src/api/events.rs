//! Organizer event and tier management.

use super::{AppError, Authenticated, EventView, TierView};
use crate::organizer::{CreateEvent, CreateTier};
use crate::server::AppState;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use gatepass_core::types::{CounterAudit, EventId, TierId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tier availability body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierActivation {
    /// Open (`true`) or close (`false`) the tier
    pub is_active: bool,
}

/// Stored counters next to a recount of live tickets.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResponse {
    /// Event
    pub event_id: EventId,
    /// `tickets_issued` as stored
    pub recorded_issued: u32,
    /// Live tickets counted
    pub actual_issued: u32,
    /// Per-tier figures
    pub tiers: Vec<TierAudit>,
    /// True when every counter matches its recount
    pub consistent: bool,
}

/// Per-tier audit figures.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierAudit {
    /// Tier
    pub tier_id: TierId,
    /// `tickets_sold` as stored
    pub recorded_sold: u32,
    /// Live tickets counted
    pub actual_sold: u32,
}

impl From<&CounterAudit> for AuditResponse {
    fn from(audit: &CounterAudit) -> Self {
        Self {
            event_id: audit.event_id,
            recorded_issued: audit.recorded_issued,
            actual_issued: audit.actual_issued,
            tiers: audit
                .tiers
                .iter()
                .map(|tier| TierAudit {
                    tier_id: tier.tier_id,
                    recorded_sold: tier.recorded_sold,
                    actual_sold: tier.actual_sold,
                })
                .collect(),
            consistent: audit.is_consistent(),
        }
    }
}

/// `POST /api/events`
///
/// # Errors
///
/// 400 for invalid input, 401 without a session.
pub async fn create_event(
    State(state): State<AppState>,
    Authenticated(owner): Authenticated,
    body: Result<Json<CreateEvent>, JsonRejection>,
) -> Result<(StatusCode, Json<EventView>), AppError> {
    let Json(body) = body.map_err(|e| AppError::invalid_body(&e))?;
    let event = state.admin.create_event(owner, body).await?;
    Ok((StatusCode::CREATED, Json(EventView::new(&event, &[]))))
}

/// `GET /api/events/:id`
///
/// # Errors
///
/// 403 for non-owners, 404 for unknown events.
pub async fn get_event(
    State(state): State<AppState>,
    Authenticated(owner): Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<EventView>, AppError> {
    let (event, tiers) = state.admin.event(owner, EventId::from_uuid(id)).await?;
    Ok(Json(EventView::new(&event, &tiers)))
}

/// `POST /api/events/:id/tiers`
///
/// # Errors
///
/// 400 for invalid input, 403 for non-owners, 404 for unknown events.
pub async fn create_tier(
    State(state): State<AppState>,
    Authenticated(owner): Authenticated,
    Path(id): Path<Uuid>,
    body: Result<Json<CreateTier>, JsonRejection>,
) -> Result<(StatusCode, Json<TierView>), AppError> {
    let Json(body) = body.map_err(|e| AppError::invalid_body(&e))?;
    let tier = state
        .admin
        .create_tier(owner, EventId::from_uuid(id), body)
        .await?;
    Ok((StatusCode::CREATED, Json(TierView::from(&tier))))
}

/// `POST /api/events/:id/tiers/:tier_id/active`
///
/// # Errors
///
/// 403 for non-owners, 404 for unknown events or tiers.
pub async fn set_tier_active(
    State(state): State<AppState>,
    Authenticated(owner): Authenticated,
    Path((id, tier_id)): Path<(Uuid, Uuid)>,
    body: Result<Json<TierActivation>, JsonRejection>,
) -> Result<Json<TierView>, AppError> {
    let Json(body) = body.map_err(|e| AppError::invalid_body(&e))?;
    let tier = state
        .admin
        .set_tier_active(
            owner,
            EventId::from_uuid(id),
            TierId::from_uuid(tier_id),
            body.is_active,
        )
        .await?;
    Ok(Json(TierView::from(&tier)))
}

/// `GET /api/events/:id/audit`
///
/// # Errors
///
/// 403 for non-owners, 404 for unknown events.
pub async fn audit_counters(
    State(state): State<AppState>,
    Authenticated(owner): Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditResponse>, AppError> {
    let audit = state.admin.audit(owner, EventId::from_uuid(id)).await?;
    Ok(Json(AuditResponse::from(&audit)))
}
