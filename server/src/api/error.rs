//! HTTP error mapping.
//!
//! Every service error becomes an [`AppError`] with a stable code, a
//! human-readable message and a `retryable` hint, so clients can tell "try
//! again" apart from "this will never work as submitted".

use crate::organizer::AdminError;
use crate::payments::PaymentOrderError;
use crate::validation::ScanError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use gatepass_core::error::{ClaimError, LifecycleError, StoreError, TransitionError};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Application error returned by handlers.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    retryable: bool,
    retry_after: Option<Duration>,
}

impl AppError {
    /// Create an error.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retryable: false,
            retry_after: None,
        }
    }

    /// Mark the error as retryable.
    #[must_use]
    pub const fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// 401 for missing or unknown bearer tokens.
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", "a valid session is required")
    }

    /// 400 for request bodies that are not the expected JSON.
    #[must_use]
    pub fn invalid_body(rejection: &JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
    }

    /// 500 for storage faults.
    #[must_use]
    pub fn storage(error: &StoreError) -> Self {
        tracing::error!(error = %error, "Storage failure");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "something went wrong, please try again",
        )
        .retryable()
    }

    /// HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Stable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                code = self.code,
                message = %self.message,
                "Request failed"
            );
        }

        let mut response = (
            self.status,
            Json(ErrorResponse {
                code: self.code,
                message: self.message,
                retryable: self.retryable,
            }),
        )
            .into_response();

        if let Some(retry_after) = self.retry_after {
            let secs = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<ClaimError> for AppError {
    fn from(error: ClaimError) -> Self {
        let status = match &error {
            ClaimError::Validation(_) | ClaimError::TierUnavailable => StatusCode::BAD_REQUEST,
            ClaimError::EventNotFound => StatusCode::NOT_FOUND,
            ClaimError::SoldOut | ClaimError::TierSoldOut | ClaimError::DuplicateIdentity => {
                StatusCode::CONFLICT
            }
            ClaimError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ClaimError::CodeGenerationExhausted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ClaimError::Storage(e) => return Self::storage(e),
        };
        let retry_after = match &error {
            ClaimError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };
        Self {
            status,
            code: error.code(),
            message: error.to_string(),
            retryable: error.is_retryable(),
            retry_after,
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(error: LifecycleError) -> Self {
        let status = match &error {
            LifecycleError::NotFound => StatusCode::NOT_FOUND,
            LifecycleError::Unauthorized => StatusCode::FORBIDDEN,
            LifecycleError::Transition(TransitionError::WindowElapsed) => StatusCode::GONE,
            LifecycleError::Transition(_) => StatusCode::CONFLICT,
            LifecycleError::Storage(e) => return Self::storage(e),
        };
        Self::new(status, error.code(), error.to_string())
    }
}

impl From<ScanError> for AppError {
    fn from(error: ScanError) -> Self {
        match &error {
            ScanError::MalformedCode(_) => {
                Self::new(StatusCode::BAD_REQUEST, error.code(), error.to_string())
            }
            ScanError::Storage(e) => Self::storage(e),
        }
    }
}

impl From<PaymentOrderError> for AppError {
    fn from(error: PaymentOrderError) -> Self {
        let status = match &error {
            PaymentOrderError::InvalidAmount { .. }
            | PaymentOrderError::AmountMismatch
            | PaymentOrderError::CurrencyMismatch
            | PaymentOrderError::TicketMismatch => StatusCode::BAD_REQUEST,
            PaymentOrderError::TicketNotFound => StatusCode::NOT_FOUND,
            PaymentOrderError::NotPayable { .. } => StatusCode::CONFLICT,
            PaymentOrderError::Gateway(_) => StatusCode::BAD_GATEWAY,
            PaymentOrderError::Storage(e) => return Self::storage(e),
        };
        let app = Self::new(status, error.code(), error.to_string());
        if error.is_retryable() { app.retryable() } else { app }
    }
}

impl From<AdminError> for AppError {
    fn from(error: AdminError) -> Self {
        let status = match &error {
            AdminError::Validation(_) => StatusCode::BAD_REQUEST,
            AdminError::EventNotFound | AdminError::TierNotFound => StatusCode::NOT_FOUND,
            AdminError::Unauthorized => StatusCode::FORBIDDEN,
            AdminError::Storage(e) => return Self::storage(e),
        };
        Self::new(status, error.code(), error.to_string())
    }
}
