//! Payment gateway orders for paid tickets.
//!
//! The client asks for an order against a pending ticket; the server checks the
//! amount against the ticket's tier and the configured ceiling, creates the
//! order with the gateway, records the gateway order id as the ticket's payment
//! reference, and hands back only the public key. Capture is confirmed later
//! through the payment lifecycle.

use crate::metrics;
use gatepass_core::environment::Clock;
use gatepass_core::error::StoreError;
use gatepass_core::payment::PaymentStatus;
use gatepass_core::store::TicketStore;
use gatepass_core::types::{EventId, Money, TicketId};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from a payment gateway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Network failure or timeout talking to the gateway.
    #[error("gateway unreachable: {0}")]
    Transport(String),

    /// The gateway refused the order.
    #[error("gateway rejected the order ({status}): {message}")]
    Rejected {
        /// HTTP status returned
        status: u16,
        /// Gateway message
        message: String,
    },

    /// The gateway answered with something we could not read.
    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Whether the same order may succeed later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
            Self::InvalidResponse(_) => false,
        }
    }
}

/// Order request sent to a gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    /// Amount in minor units
    pub amount: Money,
    /// ISO currency code
    pub currency: String,
    /// Our reference for the order (the ticket id)
    pub receipt: String,
}

/// Order created by a gateway.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GatewayOrder {
    /// Gateway order id
    pub id: String,
    /// Amount in minor units
    pub amount: i64,
    /// Currency
    pub currency: String,
}

/// Abstraction over payment processors.
pub trait PaymentGateway: Send + Sync {
    /// Create an order for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the gateway cannot create the order.
    fn create_order<'a>(
        &'a self,
        request: &'a OrderRequest,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayOrder, GatewayError>> + Send + 'a>>;

    /// Public key for the client-side payment widget.
    fn key_id(&self) -> &str;
}

/// Gateway that accepts every order (development and tests).
#[derive(Clone, Debug)]
pub struct MockPaymentGateway {
    key_id: String,
}

impl MockPaymentGateway {
    /// Creates a mock gateway advertising `key_id`.
    #[must_use]
    pub fn new(key_id: impl Into<String>) -> Self {
        Self { key_id: key_id.into() }
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new("rzp_test_mock")
    }
}

impl PaymentGateway for MockPaymentGateway {
    fn create_order<'a>(
        &'a self,
        request: &'a OrderRequest,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayOrder, GatewayError>> + Send + 'a>> {
        Box::pin(async move {
            let id = format!("order_mock_{}", uuid::Uuid::new_v4().simple());
            info!(order_id = %id, amount = request.amount.minor(), "Mock order created");
            Ok(GatewayOrder {
                id,
                amount: request.amount.minor(),
                currency: request.currency.clone(),
            })
        })
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}

/// Razorpay orders API over HTTPS with basic auth.
#[derive(Clone)]
pub struct RazorpayGateway {
    client: reqwest::Client,
    api_base: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    /// Create a client for `api_base` (e.g. `https://api.razorpay.com`).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        api_base: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.into(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        })
    }
}

impl std::fmt::Debug for RazorpayGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayGateway")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .field("key_secret", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl PaymentGateway for RazorpayGateway {
    fn create_order<'a>(
        &'a self,
        request: &'a OrderRequest,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayOrder, GatewayError>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/v1/orders", self.api_base.trim_end_matches('/'));
            let response = self
                .client
                .post(url)
                .basic_auth(&self.key_id, Some(&self.key_secret))
                .json(request)
                .send()
                .await
                .map_err(|e| GatewayError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(GatewayError::Rejected {
                    status: status.as_u16(),
                    message,
                });
            }
            response
                .json::<GatewayOrder>()
                .await
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
        })
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}

/// Client request for an order.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    /// Amount in minor units
    pub amount: i64,
    /// ISO currency code
    pub currency: String,
    /// Event the ticket belongs to
    pub event_id: EventId,
    /// Ticket being paid for
    pub ticket_id: TicketId,
}

/// Order handle returned to the client. Never carries the gateway secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderHandle {
    /// Gateway order id
    pub order_id: String,
    /// Amount in minor units
    pub amount: i64,
    /// Currency
    pub currency: String,
    /// Public key for the payment widget
    pub key_id: String,
}

/// Failure creating an order.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentOrderError {
    /// Amount is not positive or exceeds the ceiling.
    #[error("amount must be between 1 and {max} minor units")]
    InvalidAmount {
        /// Configured ceiling
        max: i64,
    },

    /// Amount differs from the ticket's price.
    #[error("amount does not match the ticket price")]
    AmountMismatch,

    /// Currency differs from the event's.
    #[error("currency does not match the event")]
    CurrencyMismatch,

    /// No such ticket.
    #[error("ticket not found")]
    TicketNotFound,

    /// The ticket belongs to another event.
    #[error("ticket does not belong to this event")]
    TicketMismatch,

    /// Only pending tickets can be paid online.
    #[error("ticket is {status} and cannot be paid online")]
    NotPayable {
        /// Effective status of the ticket
        status: PaymentStatus,
    },

    /// Gateway failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Upstream storage fault.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl PaymentOrderError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::AmountMismatch => "amount_mismatch",
            Self::CurrencyMismatch => "currency_mismatch",
            Self::TicketNotFound => "ticket_not_found",
            Self::TicketMismatch => "ticket_mismatch",
            Self::NotPayable { .. } => "not_payable",
            Self::Gateway(_) => "gateway_error",
            Self::Storage(_) => "server_error",
        }
    }

    /// Whether the same request may succeed later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Gateway(e) => e.is_retryable(),
            Self::Storage(_) => true,
            _ => false,
        }
    }
}

/// Creates gateway orders for pending tickets.
#[derive(Clone)]
pub struct PaymentOrders {
    store: Arc<dyn TicketStore>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    max_amount: i64,
}

impl PaymentOrders {
    /// Create the service with an amount ceiling in minor units.
    #[must_use]
    pub fn new(
        store: Arc<dyn TicketStore>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        max_amount: i64,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            max_amount,
        }
    }

    /// Create an order for `request`.
    ///
    /// # Errors
    ///
    /// Any [`PaymentOrderError`].
    pub async fn create(&self, request: &CreateOrder) -> Result<OrderHandle, PaymentOrderError> {
        let result = self.create_inner(request).await;
        metrics::record_payment_order(match &result {
            Ok(_) => "created",
            Err(e) => e.code(),
        });
        result
    }

    async fn create_inner(&self, request: &CreateOrder) -> Result<OrderHandle, PaymentOrderError> {
        if request.amount <= 0 || request.amount > self.max_amount {
            return Err(PaymentOrderError::InvalidAmount { max: self.max_amount });
        }

        let record = self
            .store
            .find_by_id(request.ticket_id)
            .await?
            .ok_or(PaymentOrderError::TicketNotFound)?;
        if record.ticket.event_id != request.event_id {
            return Err(PaymentOrderError::TicketMismatch);
        }
        if !record.event.currency.eq_ignore_ascii_case(request.currency.trim()) {
            return Err(PaymentOrderError::CurrencyMismatch);
        }
        if let Some(tier) = &record.tier {
            if tier.price.minor() != request.amount {
                return Err(PaymentOrderError::AmountMismatch);
            }
        }
        let status = record.ticket.effective_status(self.clock.now());
        if status != PaymentStatus::Pending {
            return Err(PaymentOrderError::NotPayable { status });
        }

        let order = self
            .gateway
            .create_order(&OrderRequest {
                amount: Money::from_minor(request.amount),
                currency: record.event.currency.clone(),
                receipt: request.ticket_id.to_string(),
            })
            .await
            .inspect_err(|e| {
                warn!(ticket_id = %request.ticket_id, error = %e, "Gateway order failed");
            })?;

        let reference = self
            .store
            .record_payment_reference(request.ticket_id, order.id.clone())
            .await?;
        if !reference.is_applied() {
            warn!(
                ticket_id = %request.ticket_id,
                order_id = %order.id,
                "Ticket left pending before the order was recorded"
            );
        }

        info!(ticket_id = %request.ticket_id, order_id = %order.id, "Payment order created");
        Ok(OrderHandle {
            order_id: order.id,
            amount: order.amount,
            currency: order.currency,
            key_id: self.gateway.key_id().to_string(),
        })
    }
}

impl std::fmt::Debug for PaymentOrders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentOrders")
            .field("max_amount", &self.max_amount)
            .finish_non_exhaustive()
    }
}
