//! Ticket confirmation delivery.
//!
//! The issuer hands each confirmation to a [`NotificationQueue`] and returns
//! immediately. A single worker spawned by [`NotificationDispatcher::spawn`]
//! drains the queue and delivers through a [`NotificationSender`], retrying
//! transport failures with exponential backoff. Nothing on this path can fail
//! or delay a claim.
//!
//! # Senders
//!
//! - [`ConsoleNotifier`]: logs the message (development, or no provider configured)
//! - [`WebhookNotifier`]: POSTs the message as JSON to a delivery service

use crate::metrics;
use crate::retry::{RetryPolicy, retry_with_predicate};
use gatepass_core::notify::{NotificationError, NotificationSender, TicketNotification};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Sender that writes confirmations to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl NotificationSender for ConsoleNotifier {
    fn send<'a>(
        &'a self,
        notification: &'a TicketNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotificationError>> + Send + 'a>> {
        Box::pin(async move {
            info!(
                ticket_id = %notification.ticket_id,
                ticket_code = %notification.ticket_code,
                event_title = %notification.event_title,
                has_email = notification.attendee_email.is_some(),
                ticket_url = %notification.ticket_url,
                "Ticket confirmation (console)"
            );
            Ok(())
        })
    }
}

/// Sender that POSTs confirmations to an HTTP delivery service.
///
/// 2xx is success, 4xx is a rejection (not retried), anything else is a
/// transport failure.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a notifier for `url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError::Transport`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl NotificationSender for WebhookNotifier {
    fn send<'a>(
        &'a self,
        notification: &'a TicketNotification,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotificationError>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.url)
                .json(notification)
                .send()
                .await
                .map_err(|e| NotificationError::Transport(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                Ok(())
            } else if status.is_client_error() {
                Err(NotificationError::Rejected(format!("webhook answered {status}")))
            } else {
                Err(NotificationError::Transport(format!("webhook answered {status}")))
            }
        })
    }
}

/// Producer handle for the notification queue.
///
/// Cheap to clone. The worker stops once every handle has been dropped and
/// the queue is drained.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<TicketNotification>,
}

impl NotificationQueue {
    /// Queue a confirmation without waiting.
    ///
    /// A full or closed queue drops the message and logs it; the caller is
    /// never told.
    pub fn enqueue(&self, notification: TicketNotification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(dropped)) => {
                warn!(
                    ticket_id = %dropped.ticket_id,
                    "Notification queue full, dropping confirmation"
                );
                metrics::record_notification("dropped");
            }
            Err(TrySendError::Closed(dropped)) => {
                warn!(
                    ticket_id = %dropped.ticket_id,
                    "Notification worker stopped, dropping confirmation"
                );
                metrics::record_notification("dropped");
            }
        }
    }
}

/// Owns the delivery worker.
pub struct NotificationDispatcher {
    sender: Arc<dyn NotificationSender>,
    policy: RetryPolicy,
    capacity: usize,
}

impl NotificationDispatcher {
    /// Configure a dispatcher.
    ///
    /// `capacity` bounds the number of undelivered confirmations held in memory.
    #[must_use]
    pub fn new(sender: Arc<dyn NotificationSender>, policy: RetryPolicy, capacity: usize) -> Self {
        Self {
            sender,
            policy,
            capacity: capacity.max(1),
        }
    }

    /// Start the worker and return the queue that feeds it.
    #[must_use]
    pub fn spawn(self) -> (NotificationQueue, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<TicketNotification>(self.capacity);
        let Self { sender, policy, .. } = self;

        let handle = tokio::spawn(async move {
            info!("Notification dispatcher started");
            while let Some(notification) = rx.recv().await {
                deliver(sender.as_ref(), &policy, &notification).await;
            }
            info!("Notification dispatcher stopped");
        });

        (NotificationQueue { tx }, handle)
    }
}

async fn deliver(
    sender: &dyn NotificationSender,
    policy: &RetryPolicy,
    notification: &TicketNotification,
) {
    let result = retry_with_predicate(
        policy,
        || sender.send(notification),
        NotificationError::is_retryable,
    )
    .await;

    match result {
        Ok(()) => {
            debug!(ticket_id = %notification.ticket_id, "Ticket confirmation delivered");
            metrics::record_notification("sent");
        }
        Err(e) => {
            error!(
                ticket_id = %notification.ticket_id,
                error = %e,
                "Ticket confirmation could not be delivered"
            );
            metrics::record_notification("failed");
        }
    }
}
