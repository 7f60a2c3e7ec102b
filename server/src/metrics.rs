//! Business metrics for gatepass.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `gatepass_claims_total{outcome}` - Claims by outcome (`issued` or an error code)
//! - `gatepass_scans_total{outcome}` - Scans by outcome
//! - `gatepass_notifications_total{status}` - Notification deliveries
//! - `gatepass_code_collisions_total` - Ticket code collisions retried
//! - `gatepass_tickets_expired_total{source}` - Expiries persisted, by reader
//! - `gatepass_payment_orders_total{status}` - Gateway orders
//! - `gatepass_store_unique_violations_total{constraint}` - Recorded by the store
//!
//! ## Histograms
//! - `gatepass_claim_duration_seconds` - Claim handling time

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Install the Prometheus recorder and register metric descriptions.
///
/// # Errors
///
/// Returns [`MetricsError`] if the recorder cannot be built or installed.
pub fn install_recorder() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )
        .map_err(|e| MetricsError::Build(e.to_string()))?
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;
    register_business_metrics();
    Ok(handle)
}

/// Register all business metric descriptions.
pub fn register_business_metrics() {
    describe_counter!("gatepass_claims_total", "Ticket claims by outcome");
    describe_histogram!(
        "gatepass_claim_duration_seconds",
        "Time taken to handle a ticket claim"
    );
    describe_counter!("gatepass_scans_total", "Door scans by outcome");
    describe_counter!(
        "gatepass_notifications_total",
        "Ticket notifications by delivery status (sent, failed, dropped)"
    );
    describe_counter!(
        "gatepass_code_collisions_total",
        "Ticket code collisions that triggered a regenerate-and-retry"
    );
    describe_counter!(
        "gatepass_tickets_expired_total",
        "Unpaid tickets persisted as expired, by the reader that did it"
    );
    describe_counter!(
        "gatepass_payment_orders_total",
        "Payment gateway orders by status"
    );
    describe_counter!(
        "gatepass_store_unique_violations_total",
        "Unique constraint violations reported by the ticket store"
    );
    tracing::info!("Business metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record a finished claim.
///
/// # Arguments
///
/// * `outcome` - `issued` or the claim error code
/// * `elapsed` - Time spent handling the claim
pub fn record_claim(outcome: &'static str, elapsed: Duration) {
    metrics::counter!("gatepass_claims_total", "outcome" => outcome).increment(1);
    metrics::histogram!("gatepass_claim_duration_seconds").record(elapsed.as_secs_f64());
}

/// Record a scan outcome.
pub fn record_scan(outcome: &'static str) {
    metrics::counter!("gatepass_scans_total", "outcome" => outcome).increment(1);
}

/// Record a notification delivery status (`sent`, `failed`, `dropped`).
pub fn record_notification(status: &'static str) {
    metrics::counter!("gatepass_notifications_total", "status" => status).increment(1);
}

/// Record a ticket code collision.
pub fn record_code_collision() {
    metrics::counter!("gatepass_code_collisions_total").increment(1);
}

/// Record persisted expiries.
///
/// # Arguments
///
/// * `source` - `scan`, `view`, `lifecycle` or `sweep`
/// * `count` - Number of tickets expired
pub fn record_expired(source: &'static str, count: u64) {
    if count > 0 {
        metrics::counter!("gatepass_tickets_expired_total", "source" => source).increment(count);
    }
}

/// Record a payment order status (`created` or an error code).
pub fn record_payment_order(status: &'static str) {
    metrics::counter!("gatepass_payment_orders_total", "status" => status).increment(1);
}
