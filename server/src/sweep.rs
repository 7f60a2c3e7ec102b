//! Optional background expiry sweep.
//!
//! Persists `expired` for unpaid tickets past the booking window and prunes old
//! claim attempts. Every read path already applies expiry lazily, so the sweep
//! only saves those readers a write.

use crate::metrics;
use gatepass_core::environment::Clock;
use gatepass_core::error::StoreError;
use gatepass_core::store::{ClaimLog, TicketStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Claim attempts older than this are pruned.
const CLAIM_LOG_RETENTION_HOURS: i64 = 1;

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Tickets moved to `expired`
    pub expired: u64,
    /// Claim attempts deleted
    pub pruned: u64,
}

/// Periodic expiry reconciliation.
#[derive(Clone)]
pub struct ExpirySweep {
    store: Arc<dyn TicketStore>,
    claims: Arc<dyn ClaimLog>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    batch: u32,
}

impl ExpirySweep {
    /// Configure a sweep that expires at most `batch` tickets per store call.
    #[must_use]
    pub fn new(
        store: Arc<dyn TicketStore>,
        claims: Arc<dyn ClaimLog>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        batch: u32,
    ) -> Self {
        Self {
            store,
            claims,
            clock,
            interval,
            batch: batch.max(1),
        }
    }

    /// Run one pass, draining stale tickets batch by batch.
    ///
    /// # Errors
    ///
    /// Returns the first [`StoreError`]; work done before it is kept.
    pub async fn run_once(&self) -> Result<SweepReport, StoreError> {
        let now = self.clock.now();
        let mut report = SweepReport::default();
        loop {
            let expired = self.store.expire_stale(now, self.batch).await?;
            report.expired += expired;
            if expired < u64::from(self.batch) {
                break;
            }
        }
        report.pruned = self
            .claims
            .prune(now - chrono::Duration::hours(CLAIM_LOG_RETENTION_HOURS))
            .await?;
        metrics::record_expired("sweep", report.expired);
        Ok(report)
    }

    /// Run passes every interval until `shutdown` fires.
    #[must_use]
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "Expiry sweep started");
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = ticker.tick() => match self.run_once().await {
                        Ok(report) => debug!(
                            expired = report.expired,
                            pruned = report.pruned,
                            "Expiry sweep pass"
                        ),
                        Err(e) => error!(error = %e, "Expiry sweep pass failed"),
                    },
                }
            }
            info!("Expiry sweep stopped");
        })
    }
}

impl std::fmt::Debug for ExpirySweep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpirySweep")
            .field("interval", &self.interval)
            .field("batch", &self.batch)
            .finish_non_exhaustive()
    }
}
