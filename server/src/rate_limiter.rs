//! Sliding-window claim rate limiter.
//!
//! One admitted claim per `(event, origin)` per window. The check and the
//! record happen in one [`ClaimLog::admit`] call, so two simultaneous requests
//! from the same origin cannot both be admitted. This is an abuse guard only;
//! capacity and per-phone uniqueness are enforced by the store regardless.

use gatepass_core::environment::Clock;
use gatepass_core::error::ClaimError;
use gatepass_core::store::{ClaimLog, RateDecision};
use gatepass_core::types::EventId;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Rate limiter for the public claim endpoint.
#[derive(Clone)]
pub struct ClaimRateLimiter {
    log: Arc<dyn ClaimLog>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl ClaimRateLimiter {
    /// Create a limiter over `log` with the given window.
    #[must_use]
    pub fn new(log: Arc<dyn ClaimLog>, clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self { log, clock, window }
    }

    /// Window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Admit and record a claim attempt from `origin`.
    ///
    /// # Errors
    ///
    /// - [`ClaimError::RateLimited`] if `origin` claimed for this event within the window
    /// - [`ClaimError::Storage`] if the log is unavailable
    pub async fn admit(&self, event_id: EventId, origin: &str) -> Result<(), ClaimError> {
        match self
            .log
            .admit(event_id, origin, self.clock.now(), self.window)
            .await?
        {
            RateDecision::Allowed => Ok(()),
            RateDecision::Denied { retry_after } => {
                debug!(
                    %event_id,
                    origin,
                    retry_after_secs = retry_after.as_secs(),
                    "claim rate limited"
                );
                Err(ClaimError::RateLimited { retry_after })
            }
        }
    }
}

impl std::fmt::Debug for ClaimRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimRateLimiter")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gatepass_testing::{InMemoryClaimLog, ManualClock, test_epoch};

    fn limiter(clock: &ManualClock) -> ClaimRateLimiter {
        ClaimRateLimiter::new(
            Arc::new(InMemoryClaimLog::new()),
            Arc::new(clock.clone()),
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn second_claim_inside_window_is_denied() {
        let clock = ManualClock::new(test_epoch());
        let limiter = limiter(&clock);
        let event = EventId::new();

        limiter.admit(event, "203.0.113.1").await.unwrap();
        clock.advance(chrono::Duration::seconds(12));
        let denied = limiter.admit(event, "203.0.113.1").await.unwrap_err();
        assert_eq!(
            denied,
            ClaimError::RateLimited {
                retry_after: Duration::from_secs(18)
            }
        );
        assert!(denied.is_retryable());
    }

    #[tokio::test]
    async fn window_is_per_event_and_origin() {
        let clock = ManualClock::new(test_epoch());
        let limiter = limiter(&clock);
        let event = EventId::new();

        limiter.admit(event, "203.0.113.1").await.unwrap();
        limiter.admit(event, "203.0.113.2").await.unwrap();
        limiter.admit(EventId::new(), "203.0.113.1").await.unwrap();
    }

    #[tokio::test]
    async fn origin_is_admitted_again_after_the_window() {
        let clock = ManualClock::new(test_epoch());
        let limiter = limiter(&clock);
        let event = EventId::new();

        limiter.admit(event, "203.0.113.1").await.unwrap();
        clock.advance(chrono::Duration::seconds(31));
        limiter.admit(event, "203.0.113.1").await.unwrap();
    }

    #[tokio::test]
    async fn attempt_exactly_one_window_old_still_denies() {
        let clock = ManualClock::new(test_epoch());
        let limiter = limiter(&clock);
        let event = EventId::new();

        limiter.admit(event, "203.0.113.1").await.unwrap();
        clock.advance(chrono::Duration::seconds(30));
        assert_eq!(
            limiter.admit(event, "203.0.113.1").await.unwrap_err(),
            ClaimError::RateLimited {
                retry_after: Duration::from_secs(1)
            }
        );
    }
}
