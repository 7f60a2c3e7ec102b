//! Eligibility rules for a new claim.
//!
//! [`EligibilitySnapshot::evaluate`] is the single definition of the rules.
//! Stores call it on a snapshot taken *inside* the same atomic unit that
//! inserts the ticket, so the answer cannot go stale between check and write.

use crate::error::ClaimError;
use serde::{Deserialize, Serialize};

/// Tier counters at evaluation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounters {
    /// Tier capacity (`None` = unlimited)
    pub capacity: Option<u32>,
    /// Non-cancelled tickets sold
    pub sold: u32,
    /// Whether the tier accepts claims
    pub is_active: bool,
}

/// Everything the rules need to know about an event, tier and phone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilitySnapshot {
    /// Event capacity (`None` = unlimited)
    pub event_capacity: Option<u32>,
    /// Non-cancelled tickets issued for the event
    pub event_issued: u32,
    /// Tier counters when the claim names a tier
    pub tier: Option<TierCounters>,
    /// A non-cancelled ticket already exists for `(event, phone)`
    pub duplicate: bool,
}

/// Outcome of the rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    /// The claim may proceed
    Eligible,
    /// Event capacity reached
    SoldOut,
    /// Tier no longer accepts claims
    TierInactive,
    /// Tier capacity reached
    TierSoldOut,
    /// A live ticket already exists for this phone
    DuplicateIdentity,
}

const fn at_capacity(capacity: Option<u32>, used: u32) -> bool {
    match capacity {
        Some(capacity) => used >= capacity,
        None => false,
    }
}

impl EligibilitySnapshot {
    /// Evaluates the rules, short-circuiting on the first failure.
    ///
    /// Order: event capacity, tier state, tier capacity, duplicate identity.
    #[must_use]
    pub const fn evaluate(&self) -> Eligibility {
        if at_capacity(self.event_capacity, self.event_issued) {
            return Eligibility::SoldOut;
        }
        if let Some(tier) = self.tier {
            if !tier.is_active {
                return Eligibility::TierInactive;
            }
            if at_capacity(tier.capacity, tier.sold) {
                return Eligibility::TierSoldOut;
            }
        }
        if self.duplicate {
            return Eligibility::DuplicateIdentity;
        }
        Eligibility::Eligible
    }
}

impl Eligibility {
    /// True for [`Eligibility::Eligible`].
    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }

    /// The claim error for a rejection, `None` when eligible.
    #[must_use]
    pub fn rejection(&self) -> Option<ClaimError> {
        match self {
            Self::Eligible => None,
            Self::SoldOut => Some(ClaimError::SoldOut),
            Self::TierInactive => Some(ClaimError::TierUnavailable),
            Self::TierSoldOut => Some(ClaimError::TierSoldOut),
            Self::DuplicateIdentity => Some(ClaimError::DuplicateIdentity),
        }
    }
}
