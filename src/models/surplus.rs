//! Per-owner surplus tracker
//!
//! Holds surplus carried from prior periods that no goal has claimed yet,
//! plus the closed-period ledger surplus it was last reconciled against.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::OwnerId;
use super::money::Money;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurplusTracker {
    pub owner_id: OwnerId,
    /// Surplus not assigned to any goal; may go negative if closed-period
    /// income is later removed, and is carried forward as a debt
    pub accumulated_balance: Money,
    /// Closed-period `income - expense` already folded into the pool
    #[serde(default)]
    pub synced_surplus: Money,
    /// Date of the most recent allocator run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl SurplusTracker {
    pub fn new(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            accumulated_balance: Money::zero(),
            synced_surplus: Money::zero(),
            last_run: None,
            updated_at: Utc::now(),
        }
    }

    /// Fold a new closed-period surplus into the pool, returning the delta
    pub fn sync(&mut self, closed_surplus: Money) -> Money {
        let delta = closed_surplus - self.synced_surplus;
        self.accumulated_balance += delta;
        self.synced_surplus = closed_surplus;
        delta
    }

    pub fn refund(&mut self, amount: Money) {
        self.accumulated_balance += amount;
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
