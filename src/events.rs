//! Domain events
//!
//! Mutating services return the events they produced instead of relying on
//! save/delete hooks. [`dispatch`] turns a batch of events into exactly one
//! allocator run per affected owner.

use std::fmt;

use crate::error::LedgerResult;
use crate::models::{GoalId, OwnerId, Transaction};
use crate::services::allocator::{AllocationOutcome, GoalAllocator};
use crate::storage::LedgerStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Change {
    Created,
    Updated,
    Deleted,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainEvent {
    IncomeRecorded {
        owner: OwnerId,
        change: Change,
    },
    ExpenseRecorded {
        owner: OwnerId,
        change: Change,
    },
    GoalChanged {
        owner: OwnerId,
        goal: GoalId,
        change: Change,
    },
}

impl DomainEvent {
    pub fn owner(&self) -> OwnerId {
        match self {
            Self::IncomeRecorded { owner, .. }
            | Self::ExpenseRecorded { owner, .. }
            | Self::GoalChanged { owner, .. } => *owner,
        }
    }

    pub fn change(&self) -> Change {
        match self {
            Self::IncomeRecorded { change, .. }
            | Self::ExpenseRecorded { change, .. }
            | Self::GoalChanged { change, .. } => *change,
        }
    }

    /// The event for a change to `txn`
    pub fn for_transaction(txn: &Transaction, change: Change) -> Self {
        let owner = txn.owner_id;
        if txn.is_income() {
            Self::IncomeRecorded { owner, change }
        } else {
            Self::ExpenseRecorded { owner, change }
        }
    }
}

impl fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncomeRecorded { change, .. } => write!(f, "income {}", change),
            Self::ExpenseRecorded { change, .. } => write!(f, "expense {}", change),
            Self::GoalChanged { goal, change, .. } => write!(f, "goal {} {}", goal, change),
        }
    }
}

/// Owners touched by `events`, in first-seen order
pub fn affected_owners(events: &[DomainEvent]) -> Vec<OwnerId> {
    let mut owners: Vec<OwnerId> = Vec::new();
    for event in events {
        let owner = event.owner();
        if !owners.contains(&owner) {
            owners.push(owner);
        }
    }
    owners
}

/// Re-run the allocator once for every owner touched by `events`
///
/// Must not be called while holding any of those owners' guards.
pub fn dispatch<S: LedgerStore + ?Sized>(
    allocator: &GoalAllocator<'_, S>,
    events: &[DomainEvent],
) -> LedgerResult<Vec<AllocationOutcome>> {
    affected_owners(events)
        .into_iter()
        .map(|owner| {
            tracing::debug!(owner = %owner, events = events.len(), "dispatching allocation");
            allocator.run(owner)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affected_owners_dedups_in_order() {
        let a = OwnerId::new();
        let b = OwnerId::new();
        let events = [
            DomainEvent::ExpenseRecorded {
                owner: b,
                change: Change::Created,
            },
            DomainEvent::IncomeRecorded {
                owner: a,
                change: Change::Deleted,
            },
            DomainEvent::GoalChanged {
                owner: b,
                goal: GoalId::new(),
                change: Change::Updated,
            },
        ];
        assert_eq!(affected_owners(&events), vec![b, a]);
    }

    #[test]
    fn test_no_events_no_owners() {
        assert!(affected_owners(&[]).is_empty());
    }
}
