//! Goal allocator
//!
//! Distributes an owner's surplus across savings goals. Every run starts
//! from scratch: the pool is the unassigned balance plus everything already
//! sitting in goals, each goal is reset, and goals are refilled in funding
//! order (deadline, priority, age, id). Whatever is left goes back to the
//! surplus tracker. Running twice on unchanged data changes nothing.

use crate::clock::Clock;
use crate::error::LedgerResult;
use crate::models::{GoalId, Money, OwnerId, SavingsGoal, SurplusTracker};
use crate::notify::{Notice, NotificationSink};
use crate::storage::{LedgerStore, OwnerGuard, Storage};

use super::solvency::SolvencyGuard;

/// One goal's share of the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoalAllocation {
    pub goal_id: GoalId,
    pub amount: Money,
}

/// Result of planning a run, before anything is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    /// In funding order
    pub allocations: Vec<GoalAllocation>,
    /// Pool left after every goal is served; negative if the pool was short
    pub remainder: Money,
    pub notices: Vec<Notice>,
}

impl AllocationPlan {
    pub fn amount_for(&self, goal_id: GoalId) -> Option<Money> {
        self.allocations
            .iter()
            .find(|a| a.goal_id == goal_id)
            .map(|a| a.amount)
    }
}

/// What a completed run wrote
#[derive(Debug, Clone)]
pub struct AllocationOutcome {
    pub owner: OwnerId,
    pub goals: Vec<SavingsGoal>,
    pub tracker: SurplusTracker,
    /// Closed-period surplus folded into the pool by this run
    pub synced: Money,
}

pub struct GoalAllocator<'a, S: LedgerStore + ?Sized = Storage> {
    store: &'a S,
    clock: &'a dyn Clock,
    sink: &'a dyn NotificationSink,
}

impl<'a, S: LedgerStore + ?Sized> GoalAllocator<'a, S> {
    pub fn new(store: &'a S, clock: &'a dyn Clock, sink: &'a dyn NotificationSink) -> Self {
        Self { store, clock, sink }
    }

    /// Plan a run over `goals` with `accumulated_balance` unassigned
    pub fn plan(goals: &[SavingsGoal], accumulated_balance: Money) -> AllocationPlan {
        let already_allocated: Money = goals.iter().map(|g| g.current_amount).sum();
        let mut remaining = accumulated_balance + already_allocated;

        let mut ordered: Vec<&SavingsGoal> = goals.iter().collect();
        ordered.sort_by(|a, b| a.allocation_order(b));

        let mut allocations = Vec::with_capacity(ordered.len());
        let mut notices = Vec::new();
        for goal in ordered {
            let amount = remaining.max_zero().min(goal.target_amount);
            remaining -= amount;

            if amount >= goal.target_amount && !goal.is_completed() {
                notices.push(Notice::info(format!(
                    "Savings goal '{}' is fully funded",
                    goal.name
                )));
            }
            allocations.push(GoalAllocation {
                goal_id: goal.id,
                amount,
            });
        }

        if remaining.is_negative() {
            notices.push(Notice::warning(format!(
                "Surplus is short by {}; the shortfall is carried forward",
                -remaining
            )));
        }

        AllocationPlan {
            allocations,
            remainder: remaining,
            notices,
        }
    }

    /// Run for `owner` as its own unit of work
    pub fn run(&self, owner: OwnerId) -> LedgerResult<AllocationOutcome> {
        let guard = self.store.lock_owner(owner)?;
        self.run_locked(&guard)
    }

    /// Run while the caller already holds the owner's guard
    pub fn run_locked(&self, guard: &OwnerGuard<'_>) -> LedgerResult<AllocationOutcome> {
        let owner = guard.owner();
        let today = self.clock.today();

        let original = self.store.get_surplus_tracker(owner)?;
        let mut tracker = original.clone();
        let closed = SolvencyGuard::closed_period_surplus(self.store, owner, today)?;
        let synced = tracker.sync(closed);

        let goals = self.store.list_goals(owner)?;
        let plan = Self::plan(&goals, tracker.accumulated_balance);

        for allocation in &plan.allocations {
            self.store
                .upsert_goal_amount(allocation.goal_id, allocation.amount)?;
        }

        tracker.accumulated_balance = plan.remainder;
        tracker.last_run = Some(today);
        if tracker != original {
            tracker.touch();
            self.store.set_surplus_tracker(&tracker)?;
        }
        self.store.commit()?;

        tracing::debug!(
            owner = %owner,
            goals = goals.len(),
            synced = %synced,
            remainder = %plan.remainder,
            "allocation run complete"
        );
        for notice in &plan.notices {
            self.sink.deliver(notice);
        }

        Ok(AllocationOutcome {
            owner,
            goals: self.store.list_goals(owner)?,
            tracker,
            synced,
        })
    }

    /// Return money taken out of goals to the unassigned pool
    ///
    /// The caller removes `amount` from its goals in the same unit, so the
    /// pool the next run sees is unchanged. Nothing is committed here.
    pub fn release_locked(&self, guard: &OwnerGuard<'_>, amount: Money) -> LedgerResult<SurplusTracker> {
        let mut tracker = self.store.get_surplus_tracker(guard.owner())?;
        if amount.is_zero() {
            return Ok(tracker);
        }
        tracker.refund(amount);
        tracker.touch();
        self.store.set_surplus_tracker(&tracker)?;

        tracing::debug!(owner = %guard.owner(), amount = %amount, "goal money released to pool");
        Ok(tracker)
    }
}
