//! Savings goal service
//!
//! Goals are funded only by the allocator. Anything that takes money out
//! of a goal outside an allocation run (deleting it, or shrinking its
//! target below what it holds) hands that money back through the
//! allocator first, so the pool the next run sees is unchanged.

use crate::error::{LedgerError, LedgerResult};
use crate::events::{Change, DomainEvent};
use crate::models::{GoalFilter, GoalId, Money, OwnerId, SavingsGoal};
use crate::notify::Severity;
use crate::storage::LedgerStore;
use crate::validation::GoalDraft;

use super::ServiceContext;

/// Service for savings goals
pub struct GoalService<'a> {
    ctx: ServiceContext<'a>,
}

impl<'a> GoalService<'a> {
    pub fn new(ctx: ServiceContext<'a>) -> Self {
        Self { ctx }
    }

    /// Create a goal and let the allocator fund it
    pub fn create(&self, owner: OwnerId, draft: GoalDraft) -> LedgerResult<SavingsGoal> {
        let goal = {
            let _guard = self.ctx.storage.lock_owner(owner)?;

            if self.ctx.storage.goals.find_by_name(owner, &draft.name)?.is_some() {
                return Err(LedgerError::invalid(
                    "name",
                    format!("a goal named '{}' already exists", draft.name),
                ));
            }

            let goal = SavingsGoal::new(
                owner,
                draft.name,
                draft.target_amount,
                draft.deadline,
                draft.priority,
            );
            goal.validate()
                .map_err(|e| LedgerError::invalid(e.field(), e.to_string()))?;

            self.ctx.storage.create_goal(goal.clone())?;
            self.ctx.storage.commit()?;
            goal
        };

        tracing::info!(owner = %owner, id = %goal.id, name = %goal.name, "goal created");
        self.ctx
            .sink
            .notify(Severity::Info, &format!("Savings goal '{}' created", goal.name));

        self.dispatch_and_reload(owner, goal.id, Change::Created)
    }

    pub fn get(&self, owner: OwnerId, id: GoalId) -> LedgerResult<SavingsGoal> {
        self.ctx
            .storage
            .goals
            .get(id)?
            .filter(|g| g.owner_id == owner)
            .ok_or_else(|| LedgerError::goal_not_found(id.to_string()))
    }

    /// Find a goal by ID string or name
    pub fn find(&self, owner: OwnerId, identifier: &str) -> LedgerResult<SavingsGoal> {
        if let Ok(id) = identifier.trim().parse::<GoalId>() {
            return self.get(owner, id);
        }
        self.ctx
            .storage
            .goals
            .find_by_name(owner, identifier.trim())?
            .ok_or_else(|| LedgerError::goal_not_found(identifier))
    }

    /// The owner's goals in funding order
    pub fn list(&self, owner: OwnerId, filter: GoalFilter) -> LedgerResult<Vec<SavingsGoal>> {
        let mut goals: Vec<SavingsGoal> = self
            .ctx
            .storage
            .list_goals(owner)?
            .into_iter()
            .filter(|g| filter.matches(g))
            .collect();
        goals.sort_by(|a, b| a.allocation_order(b));
        Ok(goals)
    }

    /// Change a goal's name, target, deadline or priority
    pub fn update(&self, owner: OwnerId, id: GoalId, draft: GoalDraft) -> LedgerResult<SavingsGoal> {
        {
            let guard = self.ctx.storage.lock_owner(owner)?;
            let before = self.get(owner, id)?;

            if let Some(other) = self.ctx.storage.goals.find_by_name(owner, &draft.name)? {
                if other.id != id {
                    return Err(LedgerError::invalid(
                        "name",
                        format!("a goal named '{}' already exists", draft.name),
                    ));
                }
            }

            let mut after = before.clone();
            after.name = draft.name;
            after.target_amount = draft.target_amount;
            after.deadline = draft.deadline;
            after.priority = draft.priority;

            let excess = (after.current_amount - after.target_amount).max_zero();
            if excess.is_positive() {
                after.current_amount = after.target_amount;
            }
            after
                .validate()
                .map_err(|e| LedgerError::invalid(e.field(), e.to_string()))?;

            if after == before {
                return Ok(before);
            }
            self.ctx.allocator().release_locked(&guard, excess)?;
            after.touch();
            self.ctx.storage.update_goal(&before, after)?;
            self.ctx.storage.commit()?;
        }

        self.dispatch_and_reload(owner, id, Change::Updated)
    }

    pub fn delete(&self, owner: OwnerId, id: GoalId) -> LedgerResult<SavingsGoal> {
        let mut deleted = self.delete_many(owner, &[id])?;
        deleted
            .pop()
            .ok_or_else(|| LedgerError::goal_not_found(id.to_string()))
    }

    /// Delete goals, returning their money to the surplus pool
    pub fn delete_many(&self, owner: OwnerId, ids: &[GoalId]) -> LedgerResult<Vec<SavingsGoal>> {
        let deleted = {
            let guard = self.ctx.storage.lock_owner(owner)?;

            let mut targets: Vec<SavingsGoal> = Vec::with_capacity(ids.len());
            for id in ids {
                let goal = self.get(owner, *id)?;
                if !targets.iter().any(|g| g.id == goal.id) {
                    targets.push(goal);
                }
            }
            if targets.is_empty() {
                return Ok(Vec::new());
            }

            let refund: Money = targets.iter().map(|g| g.current_amount).sum();
            self.ctx.allocator().release_locked(&guard, refund)?;

            let mut deleted = Vec::with_capacity(targets.len());
            for goal in targets {
                deleted.push(self.ctx.storage.delete_goal(goal.id)?);
            }
            self.ctx.storage.commit()?;
            deleted
        };

        tracing::info!(owner = %owner, count = deleted.len(), "goals deleted");
        self.ctx.sink.notify(
            Severity::Info,
            &format!("Deleted {} savings goal(s)", deleted.len()),
        );

        let events: Vec<DomainEvent> = deleted
            .iter()
            .map(|g| DomainEvent::GoalChanged {
                owner,
                goal: g.id,
                change: Change::Deleted,
            })
            .collect();
        self.ctx.dispatch(&events)?;
        Ok(deleted)
    }

    pub fn delete_all(&self, owner: OwnerId) -> LedgerResult<Vec<SavingsGoal>> {
        let ids: Vec<GoalId> = self
            .ctx
            .storage
            .list_goals(owner)?
            .into_iter()
            .map(|g| g.id)
            .collect();
        self.delete_many(owner, &ids)
    }

    fn dispatch_and_reload(&self, owner: OwnerId, id: GoalId, change: Change) -> LedgerResult<SavingsGoal> {
        self.ctx.dispatch(&[DomainEvent::GoalChanged {
            owner,
            goal: id,
            change,
        }])?;
        self.get(owner, id)
    }
}
