//! Dashboard service
//!
//! Brings the owner up to date (scheduler, then allocator) and gathers the
//! figures shown on the summary screen.

use chrono::NaiveDate;

use crate::error::LedgerResult;
use crate::models::{Money, OwnerId, RecurringRule, SavingsGoal};

use super::allocator::AllocationOutcome;
use super::recurring::RecurringService;
use super::scheduler::SchedulerReport;
use super::solvency::{SolvencyGuard, Totals};
use super::ServiceContext;

/// Everything the summary screen shows
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub owner: OwnerId,
    pub today: NaiveDate,
    /// All-time income and expense
    pub totals: Totals,
    /// The current month's balance, floored at zero
    pub month_balance: Money,
    /// Surplus not assigned to any goal
    pub accumulated_balance: Money,
    /// Goals in funding order
    pub goals: Vec<SavingsGoal>,
    /// Expense rules still due, including pending ones
    pub due_expenses: Vec<RecurringRule>,
    pub report: SchedulerReport,
}

impl Dashboard {
    pub fn balance(&self) -> Money {
        self.totals.balance()
    }

    /// Money held by goals
    pub fn allocated(&self) -> Money {
        self.goals.iter().map(|g| g.current_amount).sum()
    }
}

pub struct DashboardService<'a> {
    ctx: ServiceContext<'a>,
}

impl<'a> DashboardService<'a> {
    pub fn new(ctx: ServiceContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn render(&self, owner: OwnerId) -> LedgerResult<Dashboard> {
        let report = self.ctx.scheduler().run(owner)?;
        let AllocationOutcome { goals, tracker, .. } = self.ctx.allocator().run(owner)?;

        let today = self.ctx.clock.today();
        let mut goals = goals;
        goals.sort_by(|a, b| a.allocation_order(b));

        Ok(Dashboard {
            owner,
            today,
            totals: SolvencyGuard::totals(self.ctx.storage, owner, None)?,
            month_balance: SolvencyGuard::month_balance(self.ctx.storage, owner, today)?,
            accumulated_balance: tracker.accumulated_balance,
            goals,
            due_expenses: RecurringService::new(self.ctx).due_expenses(owner)?,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frequency, Kind, RuleStatus};
    use crate::services::testing::{date, Fixture};
    use crate::services::{GoalService, RecurringService};
    use crate::validation::{GoalDraft, RuleDraft};

    fn monthly(kind: Kind, units: i64) -> RuleDraft {
        RuleDraft {
            kind,
            amount: Money::from_units(units),
            category: "General".into(),
            frequency: Frequency::Monthly,
            start_date: date(2024, 1, 5),
            end_date: None,
        }
    }

    #[test]
    fn test_render_brings_owner_up_to_date() {
        let fx = Fixture::new(date(2024, 3, 20));
        let recurring = RecurringService::new(fx.ctx());
        recurring.create(fx.owner, monthly(Kind::income("Employer"), 1000)).unwrap();
        recurring.create(fx.owner, monthly(Kind::expense("Rent"), 600)).unwrap();
        GoalService::new(fx.ctx())
            .create(
                fx.owner,
                GoalDraft {
                    name: "Holiday".into(),
                    target_amount: Money::from_units(500),
                    deadline: None,
                    priority: Default::default(),
                },
            )
            .unwrap();

        let dashboard = DashboardService::new(fx.ctx()).render(fx.owner).unwrap();

        assert_eq!(dashboard.report.created.len(), 6);
        assert_eq!(dashboard.totals.income, Money::from_units(3000));
        assert_eq!(dashboard.balance(), Money::from_units(1200));
        assert_eq!(dashboard.month_balance, Money::from_units(400));
        // Closed months: January and February, 800 surplus
        assert_eq!(dashboard.allocated(), Money::from_units(500));
        assert_eq!(dashboard.accumulated_balance, Money::from_units(300));
        assert!(dashboard.due_expenses.is_empty());
    }

    #[test]
    fn test_render_shows_pending_expenses() {
        let fx = Fixture::new(date(2024, 1, 10));
        let recurring = RecurringService::new(fx.ctx());
        recurring.create(fx.owner, monthly(Kind::expense("Rent"), 600)).unwrap();

        let dashboard = DashboardService::new(fx.ctx()).render(fx.owner).unwrap();

        assert_eq!(dashboard.due_expenses.len(), 1);
        assert_eq!(dashboard.due_expenses[0].status, RuleStatus::Pending);
        assert_eq!(dashboard.month_balance, Money::zero());
    }
}
