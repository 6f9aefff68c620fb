//! Transaction service
//!
//! Direct user entry of one-off income and expenses. Every mutation is
//! checked by the solvency guard against the owner's all-time totals while
//! the owner's guard is held.

use crate::error::{LedgerError, LedgerResult};
use crate::events::{Change, DomainEvent};
use crate::models::{KindTag, OwnerId, Transaction, TransactionId};
use crate::notify::Severity;
use crate::storage::{LedgerStore, TransactionFilter};
use crate::validation::{TransactionDraft, TransactionInput};

use super::budget::BudgetService;
use super::solvency::{BalanceDelta, SolvencyGuard};
use super::ServiceContext;

/// A row `import_batch` did not create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based position in the batch
    pub row: usize,
    pub reason: String,
}

/// Result of an import
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub imported: Vec<Transaction>,
    pub skipped: Vec<SkippedRow>,
}

impl ImportSummary {
    pub fn imported_count(&self) -> usize {
        self.imported.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Service for one-off income and expense entries
pub struct TransactionService<'a> {
    ctx: ServiceContext<'a>,
}

impl<'a> TransactionService<'a> {
    pub fn new(ctx: ServiceContext<'a>) -> Self {
        Self { ctx }
    }

    /// Record a new income or expense
    pub fn create(&self, owner: OwnerId, draft: TransactionDraft) -> LedgerResult<Transaction> {
        let txn = {
            let _guard = self.ctx.storage.lock_owner(owner)?;

            let txn = Transaction::new(owner, draft.kind, draft.amount, draft.date, draft.category);
            txn.validate()
                .map_err(|e| LedgerError::invalid(e.field(), e.to_string()))?;

            let action = format!("Cannot add {}", noun(txn.tag()));
            self.ctx
                .ensure_solvent(owner, BalanceDelta::insertion(&txn), &action)?;

            self.ctx.storage.create_transaction(txn.clone())?;
            self.ctx.storage.commit()?;
            txn
        };

        tracing::info!(owner = %owner, id = %txn.id, kind = %txn.tag(), amount = %txn.amount, "transaction created");
        self.ctx
            .sink
            .notify(Severity::Info, &format!("{} added successfully", txn.tag()));

        self.after_expense_change(&txn)?;
        self.ctx
            .dispatch(&[DomainEvent::for_transaction(&txn, Change::Created)])?;
        Ok(txn)
    }

    /// Get one of the owner's transactions
    pub fn get(&self, owner: OwnerId, id: TransactionId) -> LedgerResult<Transaction> {
        self.ctx
            .storage
            .transactions
            .get(id)?
            .filter(|t| t.owner_id == owner)
            .ok_or_else(|| LedgerError::transaction_not_found(id.to_string()))
    }

    /// Find a transaction by ID string
    pub fn find(&self, owner: OwnerId, identifier: &str) -> LedgerResult<Transaction> {
        let id = identifier
            .trim()
            .parse::<TransactionId>()
            .map_err(|_| LedgerError::transaction_not_found(identifier))?;
        self.get(owner, id)
    }

    /// The owner's transactions matching `filter`, newest first
    pub fn list(&self, owner: OwnerId, filter: &TransactionFilter) -> LedgerResult<Vec<Transaction>> {
        self.ctx.storage.transactions.list(owner, filter)
    }

    /// Replace the fields of an existing transaction
    ///
    /// The direction (income or expense) cannot change. The guard judges
    /// the net effect of removing the old amount and adding the new one.
    pub fn update(
        &self,
        owner: OwnerId,
        id: TransactionId,
        draft: TransactionDraft,
    ) -> LedgerResult<Transaction> {
        let (after, changed) = {
            let _guard = self.ctx.storage.lock_owner(owner)?;
            let before = self.get(owner, id)?;

            if draft.kind.tag() != before.tag() {
                return Err(LedgerError::invalid(
                    "kind",
                    format!("a {} cannot be changed into a {}", before.tag(), draft.kind.tag()),
                ));
            }

            let mut after = before.clone();
            after.kind = draft.kind;
            after.amount = draft.amount;
            after.date = draft.date;
            after.category = draft.category;
            after
                .validate()
                .map_err(|e| LedgerError::invalid(e.field(), e.to_string()))?;

            if after == before {
                (before, false)
            } else {
                let action = format!("Cannot update {}", noun(after.tag()));
                self.ctx
                    .ensure_solvent(owner, BalanceDelta::replacement(&before, &after), &action)?;

                after.touch();
                self.ctx.storage.update_transaction(&before, after.clone())?;
                self.ctx.storage.commit()?;
                (after, true)
            }
        };

        if !changed {
            return Ok(after);
        }
        self.ctx
            .sink
            .notify(Severity::Info, &format!("{} updated successfully", after.tag()));
        self.after_expense_change(&after)?;
        self.ctx
            .dispatch(&[DomainEvent::for_transaction(&after, Change::Updated)])?;
        Ok(after)
    }

    /// Delete one transaction
    pub fn delete(&self, owner: OwnerId, id: TransactionId) -> LedgerResult<Transaction> {
        let mut deleted = self.delete_many(owner, &[id])?;
        deleted
            .pop()
            .ok_or_else(|| LedgerError::transaction_not_found(id.to_string()))
    }

    /// Delete several transactions as one unit
    ///
    /// The guard judges the aggregate removal, so deleting an income
    /// together with the expenses it paid for is allowed even when deleting
    /// the income alone would not be.
    pub fn delete_many(&self, owner: OwnerId, ids: &[TransactionId]) -> LedgerResult<Vec<Transaction>> {
        let deleted = {
            let _guard = self.ctx.storage.lock_owner(owner)?;

            let mut targets = Vec::with_capacity(ids.len());
            for id in ids {
                let txn = self.get(owner, *id)?;
                if !targets.iter().any(|t: &Transaction| t.id == txn.id) {
                    targets.push(txn);
                }
            }
            if targets.is_empty() {
                return Ok(Vec::new());
            }

            let delta: BalanceDelta = targets.iter().map(BalanceDelta::removal).sum();
            let action = if targets.len() == 1 {
                format!("Cannot delete {}", noun(targets[0].tag()))
            } else {
                format!("Cannot delete {} transactions", targets.len())
            };
            self.ctx.ensure_solvent(owner, delta, &action)?;

            let mut deleted = Vec::with_capacity(targets.len());
            for txn in targets {
                deleted.push(self.ctx.storage.delete_transaction(txn.id)?);
            }
            self.ctx.storage.commit()?;
            deleted
        };

        tracing::info!(owner = %owner, count = deleted.len(), "transactions deleted");
        let events: Vec<DomainEvent> = deleted
            .iter()
            .map(|t| DomainEvent::for_transaction(t, Change::Deleted))
            .collect();
        self.ctx.dispatch(&events)?;
        Ok(deleted)
    }

    /// Delete every income or every expense the owner has
    pub fn delete_all(&self, owner: OwnerId, kind: KindTag) -> LedgerResult<Vec<Transaction>> {
        let ids: Vec<TransactionId> = self
            .list(owner, &TransactionFilter::kind(kind))?
            .into_iter()
            .map(|t| t.id)
            .collect();
        self.delete_many(owner, &ids)
    }

    /// Create many rows as one unit, skipping the ones that cannot be added
    ///
    /// Rows are judged in order against running totals, so an income row
    /// early in the batch can pay for an expense row after it.
    pub fn import_batch(&self, owner: OwnerId, rows: &[TransactionInput]) -> LedgerResult<ImportSummary> {
        let summary = {
            let _guard = self.ctx.storage.lock_owner(owner)?;
            let mut totals = SolvencyGuard::totals(self.ctx.storage, owner, None)?;
            let mut summary = ImportSummary::default();

            for (index, row) in rows.iter().enumerate() {
                let row_number = index + 1;
                let draft = match row.parse() {
                    Ok(draft) => draft,
                    Err(err) => {
                        summary.skipped.push(SkippedRow {
                            row: row_number,
                            reason: err.to_string(),
                        });
                        continue;
                    }
                };

                let txn = Transaction::new(owner, draft.kind, draft.amount, draft.date, draft.category);
                let delta = BalanceDelta::insertion(&txn);
                let verdict = SolvencyGuard::evaluate(totals, delta);
                if !verdict.is_allowed() {
                    summary.skipped.push(SkippedRow {
                        row: row_number,
                        reason: format!("'{}' exceeds total income", txn.kind.label()),
                    });
                    continue;
                }

                let projected = match SolvencyGuard::project(totals, delta) {
                    Ok(projected) => projected,
                    Err(err) => {
                        summary.skipped.push(SkippedRow {
                            row: row_number,
                            reason: err.to_string(),
                        });
                        continue;
                    }
                };

                self.ctx.storage.create_transaction(txn.clone())?;
                totals = projected;
                summary.imported.push(txn);
            }

            if !summary.imported.is_empty() {
                self.ctx.storage.commit()?;
            }
            summary
        };

        self.report_import(&summary);

        let mut events: Vec<DomainEvent> = Vec::new();
        for txn in &summary.imported {
            let event = DomainEvent::for_transaction(txn, Change::Created);
            if !events.contains(&event) {
                events.push(event);
            }
        }
        self.ctx.dispatch(&events)?;
        Ok(summary)
    }

    fn report_import(&self, summary: &ImportSummary) {
        tracing::info!(
            imported = summary.imported_count(),
            skipped = summary.skipped_count(),
            "import finished"
        );
        for skipped in &summary.skipped {
            self.ctx.sink.notify(
                Severity::Warning,
                &format!("Skipping row {}: {}", skipped.row, skipped.reason),
            );
        }
        if summary.imported.is_empty() {
            self.ctx.sink.notify(
                Severity::Warning,
                "No rows were imported. All rows were skipped.",
            );
        } else {
            self.ctx.sink.notify(
                Severity::Info,
                &format!(
                    "Imported {} row(s), skipped {}",
                    summary.imported_count(),
                    summary.skipped_count()
                ),
            );
        }
    }

    fn after_expense_change(&self, txn: &Transaction) -> LedgerResult<()> {
        if txn.is_expense() {
            BudgetService::new(self.ctx).check_warnings(txn.owner_id, &txn.category)?;
        }
        Ok(())
    }
}

fn noun(kind: KindTag) -> &'static str {
    match kind {
        KindTag::Income => "income",
        KindTag::Expense => "expense",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Kind, Money};
    use crate::services::testing::{date, Fixture};

    fn draft(kind: Kind, units: i64) -> TransactionDraft {
        TransactionDraft {
            kind,
            amount: Money::from_units(units),
            date: date(2024, 5, 10),
            category: "General".into(),
        }
    }

    fn row(kind: KindTag, label: &str, amount: &str) -> TransactionInput {
        TransactionInput {
            kind,
            label: label.into(),
            amount: amount.into(),
            date: "2024-05-01".into(),
            category: "General".into(),
        }
    }

    #[test]
    fn test_expense_within_income_is_accepted() {
        let fx = Fixture::new(date(2024, 5, 15));
        let service = TransactionService::new(fx.ctx());

        service.create(fx.owner, draft(Kind::income("Salary"), 1000)).unwrap();
        let expense = service.create(fx.owner, draft(Kind::expense("Rent"), 1000)).unwrap();

        assert!(expense.is_expense());
        assert_eq!(service.list(fx.owner, &TransactionFilter::default()).unwrap().len(), 2);
    }

    #[test]
    fn test_expense_beyond_income_is_refused() {
        let fx = Fixture::new(date(2024, 5, 15));
        let service = TransactionService::new(fx.ctx());
        service.create(fx.owner, draft(Kind::income("Salary"), 100)).unwrap();

        let err = service
            .create(fx.owner, draft(Kind::expense("Laptop"), 150))
            .unwrap_err();

        assert!(err.is_solvency_violation());
        assert!(err.to_string().contains("50.00"));
        assert!(fx.sink.contains(Severity::Warning, "Cannot add expense"));
        assert_eq!(fx.storage.transactions.count().unwrap(), 1);
    }

    #[test]
    fn test_amounts_past_the_range_are_refused_not_wrapped() {
        let fx = Fixture::new(date(2024, 5, 15));
        let service = TransactionService::new(fx.ctx());
        let mut huge = draft(Kind::income("Lottery"), 0);
        huge.amount = Money::from_cents(90_000_000_000_000_000);
        assert!(service.create(fx.owner, huge).unwrap_err().is_validation());

        // Stored income already close to the limit
        fx.storage
            .create_transaction(Transaction::new(
                fx.owner,
                Kind::income("Legacy"),
                Money::from_cents(i64::MAX - 100),
                date(2024, 5, 1),
                "General",
            ))
            .unwrap();
        fx.storage.commit().unwrap();

        let mut max = draft(Kind::income("Bonus"), 0);
        max.amount = Money::MAX_AMOUNT;
        let err = service.create(fx.owner, max).unwrap_err();
        assert!(err.is_validation());

        let mut spend = draft(Kind::expense("Yacht"), 0);
        spend.amount = Money::MAX_AMOUNT;
        service.create(fx.owner, spend).unwrap();
        assert_eq!(
            fx.storage.sum_income(fx.owner, None).unwrap(),
            Money::from_cents(i64::MAX - 100)
        );
    }

    #[test]
    fn test_deleting_spent_income_is_refused() {
        let fx = Fixture::new(date(2024, 5, 15));
        let service = TransactionService::new(fx.ctx());
        let income = service.create(fx.owner, draft(Kind::income("Salary"), 100)).unwrap();
        service.create(fx.owner, draft(Kind::expense("Food"), 80)).unwrap();

        let err = service.delete(fx.owner, income.id).unwrap_err();
        assert!(err.is_solvency_violation());
    }

    #[test]
    fn test_delete_many_judges_the_aggregate() {
        let fx = Fixture::new(date(2024, 5, 15));
        let service = TransactionService::new(fx.ctx());
        let income = service.create(fx.owner, draft(Kind::income("Salary"), 100)).unwrap();
        let food = service.create(fx.owner, draft(Kind::expense("Food"), 80)).unwrap();

        let deleted = service.delete_many(fx.owner, &[income.id, food.id]).unwrap();

        assert_eq!(deleted.len(), 2);
        assert_eq!(fx.storage.transactions.count().unwrap(), 0);
    }

    #[test]
    fn test_update_cannot_raise_expense_past_income() {
        let fx = Fixture::new(date(2024, 5, 15));
        let service = TransactionService::new(fx.ctx());
        service.create(fx.owner, draft(Kind::income("Salary"), 100)).unwrap();
        let food = service.create(fx.owner, draft(Kind::expense("Food"), 80)).unwrap();

        let err = service
            .update(fx.owner, food.id, draft(Kind::expense("Food"), 120))
            .unwrap_err();
        assert!(err.is_solvency_violation());

        let lowered = service
            .update(fx.owner, food.id, draft(Kind::expense("Food"), 40))
            .unwrap();
        assert_eq!(lowered.amount, Money::from_units(40));
    }

    #[test]
    fn test_update_cannot_flip_direction() {
        let fx = Fixture::new(date(2024, 5, 15));
        let service = TransactionService::new(fx.ctx());
        let income = service.create(fx.owner, draft(Kind::income("Salary"), 100)).unwrap();

        let err = service
            .update(fx.owner, income.id, draft(Kind::expense("Salary"), 100))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_other_owners_transactions_are_invisible() {
        let fx = Fixture::new(date(2024, 5, 15));
        let service = TransactionService::new(fx.ctx());
        let income = service.create(fx.owner, draft(Kind::income("Salary"), 100)).unwrap();

        let err = service.get(OwnerId::new(), income.id).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_import_uses_running_totals() {
        let fx = Fixture::new(date(2024, 5, 15));
        let service = TransactionService::new(fx.ctx());
        let rows = vec![
            row(KindTag::Expense, "Rent", "500"),
            row(KindTag::Income, "Salary", "800"),
            row(KindTag::Expense, "Rent", "500"),
            row(KindTag::Expense, "Car", "400"),
            row(KindTag::Expense, "", "abc"),
        ];

        let summary = service.import_batch(fx.owner, &rows).unwrap();

        assert_eq!(summary.imported_count(), 2);
        let skipped: Vec<usize> = summary.skipped.iter().map(|s| s.row).collect();
        assert_eq!(skipped, vec![1, 4, 5]);
        assert!(fx.sink.contains(Severity::Info, "Imported 2 row(s), skipped 3"));
    }

    #[test]
    fn test_income_triggers_allocation() {
        let fx = Fixture::new(date(2024, 5, 15));
        let service = TransactionService::new(fx.ctx());
        let mut income = draft(Kind::income("Salary"), 300);
        income.date = date(2024, 4, 10);

        service.create(fx.owner, income).unwrap();

        let tracker = fx.storage.get_surplus_tracker(fx.owner).unwrap();
        assert_eq!(tracker.accumulated_balance, Money::from_units(300));
        assert_eq!(tracker.last_run, Some(date(2024, 5, 15)));
    }
}
