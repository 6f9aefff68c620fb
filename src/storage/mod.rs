//! Storage layer
//!
//! [`LedgerStore`] is the narrow interface the scheduler and allocator work
//! against. [`Storage`] implements it with one JSON file per record type,
//! in-memory indexes, atomic file replacement and an audit trail.
//!
//! A unit of work starts with [`LedgerStore::lock_owner`]: the returned
//! [`OwnerGuard`] holds the data directory's lock file exclusively, and the
//! store reloads from disk first if another handle committed since this one
//! last looked. Writes go to memory; [`LedgerStore::commit`] writes every
//! file before replacing any of them and only then appends the unit's audit
//! entries. A unit that ends without committing its writes is rolled back.

pub mod budgets;
pub mod file_io;
pub mod goals;
pub mod locks;
pub mod rules;
pub mod surplus;
pub mod transactions;

pub use budgets::BudgetRepository;
pub use goals::GoalRepository;
pub use locks::{OwnerGuard, StoreLease, StoreLock, UnitScope};
pub use rules::RuleRepository;
pub use surplus::SurplusRepository;
pub use transactions::{TransactionFilter, TransactionRepository};

use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;

use crate::audit::{AuditEntry, AuditLogger, EntityType};
use crate::config::paths::SurplusPaths;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    Budget, BudgetId, DateWindow, GoalId, IdempotencyKey, KindTag, Money, OwnerId, RecurringRule, RuleId,
    SavingsGoal, SurplusTracker, Transaction, TransactionId,
};

use file_io::{read_revision, stage_json, Revision};

/// Persistence operations the ledger core depends on
pub trait LedgerStore: Send + Sync {
    /// Start a unit of work on one owner's records
    ///
    /// Blocks while any other unit holds the store, in this process or
    /// another one.
    fn lock_owner(&self, owner: OwnerId) -> LedgerResult<OwnerGuard<'_>>;

    /// Total income for `owner`; `None` means all time
    fn sum_income(&self, owner: OwnerId, window: Option<DateWindow>) -> LedgerResult<Money>;

    /// Total expense for `owner`; `None` means all time
    fn sum_expense(&self, owner: OwnerId, window: Option<DateWindow>) -> LedgerResult<Money>;

    /// Insert a transaction
    ///
    /// Fails with [`LedgerError::ConstraintViolation`] if a transaction with
    /// the same idempotency key already exists.
    fn create_transaction(&self, txn: Transaction) -> LedgerResult<TransactionId>;

    /// Whether a transaction with this idempotency key already exists
    fn has_materialized(&self, key: &IdempotencyKey) -> LedgerResult<bool>;

    /// Active and pending rules with `next_due_date <= as_of`, ascending id
    fn list_due_rules(&self, owner: OwnerId, as_of: NaiveDate) -> LedgerResult<Vec<RecurringRule>>;

    fn update_rule(&self, rule: &RecurringRule) -> LedgerResult<()>;

    fn list_goals(&self, owner: OwnerId) -> LedgerResult<Vec<SavingsGoal>>;

    /// Overwrite a goal's allocated amount
    fn upsert_goal_amount(&self, goal: GoalId, amount: Money) -> LedgerResult<()>;

    fn get_surplus_tracker(&self, owner: OwnerId) -> LedgerResult<SurplusTracker>;

    fn set_surplus_tracker(&self, tracker: &SurplusTracker) -> LedgerResult<()>;

    /// Persist everything written so far
    fn commit(&self) -> LedgerResult<()>;
}

/// In-memory state as it stood when a unit of work began or last committed
struct Snapshot {
    transactions: Vec<Transaction>,
    rules: Vec<RecurringRule>,
    goals: Vec<SavingsGoal>,
    trackers: Vec<SurplusTracker>,
    budgets: Vec<Budget>,
    audit_len: usize,
}

/// Main storage coordinator that provides access to all repositories
pub struct Storage {
    paths: SurplusPaths,
    audit: AuditLogger,
    lock: StoreLock,
    /// Revision the in-memory data reflects; `None` forces a reload
    revision: Mutex<Option<Revision>>,
    /// Rollback point of the open unit of work
    unit: Mutex<Option<Snapshot>>,
    /// Audit entries for writes not committed yet
    staged_audit: Mutex<Vec<AuditEntry>>,
    pub transactions: TransactionRepository,
    pub rules: RuleRepository,
    pub goals: GoalRepository,
    pub surplus: SurplusRepository,
    pub budgets: BudgetRepository,
}

fn locked<T>(mutex: &Mutex<T>) -> LedgerResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| LedgerError::Storage(format!("Failed to acquire storage state: {}", e)))
}

fn locked_or_poisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Storage {
    /// Create storage rooted at `paths` without loading anything
    pub fn new(paths: SurplusPaths) -> Result<Self, LedgerError> {
        paths.ensure_directories()?;

        Ok(Self {
            audit: AuditLogger::new(paths.audit_log()),
            lock: StoreLock::new(paths.lock_file()),
            revision: Mutex::new(None),
            unit: Mutex::new(None),
            staged_audit: Mutex::new(Vec::new()),
            transactions: TransactionRepository::new(paths.transactions_file()),
            rules: RuleRepository::new(paths.rules_file()),
            goals: GoalRepository::new(paths.goals_file()),
            surplus: SurplusRepository::new(paths.surplus_file()),
            budgets: BudgetRepository::new(paths.budgets_file()),
            paths,
        })
    }

    /// Create storage and load every data file
    pub fn open(paths: SurplusPaths) -> Result<Self, LedgerError> {
        let storage = Self::new(paths)?;
        storage.reload()?;
        Ok(storage)
    }

    pub fn paths(&self) -> &SurplusPaths {
        &self.paths
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Replace memory with what is on disk, dropping uncommitted writes
    pub fn reload(&self) -> Result<(), LedgerError> {
        // Read first: data newer than the stamp only causes an extra reload
        let revision = read_revision(self.paths.revision_file())?;
        *locked(&self.revision)? = None;
        self.load_all()?;
        locked(&self.staged_audit)?.clear();
        *locked(&self.revision)? = Some(revision);
        Ok(())
    }

    fn load_all(&self) -> Result<(), LedgerError> {
        self.transactions.load()?;
        self.rules.load()?;
        self.goals.load()?;
        self.surplus.load()?;
        self.budgets.load()?;
        tracing::debug!(
            base_dir = %self.paths.base_dir().display(),
            "loaded ledger data"
        );
        Ok(())
    }

    /// Write every data file, then swap them all into place
    ///
    /// Nothing on disk changes unless every file was written and synced.
    /// The revision stamp is replaced last.
    fn publish_all(&self, revision: Revision) -> Result<(), LedgerError> {
        let staged = [
            self.transactions.stage(),
            self.rules.stage(),
            self.goals.stage(),
            self.surplus.stage(),
            self.budgets.stage(),
            stage_json(self.paths.revision_file(), &revision),
        ];

        let mut ready = Vec::with_capacity(staged.len());
        let mut failure = None;
        for result in staged {
            match result {
                Ok(file) => ready.push(file),
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }
        if let Some(err) = failure {
            for file in ready {
                file.discard();
            }
            return Err(err);
        }

        for file in ready {
            file.publish()?;
        }
        Ok(())
    }

    /// Publish memory to disk, then append the pending audit entries
    fn persist(&self) -> Result<(), LedgerError> {
        let revision = read_revision(self.paths.revision_file())?.next();
        if let Err(err) = self.publish_all(revision) {
            // Disk may be ahead of the stamp; make the next unit reload
            *locked(&self.revision)? = None;
            return Err(err);
        }
        *locked(&self.revision)? = Some(revision);

        let entries = std::mem::take(&mut *locked(&self.staged_audit)?);
        if let Err(err) = self.audit.log_batch(&entries) {
            // The data is already durable; losing the trail must not undo it
            tracing::error!(error = %err, entries = entries.len(), "failed to append audit entries");
        }
        tracing::debug!(revision = revision.revision, "committed ledger data");
        Ok(())
    }

    fn snapshot(&self) -> Result<Snapshot, LedgerError> {
        Ok(Snapshot {
            transactions: self.transactions.records()?,
            rules: self.rules.records()?,
            goals: self.goals.records()?,
            trackers: self.surplus.records()?,
            budgets: self.budgets.records()?,
            audit_len: locked(&self.staged_audit)?.len(),
        })
    }

    fn restore(&self, snapshot: Snapshot) -> Result<(), LedgerError> {
        self.transactions.replace(snapshot.transactions)?;
        self.rules.replace(snapshot.rules)?;
        self.goals.replace(snapshot.goals)?;
        self.surplus.replace(snapshot.trackers)?;
        self.budgets.replace(snapshot.budgets)?;
        locked(&self.staged_audit)?.truncate(snapshot.audit_len);
        Ok(())
    }

    /// Bring memory up to date and record the rollback point
    fn begin_unit(&self) -> Result<(), LedgerError> {
        let on_disk = read_revision(self.paths.revision_file())?;
        let current = *locked(&self.revision)?;
        if current != Some(on_disk) {
            tracing::debug!(revision = on_disk.revision, "ledger changed on disk, reloading");
            self.reload()?;
        }
        let snapshot = self.snapshot()?;
        *locked(&self.unit)? = Some(snapshot);
        Ok(())
    }

    fn stage_audit(&self, entry: AuditEntry) -> LedgerResult<()> {
        locked(&self.staged_audit)?.push(entry);
        Ok(())
    }

    // Audited writes. Each mutates memory and stages an audit entry;
    // both reach disk on commit.

    pub fn update_transaction(&self, before: &Transaction, after: Transaction) -> LedgerResult<()> {
        let entry = AuditEntry::update(
            EntityType::Transaction,
            after.id.to_string(),
            Some(after.kind.label().to_string()),
            before,
            &after,
        );
        self.transactions.update(after)?;
        self.stage_audit(entry)
    }

    pub fn delete_transaction(&self, id: TransactionId) -> LedgerResult<Transaction> {
        let txn = self
            .transactions
            .delete(id)?
            .ok_or_else(|| LedgerError::transaction_not_found(id.to_string()))?;
        self.stage_audit(AuditEntry::delete(
            EntityType::Transaction,
            id.to_string(),
            Some(txn.kind.label().to_string()),
            &txn,
        ))?;
        Ok(txn)
    }

    pub fn create_rule(&self, rule: RecurringRule) -> LedgerResult<()> {
        let entry = AuditEntry::create(
            EntityType::RecurringRule,
            rule.id.to_string(),
            Some(rule.kind.label().to_string()),
            &rule,
        );
        self.rules.upsert(rule)?;
        self.stage_audit(entry)
    }

    pub fn delete_rule(&self, id: RuleId) -> LedgerResult<RecurringRule> {
        let rule = self
            .rules
            .delete(id)?
            .ok_or_else(|| LedgerError::rule_not_found(id.to_string()))?;
        self.stage_audit(AuditEntry::delete(
            EntityType::RecurringRule,
            id.to_string(),
            Some(rule.kind.label().to_string()),
            &rule,
        ))?;
        Ok(rule)
    }

    pub fn create_goal(&self, goal: SavingsGoal) -> LedgerResult<()> {
        let entry = AuditEntry::create(
            EntityType::SavingsGoal,
            goal.id.to_string(),
            Some(goal.name.clone()),
            &goal,
        );
        self.goals.upsert(goal)?;
        self.stage_audit(entry)
    }

    pub fn update_goal(&self, before: &SavingsGoal, after: SavingsGoal) -> LedgerResult<()> {
        let entry = AuditEntry::update(
            EntityType::SavingsGoal,
            after.id.to_string(),
            Some(after.name.clone()),
            before,
            &after,
        );
        self.goals.upsert(after)?;
        self.stage_audit(entry)
    }

    pub fn delete_goal(&self, id: GoalId) -> LedgerResult<SavingsGoal> {
        let goal = self
            .goals
            .delete(id)?
            .ok_or_else(|| LedgerError::goal_not_found(id.to_string()))?;
        self.stage_audit(AuditEntry::delete(
            EntityType::SavingsGoal,
            id.to_string(),
            Some(goal.name.clone()),
            &goal,
        ))?;
        Ok(goal)
    }

    pub fn create_budget(&self, budget: Budget) -> LedgerResult<()> {
        let entry = AuditEntry::create(
            EntityType::Budget,
            budget.id.to_string(),
            Some(budget.name.clone()),
            &budget,
        );
        self.budgets.upsert(budget)?;
        self.stage_audit(entry)
    }

    pub fn delete_budget(&self, id: BudgetId) -> LedgerResult<Budget> {
        let budget = self
            .budgets
            .delete(id)?
            .ok_or_else(|| LedgerError::budget_not_found(id.to_string()))?;
        self.stage_audit(AuditEntry::delete(
            EntityType::Budget,
            id.to_string(),
            Some(budget.name.clone()),
            &budget,
        ))?;
        Ok(budget)
    }

    fn sum(&self, owner: OwnerId, kind: KindTag, window: Option<DateWindow>) -> LedgerResult<Money> {
        self.transactions
            .sum(owner, kind, window.unwrap_or_else(DateWindow::all_time))
    }
}

impl LedgerStore for Storage {
    fn lock_owner(&self, owner: OwnerId) -> LedgerResult<OwnerGuard<'_>> {
        let lease = self.lock.acquire()?;
        self.begin_unit()?;
        Ok(OwnerGuard::new(owner, self, lease))
    }

    fn sum_income(&self, owner: OwnerId, window: Option<DateWindow>) -> LedgerResult<Money> {
        self.sum(owner, KindTag::Income, window)
    }

    fn sum_expense(&self, owner: OwnerId, window: Option<DateWindow>) -> LedgerResult<Money> {
        self.sum(owner, KindTag::Expense, window)
    }

    fn create_transaction(&self, txn: Transaction) -> LedgerResult<TransactionId> {
        let id = txn.id;
        let entry = AuditEntry::create(
            EntityType::Transaction,
            id.to_string(),
            Some(txn.kind.label().to_string()),
            &txn,
        );
        self.transactions.insert(txn)?;
        self.stage_audit(entry)?;
        Ok(id)
    }

    fn has_materialized(&self, key: &IdempotencyKey) -> LedgerResult<bool> {
        self.transactions.contains_key(key)
    }

    fn list_due_rules(&self, owner: OwnerId, as_of: NaiveDate) -> LedgerResult<Vec<RecurringRule>> {
        self.rules.due(owner, as_of)
    }

    fn update_rule(&self, rule: &RecurringRule) -> LedgerResult<()> {
        let before = self
            .rules
            .get(rule.id)?
            .ok_or_else(|| LedgerError::rule_not_found(rule.id.to_string()))?;
        if &before == rule {
            return Ok(());
        }
        let entry = AuditEntry::update(
            EntityType::RecurringRule,
            rule.id.to_string(),
            Some(rule.kind.label().to_string()),
            &before,
            rule,
        );
        self.rules.upsert(rule.clone())?;
        self.stage_audit(entry)
    }

    fn list_goals(&self, owner: OwnerId) -> LedgerResult<Vec<SavingsGoal>> {
        self.goals.by_owner(owner)
    }

    fn upsert_goal_amount(&self, goal: GoalId, amount: Money) -> LedgerResult<()> {
        let before = self
            .goals
            .get(goal)?
            .ok_or_else(|| LedgerError::goal_not_found(goal.to_string()))?;
        if before.current_amount == amount {
            return Ok(());
        }
        self.goals.set_amount(goal, amount)?;
        let mut after = before.clone();
        after.current_amount = amount;
        self.stage_audit(AuditEntry::update(
            EntityType::SavingsGoal,
            goal.to_string(),
            Some(before.name.clone()),
            &before,
            &after,
        ))
    }

    fn get_surplus_tracker(&self, owner: OwnerId) -> LedgerResult<SurplusTracker> {
        self.surplus.get(owner)
    }

    fn set_surplus_tracker(&self, tracker: &SurplusTracker) -> LedgerResult<()> {
        let previous = self.surplus.set(tracker.clone())?;
        let entry = match &previous {
            Some(before) if before == tracker => return Ok(()),
            Some(before) => AuditEntry::update(
                EntityType::SurplusTracker,
                tracker.owner_id.to_string(),
                None,
                before,
                tracker,
            ),
            None => AuditEntry::create(
                EntityType::SurplusTracker,
                tracker.owner_id.to_string(),
                None,
                tracker,
            ),
        };
        self.stage_audit(entry)
    }

    fn commit(&self) -> LedgerResult<()> {
        if locked(&self.unit)?.is_none() {
            // No unit open: hold the lock just for the write
            let _lease = self.lock.acquire()?;
            return self.persist();
        }
        self.persist()?;
        let snapshot = self.snapshot()?;
        *locked(&self.unit)? = Some(snapshot);
        Ok(())
    }
}

impl UnitScope for Storage {
    fn end_unit(&self) {
        let Some(snapshot) = locked_or_poisoned(&self.unit).take() else {
            return;
        };
        let pending = locked_or_poisoned(&self.staged_audit).len();
        if pending <= snapshot.audit_len {
            return;
        }

        tracing::warn!(
            discarded = pending - snapshot.audit_len,
            "unit of work ended without commit, rolling back"
        );
        if let Err(err) = self.restore(snapshot) {
            tracing::error!(error = %err, "rollback failed, memory will be reloaded");
            *locked_or_poisoned(&self.revision) = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Operation;
    use crate::models::{Frequency, Kind, Priority};
    use tempfile::TempDir;

    fn create_test_storage() -> (TempDir, Storage) {
        let temp_dir = TempDir::new().unwrap();
        let paths = SurplusPaths::with_base_dir(temp_dir.path().to_path_buf());
        let storage = Storage::open(paths).unwrap();
        (temp_dir, storage)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_storage_creation() {
        let (temp_dir, storage) = create_test_storage();
        assert!(temp_dir.path().join("data").exists());
        assert!(!storage.paths().is_initialized());
    }

    #[test]
    fn test_sums_through_trait() {
        let (_temp_dir, storage) = create_test_storage();
        let owner = OwnerId::new();
        storage
            .create_transaction(Transaction::new(
                owner,
                Kind::income("Employer"),
                Money::from_units(100),
                date(2024, 1, 1),
                "Salary",
            ))
            .unwrap();
        storage
            .create_transaction(Transaction::new(
                owner,
                Kind::expense("Lunch"),
                Money::from_units(30),
                date(2024, 2, 1),
                "Food & Dining",
            ))
            .unwrap();

        assert_eq!(storage.sum_income(owner, None).unwrap(), Money::from_units(100));
        assert_eq!(storage.sum_expense(owner, None).unwrap(), Money::from_units(30));
        assert_eq!(
            storage
                .sum_expense(owner, Some(DateWindow::before(date(2024, 2, 1))))
                .unwrap(),
            Money::zero()
        );
    }

    #[test]
    fn test_commit_persists_and_audits() {
        let (temp_dir, storage) = create_test_storage();
        let owner = OwnerId::new();
        let rule = RecurringRule::new(
            owner,
            Kind::expense("Gym"),
            Money::from_units(40),
            "Health",
            Frequency::Monthly,
            date(2024, 1, 5),
            None,
        );
        storage.create_rule(rule.clone()).unwrap();
        let mut moved = rule.clone();
        moved.advance();
        storage.update_rule(&moved).unwrap();
        storage.commit().unwrap();

        let reopened =
            Storage::open(SurplusPaths::with_base_dir(temp_dir.path().to_path_buf())).unwrap();
        assert_eq!(
            reopened.rules.get(rule.id).unwrap().unwrap().next_due_date,
            date(2024, 2, 5)
        );

        let ops: Vec<_> = storage
            .audit()
            .read_all()
            .unwrap()
            .into_iter()
            .map(|e| (e.entity_type, e.operation))
            .collect();
        assert_eq!(
            ops,
            vec![
                (EntityType::RecurringRule, Operation::Create),
                (EntityType::RecurringRule, Operation::Update),
            ]
        );
    }

    #[test]
    fn test_upsert_goal_amount_skips_unchanged() {
        let (_temp_dir, storage) = create_test_storage();
        let goal = SavingsGoal::new(
            OwnerId::new(),
            "Bike",
            Money::from_units(600),
            None,
            Priority::Low,
        );
        let id = goal.id;
        storage.create_goal(goal).unwrap();

        storage.upsert_goal_amount(id, Money::zero()).unwrap();
        storage.upsert_goal_amount(id, Money::from_units(50)).unwrap();
        assert!(storage.audit().read_all().unwrap().is_empty());
        storage.commit().unwrap();

        assert_eq!(storage.audit().read_all().unwrap().len(), 2);
        assert!(storage
            .upsert_goal_amount(GoalId::new(), Money::zero())
            .unwrap_err()
            .is_not_found());
    }

    fn income(owner: OwnerId, units: i64) -> Transaction {
        Transaction::new(
            owner,
            Kind::income("Employer"),
            Money::from_units(units),
            date(2024, 1, 1),
            "Salary",
        )
    }

    #[test]
    fn test_unit_sees_commits_from_another_handle() {
        let (temp_dir, first) = create_test_storage();
        let second =
            Storage::open(SurplusPaths::with_base_dir(temp_dir.path().to_path_buf())).unwrap();
        let owner = OwnerId::new();

        {
            let _guard = first.lock_owner(owner).unwrap();
            first.create_transaction(income(owner, 1000)).unwrap();
            first.commit().unwrap();
        }

        // Loaded before the commit, so stale until a unit starts
        assert_eq!(second.sum_income(owner, None).unwrap(), Money::zero());
        let _guard = second.lock_owner(owner).unwrap();
        assert_eq!(second.sum_income(owner, None).unwrap(), Money::from_units(1000));
    }

    #[test]
    fn test_unit_without_commit_is_rolled_back() {
        let (_temp_dir, storage) = create_test_storage();
        let owner = OwnerId::new();
        let kept = income(owner, 100);

        {
            let _guard = storage.lock_owner(owner).unwrap();
            storage.create_transaction(kept.clone()).unwrap();
            storage.commit().unwrap();
            storage.create_transaction(income(owner, 900)).unwrap();
        }

        assert_eq!(storage.sum_income(owner, None).unwrap(), Money::from_units(100));
        assert!(storage.transactions.get(kept.id).unwrap().is_some());
        assert_eq!(storage.audit().read_all().unwrap().len(), 1);

        // A later commit must not resurrect the discarded write
        {
            let _guard = storage.lock_owner(owner).unwrap();
            storage.commit().unwrap();
        }
        assert_eq!(storage.audit().read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_commit_replaces_no_file() {
        let (temp_dir, storage) = create_test_storage();
        let owner = OwnerId::new();
        {
            let _guard = storage.lock_owner(owner).unwrap();
            storage.create_transaction(income(owner, 100)).unwrap();
            storage.commit().unwrap();
        }

        // A directory where the goals temp file should go makes staging fail
        let blocker = temp_dir.path().join("data").join("goals.json.tmp");
        std::fs::create_dir(&blocker).unwrap();
        {
            let _guard = storage.lock_owner(owner).unwrap();
            storage.create_transaction(income(owner, 900)).unwrap();
            assert!(storage.commit().is_err());
        }

        assert_eq!(storage.sum_income(owner, None).unwrap(), Money::from_units(100));
        assert!(!temp_dir
            .path()
            .join("data")
            .join("transactions.json.tmp")
            .exists());
        let reopened =
            Storage::open(SurplusPaths::with_base_dir(temp_dir.path().to_path_buf())).unwrap();
        assert_eq!(reopened.sum_income(owner, None).unwrap(), Money::from_units(100));
        assert_eq!(storage.audit().read_all().unwrap().len(), 1);
    }
}
