//! Transaction repository for JSON storage
//!
//! Manages loading and saving transactions to transactions.json and owns the
//! uniqueness constraint on materialized transactions: inserting a second
//! transaction with the same [`IdempotencyKey`] fails with
//! [`LedgerError::ConstraintViolation`], checked under the write lock.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::LedgerError;
use crate::models::{
    DateWindow, IdempotencyKey, KindTag, Money, OwnerId, RuleId, Transaction, TransactionId,
};

use super::file_io::{read_records, stage_records, write_records, StagedFile};

/// Query filter for listing transactions
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionFilter {
    pub kind: Option<KindTag>,
    pub window: DateWindow,
    pub rule_id: Option<RuleId>,
}

impl TransactionFilter {
    pub fn kind(kind: KindTag) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn within(mut self, window: DateWindow) -> Self {
        self.window = window;
        self
    }

    pub fn matches(&self, txn: &Transaction) -> bool {
        self.kind.map_or(true, |k| txn.tag() == k)
            && self.window.contains(txn.date)
            && self.rule_id.map_or(true, |r| txn.rule_id == Some(r))
    }
}

/// Repository for transaction persistence with indexing
pub struct TransactionRepository {
    path: PathBuf,
    data: RwLock<HashMap<TransactionId, Transaction>>,
    /// Index: owner_id -> transaction_ids
    by_owner: RwLock<HashMap<OwnerId, Vec<TransactionId>>>,
    /// Uniqueness index over materialized transactions
    keys: RwLock<HashMap<IdempotencyKey, TransactionId>>,
}

impl TransactionRepository {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
            by_owner: RwLock::new(HashMap::new()),
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Load transactions from disk and build indexes
    ///
    /// A file holding two transactions with the same key is corrupt and is
    /// refused rather than silently deduplicated.
    pub fn load(&self) -> Result<(), LedgerError> {
        let records: Vec<Transaction> = read_records(&self.path)?;
        self.replace(records)
    }

    /// Swap in `records` wholesale, rebuilding the indexes
    ///
    /// Nothing changes if `records` holds a duplicate key.
    pub fn replace(&self, records: Vec<Transaction>) -> Result<(), LedgerError> {
        let mut next_data = HashMap::with_capacity(records.len());
        let mut next_by_owner: HashMap<OwnerId, Vec<TransactionId>> = HashMap::new();
        let mut next_keys = HashMap::new();

        for txn in records {
            if let Some(key) = txn.idempotency_key() {
                if next_keys.insert(key.clone(), txn.id).is_some() {
                    return Err(LedgerError::DataIntegrity(format!(
                        "duplicate materialized transaction in {}: {}",
                        self.path.display(),
                        key
                    )));
                }
            }
            next_by_owner.entry(txn.owner_id).or_default().push(txn.id);
            next_data.insert(txn.id, txn);
        }

        let mut data = self.data.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let mut by_owner = self.by_owner.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let mut keys = self.keys.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        *data = next_data;
        *by_owner = next_by_owner;
        *keys = next_keys;
        Ok(())
    }

    pub fn save(&self) -> Result<(), LedgerError> {
        write_records(&self.path, self.records()?)
    }

    /// Write every record to a temp file beside the data file
    pub fn stage(&self) -> Result<StagedFile, LedgerError> {
        stage_records(&self.path, self.records()?)
    }

    /// All transactions, newest first
    pub fn records(&self) -> Result<Vec<Transaction>, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut transactions: Vec<_> = data.values().cloned().collect();
        transactions.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));

        Ok(transactions)
    }

    pub fn get(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data.get(&id).cloned())
    }

    /// Get an owner's transactions matching `filter`, newest first
    pub fn list(
        &self,
        owner: OwnerId,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;
        let by_owner = self.by_owner.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let ids = by_owner.get(&owner).map(|v| v.as_slice()).unwrap_or(&[]);
        let mut transactions: Vec<_> = ids
            .iter()
            .filter_map(|id| data.get(id))
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(transactions)
    }

    /// Sum an owner's amounts of one kind within a window
    pub fn sum(
        &self,
        owner: OwnerId,
        kind: KindTag,
        window: DateWindow,
    ) -> Result<Money, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;
        let by_owner = self.by_owner.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let ids = by_owner.get(&owner).map(|v| v.as_slice()).unwrap_or(&[]);
        let amounts = ids
            .iter()
            .filter_map(|id| data.get(id))
            .filter(|t| t.tag() == kind && window.contains(t.date))
            .map(|t| t.amount);
        Money::checked_sum(amounts).ok_or_else(|| {
            LedgerError::DataIntegrity(format!("{} total for owner {} overflows", kind, owner))
        })
    }

    /// Insert a new transaction, enforcing the uniqueness key
    pub fn insert(&self, txn: Transaction) -> Result<(), LedgerError> {
        let mut data = self.data.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let mut by_owner = self.by_owner.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let mut keys = self.keys.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        if data.contains_key(&txn.id) {
            return Err(LedgerError::ConstraintViolation(format!(
                "transaction {} already exists",
                txn.id
            )));
        }
        if let Some(key) = txn.idempotency_key() {
            if keys.contains_key(&key) {
                return Err(LedgerError::ConstraintViolation(format!(
                    "already materialized: {}",
                    key
                )));
            }
            keys.insert(key, txn.id);
        }

        by_owner.entry(txn.owner_id).or_default().push(txn.id);
        data.insert(txn.id, txn);
        Ok(())
    }

    /// Replace an existing transaction, re-checking the uniqueness key
    pub fn update(&self, txn: Transaction) -> Result<(), LedgerError> {
        let mut data = self.data.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let mut by_owner = self.by_owner.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let mut keys = self.keys.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let old = data
            .get(&txn.id)
            .cloned()
            .ok_or_else(|| LedgerError::transaction_not_found(txn.id.to_string()))?;

        let new_key = txn.idempotency_key();
        if let Some(key) = &new_key {
            if keys.get(key).is_some_and(|&holder| holder != txn.id) {
                return Err(LedgerError::ConstraintViolation(format!(
                    "already materialized: {}",
                    key
                )));
            }
        }

        if let Some(old_key) = old.idempotency_key() {
            keys.remove(&old_key);
        }
        if let Some(key) = new_key {
            keys.insert(key, txn.id);
        }
        if old.owner_id != txn.owner_id {
            if let Some(ids) = by_owner.get_mut(&old.owner_id) {
                ids.retain(|&id| id != txn.id);
            }
            by_owner.entry(txn.owner_id).or_default().push(txn.id);
        }

        data.insert(txn.id, txn);
        Ok(())
    }

    /// Delete a transaction, returning it if it existed
    pub fn delete(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        let mut data = self.data.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let mut by_owner = self.by_owner.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let mut keys = self.keys.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let Some(txn) = data.remove(&id) else {
            return Ok(None);
        };
        if let Some(ids) = by_owner.get_mut(&txn.owner_id) {
            ids.retain(|&tid| tid != id);
        }
        if let Some(key) = txn.idempotency_key() {
            keys.remove(&key);
        }
        Ok(Some(txn))
    }

    /// Whether a transaction with this uniqueness key exists
    pub fn contains_key(&self, key: &IdempotencyKey) -> Result<bool, LedgerError> {
        let keys = self.keys.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(keys.contains_key(key))
    }

    /// All transactions materialized from `rule_id`
    pub fn by_rule(&self, rule_id: RuleId) -> Result<Vec<Transaction>, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut transactions: Vec<_> = data
            .values()
            .filter(|t| t.rule_id == Some(rule_id))
            .cloned()
            .collect();
        transactions.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(transactions)
    }

    pub fn count(&self) -> Result<usize, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frequency, Kind, RecurringRule};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, TransactionRepository) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("transactions.json");
        let repo = TransactionRepository::new(path);
        (temp_dir, repo)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn expense(owner: OwnerId, cents: i64, on: NaiveDate) -> Transaction {
        Transaction::new(
            owner,
            Kind::expense("Coffee"),
            Money::from_cents(cents),
            on,
            "Food & Dining",
        )
    }

    fn rent_rule(owner: OwnerId) -> RecurringRule {
        RecurringRule::new(
            owner,
            Kind::expense("Rent"),
            Money::from_units(1200),
            "Housing",
            Frequency::Monthly,
            date(2024, 1, 1),
            None,
        )
    }

    #[test]
    fn test_empty_load() {
        let (_temp_dir, repo) = create_test_repo();
        repo.load().unwrap();
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_materialization_is_a_constraint_violation() {
        let (_temp_dir, repo) = create_test_repo();
        let rule = rent_rule(OwnerId::new());

        repo.insert(Transaction::from_rule(&rule)).unwrap();
        let err = repo.insert(Transaction::from_rule(&rule)).unwrap_err();

        assert!(err.is_constraint_violation());
        assert_eq!(repo.count().unwrap(), 1);
    }

    #[test]
    fn test_direct_entries_may_repeat() {
        let (_temp_dir, repo) = create_test_repo();
        let owner = OwnerId::new();

        repo.insert(expense(owner, 450, date(2024, 1, 2))).unwrap();
        repo.insert(expense(owner, 450, date(2024, 1, 2))).unwrap();

        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn test_delete_frees_the_key() {
        let (_temp_dir, repo) = create_test_repo();
        let rule = rent_rule(OwnerId::new());
        let txn = Transaction::from_rule(&rule);
        let id = txn.id;

        repo.insert(txn).unwrap();
        assert!(repo.delete(id).unwrap().is_some());
        repo.insert(Transaction::from_rule(&rule)).unwrap();
        assert_eq!(repo.by_rule(rule.id).unwrap().len(), 1);
    }

    #[test]
    fn test_update_clearing_provenance_releases_key() {
        let (_temp_dir, repo) = create_test_repo();
        let rule = rent_rule(OwnerId::new());
        let mut txn = Transaction::from_rule(&rule);
        repo.insert(txn.clone()).unwrap();

        txn.rule_id = None;
        repo.update(txn).unwrap();

        repo.insert(Transaction::from_rule(&rule)).unwrap();
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn test_sum_respects_owner_kind_and_window() {
        let (_temp_dir, repo) = create_test_repo();
        let owner = OwnerId::new();
        let other = OwnerId::new();

        repo.insert(expense(owner, 100, date(2024, 1, 10))).unwrap();
        repo.insert(expense(owner, 200, date(2024, 2, 10))).unwrap();
        repo.insert(expense(other, 400, date(2024, 1, 10))).unwrap();
        repo.insert(Transaction::new(
            owner,
            Kind::income("Employer"),
            Money::from_cents(900),
            date(2024, 1, 1),
            "Salary",
        ))
        .unwrap();

        let all = repo
            .sum(owner, KindTag::Expense, DateWindow::all_time())
            .unwrap();
        assert_eq!(all.cents(), 300);

        let january = repo
            .sum(owner, KindTag::Expense, DateWindow::month_of(date(2024, 1, 5)))
            .unwrap();
        assert_eq!(january.cents(), 100);

        let income = repo
            .sum(owner, KindTag::Income, DateWindow::all_time())
            .unwrap();
        assert_eq!(income.cents(), 900);
    }

    #[test]
    fn test_save_and_reload() {
        let (temp_dir, repo) = create_test_repo();
        let rule = rent_rule(OwnerId::new());
        let txn = Transaction::from_rule(&rule);
        let id = txn.id;

        repo.insert(txn).unwrap();
        repo.save().unwrap();

        let repo2 = TransactionRepository::new(temp_dir.path().join("transactions.json"));
        repo2.load().unwrap();

        assert_eq!(repo2.get(id).unwrap().unwrap().rule_id, Some(rule.id));
        assert!(repo2
            .insert(Transaction::from_rule(&rule))
            .unwrap_err()
            .is_constraint_violation());
    }

    #[test]
    fn test_list_filters() {
        let (_temp_dir, repo) = create_test_repo();
        let owner = OwnerId::new();
        repo.insert(expense(owner, 100, date(2024, 1, 10))).unwrap();
        repo.insert(expense(owner, 200, date(2024, 3, 10))).unwrap();

        let filter = TransactionFilter::kind(KindTag::Expense)
            .within(DateWindow::between(date(2024, 2, 1), date(2024, 12, 31)));
        let listed = repo.list(owner, &filter).unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].amount.cents(), 200);
    }
}
