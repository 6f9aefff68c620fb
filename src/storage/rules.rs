//! Recurring rule repository for JSON storage
//!
//! Manages loading and saving recurring rules to recurring.json.
//! Listings come back in ascending id order, which is creation order.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::NaiveDate;

use crate::error::LedgerError;
use crate::models::{OwnerId, RecurringRule, RuleId, RuleStatus};

use super::file_io::{read_records, stage_records, write_records, StagedFile};

pub struct RuleRepository {
    path: PathBuf,
    data: RwLock<HashMap<RuleId, RecurringRule>>,
}

impl RuleRepository {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
        }
    }

    pub fn load(&self) -> Result<(), LedgerError> {
        let records: Vec<RecurringRule> = read_records(&self.path)?;
        self.replace(records)
    }

    /// Swap in `records` wholesale
    pub fn replace(&self, records: Vec<RecurringRule>) -> Result<(), LedgerError> {
        let mut data = self.data.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        data.clear();
        for rule in records {
            data.insert(rule.id, rule);
        }

        Ok(())
    }

    pub fn save(&self) -> Result<(), LedgerError> {
        write_records(&self.path, self.records()?)
    }

    /// Write every record to a temp file beside the data file
    pub fn stage(&self) -> Result<StagedFile, LedgerError> {
        stage_records(&self.path, self.records()?)
    }

    /// All rules, ascending id
    pub fn records(&self) -> Result<Vec<RecurringRule>, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut rules: Vec<_> = data.values().cloned().collect();
        rules.sort_by_key(|r| r.id);

        Ok(rules)
    }

    pub fn get(&self, id: RuleId) -> Result<Option<RecurringRule>, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data.get(&id).cloned())
    }

    /// Every rule belonging to `owner`, ascending id
    pub fn by_owner(&self, owner: OwnerId) -> Result<Vec<RecurringRule>, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut rules: Vec<_> = data
            .values()
            .filter(|r| r.owner_id == owner)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.id);
        Ok(rules)
    }

    /// Active and pending rules whose cursor is on or before `as_of`
    pub fn due(&self, owner: OwnerId, as_of: NaiveDate) -> Result<Vec<RecurringRule>, LedgerError> {
        Ok(self
            .by_owner(owner)?
            .into_iter()
            .filter(|r| r.is_due(as_of))
            .collect())
    }

    /// Rules in a given status, ascending id
    pub fn with_status(
        &self,
        owner: OwnerId,
        status: RuleStatus,
    ) -> Result<Vec<RecurringRule>, LedgerError> {
        Ok(self
            .by_owner(owner)?
            .into_iter()
            .filter(|r| r.status == status)
            .collect())
    }

    pub fn upsert(&self, rule: RecurringRule) -> Result<(), LedgerError> {
        let mut data = self.data.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        data.insert(rule.id, rule);
        Ok(())
    }

    pub fn delete(&self, id: RuleId) -> Result<Option<RecurringRule>, LedgerError> {
        let mut data = self.data.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        Ok(data.remove(&id))
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
    use crate::models::{Frequency, Kind, Money};
    use tempfile::TempDir;

    fn create_test_repo() -> (TempDir, RuleRepository) {
        let temp_dir = TempDir::new().unwrap();
        let repo = RuleRepository::new(temp_dir.path().join("recurring.json"));
        (temp_dir, repo)
    }

    fn rule(owner: OwnerId, start: NaiveDate) -> RecurringRule {
        RecurringRule::new(
            owner,
            Kind::income("Employer"),
            Money::from_units(3000),
            "Salary",
            Frequency::Monthly,
            start,
            None,
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_due_skips_future_and_inactive() {
        let (_temp_dir, repo) = create_test_repo();
        let owner = OwnerId::new();

        let due = rule(owner, date(2024, 1, 1));
        let future = rule(owner, date(2024, 6, 1));
        let mut stopped = rule(owner, date(2024, 1, 1));
        stopped.deactivate();

        repo.upsert(due.clone()).unwrap();
        repo.upsert(future).unwrap();
        repo.upsert(stopped).unwrap();

        let listed = repo.due(owner, date(2024, 3, 1)).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, due.id);
    }

    #[test]
    fn test_by_owner_is_isolated() {
        let (_temp_dir, repo) = create_test_repo();
        let owner = OwnerId::new();
        repo.upsert(rule(owner, date(2024, 1, 1))).unwrap();
        repo.upsert(rule(OwnerId::new(), date(2024, 1, 1))).unwrap();

        assert_eq!(repo.by_owner(owner).unwrap().len(), 1);
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn test_save_and_reload() {
        let (temp_dir, repo) = create_test_repo();
        let mut r = rule(OwnerId::new(), date(2024, 1, 31));
        r.advance();
        repo.upsert(r.clone()).unwrap();
        repo.save().unwrap();

        let repo2 = RuleRepository::new(temp_dir.path().join("recurring.json"));
        repo2.load().unwrap();
        assert_eq!(repo2.get(r.id).unwrap(), Some(r));
    }
}
