//! Budget repository for JSON storage

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use chrono::NaiveDate;

use crate::error::LedgerError;
use crate::models::{Budget, BudgetId, OwnerId};

use super::file_io::{read_records, stage_records, write_records, StagedFile};

pub struct BudgetRepository {
    path: PathBuf,
    data: RwLock<HashMap<BudgetId, Budget>>,
}

impl BudgetRepository {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
        }
    }

    pub fn load(&self) -> Result<(), LedgerError> {
        let records: Vec<Budget> = read_records(&self.path)?;
        self.replace(records)
    }

    /// Swap in `records` wholesale
    pub fn replace(&self, records: Vec<Budget>) -> Result<(), LedgerError> {
        let mut data = self.data.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        data.clear();
        for budget in records {
            data.insert(budget.id, budget);
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

    /// Every record, in file order
    pub fn records(&self) -> Result<Vec<Budget>, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut budgets: Vec<_> = data.values().cloned().collect();
        budgets.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));

        Ok(budgets)
    }

    pub fn get(&self, id: BudgetId) -> Result<Option<Budget>, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data.get(&id).cloned())
    }

    /// An owner's budgets ordered by start date
    pub fn by_owner(&self, owner: OwnerId) -> Result<Vec<Budget>, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut budgets: Vec<_> = data
            .values()
            .filter(|b| b.owner_id == owner)
            .cloned()
            .collect();
        budgets.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
        Ok(budgets)
    }

    /// Budgets active on `date` that give `category` a share
    pub fn active_with_category(
        &self,
        owner: OwnerId,
        date: NaiveDate,
        category: &str,
    ) -> Result<Vec<Budget>, LedgerError> {
        Ok(self
            .by_owner(owner)?
            .into_iter()
            .filter(|b| b.is_active_on(date) && b.category(category).is_some())
            .collect())
    }

    pub fn upsert(&self, budget: Budget) -> Result<(), LedgerError> {
        let mut data = self.data.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        data.insert(budget.id, budget);
        Ok(())
    }

    pub fn delete(&self, id: BudgetId) -> Result<Option<Budget>, LedgerError> {
        let mut data = self.data.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        Ok(data.remove(&id))
    }
}
