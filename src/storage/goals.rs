//! Savings goal repository for JSON storage

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::LedgerError;
use crate::models::{GoalId, Money, OwnerId, SavingsGoal};

use super::file_io::{read_records, stage_records, write_records, StagedFile};

pub struct GoalRepository {
    path: PathBuf,
    data: RwLock<HashMap<GoalId, SavingsGoal>>,
}

impl GoalRepository {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
        }
    }

    pub fn load(&self) -> Result<(), LedgerError> {
        let records: Vec<SavingsGoal> = read_records(&self.path)?;
        self.replace(records)
    }

    /// Swap in `records` wholesale
    pub fn replace(&self, records: Vec<SavingsGoal>) -> Result<(), LedgerError> {
        let mut data = self.data.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        data.clear();
        for goal in records {
            data.insert(goal.id, goal);
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

    /// All goals, oldest first
    pub fn records(&self) -> Result<Vec<SavingsGoal>, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut goals: Vec<_> = data.values().cloned().collect();
        goals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(goals)
    }

    pub fn get(&self, id: GoalId) -> Result<Option<SavingsGoal>, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data.get(&id).cloned())
    }

    /// Find a goal by name (case-insensitive) within an owner's goals
    pub fn find_by_name(
        &self,
        owner: OwnerId,
        name: &str,
    ) -> Result<Option<SavingsGoal>, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let name_lower = name.to_lowercase();
        Ok(data
            .values()
            .find(|g| g.owner_id == owner && g.name.to_lowercase() == name_lower)
            .cloned())
    }

    /// An owner's goals, oldest first
    pub fn by_owner(&self, owner: OwnerId) -> Result<Vec<SavingsGoal>, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut goals: Vec<_> = data
            .values()
            .filter(|g| g.owner_id == owner)
            .cloned()
            .collect();
        goals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(goals)
    }

    pub fn upsert(&self, goal: SavingsGoal) -> Result<(), LedgerError> {
        let mut data = self.data.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        data.insert(goal.id, goal);
        Ok(())
    }

    /// Overwrite a goal's allocated amount, returning the previous state
    pub fn set_amount(&self, id: GoalId, amount: Money) -> Result<SavingsGoal, LedgerError> {
        let mut data = self.data.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let goal = data
            .get_mut(&id)
            .ok_or_else(|| LedgerError::goal_not_found(id.to_string()))?;
        let before = goal.clone();
        goal.current_amount = amount;
        goal.touch();
        Ok(before)
    }

    pub fn delete(&self, id: GoalId) -> Result<Option<SavingsGoal>, LedgerError> {
        let mut data = self.data.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        Ok(data.remove(&id))
    }
}
