//! Surplus tracker repository for JSON storage
//!
//! One tracker per owner. An owner without a stored tracker reads as a fresh
//! zero tracker.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::LedgerError;
use crate::models::{OwnerId, SurplusTracker};

use super::file_io::{read_records, stage_records, write_records, StagedFile};

pub struct SurplusRepository {
    path: PathBuf,
    data: RwLock<HashMap<OwnerId, SurplusTracker>>,
}

impl SurplusRepository {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(HashMap::new()),
        }
    }

    pub fn load(&self) -> Result<(), LedgerError> {
        let records: Vec<SurplusTracker> = read_records(&self.path)?;
        self.replace(records)
    }

    /// Swap in `records` wholesale
    pub fn replace(&self, records: Vec<SurplusTracker>) -> Result<(), LedgerError> {
        let mut data = self.data.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        data.clear();
        for tracker in records {
            data.insert(tracker.owner_id, tracker);
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

    pub fn records(&self) -> Result<Vec<SurplusTracker>, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut trackers: Vec<_> = data.values().cloned().collect();
        trackers.sort_by_key(|t| t.owner_id);

        Ok(trackers)
    }

    /// The owner's tracker, or a zero tracker if none is stored
    pub fn get(&self, owner: OwnerId) -> Result<SurplusTracker, LedgerError> {
        let data = self.data.read().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data
            .get(&owner)
            .cloned()
            .unwrap_or_else(|| SurplusTracker::new(owner)))
    }

    /// Store a tracker, returning the previous one if any
    pub fn set(&self, tracker: SurplusTracker) -> Result<Option<SurplusTracker>, LedgerError> {
        let mut data = self.data.write().map_err(|e| {
            LedgerError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        Ok(data.insert(tracker.owner_id, tracker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Money;
    use tempfile::TempDir;

    #[test]
    fn test_missing_tracker_reads_as_zero() {
        let temp_dir = TempDir::new().unwrap();
        let repo = SurplusRepository::new(temp_dir.path().join("surplus.json"));
        let tracker = repo.get(OwnerId::new()).unwrap();
        assert_eq!(tracker.accumulated_balance, Money::zero());
    }

    #[test]
    fn test_set_save_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("surplus.json");
        let repo = SurplusRepository::new(path.clone());
        let owner = OwnerId::new();

        let mut tracker = SurplusTracker::new(owner);
        tracker.refund(Money::from_units(2000));
        assert!(repo.set(tracker).unwrap().is_none());
        repo.save().unwrap();

        let repo2 = SurplusRepository::new(path);
        repo2.load().unwrap();
        assert_eq!(
            repo2.get(owner).unwrap().accumulated_balance,
            Money::from_units(2000)
        );
    }
}
