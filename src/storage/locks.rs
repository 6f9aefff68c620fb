//! Store-wide serialization
//!
//! Every unit of work holds the data directory's lock file exclusively, so a
//! read-check-write sequence never interleaves with another one, whether it
//! runs on another thread or in another `surplus` process. Threads of one
//! process queue on a busy flag before they touch the file lock.
//!
//! [`OwnerGuard`] is what callers hold: it names the owner the unit works
//! on, tells the store when the unit ends and releases the lock last.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};

use fs4::FileExt;

use crate::error::LedgerError;
use crate::models::OwnerId;

#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    busy: Mutex<bool>,
    released: Condvar,
}

impl StoreLock {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            busy: Mutex::new(false),
            released: Condvar::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until no other thread or process holds the store, then claim it
    pub fn acquire(&self) -> Result<StoreLease<'_>, LedgerError> {
        let mut busy = self
            .busy
            .lock()
            .map_err(|e| LedgerError::Storage(format!("Failed to acquire store lock: {}", e)))?;
        while *busy {
            busy = self.released.wait(busy).map_err(|e| {
                LedgerError::Storage(format!("Failed to acquire store lock: {}", e))
            })?;
        }
        *busy = true;
        drop(busy);

        match self.lock_file() {
            Ok(file) => Ok(StoreLease {
                lock: self,
                file: Some(file),
            }),
            Err(err) => {
                self.release();
                Err(err)
            }
        }
    }

    fn lock_file(&self) -> Result<File, LedgerError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| {
                LedgerError::Storage(format!("Failed to open {}: {}", self.path.display(), e))
            })?;
        file.lock_exclusive().map_err(|e| {
            LedgerError::Storage(format!("Failed to lock {}: {}", self.path.display(), e))
        })?;
        Ok(file)
    }

    fn release(&self) {
        let mut busy = match self.busy.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *busy = false;
        drop(busy);
        self.released.notify_all();
    }
}

/// Exclusive hold on the store; closing the file drops the OS lock
#[derive(Debug)]
pub struct StoreLease<'a> {
    lock: &'a StoreLock,
    file: Option<File>,
}

impl Drop for StoreLease<'_> {
    fn drop(&mut self) {
        drop(self.file.take());
        self.lock.release();
    }
}

/// The store side of a unit of work
pub trait UnitScope: Sync {
    /// Called once when the guard for the unit is dropped, lock still held
    fn end_unit(&self);
}

/// Proof that the holder has exclusive access to the store while working on
/// one owner's records
pub struct OwnerGuard<'a> {
    owner: OwnerId,
    scope: &'a dyn UnitScope,
    _lease: StoreLease<'a>,
}

impl<'a> OwnerGuard<'a> {
    pub fn new(owner: OwnerId, scope: &'a dyn UnitScope, lease: StoreLease<'a>) -> Self {
        Self {
            owner,
            scope,
            _lease: lease,
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }
}

impl std::fmt::Debug for OwnerGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerGuard").field("owner", &self.owner).finish()
    }
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        self.scope.end_unit();
    }
}
