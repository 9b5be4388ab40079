//! Advisory lock serializing every process that shares one ledger file.
//!
//! A snapshot-backed ledger is only consistent if load, mutation and save
//! run as one critical section. The lock lives on a `<ledger>.lock` sibling
//! so the ledger itself can be replaced by rename while it is held.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fd_lock::{RwLock, RwLockWriteGuard};
use tracing::debug;

use crate::error::{DuelError, DuelResult};

pub struct LedgerLock {
    path: PathBuf,
    lock: RwLock<File>,
}

impl LedgerLock {
    /// Open (creating if needed) the lock file guarding `ledger`.
    pub fn open(ledger: &Path) -> DuelResult<Self> {
        let path = lock_path(ledger);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| DuelError::Storage(format!("opening {}: {}", path.display(), e)))?;
        Ok(Self {
            path,
            lock: RwLock::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until this handle holds the ledger exclusively. Released when
    /// the guard is dropped.
    pub fn acquire(&mut self) -> DuelResult<RwLockWriteGuard<'_, File>> {
        debug!(path = %self.path.display(), "Acquiring ledger lock");
        let path = &self.path;
        self.lock
            .write()
            .map_err(|e| DuelError::Storage(format!("locking {}: {}", path.display(), e)))
    }
}

fn lock_path(ledger: &Path) -> PathBuf {
    let mut name = ledger
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "ledger".into());
    name.push(".lock");
    ledger.with_file_name(name)
}
