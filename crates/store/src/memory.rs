use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use common::{Error, HoldingsStore, HoldingsTable, Result};

/// In-process holdings table. Used for dry runs and as a test double; load
/// and save failures can be switched on to exercise abort paths.
#[derive(Default)]
pub struct MemoryStore {
    table: Mutex<HoldingsTable>,
    fail_load: AtomicBool,
    fail_save: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new(table: HoldingsTable) -> Self {
        Self {
            table: Mutex::new(table),
            ..Self::default()
        }
    }

    pub fn set_fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current contents, bypassing the failure switches.
    pub fn snapshot(&self) -> HoldingsTable {
        self.table
            .lock()
            .map(|t| t.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl HoldingsStore for MemoryStore {
    fn load(&self) -> Result<HoldingsTable> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(Error::Store("memory store: load disabled".into()));
        }
        self.table
            .lock()
            .map(|t| t.clone())
            .map_err(|_| Error::Store("memory store lock poisoned".into()))
    }

    fn save(&self, table: &HoldingsTable) -> Result<()> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(Error::Store("memory store: save disabled".into()));
        }
        let mut guard = self
            .table
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".into()))?;
        *guard = table.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
