use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use common::{HoldingsStore, HoldingsTable, Result};

use crate::CsvHoldingsStore;

/// Exclusive access to the underlying store for the lifetime of the guard.
pub type StoreGuard<'a> = MutexGuard<'a, Box<dyn HoldingsStore>>;

/// The single critical section around the holdings table.
///
/// Ticks hold the guard while they apply fetched quotes, from re-load to
/// final save; commands go through [`SharedStore::update`]. Either way no
/// load-mutate-save sequence can interleave with another one.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<Box<dyn HoldingsStore>>>,
}

impl SharedStore {
    pub fn new<S: HoldingsStore + 'static>(store: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(store))),
        }
    }

    /// Take the store for a multi-step sequence (a whole tick).
    pub async fn lock(&self) -> StoreGuard<'_> {
        self.inner.lock().await
    }

    /// Load a consistent copy of the table.
    pub async fn read(&self) -> Result<HoldingsTable> {
        self.inner.lock().await.load()
    }

    /// Load, apply `f`, and save. Nothing is written if `f` fails.
    pub async fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut HoldingsTable) -> Result<T>,
    {
        let store = self.inner.lock().await;
        let mut table = store.load()?;
        let out = f(&mut table)?;
        store.save(&table)?;
        Ok(out)
    }

    /// Write a timestamped CSV copy of the table into `dir`.
    pub async fn backup(&self, dir: &Path, now: NaiveDateTime) -> Result<PathBuf> {
        let table = self.read().await?;
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("holdings_{}.csv", now.format("%Y%m%d_%H%M%S")));
        CsvHoldingsStore::new(&path).save(&table)?;
        info!(path = %path.display(), rows = table.holdings.len(), "Holdings backup written");
        Ok(path)
    }
}
