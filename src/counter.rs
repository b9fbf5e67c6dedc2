//! Sequential PO number allocation.
//!
//! The durable store is the single source of truth. Allocation is a single
//! store operation: the database store increments inside one immediate
//! SQLite transaction, so separate processes sharing a database never observe
//! the same value. `PoCounter` additionally serialises callers in-process, and
//! a value is only returned once it has been saved.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::cache::PoDisplayCache;
use crate::error::{PorError, PorResult};

/// One durable integer slot.
///
/// The provided `current_or_init` and `increment` are a load followed by a
/// save; stores shared between processes override them with an atomic version.
pub trait CounterStore: Send + Sync {
    /// `None` when no value has ever been saved.
    fn load(&self) -> PorResult<Option<i64>>;
    fn save(&self, value: i64) -> PorResult<()>;

    /// Stored value, saving `start` first when the slot is empty.
    fn current_or_init(&self, start: i64) -> PorResult<i64> {
        match self.load()? {
            Some(value) => Ok(value),
            None => {
                debug!(starting_value = start, "Initialising PO counter");
                self.save(start)?;
                Ok(start)
            }
        }
    }

    /// Advance the slot by one and return the new value.
    fn increment(&self, start: i64) -> PorResult<i64> {
        let next = self
            .current_or_init(start)?
            .checked_add(1)
            .ok_or_else(|| PorError::Persistence("PO counter overflow".to_string()))?;
        self.save(next)?;
        Ok(next)
    }
}

impl<T: CounterStore + ?Sized> CounterStore for Arc<T> {
    fn load(&self) -> PorResult<Option<i64>> {
        (**self).load()
    }

    fn save(&self, value: i64) -> PorResult<()> {
        (**self).save(value)
    }

    fn current_or_init(&self, start: i64) -> PorResult<i64> {
        (**self).current_or_init(start)
    }

    fn increment(&self, start: i64) -> PorResult<i64> {
        (**self).increment(start)
    }
}

/// Counter persisted as a decimal number in a text file.
///
/// Only safe within one process: the file carries no lock, so two processes
/// allocating from the same file can issue the same number. Use the database
/// store when several processes share a counter.
pub struct FileCounterStore {
    path: PathBuf,
}

impl FileCounterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCounterStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CounterStore for FileCounterStore {
    fn load(&self) -> PorResult<Option<i64>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .map_err(|e| PorError::Persistence(format!("Failed to read PO counter: {}", e)))?;
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }
        content.parse::<i64>().map(Some).map_err(|_| {
            PorError::Persistence(format!(
                "Corrupt PO counter file {}: {:?}",
                self.path.display(),
                content
            ))
        })
    }

    fn save(&self, value: i64) -> PorResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    PorError::Persistence(format!("Failed to create counter directory: {}", e))
                })?;
            }
        }
        // Write then rename so a crash never leaves a half-written number.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, value.to_string())
            .map_err(|e| PorError::Persistence(format!("Failed to write PO counter: {}", e)))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            PorError::Persistence(format!("Failed to replace PO counter: {}", e))
        })
    }
}

pub struct PoCounter {
    store: Box<dyn CounterStore>,
    lock: Mutex<()>,
    starting_value: i64,
    display: PoDisplayCache,
}

impl PoCounter {
    /// Wrap a store, creating its state at `starting_value` if it has none.
    pub fn new(store: Box<dyn CounterStore>, starting_value: i64) -> PorResult<Self> {
        let counter = PoCounter {
            store,
            lock: Mutex::new(()),
            starting_value,
            display: PoDisplayCache::new(),
        };
        let current = counter.current()?;
        info!(current, "PO counter ready");
        Ok(counter)
    }

    fn guard(&self) -> PorResult<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| PorError::Persistence("PO counter lock poisoned".to_string()))
    }

    /// Last issued number, read from the store.
    pub fn current(&self) -> PorResult<i64> {
        let _guard = self.guard()?;
        let value = self.store.current_or_init(self.starting_value)?;
        self.display.set(value);
        Ok(value)
    }

    /// Allocate the next number. If the save fails nothing is issued and the
    /// stored value is unchanged.
    pub fn next(&self) -> PorResult<i64> {
        let _guard = self.guard()?;
        let next = match self.store.increment(self.starting_value) {
            Ok(next) => next,
            Err(e) => {
                warn!(error = %e, "PO allocation failed; counter not advanced");
                self.display.invalidate();
                return Err(e);
            }
        };
        self.display.set(next);
        info!(po_number = next, "PO number allocated");
        Ok(next)
    }

    /// Overwrite the last issued number; the next allocation returns `value + 1`.
    pub fn set_value(&self, value: i64) -> PorResult<()> {
        if value < 1 {
            return Err(PorError::InvalidOverride(value));
        }
        let _guard = self.guard()?;
        self.store.save(value)?;
        self.display.set(value);
        info!(po_number = value, "PO counter overridden");
        Ok(())
    }

    /// Cached projection for display. May lag behind a concurrent writer;
    /// never use it to derive a number.
    pub fn displayed(&self) -> Option<i64> {
        self.display.get()
    }
}
