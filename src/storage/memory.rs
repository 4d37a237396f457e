//! In-memory storage backend.
//!
//! Holds plain snapshots behind a mutex. Used by unit and integration tests,
//! including a save-failure toggle for exercising persist-error paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::{Result, StorageError};
use crate::event::{Event, EventDetails, EventId};
use crate::storage::CalendarStorage;

/// In-memory snapshots of the three persisted collections.
#[derive(Default)]
pub struct MemoryStorage {
    events: Mutex<Vec<Event>>,
    details: Mutex<HashMap<EventId, EventDetails>>,
    notified: Mutex<HashSet<EventId>>,
    fail_saves: AtomicBool,
}

impl MemoryStorage {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save return an error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("simulated save failure".to_string()).into());
        }
        Ok(())
    }
}

impl CalendarStorage for MemoryStorage {
    fn load_events(&self) -> Result<Vec<Event>> {
        Ok(self.events.lock().clone())
    }

    fn save_events(&self, events: &[Event]) -> Result<()> {
        self.check_available()?;
        *self.events.lock() = events.to_vec();
        Ok(())
    }

    fn load_details(&self) -> Result<HashMap<EventId, EventDetails>> {
        Ok(self.details.lock().clone())
    }

    fn save_details(&self, details: &HashMap<EventId, EventDetails>) -> Result<()> {
        self.check_available()?;
        *self.details.lock() = details.clone();
        Ok(())
    }

    fn load_notified(&self) -> Result<HashSet<EventId>> {
        Ok(self.notified.lock().clone())
    }

    fn save_notified(&self, notified: &HashSet<EventId>) -> Result<()> {
        self.check_available()?;
        *self.notified.lock() = notified.clone();
        Ok(())
    }
}
