//! Durable record of delivered reminders.
//!
//! The ledger is the at-most-once guard: an event id lands here the moment
//! its reminder is dismissed, and the set is persisted through the storage
//! contract before any further scan work, so a crash between scans never
//! re-fires a delivered reminder.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::event::{Event, EventId};
use crate::storage::CalendarStorage;

/// Persistent set of event ids whose reminders were delivered.
pub struct NotifiedLedger {
    notified: RwLock<HashSet<EventId>>,
    storage: Arc<dyn CalendarStorage>,
}

impl NotifiedLedger {
    /// Create a ledger wired to `storage`, loading persisted state.
    pub fn new(storage: Arc<dyn CalendarStorage>) -> Result<Self> {
        let notified = storage.load_notified()?;
        debug!("Loaded {} delivered reminder entries", notified.len());
        Ok(Self {
            notified: RwLock::new(notified),
            storage,
        })
    }

    /// Whether the reminder for `id` was already delivered.
    pub fn contains(&self, id: EventId) -> bool {
        self.notified.read().contains(&id)
    }

    /// Record `id` as delivered and persist immediately.
    pub fn mark(&self, id: EventId) -> Result<()> {
        let mut notified = self.notified.write();
        if notified.insert(id) {
            self.storage.save_notified(&notified)?;
        }
        Ok(())
    }

    /// Record a batch of ids as delivered with a single persist.
    pub fn mark_all(&self, ids: &[EventId]) -> Result<()> {
        let mut notified = self.notified.write();
        let mut changed = false;
        for id in ids {
            changed |= notified.insert(*id);
        }
        if changed {
            self.storage.save_notified(&notified)?;
        }
        Ok(())
    }

    /// Forget the delivered state for `id`, re-arming its reminder. Returns
    /// `false` when the id was not recorded.
    pub fn clear(&self, id: EventId) -> Result<bool> {
        let mut notified = self.notified.write();
        if notified.remove(&id) {
            self.storage.save_notified(&notified)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Drop entries whose event no longer exists and entries whose event
    /// ended more than `retention` before `now`. Returns how many were
    /// dropped.
    pub fn prune(
        &self,
        events: &[Event],
        now: NaiveDateTime,
        retention: Duration,
    ) -> Result<usize> {
        let mut notified = self.notified.write();
        let before = notified.len();
        notified.retain(|id| {
            events
                .iter()
                .find(|e| e.id == *id)
                .is_some_and(|e| e.end + retention >= now)
        });
        let dropped = before - notified.len();
        if dropped > 0 {
            self.storage.save_notified(&notified)?;
            debug!("Pruned {} delivered reminder entries", dropped);
        }
        Ok(dropped)
    }

    /// Number of delivered entries.
    pub fn len(&self) -> usize {
        self.notified.read().len()
    }

    /// True when nothing has been delivered.
    pub fn is_empty(&self) -> bool {
        self.notified.read().is_empty()
    }
}
