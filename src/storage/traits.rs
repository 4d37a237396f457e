//! Storage trait definitions.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::event::{Event, EventDetails, EventId};

/// Trait for calendar storage backends.
///
/// The contract is synchronous: the store calls these methods inline after
/// every mutation, and the reminder ledger persists through them before scan
/// work continues. Async ends at the scheduler boundary.
pub trait CalendarStorage: Send + Sync {
    /// Load all persisted events.
    fn load_events(&self) -> crate::error::Result<Vec<Event>>;

    /// Persist the full event list, replacing previous state.
    fn save_events(&self, events: &[Event]) -> crate::error::Result<()>;

    /// Load the details side table.
    fn load_details(&self) -> crate::error::Result<HashMap<EventId, EventDetails>>;

    /// Persist the details side table, replacing previous state.
    fn save_details(&self, details: &HashMap<EventId, EventDetails>) -> crate::error::Result<()>;

    /// Load the set of event ids whose reminders were already delivered.
    fn load_notified(&self) -> crate::error::Result<HashSet<EventId>>;

    /// Persist the delivered set, replacing previous state.
    fn save_notified(&self, notified: &HashSet<EventId>) -> crate::error::Result<()>;

    /// Write a backup snapshot, returning its location when one was made.
    fn backup(&self) -> crate::error::Result<Option<PathBuf>> {
        Ok(None)
    }
}
