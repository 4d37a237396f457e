//! Event storage and management.
//!
//! This module provides the EventStore, the single authority over the
//! in-memory event list and details side table. Every mutation applies in
//! memory first, then persists the full state through the storage contract
//! before returning; a persist failure surfaces as the operation's error
//! while the in-memory change stands, so the next successful save writes it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use parking_lot::RwLock;
use tracing::debug;

use crate::conflict::{self, Conflict};
use crate::error::Result;
use crate::event::{Event, EventDetails, EventId, EventUpdate, UNASSIGNED_ID};
use crate::recurrence;
use crate::storage::CalendarStorage;

// ============================================================================
// Event Store
// ============================================================================

/// Store for calendar events, providing CRUD and query operations backed by
/// a storage collaborator.
pub struct EventStore {
    events: RwLock<Vec<Event>>,
    details: RwLock<HashMap<EventId, EventDetails>>,
    storage: Arc<dyn CalendarStorage>,
}

impl EventStore {
    /// Create a store wired to `storage`, loading persisted state.
    pub fn new(storage: Arc<dyn CalendarStorage>) -> Result<Self> {
        let events = storage.load_events()?;
        let details = storage.load_details()?;
        debug!("Loaded {} events, {} detail records", events.len(), details.len());
        Ok(Self {
            events: RwLock::new(events),
            details: RwLock::new(details),
            storage,
        })
    }

    // ========================================================================
    // CRUD Operations
    // ========================================================================

    /// Add a single event, minting its id. Returns the assigned id.
    pub fn add(&self, mut event: Event) -> Result<EventId> {
        event.validate()?;

        let mut events = self.events.write();
        event.id = next_id(&events);
        let id = event.id;
        debug!("Adding event: {} ({})", event.title, id);
        events.push(event);
        self.storage.save_events(&events)?;
        Ok(id)
    }

    /// Add a recurring event, materializing one stored event per occurrence.
    ///
    /// Occurrences preserve the anchor's duration and carry no rule of their
    /// own. A rule that yields nothing stores the anchor alone, so a
    /// degenerate rule never erases the event. All inserts persist once.
    pub fn add_series(&self, anchor: Event) -> Result<Vec<EventId>> {
        anchor.validate()?;

        let occurrences = recurrence::expand(&anchor);
        let mut events = self.events.write();
        let mut ids = Vec::with_capacity(occurrences.len());
        for mut occurrence in occurrences {
            occurrence.id = next_id(&events);
            ids.push(occurrence.id);
            events.push(occurrence);
        }
        debug!("Added series of {} events for '{}'", ids.len(), anchor.title);
        self.storage.save_events(&events)?;
        Ok(ids)
    }

    /// Apply a partial update to the event with `id`. Returns `false` when
    /// no event has that id.
    pub fn update(&self, id: EventId, update: &EventUpdate) -> Result<bool> {
        let mut events = self.events.write();
        let Some(event) = events.iter_mut().find(|e| e.id == id) else {
            return Ok(false);
        };

        let mut updated = event.clone();
        update.apply_to(&mut updated);
        updated.validate()?;
        *event = updated;
        debug!("Updated event {}", id);
        self.storage.save_events(&events)?;
        Ok(true)
    }

    /// Remove the event with `id`, cascading its details record. Returns
    /// `false` when no event has that id.
    pub fn remove(&self, id: EventId) -> Result<bool> {
        let mut events = self.events.write();
        let before = events.len();
        events.retain(|e| e.id != id);
        if events.len() == before {
            return Ok(false);
        }
        debug!("Removed event {}", id);
        self.storage.save_events(&events)?;
        drop(events);

        let mut details = self.details.write();
        if details.remove(&id).is_some() {
            self.storage.save_details(&details)?;
        }
        Ok(true)
    }

    /// Get an event by id.
    pub fn get(&self, id: EventId) -> Option<Event> {
        self.events.read().iter().find(|e| e.id == id).cloned()
    }

    /// Snapshot of all events in insertion order.
    pub fn list(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// True when no events are stored.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    // ========================================================================
    // Title Operations
    // ========================================================================

    /// Find the first event whose title matches, case-insensitively.
    pub fn find_by_title(&self, title: &str) -> Option<Event> {
        self.events
            .read()
            .iter()
            .find(|e| e.title.eq_ignore_ascii_case(title))
            .cloned()
    }

    /// Remove every event whose title matches, case-insensitively. Returns
    /// the ids that were removed (empty when none matched).
    pub fn remove_by_title(&self, title: &str) -> Result<Vec<EventId>> {
        let mut events = self.events.write();
        let removed_ids: Vec<EventId> = events
            .iter()
            .filter(|e| e.title.eq_ignore_ascii_case(title))
            .map(|e| e.id)
            .collect();
        if removed_ids.is_empty() {
            return Ok(removed_ids);
        }
        events.retain(|e| !e.title.eq_ignore_ascii_case(title));
        debug!("Removed {} events titled '{}'", removed_ids.len(), title);
        self.storage.save_events(&events)?;
        drop(events);

        let mut details = self.details.write();
        let had_details = removed_ids.iter().any(|id| details.remove(id).is_some());
        if had_details {
            self.storage.save_details(&details)?;
        }
        Ok(removed_ids)
    }

    // ========================================================================
    // Query Operations
    // ========================================================================

    /// Events starting within `within` of `now` (inclusive), sorted by start.
    pub fn upcoming(&self, now: NaiveDateTime, within: Duration) -> Vec<Event> {
        let mut upcoming: Vec<Event> = self
            .events
            .read()
            .iter()
            .filter(|e| e.starts_within(now, within))
            .cloned()
            .collect();
        upcoming.sort_by(|a, b| a.start.cmp(&b.start));
        upcoming
    }

    /// Find the first stored event conflicting with `[start, end)`, skipping
    /// the event whose id equals `exclude`. Advisory only.
    pub fn check_conflicts(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude: Option<EventId>,
    ) -> Option<Event> {
        conflict::find_conflict(&self.events.read(), start, end, exclude).cloned()
    }

    /// All pairwise conflicts among stored events, largest overlap first.
    pub fn conflicts(&self) -> Vec<Conflict> {
        conflict::detect_conflicts(&self.events.read())
    }

    // ========================================================================
    // Details Side Table
    // ========================================================================

    /// Get the details record for an event.
    pub fn details(&self, id: EventId) -> Option<EventDetails> {
        self.details.read().get(&id).cloned()
    }

    /// Snapshot of the whole details side table.
    pub fn all_details(&self) -> HashMap<EventId, EventDetails> {
        self.details.read().clone()
    }

    /// Set the details record for an event. Returns `false` when no event
    /// has that id.
    pub fn set_details(&self, id: EventId, details: EventDetails) -> Result<bool> {
        if self.get(id).is_none() {
            return Ok(false);
        }
        let mut table = self.details.write();
        table.insert(id, details);
        self.storage.save_details(&table)?;
        Ok(true)
    }
}

/// Next id to mint: one past the highest id in use.
fn next_id(events: &[Event]) -> EventId {
    events.iter().map(|e| e.id).max().unwrap_or(UNASSIGNED_ID) + 1
}
