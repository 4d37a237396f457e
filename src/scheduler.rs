//! Scheduler facade that wires the engine together.
//!
//! The scheduler handles:
//! - Event CRUD over the shared store, with recurrence expansion
//! - Conflict queries against the stored calendar
//! - Reminder lifecycle: periodic scan, snooze timers, missed recovery
//! - Periodic backups and portable JSON exports
//!
//! Reminder bookkeeping spans two collaborators, so the facade keeps them
//! consistent: removing an event also clears its delivered state (ids can be
//! reused), and moving an event's start re-arms its reminder.

use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use tracing::{info, warn};

use crate::backup::{self, BackupService, ExportFormat, ExportResult};
use crate::config::Config;
use crate::conflict::Conflict;
use crate::error::Result;
use crate::event::{Event, EventDetails, EventId, EventUpdate};
use crate::reminder::{NotificationSink, NotifiedLedger, ReminderService, ReminderState};
use crate::search;
use crate::stats::CalendarStats;
use crate::storage::{self, CalendarStorage};
use crate::store::EventStore;

/// The calendar engine's front door.
pub struct Scheduler {
    /// Engine configuration.
    config: Config,
    /// Shared event store.
    store: Arc<EventStore>,
    /// Durable delivered-reminder ledger.
    ledger: Arc<NotifiedLedger>,
    /// Reminder scanning and snooze timers.
    reminders: ReminderService,
    /// Periodic backup timer.
    backups: BackupService,
}

impl Scheduler {
    /// Create a scheduler over an explicit storage backend and sink.
    pub fn new(
        config: Config,
        storage: Arc<dyn CalendarStorage>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let store = Arc::new(EventStore::new(storage.clone())?);
        let ledger = Arc::new(NotifiedLedger::new(storage.clone())?);
        let reminders = ReminderService::new(
            store.clone(),
            ledger.clone(),
            sink,
            config.reminders.clone(),
        );
        let backups = BackupService::new(storage, config.backup.clone());

        info!(
            "Scheduler ready with {} events, {} delivered reminders",
            store.len(),
            ledger.len()
        );

        Ok(Self {
            config,
            store,
            ledger,
            reminders,
            backups,
        })
    }

    /// Create a scheduler backed by the configured data directory.
    pub fn from_config(config: Config, sink: Arc<dyn NotificationSink>) -> Result<Self> {
        let storage = storage::create_storage(&config)?;
        Self::new(config, storage, sink)
    }

    /// The configuration the scheduler was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start background work: recover reminders missed while the engine was
    /// down, then start the periodic scan and (when enabled) the backup
    /// timer.
    pub async fn start(&self) {
        let now = Local::now().naive_local();
        self.reminders.recover_missed(now).await;
        self.reminders.start();
        self.backups.start();
        info!("Scheduler started");
    }

    /// Gracefully stop the scan and backup tasks and all snooze timers.
    pub async fn stop(&self) {
        self.reminders.stop().await;
        self.backups.stop().await;
        info!("Scheduler stopped");
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Add a single event, returning its assigned id.
    pub fn add_event(&self, event: Event) -> Result<EventId> {
        self.store.add(event)
    }

    /// Expand a recurring event and add every occurrence. Returns the
    /// assigned ids in chronological order.
    pub fn add_series(&self, anchor: Event) -> Result<Vec<EventId>> {
        self.store.add_series(anchor)
    }

    /// Apply a partial update. A start change re-arms the event's reminder.
    /// Returns false when no such event exists.
    pub fn update_event(&self, id: EventId, update: &EventUpdate) -> Result<bool> {
        let changed = self.store.update(id, update)?;
        if changed && update.start.is_some() {
            self.ledger.clear(id)?;
        }
        Ok(changed)
    }

    /// Remove an event and its reminder bookkeeping. Returns false when no
    /// such event exists.
    pub fn remove_event(&self, id: EventId) -> Result<bool> {
        let removed = self.store.remove(id)?;
        if removed {
            self.ledger.clear(id)?;
        }
        Ok(removed)
    }

    /// Remove every event whose title matches, case-insensitively. Returns
    /// how many were removed.
    pub fn remove_events_by_title(&self, title: &str) -> Result<usize> {
        let ids = self.store.remove_by_title(title)?;
        for id in &ids {
            self.ledger.clear(*id)?;
        }
        Ok(ids.len())
    }

    /// Look up an event by id.
    pub fn get_event(&self, id: EventId) -> Option<Event> {
        self.store.get(id)
    }

    /// Snapshot of all events in insertion order.
    pub fn events(&self) -> Vec<Event> {
        self.store.list()
    }

    /// Number of stored events.
    pub fn event_count(&self) -> usize {
        self.store.len()
    }

    /// First event with a matching title, case-insensitively.
    pub fn find_by_title(&self, title: &str) -> Option<Event> {
        self.store.find_by_title(title)
    }

    /// Events starting within `within` of `now`, sorted by start.
    pub fn upcoming(&self, now: NaiveDateTime, within: Duration) -> Vec<Event> {
        self.store.upcoming(now, within)
    }

    // ========================================================================
    // Conflicts
    // ========================================================================

    /// Find the first stored event conflicting with `[start, end)`, skipping
    /// `exclude` when checking a reschedule against itself.
    pub fn check_conflicts(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        exclude: Option<EventId>,
    ) -> Option<Event> {
        self.store.check_conflicts(start, end, exclude)
    }

    /// All pairwise conflicts among stored events, largest overlap first.
    pub fn conflicts(&self) -> Vec<Conflict> {
        self.store.conflicts()
    }

    // ========================================================================
    // Details
    // ========================================================================

    /// Side-table details for an event, if any.
    pub fn details(&self, id: EventId) -> Option<EventDetails> {
        self.store.details(id)
    }

    /// Attach or replace details for an event. Returns false when no such
    /// event exists.
    pub fn set_details(&self, id: EventId, details: EventDetails) -> Result<bool> {
        self.store.set_details(id, details)
    }

    // ========================================================================
    // Reminders
    // ========================================================================

    /// Run one reminder scan pass at `now`. Returns how many reminders were
    /// delivered.
    pub async fn scan_reminders(&self, now: NaiveDateTime) -> usize {
        self.reminders.scan_once(now).await
    }

    /// Recover reminders missed before `now`. Returns how many were found.
    pub async fn recover_missed(&self, now: NaiveDateTime) -> usize {
        self.reminders.recover_missed(now).await
    }

    /// Schedule (or replace) a snooze timer for an event's reminder.
    pub fn schedule_snooze(&self, id: EventId, minutes: u32) {
        self.reminders.schedule_snooze(id, minutes);
    }

    /// The reminder state of an event as of `now`, or `None` when no such
    /// event exists.
    pub fn reminder_state(&self, id: EventId, now: NaiveDateTime) -> Option<ReminderState> {
        self.store
            .get(id)
            .map(|event| self.reminders.state_of(&event, now))
    }

    /// Forget an event's delivered state so its reminder can fire again.
    /// Returns false when the event had none.
    pub fn clear_notified(&self, id: EventId) -> Result<bool> {
        self.ledger.clear(id)
    }

    // ========================================================================
    // Search and Statistics
    // ========================================================================

    /// Events whose title or description contains `keyword`.
    pub fn search(&self, keyword: &str) -> Vec<Event> {
        search::by_keyword(&self.store.list(), keyword)
    }

    /// Events starting on the given calendar date.
    pub fn events_on(&self, date: NaiveDate) -> Vec<Event> {
        search::on_date(&self.store.list(), date)
    }

    /// Events whose start date lies within the inclusive date range.
    pub fn events_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<Event> {
        search::in_range(&self.store.list(), from, to)
    }

    /// Events whose details (location, category, priority) contain `keyword`.
    pub fn search_details(&self, keyword: &str) -> Vec<Event> {
        search::by_details(&self.store.list(), &self.store.all_details(), keyword)
    }

    /// Aggregate statistics over the stored calendar as of `now`.
    pub fn stats(&self, now: NaiveDateTime) -> CalendarStats {
        CalendarStats::compute(&self.store.list(), now)
    }

    // ========================================================================
    // Export and Import
    // ========================================================================

    /// Export all events and details to `path`.
    pub fn export(&self, path: impl AsRef<Path>, format: ExportFormat) -> Result<ExportResult> {
        backup::export_events(&self.store.list(), &self.store.all_details(), path, format)
    }

    /// Import events from an export file, assigning fresh ids. Invalid
    /// records are skipped with a warning. Returns how many were added.
    pub fn import(&self, path: impl AsRef<Path>, format: ExportFormat) -> Result<usize> {
        let records = backup::import_events(path, format)?;
        let mut imported = 0;
        for record in records {
            let title = record.event.title.clone();
            match self.store.add(record.event) {
                Ok(id) => {
                    if let Some(details) = record.details {
                        if !details.is_empty() {
                            self.store.set_details(id, details)?;
                        }
                    }
                    imported += 1;
                }
                Err(e) => warn!("Skipping invalid imported event '{}': {}", title, e),
            }
        }
        info!("Imported {} events", imported);
        Ok(imported)
    }
}
