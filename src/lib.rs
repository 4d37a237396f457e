//! Chime: a personal calendar and reminder engine.
//!
//! Chime stores events with optional recurrence rules, expands them into
//! concrete occurrences, detects schedule conflicts, and delivers each
//! reminder at most once through a pluggable notification sink. State
//! survives restarts via a flat-file storage backend with a durable
//! delivered-reminder ledger.

pub mod backup;
pub mod config;
pub mod conflict;
pub mod error;
pub mod event;
pub mod recurrence;
pub mod reminder;
pub mod scheduler;
pub mod search;
pub mod stats;
pub mod storage;
pub mod store;

pub use backup::{
    export_events, import_events, BackupService, EventExport, ExportFormat, ExportResult,
};
pub use config::{BackupConfig, Config, ReminderConfig, StorageConfig};
pub use conflict::{detect_conflicts, find_conflict, is_slot_free, overlaps, Conflict};
pub use error::{ChimeError, ConfigError, EventError, Result, StorageError};
pub use event::{
    Event, EventDetails, EventId, EventUpdate, Frequency, Recurrence, UNASSIGNED_ID,
};
pub use reminder::{
    ChannelSink, MissedAction, NotificationSink, NotifiedLedger, ReminderAction, ReminderService,
    ReminderState, SinkRequest,
};
pub use scheduler::Scheduler;
pub use stats::{CalendarStats, LongestEvent};
pub use storage::{create_storage, CalendarStorage, CsvStorage, MemoryStorage};
pub use store::EventStore;
