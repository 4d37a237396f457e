//! Core event types for the calendar engine.
//!
//! This module defines events, recurrence rules, and the side-table
//! details record. All timestamps are naive local wall-clock times.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{EventError, Result};

/// Identifier for a persisted event. Positive once assigned by the store.
pub type EventId = i64;

/// Id value carried by events that have not been through the store yet.
pub const UNASSIGNED_ID: EventId = 0;

// ============================================================================
// Event
// ============================================================================

/// A calendar event occupying a concrete time interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier, assigned by the store on insert.
    pub id: EventId,
    /// Event title.
    pub title: String,
    /// Event description (may be empty).
    #[serde(default)]
    pub description: String,
    /// Start time of the event.
    pub start: NaiveDateTime,
    /// End time of the event, strictly after `start`.
    pub end: NaiveDateTime,
    /// Reminder lead time in minutes before `start`. Zero disables reminders.
    #[serde(default)]
    pub reminder_minutes: i64,
    /// Recurrence rule for repeating events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
}

impl Event {
    /// Create a new event, validating title and times.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Self> {
        let event = Self {
            id: UNASSIGNED_ID,
            title: title.into(),
            description: description.into(),
            start,
            end,
            reminder_minutes: 0,
            recurrence: None,
        };
        event.validate()?;
        Ok(event)
    }

    /// Set the reminder lead time in minutes.
    pub fn with_reminder(mut self, minutes: i64) -> Self {
        self.reminder_minutes = minutes;
        self
    }

    /// Set the recurrence rule.
    pub fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    /// Check the event invariants: non-empty title, end after start,
    /// non-negative reminder lead, interval of at least 1.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(EventError::EmptyTitle.into());
        }
        if self.end <= self.start {
            return Err(EventError::InvalidTimes {
                start: self.start,
                end: self.end,
            }
            .into());
        }
        if self.reminder_minutes < 0 {
            return Err(EventError::InvalidLead(self.reminder_minutes).into());
        }
        if let Some(ref recurrence) = self.recurrence {
            if recurrence.interval == 0 {
                return Err(EventError::InvalidInterval(recurrence.interval).into());
            }
        }
        Ok(())
    }

    /// Get the duration of the event.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// The time at which this event's reminder becomes due, if reminders
    /// are enabled.
    pub fn reminder_time(&self) -> Option<NaiveDateTime> {
        if self.reminder_minutes > 0 {
            Some(self.start - Duration::minutes(self.reminder_minutes))
        } else {
            None
        }
    }

    /// Whole minutes from `now` until the event starts. Negative once the
    /// start has passed by a full minute.
    pub fn minutes_until_start(&self, now: NaiveDateTime) -> i64 {
        (self.start - now).num_minutes()
    }

    /// Check if this event overlaps with another. Intervals are half-open:
    /// touching endpoints do not overlap.
    pub fn overlaps_with(&self, other: &Event) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Check if the event ended before `now`.
    pub fn has_ended(&self, now: NaiveDateTime) -> bool {
        self.end < now
    }

    /// Check if the event starts within `within` of `now` (inclusive).
    pub fn starts_within(&self, now: NaiveDateTime, within: Duration) -> bool {
        self.start >= now && self.start <= now + within
    }
}

// ============================================================================
// Recurrence
// ============================================================================

/// Recurrence frequency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// Stable uppercase token used by the flat-file format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
        }
    }

    /// Parse a frequency token, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            _ => None,
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recurrence rule for repeating events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recurrence {
    /// The recurrence frequency.
    pub frequency: Frequency,
    /// Interval between occurrences (e.g., every 2 weeks). At least 1.
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// Inclusive end of the rule: an occurrence landing exactly here is kept.
    pub until: NaiveDateTime,
}

fn default_interval() -> u32 {
    1
}

impl Recurrence {
    /// Create a daily recurrence ending at `until`.
    pub fn daily(until: NaiveDateTime) -> Self {
        Self {
            frequency: Frequency::Daily,
            interval: 1,
            until,
        }
    }

    /// Create a weekly recurrence ending at `until`.
    pub fn weekly(until: NaiveDateTime) -> Self {
        Self {
            frequency: Frequency::Weekly,
            interval: 1,
            until,
        }
    }

    /// Create a monthly recurrence ending at `until`.
    pub fn monthly(until: NaiveDateTime) -> Self {
        Self {
            frequency: Frequency::Monthly,
            interval: 1,
            until,
        }
    }

    /// Set the interval.
    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    /// Whether the rule is still active at `now` (the rule end is inclusive).
    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        now <= self.until
    }
}

// ============================================================================
// Event Update
// ============================================================================

/// Partial update applied to an existing event. Unset fields keep their
/// current values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventUpdate {
    /// New title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New start time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDateTime>,
    /// New end time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDateTime>,
    /// New reminder lead in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_minutes: Option<i64>,
    /// New recurrence rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    /// Clear the recurrence rule.
    #[serde(default)]
    pub clear_recurrence: bool,
}

impl EventUpdate {
    /// Apply this update to an event.
    pub fn apply_to(&self, event: &mut Event) {
        if let Some(ref title) = self.title {
            event.title = title.clone();
        }
        if let Some(ref description) = self.description {
            event.description = description.clone();
        }
        if let Some(start) = self.start {
            event.start = start;
        }
        if let Some(end) = self.end {
            event.end = end;
        }
        if let Some(reminder_minutes) = self.reminder_minutes {
            event.reminder_minutes = reminder_minutes;
        }
        if let Some(ref recurrence) = self.recurrence {
            event.recurrence = Some(recurrence.clone());
        }
        if self.clear_recurrence {
            event.recurrence = None;
        }
    }
}

// ============================================================================
// Event Details
// ============================================================================

/// Side-table record with extra fields stored per event id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: String,
}

impl EventDetails {
    /// Create a details record.
    pub fn new(
        location: impl Into<String>,
        category: impl Into<String>,
        priority: impl Into<String>,
    ) -> Self {
        Self {
            location: location.into(),
            category: category.into(),
            priority: priority.into(),
        }
    }

    /// True when every field is empty.
    pub fn is_empty(&self) -> bool {
        self.location.is_empty() && self.category.is_empty() && self.priority.is_empty()
    }
}
