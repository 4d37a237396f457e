//! Aggregate statistics over an event snapshot.
//!
//! Pure computation; rendering is the caller's job. Counts go by the
//! event's start time, and ties resolve to the earliest bucket.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::Serialize;

use crate::event::{Event, EventDetails, EventId};

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// The longest stored event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongestEvent {
    pub id: EventId,
    pub title: String,
    pub minutes: i64,
}

/// Aggregate calendar statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarStats {
    /// Total number of events.
    pub total_events: usize,
    /// Events starting after `now`.
    pub upcoming: usize,
    /// Events starting at or before `now`.
    pub past: usize,
    /// Events carrying a recurrence rule.
    pub recurring: usize,
    /// Events without one.
    pub single: usize,
    /// Weekday with the most event starts.
    pub busiest_weekday: Option<Weekday>,
    /// Hour of day (0-23) with the most event starts.
    pub busiest_hour: Option<u32>,
    /// Month (1-12) with the most event starts.
    pub busiest_month: Option<u32>,
    /// Events per week across the observed start-time span.
    pub events_per_week: f64,
    /// Mean event duration in minutes.
    pub average_duration_minutes: f64,
    /// Total scheduled minutes across all events.
    pub total_minutes: i64,
    /// The single longest event.
    pub longest_event: Option<LongestEvent>,
}

impl CalendarStats {
    /// Compute statistics over a snapshot as of `now`.
    pub fn compute(events: &[Event], now: NaiveDateTime) -> Self {
        let total_events = events.len();
        let upcoming = events.iter().filter(|e| e.start > now).count();
        let recurring = events.iter().filter(|e| e.recurrence.is_some()).count();

        let mut weekday_counts = [0usize; 7];
        let mut hour_counts = [0usize; 24];
        let mut month_counts = [0usize; 12];
        let mut total_minutes = 0i64;
        let mut longest_event: Option<LongestEvent> = None;

        for event in events {
            weekday_counts[event.start.weekday().num_days_from_monday() as usize] += 1;
            hour_counts[event.start.hour() as usize] += 1;
            month_counts[event.start.month0() as usize] += 1;

            let minutes = event.duration().num_minutes();
            total_minutes += minutes;
            if longest_event.as_ref().map_or(true, |l| minutes > l.minutes) {
                longest_event = Some(LongestEvent {
                    id: event.id,
                    title: event.title.clone(),
                    minutes,
                });
            }
        }

        Self {
            total_events,
            upcoming,
            past: total_events - upcoming,
            recurring,
            single: total_events - recurring,
            busiest_weekday: max_index(&weekday_counts).map(|i| WEEKDAYS[i]),
            busiest_hour: max_index(&hour_counts).map(|i| i as u32),
            busiest_month: max_index(&month_counts).map(|i| i as u32 + 1),
            events_per_week: events_per_week(events),
            average_duration_minutes: if total_events > 0 {
                total_minutes as f64 / total_events as f64
            } else {
                0.0
            },
            total_minutes,
            longest_event,
        }
    }
}

/// Index of the first maximal nonzero count.
fn max_index(counts: &[usize]) -> Option<usize> {
    let mut best = None;
    let mut best_count = 0;
    for (i, &count) in counts.iter().enumerate() {
        if count > best_count {
            best_count = count;
            best = Some(i);
        }
    }
    best
}

/// Events per week across the span from the earliest to the latest start,
/// counting partial weeks as one full week at minimum.
fn events_per_week(events: &[Event]) -> f64 {
    let starts: Vec<NaiveDateTime> = events.iter().map(|e| e.start).collect();
    let (Some(&min), Some(&max)) = (starts.iter().min(), starts.iter().max()) else {
        return 0.0;
    };
    let days = (max - min).num_days() + 1;
    let weeks = (days as f64 / 7.0).max(1.0);
    events.len() as f64 / weeks
}

/// Event counts per category, with uncategorized events under "No Category".
pub fn by_category(
    events: &[Event],
    details: &HashMap<EventId, EventDetails>,
) -> HashMap<String, usize> {
    count_by_field(events, details, |d| &d.category, "No Category")
}

/// Event counts per priority, with unprioritized events under "No Priority".
pub fn by_priority(
    events: &[Event],
    details: &HashMap<EventId, EventDetails>,
) -> HashMap<String, usize> {
    count_by_field(events, details, |d| &d.priority, "No Priority")
}

fn count_by_field(
    events: &[Event],
    details: &HashMap<EventId, EventDetails>,
    field: fn(&EventDetails) -> &str,
    fallback: &str,
) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for event in events {
        let value = details
            .get(&event.id)
            .map(field)
            .filter(|v| !v.is_empty())
            .unwrap_or(fallback);
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    counts
}
