//! Free-text and date filters over event snapshots.
//!
//! All functions are pure filters over a slice; they never touch storage.
//! Date filters go by the event's start date, so a long event is listed
//! under the day it begins.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::event::{Event, EventDetails, EventId};

/// Events whose title or description contains `keyword`, case-insensitively.
pub fn by_keyword(events: &[Event], keyword: &str) -> Vec<Event> {
    let needle = keyword.to_lowercase();
    events
        .iter()
        .filter(|e| {
            e.title.to_lowercase().contains(&needle)
                || e.description.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Events starting on the given calendar date.
pub fn on_date(events: &[Event], date: NaiveDate) -> Vec<Event> {
    events
        .iter()
        .filter(|e| e.start.date() == date)
        .cloned()
        .collect()
}

/// Events whose start date lies within `[from, to]`, inclusive.
pub fn in_range(events: &[Event], from: NaiveDate, to: NaiveDate) -> Vec<Event> {
    events
        .iter()
        .filter(|e| {
            let date = e.start.date();
            date >= from && date <= to
        })
        .cloned()
        .collect()
}

/// Events whose side-table details contain `keyword` in the location,
/// category, or priority, case-insensitively. Events without details never
/// match.
pub fn by_details(
    events: &[Event],
    details: &HashMap<EventId, EventDetails>,
    keyword: &str,
) -> Vec<Event> {
    let needle = keyword.to_lowercase();
    events
        .iter()
        .filter(|e| {
            details.get(&e.id).is_some_and(|d| {
                d.location.to_lowercase().contains(&needle)
                    || d.category.to_lowercase().contains(&needle)
                    || d.priority.to_lowercase().contains(&needle)
            })
        })
        .cloned()
        .collect()
}
