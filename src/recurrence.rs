//! Recurrence expansion for repeating events.
//!
//! Pure functions over [`Recurrence`](crate::event::Recurrence) rules: no
//! clock access and no I/O, so every path is testable with fixed timestamps.

use chrono::{Duration, Months, NaiveDateTime};

use crate::event::{Event, Frequency, Recurrence, UNASSIGNED_ID};

/// Hard cap on the number of occurrences a single rule can produce.
const MAX_OCCURRENCES: usize = 1000;

/// Generate the start times of a rule beginning at `anchor_start`.
///
/// The sequence includes the anchor itself and every stepped start up to and
/// including one landing exactly on the rule end. Monthly steps use calendar
/// month arithmetic, clamping to the last day of shorter months.
pub fn occurrences(anchor_start: NaiveDateTime, rule: &Recurrence) -> Vec<NaiveDateTime> {
    let mut starts = Vec::new();
    let mut current = anchor_start;

    while current <= rule.until && starts.len() < MAX_OCCURRENCES {
        starts.push(current);
        match next_occurrence(current, rule) {
            Some(next) => current = next,
            None => break,
        }
    }

    starts
}

/// Calculate the next occurrence start after `current`.
fn next_occurrence(current: NaiveDateTime, rule: &Recurrence) -> Option<NaiveDateTime> {
    match rule.frequency {
        Frequency::Daily => Some(current + Duration::days(rule.interval as i64)),
        Frequency::Weekly => Some(current + Duration::weeks(rule.interval as i64)),
        Frequency::Monthly => current.checked_add_months(Months::new(rule.interval)),
    }
}

/// Materialize a recurring event into one concrete event per occurrence.
///
/// Each occurrence preserves the anchor's duration, copies its title,
/// description, and reminder lead, carries an unassigned id for the store to
/// mint, and has no recurrence rule of its own so it can never be
/// re-expanded. An event without an active rule, or a rule that yields no
/// occurrences (anchor already past the rule end), comes back as the anchor
/// alone, unchanged.
pub fn expand(event: &Event) -> Vec<Event> {
    let Some(ref rule) = event.recurrence else {
        return vec![event.clone()];
    };
    if rule.interval == 0 {
        return vec![event.clone()];
    }

    let starts = occurrences(event.start, rule);
    if starts.is_empty() {
        return vec![event.clone()];
    }

    let duration = event.duration();
    starts
        .into_iter()
        .map(|start| {
            let mut occurrence = event.clone();
            occurrence.id = UNASSIGNED_ID;
            occurrence.start = start;
            occurrence.end = start + duration;
            occurrence.recurrence = None;
            occurrence
        })
        .collect()
}
