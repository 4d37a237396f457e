//! Conflict detection over event intervals.
//!
//! Intervals are treated as half-open: an event ending exactly when another
//! starts does not conflict with it. Conflicts are advisory; nothing in the
//! store refuses to save a conflicting event.

use chrono::NaiveDateTime;

use crate::event::{Event, EventId};

// ============================================================================
// Overlap Predicate
// ============================================================================

/// Half-open interval overlap test.
pub fn overlaps(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Find the first event (in slice order) whose interval overlaps
/// `[start, end)`, skipping the event whose id equals `exclude` so an edited
/// event is never reported as conflicting with itself.
pub fn find_conflict<'a>(
    events: &'a [Event],
    start: NaiveDateTime,
    end: NaiveDateTime,
    exclude: Option<EventId>,
) -> Option<&'a Event> {
    events
        .iter()
        .filter(|e| Some(e.id) != exclude)
        .find(|e| overlaps(start, end, e.start, e.end))
}

/// True when `[start, end)` overlaps no event in the slice.
pub fn is_slot_free(events: &[Event], start: NaiveDateTime, end: NaiveDateTime) -> bool {
    find_conflict(events, start, end, None).is_none()
}

// ============================================================================
// Pairwise Detection
// ============================================================================

/// A detected conflict between two stored events.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    /// First event in the conflict.
    pub first: EventId,
    /// Second event in the conflict.
    pub second: EventId,
    /// Start of the overlapping period.
    pub overlap_start: NaiveDateTime,
    /// End of the overlapping period.
    pub overlap_end: NaiveDateTime,
    /// Duration of the overlap in whole minutes.
    pub overlap_minutes: i64,
}

impl Conflict {
    /// Detect a conflict between two events.
    pub fn detect(first: &Event, second: &Event) -> Option<Self> {
        if !first.overlaps_with(second) {
            return None;
        }

        let overlap_start = first.start.max(second.start);
        let overlap_end = first.end.min(second.end);

        Some(Self {
            first: first.id,
            second: second.id,
            overlap_start,
            overlap_end,
            overlap_minutes: (overlap_end - overlap_start).num_minutes(),
        })
    }
}

/// Detect all pairwise conflicts in a list of events, sorted by overlap
/// duration (largest first).
pub fn detect_conflicts(events: &[Event]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    for i in 0..events.len() {
        for j in (i + 1)..events.len() {
            if let Some(conflict) = Conflict::detect(&events[i], &events[j]) {
                conflicts.push(conflict);
            }
        }
    }

    conflicts.sort_by(|a, b| b.overlap_minutes.cmp(&a.overlap_minutes));

    conflicts
}
