//! Facade workflows: recurring series, conflict reports, search, statistics,
//! and export between engines.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use tempfile::TempDir;

use chime::{
    Config, Event, EventDetails, EventId, EventUpdate, ExportFormat, MissedAction,
    NotificationSink, Recurrence, ReminderAction, Scheduler,
};

fn test_config(data_dir: &Path) -> Config {
    crate::init_test_logging();
    let mut config = Config::default();
    config.storage.data_dir = data_dir.to_string_lossy().to_string();
    config
}

/// Sink that dismisses everything and records what it saw.
#[derive(Default)]
struct DismissingSink {
    delivered: Mutex<Vec<EventId>>,
}

#[async_trait]
impl NotificationSink for DismissingSink {
    async fn resolve(&self, event: &Event, _minutes: i64) -> chime::Result<ReminderAction> {
        self.delivered.lock().push(event.id);
        Ok(ReminderAction::Dismiss)
    }

    async fn resolve_missed(&self, _missed: &[Event]) -> chime::Result<MissedAction> {
        Ok(MissedAction::Ignore)
    }
}

fn open(data_dir: &Path) -> Scheduler {
    Scheduler::from_config(test_config(data_dir), Arc::new(DismissingSink::default())).unwrap()
}

fn dt(d: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 8, d)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

#[tokio::test]
async fn test_weekly_series_occupies_each_slot() {
    let dir = TempDir::new().unwrap();
    let engine = open(dir.path());

    // Mondays Aug 4, 11, 18
    let anchor = Event::new("Piano lesson", "", dt(4, 10, 0), dt(4, 11, 0))
        .unwrap()
        .with_recurrence(Recurrence::weekly(dt(18, 10, 0)));
    let ids = engine.add_series(anchor).unwrap();
    assert_eq!(ids.len(), 3);

    // Occurrences are plain events; the rule is not inherited
    for id in &ids {
        assert!(engine.get_event(*id).unwrap().recurrence.is_none());
    }

    // The second Monday is booked, the Tuesday after is free
    let hit = engine.check_conflicts(dt(11, 10, 30), dt(11, 11, 30), None);
    assert_eq!(hit.unwrap().id, ids[1]);
    assert!(engine.check_conflicts(dt(12, 10, 0), dt(12, 11, 0), None).is_none());

    // Back to back with an occurrence is free too
    assert!(engine.check_conflicts(dt(4, 11, 0), dt(4, 12, 0), None).is_none());
}

#[tokio::test]
async fn test_conflict_report_largest_overlap_first() {
    let dir = TempDir::new().unwrap();
    let engine = open(dir.path());

    let a = engine
        .add_event(Event::new("A", "", dt(6, 9, 0), dt(6, 12, 0)).unwrap())
        .unwrap();
    let b = engine
        .add_event(Event::new("B", "", dt(6, 10, 0), dt(6, 12, 0)).unwrap())
        .unwrap();
    let c = engine
        .add_event(Event::new("C", "", dt(6, 11, 30), dt(6, 13, 0)).unwrap())
        .unwrap();

    let report = engine.conflicts();
    assert_eq!(report.len(), 3);

    // A and B share two hours, the largest overlap
    assert_eq!((report[0].first, report[0].second), (a, b));
    assert_eq!(report[0].overlap_minutes, 120);
    assert_eq!(report[0].overlap_start, dt(6, 10, 0));
    assert_eq!(report[0].overlap_end, dt(6, 12, 0));

    // Both remaining pairs overlap C by half an hour
    assert_eq!(report[1].overlap_minutes, 30);
    assert_eq!(report[2].overlap_minutes, 30);
    assert!(report.iter().any(|x| (x.first, x.second) == (b, c)));
}

#[tokio::test]
async fn test_search_and_stats_over_live_calendar() {
    let dir = TempDir::new().unwrap();
    let engine = open(dir.path());

    let review = engine
        .add_event(Event::new("Design review", "with the platform team", dt(4, 9, 0), dt(4, 10, 0)).unwrap())
        .unwrap();
    engine
        .add_event(Event::new("Team lunch", "", dt(4, 12, 0), dt(4, 13, 0)).unwrap())
        .unwrap();
    engine
        .add_event(Event::new("Dentist", "", dt(7, 9, 0), dt(7, 9, 30)).unwrap())
        .unwrap();
    engine
        .set_details(review, EventDetails::new("Main office", "work", "high"))
        .unwrap();

    assert_eq!(engine.search("team").len(), 2);
    assert_eq!(engine.events_on(NaiveDate::from_ymd_opt(2025, 8, 4).unwrap()).len(), 2);
    assert_eq!(
        engine
            .events_between(
                NaiveDate::from_ymd_opt(2025, 8, 5).unwrap(),
                NaiveDate::from_ymd_opt(2025, 8, 7).unwrap(),
            )
            .len(),
        1
    );
    assert_eq!(engine.search_details("office").len(), 1);

    let stats = engine.stats(dt(5, 0, 0));
    assert_eq!(stats.total_events, 3);
    assert_eq!(stats.upcoming, 1);
    assert_eq!(stats.past, 2);
    assert_eq!(stats.busiest_hour, Some(9));
    assert_eq!(stats.total_minutes, 60 + 60 + 30);
}

#[tokio::test]
async fn test_export_moves_calendar_between_engines() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();

    let engine_a = open(dir_a.path());
    let id = engine_a
        .add_event(
            Event::new("Dentist", "Checkup", dt(7, 9, 0), dt(7, 10, 0))
                .unwrap()
                .with_reminder(30),
        )
        .unwrap();
    engine_a
        .add_event(Event::new("Gym", "", dt(8, 18, 0), dt(8, 19, 0)).unwrap())
        .unwrap();
    engine_a
        .set_details(id, EventDetails::new("Clinic", "health", ""))
        .unwrap();

    let export_path = dir_a.path().join("portable.jsonl");
    let result = engine_a.export(&export_path, ExportFormat::Jsonl).unwrap();
    assert_eq!(result.event_count, 2);

    let engine_b = open(dir_b.path());
    assert_eq!(engine_b.import(&export_path, ExportFormat::Jsonl).unwrap(), 2);
    assert_eq!(engine_b.event_count(), 2);

    let moved = engine_b.find_by_title("Dentist").unwrap();
    assert_eq!(moved.reminder_minutes, 30);
    assert_eq!(engine_b.details(moved.id).unwrap().location, "Clinic");
}

#[tokio::test]
async fn test_rescheduled_event_reminds_again() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(DismissingSink::default());
    let engine = Scheduler::from_config(test_config(dir.path()), sink.clone()).unwrap();

    let id = engine
        .add_event(
            Event::new("Call", "", dt(6, 10, 0), dt(6, 10, 30))
                .unwrap()
                .with_reminder(15),
        )
        .unwrap();

    assert_eq!(engine.scan_reminders(dt(6, 9, 50)).await, 1);

    // Moving the start clears the delivered state
    let update = EventUpdate {
        start: Some(dt(6, 15, 0)),
        end: Some(dt(6, 15, 30)),
        ..Default::default()
    };
    assert!(engine.update_event(id, &update).unwrap());

    // Quiet until the new window opens
    assert_eq!(engine.scan_reminders(dt(6, 10, 0)).await, 0);
    assert_eq!(engine.scan_reminders(dt(6, 14, 50)).await, 1);
    assert_eq!(sink.delivered.lock().clone(), vec![id, id]);
}
