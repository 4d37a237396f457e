//! Flat-file persistence round trips through the public API.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tempfile::TempDir;

use chime::{
    CalendarStorage, Config, CsvStorage, Event, EventDetails, EventUpdate, MissedAction,
    NotificationSink, Recurrence, ReminderAction, Scheduler,
};

fn test_config(data_dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = data_dir.to_string_lossy().to_string();
    config
}

/// Sink that dismisses everything without user interaction.
struct SilentSink;

#[async_trait]
impl NotificationSink for SilentSink {
    async fn resolve(&self, _event: &Event, _minutes: i64) -> chime::Result<ReminderAction> {
        Ok(ReminderAction::Dismiss)
    }

    async fn resolve_missed(&self, _missed: &[Event]) -> chime::Result<MissedAction> {
        Ok(MissedAction::Ignore)
    }
}

fn open(data_dir: &Path) -> Scheduler {
    crate::init_test_logging();
    Scheduler::from_config(test_config(data_dir), Arc::new(SilentSink)).unwrap()
}

fn dt(d: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 7, d)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

#[tokio::test]
async fn test_events_survive_restart() {
    let dir = TempDir::new().unwrap();

    let first = open(dir.path());
    let dentist = first
        .add_event(
            Event::new("Dentist", "Checkup", dt(7, 9, 0), dt(7, 10, 0))
                .unwrap()
                .with_reminder(30),
        )
        .unwrap();
    let standup = first
        .add_event(
            Event::new("Standup", "", dt(7, 9, 30), dt(7, 9, 45))
                .unwrap()
                .with_recurrence(Recurrence::daily(dt(14, 9, 30))),
        )
        .unwrap();
    first
        .set_details(dentist, EventDetails::new("Clinic", "health", "high"))
        .unwrap();
    drop(first);

    let second = open(dir.path());
    assert_eq!(second.event_count(), 2);

    let reloaded = second.get_event(dentist).unwrap();
    assert_eq!(reloaded.title, "Dentist");
    assert_eq!(reloaded.description, "Checkup");
    assert_eq!(reloaded.start, dt(7, 9, 0));
    assert_eq!(reloaded.reminder_minutes, 30);

    let rule = second.get_event(standup).unwrap().recurrence.unwrap();
    assert_eq!(rule, Recurrence::daily(dt(14, 9, 30)));
    assert_eq!(second.details(dentist).unwrap().location, "Clinic");

    // Ids keep minting past the reloaded maximum
    let next = second
        .add_event(Event::new("New", "", dt(8, 9, 0), dt(8, 10, 0)).unwrap())
        .unwrap();
    assert_eq!(next, standup + 1);
}

#[tokio::test]
async fn test_delimiters_in_text_round_trip() {
    let dir = TempDir::new().unwrap();

    let first = open(dir.path());
    let id = first
        .add_event(
            Event::new(
                "Lunch, with \"team\"",
                "bring:\n- laptop\n- charger",
                dt(8, 12, 0),
                dt(8, 13, 0),
            )
            .unwrap(),
        )
        .unwrap();
    drop(first);

    let second = open(dir.path());
    let reloaded = second.get_event(id).unwrap();
    assert_eq!(reloaded.title, "Lunch, with \"team\"");
    assert_eq!(reloaded.description, "bring:\n- laptop\n- charger");
}

#[tokio::test]
async fn test_malformed_lines_are_skipped_on_load() {
    let dir = TempDir::new().unwrap();

    let first = open(dir.path());
    first
        .add_event(Event::new("Kept", "", dt(9, 9, 0), dt(9, 10, 0)).unwrap())
        .unwrap();
    first
        .add_event(Event::new("Also kept", "", dt(9, 11, 0), dt(9, 12, 0)).unwrap())
        .unwrap();
    drop(first);

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(dir.path().join("events.csv"))
        .unwrap();
    writeln!(file, "not,enough").unwrap();
    writeln!(file, "3,Bad times,,2025-07-09T12:00:00,2025-07-09T11:00:00,0,").unwrap();
    drop(file);

    let second = open(dir.path());
    assert_eq!(second.event_count(), 2);
    assert!(second.find_by_title("Kept").is_some());
}

#[tokio::test]
async fn test_updates_and_removals_persist() {
    let dir = TempDir::new().unwrap();

    let first = open(dir.path());
    let keep = first
        .add_event(Event::new("Keep", "", dt(10, 9, 0), dt(10, 10, 0)).unwrap())
        .unwrap();
    let remove = first
        .add_event(Event::new("Remove", "", dt(10, 11, 0), dt(10, 12, 0)).unwrap())
        .unwrap();

    let update = EventUpdate {
        title: Some("Keep (renamed)".to_string()),
        ..Default::default()
    };
    first.update_event(keep, &update).unwrap();
    first.remove_event(remove).unwrap();
    drop(first);

    let second = open(dir.path());
    assert_eq!(second.event_count(), 1);
    assert_eq!(second.get_event(keep).unwrap().title, "Keep (renamed)");
    assert!(second.get_event(remove).is_none());
}

#[test]
fn test_backup_snapshots_data_files() {
    let dir = TempDir::new().unwrap();
    let storage = CsvStorage::new(dir.path());
    let event = Event::new("Backed up", "", dt(11, 9, 0), dt(11, 10, 0)).unwrap();
    storage.save_events(std::slice::from_ref(&event)).unwrap();

    let backup_dir = storage.backup().unwrap().expect("backup path");
    assert!(backup_dir.starts_with(dir.path().join("backups")));
    assert!(backup_dir.join("events.csv").exists());

    // The snapshot is independent of later writes
    storage.save_events(&[]).unwrap();
    let copied = std::fs::read_to_string(backup_dir.join("events.csv")).unwrap();
    assert!(copied.contains("Backed up"));
}
