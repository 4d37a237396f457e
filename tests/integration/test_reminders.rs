//! Reminder delivery semantics: at-most-once across restarts, missed
//! recovery, and snooze timing under a paused clock.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use tempfile::TempDir;

use chime::{
    ChannelSink, Config, Event, EventId, MemoryStorage, MissedAction, NotificationSink,
    ReminderAction, ReminderState, Scheduler, SinkRequest,
};

fn test_config(data_dir: &Path) -> Config {
    crate::init_test_logging();
    let mut config = Config::default();
    config.storage.data_dir = data_dir.to_string_lossy().to_string();
    config
}

/// Sink that records deliveries and answers from a script. Runs out of
/// script, it dismisses.
#[derive(Default)]
struct RecordingSink {
    answers: Mutex<VecDeque<ReminderAction>>,
    missed_answer: Mutex<Option<MissedAction>>,
    delivered: Mutex<Vec<EventId>>,
    missed_batches: Mutex<Vec<Vec<EventId>>>,
}

impl RecordingSink {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn answer_with(&self, action: ReminderAction) {
        self.answers.lock().push_back(action);
    }

    fn on_missed(&self, action: MissedAction) {
        *self.missed_answer.lock() = Some(action);
    }

    fn delivered(&self) -> Vec<EventId> {
        self.delivered.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn resolve(&self, event: &Event, _minutes: i64) -> chime::Result<ReminderAction> {
        self.delivered.lock().push(event.id);
        Ok(self
            .answers
            .lock()
            .pop_front()
            .unwrap_or(ReminderAction::Dismiss))
    }

    async fn resolve_missed(&self, missed: &[Event]) -> chime::Result<MissedAction> {
        self.missed_batches
            .lock()
            .push(missed.iter().map(|e| e.id).collect());
        Ok(self.missed_answer.lock().unwrap_or(MissedAction::Ignore))
    }
}

fn dt(d: u32, h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 8, d)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn meeting(d: u32, h: u32, lead: i64) -> Event {
    Event::new("Meeting", "", dt(d, h, 0), dt(d, h + 1, 0))
        .unwrap()
        .with_reminder(lead)
}

#[tokio::test]
async fn test_delivered_at_most_once_across_restart() {
    let dir = TempDir::new().unwrap();

    let sink_a = RecordingSink::new();
    let engine_a =
        Scheduler::from_config(test_config(dir.path()), sink_a.clone()).unwrap();
    let id = engine_a.add_event(meeting(5, 10, 15)).unwrap();

    assert_eq!(engine_a.scan_reminders(dt(5, 9, 50)).await, 1);
    assert_eq!(sink_a.delivered(), vec![id]);
    drop(engine_a);

    // A fresh engine over the same data never re-delivers
    let sink_b = RecordingSink::new();
    let engine_b =
        Scheduler::from_config(test_config(dir.path()), sink_b.clone()).unwrap();
    assert_eq!(engine_b.recover_missed(dt(5, 9, 51)).await, 0);
    assert_eq!(engine_b.scan_reminders(dt(5, 9, 51)).await, 0);
    assert!(sink_b.delivered().is_empty());
    assert_eq!(
        engine_b.reminder_state(id, dt(5, 9, 51)),
        Some(ReminderState::Delivered)
    );
}

#[tokio::test]
async fn test_missed_reminder_recovered_after_restart() {
    let dir = TempDir::new().unwrap();

    let engine_a =
        Scheduler::from_config(test_config(dir.path()), RecordingSink::new()).unwrap();
    let id = engine_a.add_event(meeting(5, 10, 30)).unwrap();
    // The engine goes down without ever scanning
    drop(engine_a);

    let sink = RecordingSink::new();
    sink.on_missed(MissedAction::NotifyNow);
    let engine_b = Scheduler::from_config(test_config(dir.path()), sink.clone()).unwrap();

    // Five minutes past the start, the reminder window is long gone
    assert_eq!(engine_b.recover_missed(dt(5, 10, 5)).await, 1);
    assert_eq!(sink.delivered(), vec![id]);
    assert_eq!(sink.missed_batches.lock().clone(), vec![vec![id]]);

    // Recovery marked it delivered; nothing fires again
    assert_eq!(engine_b.recover_missed(dt(5, 10, 6)).await, 0);
    assert_eq!(engine_b.scan_reminders(dt(5, 10, 6)).await, 0);
}

#[tokio::test]
async fn test_missed_recovery_respects_lookback() {
    let dir = TempDir::new().unwrap();

    let sink = RecordingSink::new();
    sink.on_missed(MissedAction::MarkDelivered);
    let engine = Scheduler::from_config(test_config(dir.path()), sink.clone()).unwrap();

    // Start three days stale: outside the 24h look-back
    engine.add_event(meeting(2, 10, 30)).unwrap();
    let recent = engine.add_event(meeting(5, 8, 30)).unwrap();

    assert_eq!(engine.recover_missed(dt(5, 10, 0)).await, 1);
    assert_eq!(sink.missed_batches.lock().clone(), vec![vec![recent]]);
}

#[tokio::test(start_paused = true)]
async fn test_snooze_holds_then_redelivers() {
    let storage = Arc::new(MemoryStorage::new());
    let sink = RecordingSink::new();
    sink.answer_with(ReminderAction::Snooze { minutes: 10 });
    let engine = Scheduler::new(Config::default(), storage, sink.clone()).unwrap();

    let id = engine.add_event(meeting(5, 10, 15)).unwrap();
    assert_eq!(engine.scan_reminders(dt(5, 9, 50)).await, 1);
    assert_eq!(
        engine.reminder_state(id, dt(5, 9, 55)),
        Some(ReminderState::Snoozed)
    );

    // While the timer holds, scans skip the event
    assert_eq!(engine.scan_reminders(dt(5, 9, 55)).await, 0);

    // Past the timer, the reminder comes back and the script dismisses it
    tokio::time::sleep(std::time::Duration::from_secs(11 * 60)).await;
    tokio::task::yield_now().await;
    assert_eq!(sink.delivered(), vec![id, id]);
    assert_eq!(
        engine.reminder_state(id, dt(5, 10, 0)),
        Some(ReminderState::Delivered)
    );
}

#[tokio::test(start_paused = true)]
async fn test_repeated_snooze_replaces_timer() {
    let sink = RecordingSink::new();
    let engine = Scheduler::new(
        Config::default(),
        Arc::new(MemoryStorage::new()),
        sink.clone(),
    )
    .unwrap();
    let id = engine.add_event(meeting(5, 10, 15)).unwrap();

    engine.schedule_snooze(id, 5);
    engine.schedule_snooze(id, 30);

    // Past the replaced five-minute timer: still held
    tokio::time::sleep(std::time::Duration::from_secs(10 * 60)).await;
    tokio::task::yield_now().await;
    assert!(sink.delivered().is_empty());

    // Past the thirty-minute replacement: exactly one delivery
    tokio::time::sleep(std::time::Duration::from_secs(21 * 60)).await;
    tokio::task::yield_now().await;
    assert_eq!(sink.delivered(), vec![id]);
}

#[tokio::test]
async fn test_channel_sink_drives_presentation_loop() {
    let (sink, mut requests) = ChannelSink::new(8);
    let engine = Scheduler::new(
        Config::default(),
        Arc::new(MemoryStorage::new()),
        Arc::new(sink),
    )
    .unwrap();

    // Presentation side: snooze the first reminder, dismiss the rest
    let presenter = tokio::spawn(async move {
        let mut first = true;
        let mut seen = Vec::new();
        while let Some(request) = requests.recv().await {
            match request {
                SinkRequest::Due {
                    event, respond_to, ..
                } => {
                    seen.push(event.id);
                    let action = if first {
                        first = false;
                        ReminderAction::Snooze { minutes: 5 }
                    } else {
                        ReminderAction::Dismiss
                    };
                    let _ = respond_to.send(action);
                }
                SinkRequest::Missed { respond_to, .. } => {
                    let _ = respond_to.send(MissedAction::Ignore);
                }
            }
        }
        seen
    });

    let id = engine.add_event(meeting(5, 10, 15)).unwrap();
    assert_eq!(engine.scan_reminders(dt(5, 9, 50)).await, 1);
    assert_eq!(
        engine.reminder_state(id, dt(5, 9, 50)),
        Some(ReminderState::Snoozed)
    );

    // Stopping the engine aborts the live snooze timer and drops the
    // channel, ending the presentation loop.
    engine.stop().await;
    drop(engine);
    let seen = presenter.await.unwrap();
    assert_eq!(seen, vec![id]);
}
