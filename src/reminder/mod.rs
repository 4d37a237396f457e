//! Reminder delivery: durable notified ledger, notification sink contract,
//! and the periodic scanning service.

mod ledger;
mod service;
mod sink;

pub use ledger::NotifiedLedger;
pub use service::{ReminderService, ReminderState};
pub use sink::{ChannelSink, MissedAction, NotificationSink, ReminderAction, SinkRequest};
