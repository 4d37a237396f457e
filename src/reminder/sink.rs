//! Notification sink: the engine/presentation boundary.
//!
//! The engine never draws dialogs. When a reminder comes due it hands the
//! event to a [`NotificationSink`] and waits for the user's decision as
//! data. Sinks are async because resolution usually waits on a human.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::error::{ChimeError, Result};
use crate::event::Event;

/// The user's decision for one due reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderAction {
    /// Acknowledge the reminder; it never fires again.
    Dismiss,
    /// Re-present the reminder after this many minutes.
    Snooze { minutes: u32 },
}

/// The user's decision for the startup batch of missed reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissedAction {
    /// Deliver each missed reminder through the normal path now.
    NotifyNow,
    /// Record all of them as delivered without notifying.
    MarkDelivered,
    /// Leave them alone; the periodic scan may still catch some.
    Ignore,
}

/// Trait for notification sinks.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Present one due reminder and wait for the user's choice.
    ///
    /// An `Err` is caught at the delivery boundary and treated as an
    /// implicit [`ReminderAction::Dismiss`], so a broken sink can never
    /// kill the scan loop or re-fire forever.
    async fn resolve(&self, event: &Event, minutes_until_start: i64) -> Result<ReminderAction>;

    /// Present the batch of reminders missed while the engine was down and
    /// wait for one decision covering the whole batch.
    ///
    /// An `Err` is treated as an implicit [`MissedAction::MarkDelivered`].
    async fn resolve_missed(&self, missed: &[Event]) -> Result<MissedAction>;
}

// ============================================================================
// Channel Sink
// ============================================================================

/// A reminder request forwarded over a channel by [`ChannelSink`].
#[derive(Debug)]
pub enum SinkRequest {
    /// One due reminder awaiting a decision.
    Due {
        event: Event,
        minutes_until_start: i64,
        respond_to: oneshot::Sender<ReminderAction>,
    },
    /// The startup batch of missed reminders awaiting one decision.
    Missed {
        events: Vec<Event>,
        respond_to: oneshot::Sender<MissedAction>,
    },
}

/// Sink that forwards each request over an `mpsc` channel, for presentation
/// layers that run their own event loop. Each request carries a oneshot
/// sender the consumer answers through.
pub struct ChannelSink {
    tx: mpsc::Sender<SinkRequest>,
}

impl ChannelSink {
    /// Create a sink and the receiver the presentation side consumes.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SinkRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn resolve(&self, event: &Event, minutes_until_start: i64) -> Result<ReminderAction> {
        let (respond_to, response) = oneshot::channel();
        self.tx
            .send(SinkRequest::Due {
                event: event.clone(),
                minutes_until_start,
                respond_to,
            })
            .await
            .map_err(|_| ChimeError::Sink("presentation side hung up".to_string()))?;
        response
            .await
            .map_err(|_| ChimeError::Sink("reminder request dropped without an answer".to_string()))
    }

    async fn resolve_missed(&self, missed: &[Event]) -> Result<MissedAction> {
        let (respond_to, response) = oneshot::channel();
        self.tx
            .send(SinkRequest::Missed {
                events: missed.to_vec(),
                respond_to,
            })
            .await
            .map_err(|_| ChimeError::Sink("presentation side hung up".to_string()))?;
        response
            .await
            .map_err(|_| ChimeError::Sink("missed batch dropped without an answer".to_string()))
    }
}
