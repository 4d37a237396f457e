//! Periodic reminder scanning and delivery.
//!
//! The service owns three concerns:
//! - a periodic scan task that finds due reminders and delivers them
//!   through the sink, awaiting each resolution inline;
//! - one-shot snooze timers, at most one per event id, replaced atomically
//!   when the same event is snoozed again;
//! - startup recovery of reminders missed while the engine was down.
//!
//! Delivery failures never kill the scan: a sink or persist error is logged
//! and the event is recorded as delivered on a best-effort basis.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ReminderConfig;
use crate::event::{Event, EventId};
use crate::reminder::ledger::NotifiedLedger;
use crate::reminder::sink::{MissedAction, NotificationSink, ReminderAction};
use crate::store::EventStore;

/// Fallback when a snooze request carries no usable duration.
const DEFAULT_SNOOZE_MINUTES: u32 = 5;

// ============================================================================
// Reminder State
// ============================================================================

/// Observable reminder state of a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    /// The event has no reminder lead configured.
    Disabled,
    /// Not yet inside the lead window.
    Pending,
    /// Inside the lead window and waiting to be delivered.
    Due,
    /// A live snooze timer holds the reminder back.
    Snoozed,
    /// The reminder was delivered; it never fires again.
    Delivered,
}

// ============================================================================
// Reminder Service
// ============================================================================

struct SnoozeEntry {
    token: u64,
    handle: JoinHandle<()>,
}

/// Shared state the scan loop, snooze timers, and recovery path work over.
#[derive(Clone)]
struct ScanContext {
    store: Arc<EventStore>,
    ledger: Arc<NotifiedLedger>,
    sink: Arc<dyn NotificationSink>,
    snoozes: Arc<Mutex<HashMap<EventId, SnoozeEntry>>>,
    snooze_token: Arc<AtomicU64>,
    config: ReminderConfig,
}

/// Reminder scheduler: periodic scan, snooze timers, missed recovery.
pub struct ReminderService {
    ctx: ScanContext,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    scan_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReminderService {
    /// Create a service over the shared store and ledger.
    pub fn new(
        store: Arc<EventStore>,
        ledger: Arc<NotifiedLedger>,
        sink: Arc<dyn NotificationSink>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            ctx: ScanContext {
                store,
                ledger,
                sink,
                snoozes: Arc::new(Mutex::new(HashMap::new())),
                snooze_token: Arc::new(AtomicU64::new(0)),
                config,
            },
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            scan_handle: Mutex::new(None),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start the periodic scan task. Idempotent: a second call while
    /// running is a no-op.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Reminder scan already running");
            return;
        }

        let ctx = self.ctx.clone();
        let shutdown = self.shutdown.clone();
        let period = self.ctx.config.scan_interval();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = Local::now().naive_local();
                        scan(&ctx, now).await;
                    }
                    _ = shutdown.notified() => break,
                }
            }
            info!("Reminder scan stopped");
        });

        *self.scan_handle.lock() = Some(handle);
        info!(
            "Reminder scan started (every {}s)",
            self.ctx.config.scan_interval_secs
        );
    }

    /// Stop the scan task and abort all live snooze timers. Idempotent.
    /// Snooze timers are cleared even when the scan was never started, so a
    /// caller driving scans by hand can still shut down cleanly.
    pub async fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.shutdown.notify_one();
            let handle = self.scan_handle.lock().take();
            if let Some(handle) = handle {
                if let Err(e) = handle.await {
                    if !e.is_cancelled() {
                        warn!("Reminder scan task failed: {}", e);
                    }
                }
            }
            info!("Reminder service stopped");
        }

        let mut snoozes = self.ctx.snoozes.lock();
        let live = snoozes.len();
        for (_, entry) in snoozes.drain() {
            entry.handle.abort();
        }
        drop(snoozes);
        if live > 0 {
            debug!("Aborted {} snooze timers", live);
        }
    }

    /// Whether the periodic scan is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Scanning
    // ========================================================================

    /// Run one scan pass at `now`, delivering every due reminder. Returns
    /// how many reminders were delivered. A second pass at the same instant
    /// finds nothing new.
    pub async fn scan_once(&self, now: NaiveDateTime) -> usize {
        scan(&self.ctx, now).await
    }

    /// Recover reminders missed while the engine was down: reminder time
    /// already past, event start within the configured look-back of `now`,
    /// not yet delivered. The whole batch goes to the sink for one decision.
    /// Returns how many missed reminders were found.
    pub async fn recover_missed(&self, now: NaiveDateTime) -> usize {
        let ctx = &self.ctx;
        let lookback = ctx.config.missed_lookback();
        let missed: Vec<Event> = ctx
            .store
            .list()
            .into_iter()
            .filter(|e| is_missed(e, &ctx.ledger, now, lookback))
            .collect();

        if missed.is_empty() {
            debug!("No missed reminders");
            return 0;
        }
        info!("Found {} missed reminders", missed.len());

        match ctx.sink.resolve_missed(&missed).await {
            Ok(MissedAction::NotifyNow) => {
                for event in &missed {
                    deliver(ctx, event, now).await;
                }
            }
            Ok(MissedAction::MarkDelivered) => {
                let ids: Vec<EventId> = missed.iter().map(|e| e.id).collect();
                if let Err(e) = ctx.ledger.mark_all(&ids) {
                    error!("Failed to persist delivered state for missed batch: {}", e);
                }
            }
            Ok(MissedAction::Ignore) => {
                debug!("Ignoring {} missed reminders", missed.len());
            }
            Err(e) => {
                error!("Notification sink failed for missed batch: {}", e);
                let ids: Vec<EventId> = missed.iter().map(|e| e.id).collect();
                if let Err(e) = ctx.ledger.mark_all(&ids) {
                    error!("Failed to persist delivered state for missed batch: {}", e);
                }
            }
        }

        missed.len()
    }

    // ========================================================================
    // Snooze
    // ========================================================================

    /// Schedule (or replace) the one-shot snooze timer for `id`. When the
    /// timer fires, the event is re-delivered through the normal path.
    pub fn schedule_snooze(&self, id: EventId, minutes: u32) {
        schedule_snooze(&self.ctx, id, minutes);
    }

    /// Whether a live snooze timer exists for `id`.
    pub fn is_snoozed(&self, id: EventId) -> bool {
        self.ctx.snoozes.lock().contains_key(&id)
    }

    /// Number of live snooze timers.
    pub fn snooze_count(&self) -> usize {
        self.ctx.snoozes.lock().len()
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// The reminder state of `event` as of `now`.
    pub fn state_of(&self, event: &Event, now: NaiveDateTime) -> ReminderState {
        if event.reminder_minutes <= 0 {
            ReminderState::Disabled
        } else if self.ctx.ledger.contains(event.id) {
            ReminderState::Delivered
        } else if self.is_snoozed(event.id) {
            ReminderState::Snoozed
        } else if is_due(event, now) {
            ReminderState::Due
        } else {
            ReminderState::Pending
        }
    }
}

// ============================================================================
// Scan Internals
// ============================================================================

/// Whether the reminder window is open: lead configured, and the start is
/// between zero and `reminder_minutes` whole minutes away. Minutes truncate,
/// so an event that started less than a minute ago still reads as due.
fn is_due(event: &Event, now: NaiveDateTime) -> bool {
    if event.reminder_minutes <= 0 {
        return false;
    }
    let minutes = event.minutes_until_start(now);
    minutes >= 0 && minutes <= event.reminder_minutes
}

/// Whether the reminder fire time passed while nobody was watching.
fn is_missed(
    event: &Event,
    ledger: &NotifiedLedger,
    now: NaiveDateTime,
    lookback: chrono::Duration,
) -> bool {
    let Some(reminder_time) = event.reminder_time() else {
        return false;
    };
    !ledger.contains(event.id) && reminder_time < now && event.start >= now - lookback
}

/// One scan pass: prune the ledger, then deliver every due reminder that is
/// neither delivered nor held by a snooze timer.
async fn scan(ctx: &ScanContext, now: NaiveDateTime) -> usize {
    let events = ctx.store.list();

    match ctx.ledger.prune(&events, now, ctx.config.retention()) {
        Ok(0) => {}
        Ok(dropped) => debug!("Scan pruned {} ledger entries", dropped),
        Err(e) => warn!("Ledger prune failed: {}", e),
    }

    let snoozed: Vec<EventId> = ctx.snoozes.lock().keys().copied().collect();
    let mut delivered = 0;

    for event in &events {
        if !is_due(event, now) {
            continue;
        }
        if ctx.ledger.contains(event.id) {
            continue;
        }
        if snoozed.contains(&event.id) {
            continue;
        }
        debug!("Reminder due for '{}' ({})", event.title, event.id);
        deliver(ctx, event, now).await;
        delivered += 1;
    }

    delivered
}

/// Deliver one reminder: resolve through the sink and apply the decision.
/// A sink error is an implicit dismiss so a broken sink converges to
/// silence instead of a hot loop.
async fn deliver(ctx: &ScanContext, event: &Event, now: NaiveDateTime) {
    let minutes = event.minutes_until_start(now);
    match ctx.sink.resolve(event, minutes).await {
        Ok(ReminderAction::Dismiss) => mark_delivered(ctx, event.id),
        Ok(ReminderAction::Snooze { minutes }) => schedule_snooze(ctx, event.id, minutes),
        Err(e) => {
            error!("Notification sink failed for event {}: {}", event.id, e);
            mark_delivered(ctx, event.id);
        }
    }
}

/// Record `id` in the ledger, logging instead of propagating so the caller's
/// loop continues.
fn mark_delivered(ctx: &ScanContext, id: EventId) {
    if let Err(e) = ctx.ledger.mark(id) {
        error!("Failed to persist delivered state for event {}: {}", id, e);
    }
}

/// Spawn the one-shot timer for a snoozed reminder, replacing any live
/// timer for the same event. The token makes the replacement race-free: a
/// stale timer that wakes after being replaced finds a newer token and
/// backs off.
fn schedule_snooze(ctx: &ScanContext, id: EventId, minutes: u32) {
    let minutes = if minutes == 0 {
        DEFAULT_SNOOZE_MINUTES
    } else {
        minutes
    };
    let token = ctx.snooze_token.fetch_add(1, Ordering::SeqCst);
    let timer_ctx = ctx.clone();

    let handle = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(minutes as u64 * 60)).await;

        {
            let mut snoozes = timer_ctx.snoozes.lock();
            match snoozes.get(&id) {
                Some(entry) if entry.token == token => {
                    snoozes.remove(&id);
                }
                _ => return,
            }
        }

        if timer_ctx.ledger.contains(id) {
            return;
        }
        let Some(event) = timer_ctx.store.get(id) else {
            debug!("Snoozed event {} no longer exists", id);
            return;
        };
        let now = Local::now().naive_local();
        debug!("Snooze expired for '{}' ({})", event.title, id);
        deliver(&timer_ctx, &event, now).await;
    });

    let mut snoozes = ctx.snoozes.lock();
    if let Some(old) = snoozes.insert(id, SnoozeEntry { token, handle }) {
        old.handle.abort();
        debug!("Replaced snooze timer for event {}", id);
    } else {
        debug!("Snoozed event {} for {} minutes", id, minutes);
    }
}
