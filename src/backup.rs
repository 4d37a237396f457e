//! Periodic backups and portable exports.
//!
//! The backup timer snapshots the storage backend on a fixed interval; file
//! mechanics stay behind the storage contract. Exports write events and
//! their side-table details to portable JSON for use outside the engine.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::BackupConfig;
use crate::error::Result;
use crate::event::{Event, EventDetails, EventId};
use crate::storage::CalendarStorage;

// ============================================================================
// Export
// ============================================================================

/// Export format for calendar data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Pretty-printed JSON array.
    #[default]
    Json,
    /// JSON Lines format (one event per line).
    Jsonl,
}

/// One event with its optional side-table details, as written to exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventExport {
    #[serde(flatten)]
    pub event: Event,
    /// Location, category, and priority when the event has them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<EventDetails>,
}

/// Result of an export operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResult {
    /// Path to the export file.
    pub path: PathBuf,
    /// Number of events exported.
    pub event_count: usize,
    /// Size in bytes.
    pub size_bytes: u64,
}

/// Export events and their details to `path`.
pub fn export_events(
    events: &[Event],
    details: &HashMap<EventId, EventDetails>,
    path: impl AsRef<Path>,
    format: ExportFormat,
) -> Result<ExportResult> {
    let path = path.as_ref().to_path_buf();
    let records: Vec<EventExport> = events
        .iter()
        .map(|event| EventExport {
            event: event.clone(),
            details: details.get(&event.id).cloned(),
        })
        .collect();

    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);

    match format {
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &records)?;
        }
        ExportFormat::Jsonl => {
            for record in &records {
                serde_json::to_writer(&mut writer, record)?;
                writer.write_all(b"\n")?;
            }
        }
    }
    writer.flush()?;

    let size_bytes = std::fs::metadata(&path)?.len();
    info!(
        "Exported {} events to {} ({} bytes)",
        records.len(),
        path.display(),
        size_bytes
    );

    Ok(ExportResult {
        path,
        event_count: records.len(),
        size_bytes,
    })
}

/// Read an export file back into event records.
pub fn import_events(path: impl AsRef<Path>, format: ExportFormat) -> Result<Vec<EventExport>> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);

    let records = match format {
        ExportFormat::Json => serde_json::from_reader(reader)?,
        ExportFormat::Jsonl => {
            let mut records = Vec::new();
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                records.push(serde_json::from_str(&line)?);
            }
            records
        }
    };

    Ok(records)
}

// ============================================================================
// Backup Service
// ============================================================================

/// Periodic backup timer over the storage backend.
pub struct BackupService {
    storage: Arc<dyn CalendarStorage>,
    config: BackupConfig,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackupService {
    /// Create a backup service over the shared storage backend.
    pub fn new(storage: Arc<dyn CalendarStorage>, config: BackupConfig) -> Self {
        Self {
            storage,
            config,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            handle: Mutex::new(None),
        }
    }

    /// Start the backup timer. A no-op when backups are disabled or the
    /// timer is already running. The first backup runs immediately; a
    /// failed backup is logged and the timer keeps going.
    pub fn start(&self) {
        if !self.config.enabled {
            debug!("Backups disabled");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Backup timer already running");
            return;
        }

        let storage = self.storage.clone();
        let shutdown = self.shutdown.clone();
        let period = self.config.interval();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match storage.backup() {
                            Ok(Some(path)) => info!("Backup written to {}", path.display()),
                            Ok(None) => debug!("Storage has nothing to back up"),
                            Err(e) => error!("Backup failed: {}", e),
                        }
                    }
                    _ = shutdown.notified() => break,
                }
            }
            info!("Backup timer stopped");
        });

        *self.handle.lock() = Some(handle);
        info!("Backup timer started (every {}s)", self.config.interval_secs);
    }

    /// Stop the backup timer. Idempotent.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        self.shutdown.notify_one();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Backup task failed: {}", e);
                }
            }
        }
    }

    /// Whether the backup timer is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
