//! Flat-file storage backend.
//!
//! Persists the calendar as three CSV files under a data directory:
//! `events.csv`, `details.csv`, and `notified.csv`. Text fields are
//! backslash-escaped so commas and newlines survive the round trip.
//! Writes go through a temp file and rename, so a crash mid-write never
//! truncates existing data. Malformed lines are skipped on load with a
//! warning; one corrupt line never discards the rest of the file.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{Result, StorageError};
use crate::event::{Event, EventDetails, EventId, Frequency, Recurrence};
use crate::storage::CalendarStorage;

const EVENTS_FILE: &str = "events.csv";
const DETAILS_FILE: &str = "details.csv";
const NOTIFIED_FILE: &str = "notified.csv";

/// Timestamp format shared by all files (e.g., `2025-10-05T11:00:00`).
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Flat-file storage under a data directory.
pub struct CsvStorage {
    data_dir: PathBuf,
}

impl CsvStorage {
    /// Create a backend rooted at `data_dir`. The directory is created on
    /// first save.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn events_path(&self) -> PathBuf {
        self.data_dir.join(EVENTS_FILE)
    }

    fn details_path(&self) -> PathBuf {
        self.data_dir.join(DETAILS_FILE)
    }

    fn notified_path(&self) -> PathBuf {
        self.data_dir.join(NOTIFIED_FILE)
    }

    /// Write `contents` to `path` through a temp file and rename.
    fn write_atomic(&self, path: &Path, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(StorageError::Io)?;
        let tmp = path.with_extension("csv.tmp");
        fs::write(&tmp, contents).map_err(StorageError::Io)?;
        fs::rename(&tmp, path).map_err(StorageError::Io)?;
        Ok(())
    }

    fn read_lines(&self, path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            debug!("No file at {}, starting empty", path.display());
            return Ok(None);
        }
        let contents = fs::read_to_string(path).map_err(StorageError::Io)?;
        Ok(Some(contents.lines().map(str::to_string).collect()))
    }
}

impl CalendarStorage for CsvStorage {
    fn load_events(&self) -> Result<Vec<Event>> {
        let Some(lines) = self.read_lines(&self.events_path())? else {
            return Ok(Vec::new());
        };

        let mut events = Vec::new();
        for (number, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_event_line(line) {
                Some(event) => events.push(event),
                None => warn!(
                    "Skipping malformed line {} in {}",
                    number + 1,
                    self.events_path().display()
                ),
            }
        }
        debug!("Loaded {} events from {}", events.len(), self.events_path().display());
        Ok(events)
    }

    fn save_events(&self, events: &[Event]) -> Result<()> {
        let mut contents = String::new();
        for event in events {
            contents.push_str(&format_event_line(event));
            contents.push('\n');
        }
        self.write_atomic(&self.events_path(), &contents)
    }

    fn load_details(&self) -> Result<HashMap<EventId, EventDetails>> {
        let Some(lines) = self.read_lines(&self.details_path())? else {
            return Ok(HashMap::new());
        };

        let mut details = HashMap::new();
        for (number, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_details_line(line) {
                Some((id, record)) => {
                    details.insert(id, record);
                }
                None => warn!(
                    "Skipping malformed line {} in {}",
                    number + 1,
                    self.details_path().display()
                ),
            }
        }
        Ok(details)
    }

    fn save_details(&self, details: &HashMap<EventId, EventDetails>) -> Result<()> {
        let mut ids: Vec<_> = details.keys().copied().collect();
        ids.sort_unstable();

        let mut contents = String::new();
        for id in ids {
            let record = &details[&id];
            contents.push_str(&format!(
                "{},{},{},{}\n",
                id,
                escape(&record.location),
                escape(&record.category),
                escape(&record.priority)
            ));
        }
        self.write_atomic(&self.details_path(), &contents)
    }

    fn load_notified(&self) -> Result<HashSet<EventId>> {
        let Some(lines) = self.read_lines(&self.notified_path())? else {
            return Ok(HashSet::new());
        };

        let mut notified = HashSet::new();
        for (number, line) in lines.iter().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<EventId>() {
                Ok(id) => {
                    notified.insert(id);
                }
                Err(_) => warn!(
                    "Skipping malformed line {} in {}",
                    number + 1,
                    self.notified_path().display()
                ),
            }
        }
        Ok(notified)
    }

    fn save_notified(&self, notified: &HashSet<EventId>) -> Result<()> {
        let mut ids: Vec<_> = notified.iter().copied().collect();
        ids.sort_unstable();

        let mut contents = String::new();
        for id in ids {
            contents.push_str(&format!("{id}\n"));
        }
        self.write_atomic(&self.notified_path(), &contents)
    }

    fn backup(&self) -> Result<Option<PathBuf>> {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();
        let backup_dir = self.data_dir.join("backups").join(stamp);
        fs::create_dir_all(&backup_dir).map_err(StorageError::Io)?;

        for file in [EVENTS_FILE, DETAILS_FILE, NOTIFIED_FILE] {
            let source = self.data_dir.join(file);
            if source.exists() {
                fs::copy(&source, backup_dir.join(file)).map_err(StorageError::Io)?;
            }
        }

        info!("Backup written to {}", backup_dir.display());
        Ok(Some(backup_dir))
    }
}

// ============================================================================
// Line Format
// ============================================================================

/// Build the CSV line: `id,title,description,start,end,reminder,recurrence`.
fn format_event_line(event: &Event) -> String {
    let recurrence = event
        .recurrence
        .as_ref()
        .map(|r| {
            format!(
                "{}/{}/{}",
                r.frequency.as_str(),
                r.interval,
                r.until.format(DATE_FORMAT)
            )
        })
        .unwrap_or_default();

    format!(
        "{},{},{},{},{},{},{}",
        event.id,
        escape(&event.title),
        escape(&event.description),
        event.start.format(DATE_FORMAT),
        event.end.format(DATE_FORMAT),
        event.reminder_minutes,
        recurrence
    )
}

/// Parse one event line; `None` when the line is malformed.
fn parse_event_line(line: &str) -> Option<Event> {
    let fields = split_escaped(line);
    if fields.len() < 5 {
        return None;
    }

    let id: EventId = fields[0].trim().parse().ok()?;
    let title = fields[1].clone();
    let description = fields[2].clone();
    let start = parse_datetime(&fields[3])?;
    let end = parse_datetime(&fields[4])?;

    // Older files carry only the first five fields
    let reminder_minutes = match fields.get(5) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().ok()?,
        _ => 0,
    };
    let recurrence = match fields.get(6) {
        Some(raw) if !raw.trim().is_empty() => Some(parse_recurrence(raw)?),
        _ => None,
    };

    let event = Event {
        id,
        title,
        description,
        start,
        end,
        reminder_minutes,
        recurrence,
    };
    event.validate().ok()?;
    Some(event)
}

fn parse_details_line(line: &str) -> Option<(EventId, EventDetails)> {
    let fields = split_escaped(line);
    if fields.len() < 4 {
        return None;
    }
    let id: EventId = fields[0].trim().parse().ok()?;
    Some((
        id,
        EventDetails::new(fields[1].clone(), fields[2].clone(), fields[3].clone()),
    ))
}

/// Parse the packed rule `FREQUENCY/interval/until`.
fn parse_recurrence(raw: &str) -> Option<Recurrence> {
    let mut parts = raw.splitn(3, '/');
    let frequency = Frequency::parse(parts.next()?)?;
    let interval: u32 = parts.next()?.trim().parse().ok()?;
    let until = parse_datetime(parts.next()?)?;
    if interval == 0 {
        return None;
    }
    Some(Recurrence {
        frequency,
        interval,
        until,
    })
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// Escape backslash, comma, and newline in a text field.
fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

/// Split a line on unescaped commas, undoing the escapes as it goes.
fn split_escaped(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(',') => current.push(','),
                Some('n') => current.push('\n'),
                Some('\\') => current.push('\\'),
                Some(other) => current.push(other),
                None => {}
            },
            ',' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
