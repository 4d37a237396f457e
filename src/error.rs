//! Error types for the chime calendar engine.

use thiserror::Error;

/// Main error type for chime operations.
#[derive(Error, Debug)]
pub enum ChimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Notification sink error: {0}")]
    Sink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Event validation errors.
#[derive(Error, Debug)]
pub enum EventError {
    #[error("Event end {end} is not after start {start}")]
    InvalidTimes {
        start: chrono::NaiveDateTime,
        end: chrono::NaiveDateTime,
    },

    #[error("Event title is empty")]
    EmptyTitle,

    #[error("Recurrence interval must be at least 1, got {0}")]
    InvalidInterval(u32),

    #[error("Reminder lead minutes must not be negative, got {0}")]
    InvalidLead(i64),
}

/// Storage-related errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for chime operations.
pub type Result<T> = std::result::Result<T, ChimeError>;
