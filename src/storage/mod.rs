//! Storage module for calendar persistence.
//!
//! This module provides the synchronous storage contract the engine writes
//! through, plus two backends:
//! - `CsvStorage`: flat files under a data directory
//! - `MemoryStorage`: in-memory snapshots for tests

mod csv;
mod memory;
mod traits;

pub use csv::CsvStorage;
pub use memory::MemoryStorage;
pub use traits::CalendarStorage;

use crate::config::Config;
use crate::error::Result;
use std::sync::Arc;

/// Create the flat-file storage backend from configuration.
pub fn create_storage(config: &Config) -> Result<Arc<dyn CalendarStorage>> {
    let data_dir = config.data_dir()?;
    Ok(Arc::new(CsvStorage::new(data_dir)))
}
