//! Downloadable JSON export of the durable log

use chrono::{NaiveDate, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::entry::LogEntry;
use crate::error::ExportError;

/// A serialized durable log ready to be written out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryExport {
    pub filename: String,
    pub contents: String,
}

impl EntryExport {
    /// Pretty-printed export named after today's (UTC) date
    pub fn new(entries: &[LogEntry]) -> Result<Self, ExportError> {
        Self::for_date(entries, Utc::now().date_naive())
    }

    pub fn for_date(entries: &[LogEntry], date: NaiveDate) -> Result<Self, ExportError> {
        Ok(Self {
            filename: export_filename(date),
            contents: serde_json::to_string_pretty(entries)?,
        })
    }

    /// Write into `dir`, creating it if needed
    pub fn save_in(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        fs::write(&path, &self.contents)?;
        Ok(path)
    }
}

pub fn export_filename(date: NaiveDate) -> String {
    format!("static-site-logs-{}.json", date.format("%Y-%m-%d"))
}
