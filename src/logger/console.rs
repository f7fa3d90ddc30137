//! Console mirroring of captured entries

use chrono::{DateTime, Local};
use colored::*;

use crate::entry::{EntryKind, Level, LogEntry};

/// One-line colored summary of an entry
pub fn format_entry(entry: &LogEntry) -> String {
    let time = DateTime::parse_from_rfc3339(&entry.timestamp)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| entry.timestamp.clone());

    let tag = match (entry.kind, entry.level) {
        (EntryKind::Pageview, _) => "PAGEVIEW".green(),
        (_, Some(Level::Error)) => "ERROR".red(),
        (_, Some(Level::Warn)) => "WARN".yellow(),
        (_, Some(Level::Info)) => "INFO".cyan(),
        (_, None) => "LOG".normal(),
    };

    let mut parts = vec![time.dimmed().to_string(), tag.to_string()];

    if let Some(ref site) = entry.site_id {
        parts.push(format!("[{}]", site).dimmed().to_string());
    }

    parts.push(entry.path.dimmed().to_string());
    parts.push(entry.message.bold().to_string());

    parts.join(" ")
}

/// Mirror an entry to stderr, payload indented underneath
pub fn mirror(entry: &LogEntry) {
    eprintln!("{}", format_entry(entry));

    if let Some(ref data) = entry.data {
        let pretty = serde_json::to_string_pretty(data).unwrap_or_default();
        for line in pretty.lines() {
            eprintln!("  {}", line.dimmed());
        }
    }
}
