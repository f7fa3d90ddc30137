//! Log entries: the only record the logger persists and transmits

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest stack trace kept in an entry's data payload
pub const MAX_STACK_CHARS: usize = 500;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// What kind of capture produced an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Pageview,
    Error,
    Log,
}

/// Severity attached to `log` and `error` entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A captured observability record.
///
/// Field names match the stored and transmitted JSON (`siteId`, `type`).
/// Entries are never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Capture time, RFC 3339 UTC with milliseconds
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub path: String,
}

impl LogEntry {
    /// Create an entry stamped with a fresh id and the current time
    pub fn new(
        kind: EntryKind,
        level: Option<Level>,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
        site_id: Option<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id(),
            kind,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            site_id,
            level,
            message: message.into(),
            // A null payload would come back from storage as absent
            data: data.filter(|v| !v.is_null()),
            path: path.into(),
        }
    }

    pub fn has_level(&self, level: Level) -> bool {
        self.level == Some(level)
    }
}

/// Base-36 millisecond clock followed by a random base-36 suffix.
///
/// Unique in practice, not cryptographically.
pub fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    format!("{}{}", to_base36(millis), suffix)
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Cut a stack trace down to [`MAX_STACK_CHARS`] characters
pub fn truncate_stack(stack: &str) -> String {
    stack.chars().take(MAX_STACK_CHARS).collect()
}
