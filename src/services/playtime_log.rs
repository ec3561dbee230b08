//! Append-only playtime log.
//!
//! One line per lifecycle event: `<RFC 3339 timestamp>: <description>`.
//! Lines starting with `#` are manual annotations: they keep their place in
//! time order but carry no lifecycle meaning. External tools read this
//! format, so existing lines are never rewritten.

use chrono::{DateTime, FixedOffset, Local};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, WrapperError};
use crate::events::LifecycleEvent;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// One parsed line of a playtime log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub event: LifecycleEvent,
    pub at: DateTime<FixedOffset>,
    pub annotation: bool,
    /// 1-based line number in the source
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct PlaytimeLogger {
    path: PathBuf,
}

impl PlaytimeLogger {
    /// Creates the log's directory if needed; the file itself is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open, append one line, close. No handle is kept between writes.
    pub fn append(&self, event: LifecycleEvent, at: DateTime<Local>) -> Result<()> {
        let line = format_entry(event, at);
        debug!("time log: {}", line);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

pub fn format_entry(event: LifecycleEvent, at: DateTime<Local>) -> String {
    format!("{}: {}", at.format(TIMESTAMP_FORMAT), event.description())
}

pub fn parse_entry(text: &str, line: usize) -> Result<LogEntry> {
    let invalid = |reason: String| WrapperError::InvalidLogLine { line, reason };

    let (timestamp, description) = text
        .split_once(": ")
        .ok_or_else(|| invalid(format!("missing separator in {:?}", text)))?;

    let description = description.trim();
    let event = LifecycleEvent::from_description(description)
        .ok_or_else(|| invalid(format!("invalid action {:?}", description)))?;

    let (annotation, timestamp) = match timestamp.strip_prefix('#') {
        Some(rest) => (true, rest),
        None => (false, timestamp),
    };
    let at = DateTime::parse_from_rfc3339(timestamp.trim())
        .map_err(|e| invalid(format!("bad timestamp {:?}: {}", timestamp, e)))?;

    Ok(LogEntry {
        event,
        at,
        annotation,
        line,
    })
}

/// Parse every non-blank line of a log
pub fn parse_log(contents: &str) -> Result<Vec<LogEntry>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(index, text)| parse_entry(text, index + 1))
        .collect()
}

pub fn read_log(path: &Path) -> Result<Vec<LogEntry>> {
    parse_log(&fs::read_to_string(path)?)
}
