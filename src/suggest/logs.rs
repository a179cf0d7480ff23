use super::vector::LogEntry;
use crate::error::LogSourceUnavailable;
use crate::table::RouteMethod;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Where a [`LogLoad`] came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogSource {
    /// Parsed from access-log files.
    Files {
        files: usize,
        /// Malformed lines that were skipped.
        skipped: usize,
    },
    /// The configured source was unusable; the synthetic sample was used instead.
    Fallback { reason: LogSourceUnavailable },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogLoad {
    pub entries: Vec<LogEntry>,
    pub source: LogSource,
}

impl LogLoad {
    #[must_use]
    pub fn used_fallback(&self) -> bool {
        matches!(self.source, LogSource::Fallback { .. })
    }
}

#[derive(Deserialize)]
struct LogRecord {
    method: String,
    path: String,
    status: u16,
}

/// Parse one JSONL record. Query strings are dropped from the path.
///
/// `WS` records are rejected: access logs only ever carry HTTP verbs, and a
/// scaffold stub has no WebSocket callbacks to serve an upgrade with.
#[must_use]
pub fn parse_log_line(line: &str) -> Option<LogEntry> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let record: LogRecord = serde_json::from_str(line).ok()?;
    let method: RouteMethod = record.method.parse().ok()?;
    if method.is_websocket() {
        return None;
    }
    let path = record
        .path
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    if !path.starts_with('/') {
        return None;
    }
    Some(LogEntry::new(method, path, record.status))
}

/// Five representative entries used when no real log is usable.
#[must_use]
pub fn fallback_sample() -> Vec<LogEntry> {
    vec![
        LogEntry::new(RouteMethod::Get, "/api/v1/users/audit", 200),
        LogEntry::new(RouteMethod::Get, "/api/v1/orders/history", 200),
        LogEntry::new(RouteMethod::Post, "/api/v1/invoices", 201),
        LogEntry::new(RouteMethod::Get, "/api/v2/reports/summary", 200),
        LogEntry::new(RouteMethod::Get, "/health/ready", 200),
    ]
}

fn fallback(reason: LogSourceUnavailable) -> LogLoad {
    warn!(reason = %reason, "Access logs unavailable; using synthetic sample");
    LogLoad {
        entries: fallback_sample(),
        source: LogSource::Fallback { reason },
    }
}

/// Read up to `max_entries` records from every file matching `pattern`.
///
/// Files are read in sorted path order. Malformed lines and unreadable files
/// are skipped. Never fails: an unusable source yields the fallback sample.
pub fn load_logs(pattern: &str, max_entries: usize) -> LogLoad {
    let paths = match glob::glob(pattern) {
        Ok(paths) => paths,
        Err(e) => {
            return fallback(LogSourceUnavailable::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
        }
    };
    let mut files: Vec<PathBuf> = paths.filter_map(Result::ok).filter(|p| p.is_file()).collect();
    files.sort();
    if files.is_empty() {
        return fallback(LogSourceUnavailable::NoFiles {
            pattern: pattern.to_string(),
        });
    }

    let mut entries = Vec::new();
    let mut skipped = 0usize;
    'files: for file in &files {
        let reader = match File::open(file) {
            Ok(f) => BufReader::new(f),
            Err(e) => {
                warn!(file = ?file, error = %e, "Skipping unreadable log file");
                continue;
            }
        };
        for line in reader.lines() {
            if entries.len() >= max_entries {
                debug!(max_entries, "Log entry cap reached");
                break 'files;
            }
            match line.ok().as_deref().and_then(parse_log_line) {
                Some(entry) => entries.push(entry),
                None => skipped += 1,
            }
        }
    }

    if entries.is_empty() {
        return fallback(LogSourceUnavailable::NoValidRecords { files: files.len() });
    }
    info!(
        files = files.len(),
        entries = entries.len(),
        skipped,
        "Access logs loaded"
    );
    LogLoad {
        entries,
        source: LogSource::Files {
            files: files.len(),
            skipped,
        },
    }
}
