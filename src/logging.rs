//! Diagnostic log for relay calls.
//!
//! Entries are appended to a JSONL file and mirrored in a bounded in-memory
//! buffer. Every entry is stamped with the deployment environment so failure
//! reports can be read without the process config at hand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const MAX_LOG_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub environment: String,
    /// Relay endpoint or subsystem that wrote the entry.
    pub component: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

/// Builder handed to callers; the environment is filled in by the logger.
#[derive(Debug, Clone)]
pub struct Record {
    level: LogLevel,
    component: String,
    message: String,
    request_id: Option<Uuid>,
    context: Option<serde_json::Value>,
}

impl Record {
    pub fn new(level: LogLevel, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            component: component.into(),
            message: message.into(),
            request_id: None,
            context: None,
        }
    }

    pub fn request(mut self, id: Uuid) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn context(mut self, ctx: serde_json::Value) -> Self {
        self.context = Some(ctx);
        self
    }
}

struct Logger {
    environment: String,
    entries: VecDeque<LogEntry>,
    writer: BufWriter<File>,
}

impl Logger {
    fn open(file_path: &Path, environment: String) -> std::io::Result<Self> {
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut entries = VecDeque::with_capacity(MAX_LOG_ENTRIES);
        if file_path.exists() {
            let reader = BufReader::new(File::open(file_path)?);
            for line in reader.lines().map_while(std::result::Result::ok) {
                if let Ok(entry) = serde_json::from_str::<LogEntry>(&line) {
                    if entries.len() >= MAX_LOG_ENTRIES {
                        entries.pop_front();
                    }
                    entries.push_back(entry);
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;

        Ok(Self {
            environment,
            entries,
            writer: BufWriter::new(file),
        })
    }

    fn write(&mut self, record: Record) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level: record.level,
            environment: self.environment.clone(),
            component: record.component,
            request_id: record.request_id,
            message: record.message,
            context: record.context,
        };

        if let Ok(json) = serde_json::to_string(&entry) {
            let _ = writeln!(self.writer, "{}", json);
            let _ = self.writer.flush();
        }
        if self.entries.len() >= MAX_LOG_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

#[derive(Clone)]
pub struct SharedLogger(Arc<Mutex<Logger>>);

impl SharedLogger {
    pub fn new(file_path: impl AsRef<Path>, environment: impl Into<String>) -> std::io::Result<Self> {
        let logger = Logger::open(file_path.as_ref(), environment.into())?;
        Ok(Self(Arc::new(Mutex::new(logger))))
    }

    pub fn record(&self, record: Record) {
        if let Ok(mut logger) = self.0.lock() {
            logger.write(record);
        }
    }

    pub fn info(&self, component: impl Into<String>, message: impl Into<String>) {
        self.record(Record::new(LogLevel::Info, component, message));
    }

    pub fn warn(&self, component: impl Into<String>, message: impl Into<String>) {
        self.record(Record::new(LogLevel::Warn, component, message));
    }

    /// Most recent entries first.
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.0
            .lock()
            .map(|l| l.entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entries_are_stamped_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("relay.log");
        let logger = SharedLogger::new(&path, "staging").unwrap();

        let id = Uuid::new_v4();
        logger.record(
            Record::new(LogLevel::Error, "translate", "upstream failed")
                .request(id)
                .context(json!({"status": 502})),
        );
        logger.info("startup", "ready");

        let recent = logger.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].component, "startup");
        assert_eq!(recent[1].environment, "staging");
        assert_eq!(recent[1].request_id, Some(id));
        assert_eq!(recent[1].level, LogLevel::Error);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("\"status\":502"));
    }

    #[test]
    fn test_reopen_restores_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.log");

        {
            let logger = SharedLogger::new(&path, "development").unwrap();
            logger.warn("chat", "first");
        }

        let logger = SharedLogger::new(&path, "development").unwrap();
        logger.info("chat", "second");

        let messages: Vec<_> = logger.recent(10).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["second", "first"]);
    }
}
