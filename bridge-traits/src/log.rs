//! Host log forwarding.
//!
//! Engines and mobile hosts have their own log consoles. A [`HostLogSink`]
//! receives every `tracing` event that passes the subscriber filter so the
//! core's diagnostics show up next to the host's.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// One structured log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Module path or explicit `target:` of the event
    pub target: String,
    pub message: String,
    pub fields: BTreeMap<String, String>,
    /// Name of the innermost active span, when spans are enabled
    pub span: Option<String>,
}

impl LogRecord {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: BTreeMap::new(),
            span: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Single-line rendering used by hosts that only accept plain strings.
    pub fn render(&self) -> String {
        let mut line = format!("[{}] {}: {}", self.level.as_str(), self.target, self.message);
        for (key, value) in &self.fields {
            line.push_str(&format!(" {}={}", key, value));
        }
        line
    }
}

/// Host logging sink.
///
/// Called synchronously from inside the `tracing` layer, so implementations
/// should hand the record off quickly (push to a queue, call the engine log).
pub trait HostLogSink: Send + Sync {
    fn log(&self, record: &LogRecord);

    /// Records below this level are not forwarded.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_record_render() {
        let record = LogRecord::new(LogLevel::Warn, "core_time", "Using local clock")
            .with_field("trust", "fallback")
            .with_field("attempt", "1");

        assert_eq!(
            record.render(),
            "[warn] core_time: Using local clock attempt=1 trust=fallback"
        );
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Error > LogLevel::Warn);
        assert!(LogLevel::Trace < LogLevel::Debug);
    }
}
