//! Logging collaborator: request/response lifecycle events.
//!
//! ## Overview
//!
//! The client reports lifecycle events to a [`NetworkLogger`]. Loggers are
//! fire-and-forget: `log` returns nothing, and every call made by the client
//! goes through a guard that swallows a panicking logger, so logging can never
//! change the result of a fetch.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`NetworkLogger`] | Trait for logging destinations |
//! | [`TracingLogger`] | Default; renders line blocks through `tracing` |
//! | [`NoopLogger`] | Discards everything |
//! | [`InMemoryLogger`] | Keeps rendered summaries, for tests |

mod tracing_logger;

pub use tracing_logger::{HeaderMask, LogDetail, TracingLogger};

use crate::request::Request;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::borrow::Cow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::RwLock;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// A lifecycle event, borrowed from the call that produced it.
#[derive(Debug)]
pub enum LogEvent<'a> {
    Request {
        request: &'a Request,
    },
    Response {
        url: &'a Url,
        status: StatusCode,
        headers: &'a HeaderMap,
        body: &'a [u8],
    },
    Message {
        direction: Direction,
        severity: Severity,
        message: Cow<'a, str>,
    },
}

impl<'a> LogEvent<'a> {
    pub fn message(
        direction: Direction,
        severity: Severity,
        message: impl Into<Cow<'a, str>>,
    ) -> Self {
        LogEvent::Message {
            direction,
            severity,
            message: message.into(),
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            LogEvent::Request { .. } => Direction::Request,
            LogEvent::Response { .. } => Direction::Response,
            LogEvent::Message { direction, .. } => *direction,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            LogEvent::Message { severity, .. } => *severity,
            _ => Severity::Info,
        }
    }

    /// One-line summary, e.g. `GET https://example.com/` or `200 OK https://example.com/`.
    pub fn summary(&self) -> String {
        match self {
            LogEvent::Request { request } => format!("{} {}", request.method(), request.url()),
            LogEvent::Response { url, status, .. } => format!("{} {}", status, url),
            LogEvent::Message { message, .. } => message.to_string(),
        }
    }
}

pub trait NetworkLogger: Send + Sync {
    fn log(&self, event: &LogEvent<'_>);
}

/// Hand an event to `logger`; a panicking logger is contained here.
pub(crate) fn emit(logger: &dyn NetworkLogger, event: LogEvent<'_>) {
    if catch_unwind(AssertUnwindSafe(|| logger.log(&event))).is_err() {
        tracing::warn!("network logger panicked, event dropped");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl NetworkLogger for NoopLogger {
    fn log(&self, _event: &LogEvent<'_>) {}
}

/// Summary of an event as recorded by [`InMemoryLogger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub direction: Direction,
    pub severity: Severity,
    pub summary: String,
}

/// In-memory logger for tests. Keeps the most recent `max` records.
pub struct InMemoryLogger {
    records: RwLock<Vec<LogRecord>>,
    max_records: usize,
}

impl InMemoryLogger {
    pub fn new(max: usize) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            max_records: max.max(1),
        }
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .read()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.records().iter().any(|r| r.summary.contains(needle))
    }

    pub fn clear(&self) {
        if let Ok(mut records) = self.records.write() {
            records.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryLogger {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl NetworkLogger for InMemoryLogger {
    fn log(&self, event: &LogEvent<'_>) {
        let record = LogRecord {
            direction: event.direction(),
            severity: event.severity(),
            summary: event.summary(),
        };
        if let Ok(mut records) = self.records.write() {
            records.push(record);
            if records.len() > self.max_records {
                records.remove(0);
            }
        }
    }
}
