//! Progress reporting
//!
//! Callers observe a deployment through a [`ProgressSink`]. Every event is
//! also written to the tracing subscriber.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Severity of a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A progress event streamed to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub level: ProgressLevel,
    pub message: String,
}

/// Receiver of progress events
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Discards events; tracing output still happens
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Keeps every event in memory
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ProgressSink for RecordingProgress {
    fn emit(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Writes to tracing and forwards to the caller's sink
pub struct Progress<'a> {
    sink: &'a dyn ProgressSink,
}

impl<'a> Progress<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self { sink }
    }

    fn emit(&self, level: ProgressLevel, message: String) {
        self.sink.emit(ProgressEvent { level, message });
    }

    pub fn debug(&self, message: impl Into<String>) {
        let message = message.into();
        debug!("{}", message);
        self.emit(ProgressLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.emit(ProgressLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.emit(ProgressLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.emit(ProgressLevel::Error, message);
    }
}
