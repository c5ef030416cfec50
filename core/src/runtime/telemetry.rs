use crate::report::NetworkRequestRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Error,
    Warning,
    Other,
}

impl ConsoleLevel {
    /// Maps a console message type name (`error`, `warning`, `log`, ...).
    pub fn from_type_name(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "error" => ConsoleLevel::Error,
            "warning" | "warn" => ConsoleLevel::Warning,
            _ => ConsoleLevel::Other,
        }
    }
}

/// Producer half handed to browser event callbacks. Never blocks. Console
/// errors and warnings are counted exactly; `Other` console messages are
/// ignored. Only request records go through the bounded channel, and records
/// past its capacity are counted and dropped.
#[derive(Debug, Clone)]
pub struct TelemetrySink {
    tx: SyncSender<NetworkRequestRecord>,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    errors: AtomicU64,
    warnings: AtomicU64,
    dropped: AtomicU64,
}

impl TelemetrySink {
    pub fn console(&self, level: ConsoleLevel) {
        let counter = match level {
            ConsoleLevel::Error => &self.counters.errors,
            ConsoleLevel::Warning => &self.counters.warnings,
            ConsoleLevel::Other => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request(&self, record: NetworkRequestRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Consumer half, drained once the session is closed.
pub struct TelemetryCollector {
    rx: Receiver<NetworkRequestRecord>,
    counters: Arc<Counters>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionTelemetry {
    pub console_errors: u64,
    pub console_warnings: u64,
    /// Completion order.
    pub requests: Vec<NetworkRequestRecord>,
    pub dropped_requests: u64,
}

impl TelemetryCollector {
    pub fn drain(self) -> SessionTelemetry {
        SessionTelemetry {
            console_errors: self.counters.errors.load(Ordering::Relaxed),
            console_warnings: self.counters.warnings.load(Ordering::Relaxed),
            requests: self.rx.try_iter().collect(),
            dropped_requests: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

pub fn telemetry_channel(capacity: usize) -> (TelemetrySink, TelemetryCollector) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    let counters = Arc::new(Counters::default());
    (
        TelemetrySink {
            tx,
            counters: Arc::clone(&counters),
        },
        TelemetryCollector { rx, counters },
    )
}
