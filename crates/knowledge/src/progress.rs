//! Progress reporting for index cycles.
//!
//! Phases are `list`, `fetch` and `index`. Reporting is optional; a no-op
//! reporter costs nothing.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Progress event emitted during an index cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// Phase of the operation: "list", "fetch", "index"
    pub phase: String,

    /// Source the event belongs to
    pub source: String,

    pub current: u64,
    pub total: Option<u64>,
    pub percentage: Option<f64>,
    pub message: String,
    pub elapsed_secs: Option<f64>,
}

impl ProgressEvent {
    pub fn new(
        phase: impl Into<String>,
        source: impl Into<String>,
        current: u64,
        total: Option<u64>,
        message: impl Into<String>,
    ) -> Self {
        let percentage = total.map(|t| {
            if t > 0 {
                (current as f64 / t as f64) * 100.0
            } else {
                100.0
            }
        });

        Self {
            phase: phase.into(),
            source: source.into(),
            current,
            total,
            percentage,
            message: message.into(),
            elapsed_secs: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self
    }

    /// Format as a single user-facing line.
    pub fn format_simple(&self) -> String {
        let progress = match self.total {
            Some(total) => format!("{}/{}", self.current, total),
            None => self.current.to_string(),
        };
        let pct = self
            .percentage
            .map(|p| format!(" ({:.0}%)", p))
            .unwrap_or_default();

        format!(
            "[{}:{}] {}{} - {}",
            self.phase, self.source, progress, pct, self.message
        )
    }
}

/// Callback for progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Emits progress events through an optional callback.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    start_time: Arc<Instant>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::noop()
    }
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            start_time: Arc::new(Instant::now()),
        }
    }

    /// A reporter that emits nothing.
    pub fn noop() -> Self {
        Self {
            callback: None,
            start_time: Arc::new(Instant::now()),
        }
    }

    pub fn emit(&self, event: ProgressEvent) {
        let Some(callback) = &self.callback else {
            return;
        };

        let elapsed = self.start_time.elapsed().as_secs_f64();
        let event = event.with_elapsed(elapsed);
        tracing::debug!(
            phase = %event.phase,
            source = %event.source,
            current = event.current,
            total = ?event.total,
            message = %event.message,
            elapsed_secs = elapsed,
            "Progress event"
        );
        callback(event);
    }

    pub fn list(&self, source: &str, items: u64) {
        self.emit(ProgressEvent::new(
            "list",
            source,
            items,
            None,
            format!("{} items listed", items),
        ));
    }

    pub fn fetch(&self, source: &str, current: u64, total: u64, item: &str) {
        self.emit(ProgressEvent::new(
            "fetch",
            source,
            current,
            Some(total),
            format!("fetched {}", item),
        ));
    }

    pub fn index(&self, source: &str, indexed: u64, total: u64) {
        self.emit(ProgressEvent::new(
            "index",
            source,
            indexed,
            Some(total),
            "records written",
        ));
    }
}
