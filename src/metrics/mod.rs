use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counters shared between the controller and the runner threads.
pub type SharedMetrics = Arc<Mutex<RuntimeMetrics>>;

#[derive(Debug, Default, Clone)]
pub struct RuntimeMetrics {
    lines_pushed: u64,
    redraws: u64,
    layout_passes: u64,
    spawn_failures: u64,
    process_exits: u64,
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedMetrics {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn record_lines(&mut self, count: usize) {
        self.lines_pushed = self.lines_pushed.saturating_add(count as u64);
    }

    pub fn record_redraw(&mut self) {
        self.redraws = self.redraws.saturating_add(1);
    }

    pub fn record_layout(&mut self) {
        self.layout_passes = self.layout_passes.saturating_add(1);
    }

    pub fn record_spawn_failure(&mut self) {
        self.spawn_failures = self.spawn_failures.saturating_add(1);
    }

    pub fn record_exit(&mut self) {
        self.process_exits = self.process_exits.saturating_add(1);
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            lines_pushed: self.lines_pushed,
            redraws: self.redraws,
            layout_passes: self.layout_passes,
            spawn_failures: self.spawn_failures,
            process_exits: self.process_exits,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub lines_pushed: u64,
    pub redraws: u64,
    pub layout_passes: u64,
    pub spawn_failures: u64,
    pub process_exits: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "runtime_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("lines_pushed".to_string(), json!(self.lines_pushed));
        map.insert("redraws".to_string(), json!(self.redraws));
        map.insert("layout_passes".to_string(), json!(self.layout_passes));
        map.insert("spawn_failures".to_string(), json!(self.spawn_failures));
        map.insert("process_exits".to_string(), json!(self.process_exits));
        map
    }
}

/// Apply `f` to the shared counters, ignoring a poisoned lock.
pub fn record(metrics: Option<&SharedMetrics>, f: impl FnOnce(&mut RuntimeMetrics)) {
    if let Some(metrics) = metrics {
        if let Ok(mut guard) = metrics.lock() {
            f(&mut guard);
        }
    }
}
