//! Observability - the agent event journal.
//!
//! Requests, recalls, per-tick usage rows, missed ticks, and failures are
//! emitted as events through a sink. The file sink appends JSONL so runs
//! can be inspected offline; tests collect events in memory.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trex_core::Tick;

/// One journal record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    pub timestamp: DateTime<Utc>,
    pub tick: Tick,
    pub event_type: String,
    pub reactor: Option<String>,
    pub message: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl AgentEvent {
    pub fn new(tick: Tick, event_type: &str, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            tick,
            event_type: event_type.to_string(),
            reactor: None,
            message: message.into(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_reactor(mut self, reactor: impl Into<String>) -> Self {
        self.reactor = Some(reactor.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Sink for agent events.
pub trait EventSink {
    fn emit(&mut self, event: AgentEvent);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&mut self, _event: AgentEvent) {}
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct VecEventSink {
    pub events: Vec<AgentEvent>,
}

impl EventSink for VecEventSink {
    fn emit(&mut self, event: AgentEvent) {
        self.events.push(event);
    }
}

/// Appends events to a JSONL journal file.
pub struct FileEventLog {
    path: PathBuf,
}

impl FileEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event.
    pub fn append(&self, event: &AgentEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let line = serde_json::to_string(event)?;
        writeln!(file, "{}", line)?;

        Ok(())
    }

    /// Read the last `limit` events.
    pub fn read_recent(&self, limit: usize) -> Vec<AgentEvent> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Vec::new(),
        };

        let reader = BufReader::new(file);
        let mut events: Vec<AgentEvent> = reader
            .lines()
            .filter_map(|line| line.ok())
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect();

        if events.len() > limit {
            events.drain(0..events.len() - limit);
        }

        events
    }
}

impl EventSink for FileEventLog {
    fn emit(&mut self, event: AgentEvent) {
        if let Err(error) = self.append(&event) {
            tracing::warn!(%error, "failed to append agent event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_log_round_trips_events() {
        let dir = std::env::temp_dir().join(format!("trex-events-{}", std::process::id()));
        let log = FileEventLog::new(dir.join("events.jsonl"));

        log.append(&AgentEvent::new(1, "goal_requested", "g1@t.Go"))
            .expect("append");
        log.append(
            &AgentEvent::new(2, "tick_usage", "sync").with_reactor("exec"),
        )
        .expect("append");

        let events = log.read_recent(10);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "goal_requested");
        assert_eq!(events[1].reactor.as_deref(), Some("exec"));

        let recent = log.read_recent(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].tick, 2);

        std::fs::remove_dir_all(&dir).ok();
    }
}
