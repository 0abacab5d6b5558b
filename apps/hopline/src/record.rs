//! NDJSON event logs: one `{"event": ..., "payload": ...}` object per line.

use anyhow::{anyhow, Result};
use hopline_model::EventEnvelope;
use parking_lot::Mutex;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::warn;

pub struct EventRecorder {
    out: Mutex<BufWriter<File>>,
}

impl EventRecorder {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|err| anyhow!("failed to create directory {:?}: {}", parent, err))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| anyhow!("failed to open event log {:?}: {}", path, err))?;
        Ok(Self {
            out: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn record(&self, event: &str, payload: &Value) {
        let envelope = EventEnvelope {
            event: event.to_string(),
            payload: payload.clone(),
        };
        if let Err(err) = self.write_line(&envelope) {
            warn!(event, %err, "failed to record event");
        }
    }

    fn write_line(&self, envelope: &EventEnvelope) -> Result<()> {
        let line = serde_json::to_string(envelope)?;
        let mut out = self.out.lock();
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

pub fn read_events(path: &Path) -> Result<Vec<EventEnvelope>> {
    let contents = fs::read_to_string(path)
        .map_err(|err| anyhow!("failed to read event log {:?}: {}", path, err))?;
    parse_events(&contents)
}

pub fn parse_events(contents: &str) -> Result<Vec<EventEnvelope>> {
    let mut events = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let envelope: EventEnvelope = serde_json::from_str(line)
            .map_err(|err| anyhow!("invalid event on line {}: {}", index + 1, err))?;
        events.push(envelope);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_skips_blank_lines() {
        let text = "{\"event\":\"hop_list_updated\",\"payload\":[]}\n\n{\"event\":\"new_ping_data\",\"payload\":{\"ip\":\"a\"}}\n";
        let events = parse_events(text).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].payload, json!({ "ip": "a" }));
    }

    #[test]
    fn parse_reports_line_number() {
        let err = parse_events("{\"event\":\"a\"}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
