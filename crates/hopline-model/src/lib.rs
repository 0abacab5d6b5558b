//! Shared data structures for hopline.

pub mod latency;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const EVENT_HOP_LIST: &str = "hop_list_updated";
pub const EVENT_PING: &str = "new_ping_data";

pub const COMMAND_START_TRACE: &str = "start_trace";
pub const COMMAND_STOP_TRACE: &str = "stop_trace";

pub const LATENCY_SERIES_NAME: &str = "Latency per hop";

/// One discovered hop as reported by the trace engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HopInfo {
    pub hop: u32,
    pub ip: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default, deserialize_with = "latency::deserialize_sample")]
    pub initial_latency: Option<f64>,
}

/// One probe result for a known hop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PingData {
    pub ip: String,
    #[serde(default, deserialize_with = "latency::deserialize_sample")]
    pub latency: Option<f64>,
    #[serde(default)]
    pub status: PingStatus,
    #[serde(default)]
    pub seq: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum PingStatus {
    #[default]
    Ok,
    Timeout,
    Error,
    InvalidIp,
    Other(String),
}

impl From<String> for PingStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ok" => PingStatus::Ok,
            "timeout" => PingStatus::Timeout,
            "error" => PingStatus::Error,
            "invalid_ip" => PingStatus::InvalidIp,
            _ => PingStatus::Other(value),
        }
    }
}

impl From<PingStatus> for String {
    fn from(value: PingStatus) -> Self {
        match value {
            PingStatus::Ok => "ok".to_string(),
            PingStatus::Timeout => "timeout".to_string(),
            PingStatus::Error => "error".to_string(),
            PingStatus::InvalidIp => "invalid_ip".to_string(),
            PingStatus::Other(other) => other,
        }
    }
}

/// Table entry for one hop, keyed by `ip`.
///
/// `latencies` is in arrival order; `None` marks a probe that got no reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HopRecord {
    pub ip: String,
    #[serde(default)]
    pub hop: Option<u32>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default, deserialize_with = "latency::deserialize_samples")]
    pub latencies: Vec<Option<f64>>,
}

impl HopRecord {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            hop: None,
            hostname: None,
            latencies: Vec::new(),
        }
    }

    pub fn with_hop(mut self, hop: u32) -> Self {
        self.hop = Some(hop);
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_latencies(mut self, latencies: Vec<Option<f64>>) -> Self {
        self.latencies = latencies;
        self
    }

    pub fn hostname_label(&self) -> Option<&str> {
        self.hostname.as_deref().filter(|name| !name.is_empty())
    }

    pub fn ip_label(&self) -> Option<&str> {
        Some(self.ip.as_str()).filter(|ip| !ip.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    pub data: Vec<ChartPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartPoint {
    pub position: u32,
    pub label: String,
    pub value: Option<f64>,
}

/// Inbound message on the event socket, and one line of a recorded event log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

/// Trace events the aggregator understands.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    HopList(Vec<HopInfo>),
    Ping(PingData),
}

impl TraceEvent {
    /// Decode a named event. Names other than the trace events yield `Ok(None)`.
    pub fn from_parts(event: &str, payload: &Value) -> Result<Option<Self>, serde_json::Error> {
        match event {
            EVENT_HOP_LIST => Vec::<HopInfo>::deserialize(payload).map(|hops| Some(Self::HopList(hops))),
            EVENT_PING => PingData::deserialize(payload).map(|ping| Some(Self::Ping(ping))),
            _ => Ok(None),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TraceEvent::HopList(_) => EVENT_HOP_LIST,
            TraceEvent::Ping(_) => EVENT_PING,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hop_list_payload_decodes_with_optional_fields() {
        let payload = json!([
            { "hop": 1, "ip": "192.168.1.1", "hostname": "router.lan", "initial_latency": 2 },
            { "hop": 2, "ip": "10.0.0.1" }
        ]);

        let event = TraceEvent::from_parts(EVENT_HOP_LIST, &payload).unwrap();
        let Some(TraceEvent::HopList(hops)) = event else {
            panic!("expected hop list, got {event:?}");
        };

        assert_eq!(hops.len(), 2);
        assert_eq!(hops[0].hostname.as_deref(), Some("router.lan"));
        assert_eq!(hops[0].initial_latency, Some(2.0));
        assert_eq!(hops[1].hostname, None);
        assert_eq!(hops[1].initial_latency, None);
    }

    #[test]
    fn ping_payload_keeps_timeout_as_none() {
        let payload = json!({ "ip": "10.0.0.1", "latency": null, "status": "timeout", "seq": 4 });
        let event = TraceEvent::from_parts(EVENT_PING, &payload).unwrap();

        assert_eq!(
            event,
            Some(TraceEvent::Ping(PingData {
                ip: "10.0.0.1".to_string(),
                latency: None,
                status: PingStatus::Timeout,
                seq: Some(4),
            }))
        );
    }

    #[test]
    fn unknown_ping_status_is_preserved() {
        let ping: PingData =
            serde_json::from_value(json!({ "ip": "10.0.0.1", "latency": 3, "status": "weird" })).unwrap();
        assert_eq!(ping.status, PingStatus::Other("weird".to_string()));
        assert_eq!(ping.latency, Some(3.0));
        assert_eq!(serde_json::to_value(&ping).unwrap()["status"], "weird");
    }

    #[test]
    fn unknown_event_name_is_not_an_error() {
        let event = TraceEvent::from_parts("theme_changed", &json!({ "dark": true })).unwrap();
        assert!(event.is_none());
    }

    #[test]
    fn malformed_known_payload_is_an_error() {
        assert!(TraceEvent::from_parts(EVENT_PING, &json!("nope")).is_err());
        assert!(TraceEvent::from_parts(EVENT_HOP_LIST, &json!({ "hop": 1 })).is_err());
    }

    #[test]
    fn hop_record_labels_ignore_empty_strings() {
        let record = HopRecord::new("").with_hostname("");
        assert_eq!(record.hostname_label(), None);
        assert_eq!(record.ip_label(), None);

        let record = HopRecord::new("10.0.0.1").with_hostname("core1");
        assert_eq!(record.hostname_label(), Some("core1"));
        assert_eq!(record.ip_label(), Some("10.0.0.1"));
    }
}
