use crate::table::HopTable;
use crate::views::{chart_series, sorted_hop_list};
use hopline_model::{ChartSeries, HopInfo, HopRecord, PingData, TraceEvent};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

/// Display-ready projections of the table at one revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TraceViews {
    pub revision: u64,
    pub hops: Vec<HopRecord>,
    pub series: Vec<ChartSeries>,
}

impl TraceViews {
    pub fn compute(table: &HopTable, revision: u64) -> Self {
        Self {
            revision,
            hops: sorted_hop_list(table),
            series: chart_series(table),
        }
    }
}

/// Owns the hop table for one trace session.
///
/// Every mutation recomputes [`TraceViews`] and publishes them on a watch
/// channel, so observers always see views matching the latest table.
#[derive(Debug)]
pub struct TraceAggregator {
    table: HopTable,
    revision: u64,
    views: watch::Sender<TraceViews>,
}

impl Default for TraceAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceAggregator {
    pub fn new() -> Self {
        let table = HopTable::new();
        let (views, _) = watch::channel(TraceViews::compute(&table, 0));
        Self {
            table,
            revision: 0,
            views,
        }
    }

    pub fn table(&self) -> &HopTable {
        &self.table
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn views(&self) -> TraceViews {
        self.views.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TraceViews> {
        self.views.subscribe()
    }

    /// Start a new session with an empty table.
    pub fn reset(&mut self) {
        self.table.clear();
        self.commit();
    }

    pub fn upsert(&mut self, record: HopRecord) {
        self.table.upsert(record);
        self.commit();
    }

    pub fn push_sample(&mut self, ip: &str, sample: Option<f64>) {
        self.table.entry_for(ip).latencies.push(sample);
        self.commit();
    }

    /// Merge a cumulative hop list. Known hops keep their samples.
    pub fn apply_hop_list(&mut self, hops: &[HopInfo]) {
        if hops.is_empty() {
            debug!("empty hop list; table unchanged");
            return;
        }

        for info in hops {
            let is_new = self.table.get(&info.ip).is_none();
            let record = self.table.entry_for(&info.ip);
            record.hop = Some(info.hop);
            if let Some(hostname) = &info.hostname {
                record.hostname = Some(hostname.clone());
            }
            if is_new {
                if let Some(initial) = info.initial_latency {
                    record.latencies.push(Some(initial));
                }
            }
        }
        self.commit();
    }

    pub fn apply_ping(&mut self, ping: &PingData) {
        self.push_sample(&ping.ip, ping.latency);
    }

    pub fn apply(&mut self, event: &TraceEvent) {
        match event {
            TraceEvent::HopList(hops) => self.apply_hop_list(hops),
            TraceEvent::Ping(ping) => self.apply_ping(ping),
        }
    }

    /// Decode and apply a named event. Returns whether the table was touched;
    /// unrelated event names are ignored.
    pub fn ingest(&mut self, event: &str, payload: &Value) -> Result<bool, serde_json::Error> {
        match TraceEvent::from_parts(event, payload)? {
            Some(event) => {
                self.apply(&event);
                Ok(true)
            }
            None => {
                debug!(event, "ignoring unrelated event");
                Ok(false)
            }
        }
    }

    fn commit(&mut self) {
        self.revision += 1;
        let views = TraceViews::compute(&self.table, self.revision);
        debug!(revision = self.revision, hops = views.hops.len(), "views recomputed");
        self.views.send_replace(views);
    }
}
