//! Hop latency table and the views derived from it.

pub mod aggregator;
pub mod table;
pub mod views;

pub use aggregator::{TraceAggregator, TraceViews};
pub use table::HopTable;
pub use views::{chart_series, latest_latency, point_label, sorted_hop_list};
