use crate::table::HopTable;
use hopline_model::{ChartPoint, ChartSeries, HopRecord, LATENCY_SERIES_NAME};

/// All records ordered by hop distance; unclassified records sort as hop 0.
pub fn sorted_hop_list(table: &HopTable) -> Vec<HopRecord> {
    sorted_records(table).into_iter().cloned().collect()
}

/// Most recent sample that carries a value, scanning from the end.
pub fn latest_latency(samples: &[Option<f64>]) -> Option<f64> {
    samples.iter().rev().find_map(|sample| *sample)
}

/// The single "Latency per hop" series, one point per record.
pub fn chart_series(table: &HopTable) -> Vec<ChartSeries> {
    let data = sorted_records(table)
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let position = record.hop.unwrap_or(index as u32 + 1);
            ChartPoint {
                position,
                label: point_label(record, position),
                value: latest_latency(&record.latencies),
            }
        })
        .collect();

    vec![ChartSeries {
        name: LATENCY_SERIES_NAME.to_string(),
        data,
    }]
}

/// Hostname, then ip, then `Hop {position}`.
pub fn point_label(record: &HopRecord, position: u32) -> String {
    record
        .hostname_label()
        .or_else(|| record.ip_label())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Hop {position}"))
}

fn sorted_records(table: &HopTable) -> Vec<&HopRecord> {
    let mut records: Vec<&HopRecord> = table.iter().collect();
    records.sort_by_key(|record| record.hop.unwrap_or(0));
    records
}
