use hopline_model::{ChartPoint, HopRecord};
use hopline_state::TraceViews;

const BAR_WIDTH: usize = 24;

#[derive(Debug, Clone, Copy)]
pub struct DrawOpts {
    pub plain: bool,
}

pub fn render_views(target: &str, views: &TraceViews, updated_at: &str, term_w: u16) -> String {
    let mut lines = Vec::new();
    let width = term_w as usize;
    lines.push(center_line(&format!("HOPLINE  {target}"), width));
    lines.push(center_line(
        &format!("revision {}  updated {updated_at}", views.revision),
        width,
    ));
    lines.push("".to_string());

    let Some(series) = views.series.first() else {
        lines.push("No series".to_string());
        return lines.join("\n");
    };

    if series.data.is_empty() {
        lines.push("Waiting for hops...".to_string());
        return lines.join("\n");
    }

    lines.push(series.name.clone());
    lines.push(format!(
        "{:>3}  {:<32} {:>9} {:>5} {:>5}",
        "HOP", "HOST", "LAST", "SEEN", "LOSS"
    ));

    let max_value = series
        .data
        .iter()
        .filter_map(|point| point.value)
        .fold(0.0_f64, f64::max);

    for (point, record) in series.data.iter().zip(views.hops.iter()) {
        lines.push(render_row(point, record, max_value));
    }

    lines.join("\n")
}

fn render_row(point: &ChartPoint, record: &HopRecord, max_value: f64) -> String {
    let last = match point.value {
        Some(value) => format!("{value:.1} ms"),
        None => "*".to_string(),
    };
    format!(
        "{:>3}  {:<32} {:>9} {:>5} {:>4}%  {}",
        point.position,
        truncate(&point.label, 32),
        last,
        record.latencies.len(),
        loss_percent(&record.latencies),
        bar(point.value, max_value)
    )
}

fn loss_percent(samples: &[Option<f64>]) -> u32 {
    if samples.is_empty() {
        return 0;
    }
    let lost = samples.iter().filter(|sample| sample.is_none()).count();
    ((lost as f64 / samples.len() as f64) * 100.0).round() as u32
}

fn bar(value: Option<f64>, max_value: f64) -> String {
    match value {
        Some(value) if max_value > 0.0 => {
            let filled = ((value / max_value) * BAR_WIDTH as f64).round() as usize;
            "#".repeat(filled.clamp(1, BAR_WIDTH))
        }
        Some(_) => "#".to_string(),
        None => "".to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('~');
    out
}

fn center_line(text: &str, width: usize) -> String {
    if text.len() >= width {
        return text.to_string();
    }
    let pad = (width - text.len()) / 2;
    format!("{}{}", " ".repeat(pad), text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopline_model::HopRecord;
    use hopline_state::HopTable;

    fn views(records: Vec<HopRecord>) -> TraceViews {
        let table: HopTable = records.into_iter().collect();
        TraceViews::compute(&table, 7)
    }

    #[test]
    fn render_contains_header_and_rows() {
        let views = views(vec![
            HopRecord::new("192.168.1.1")
                .with_hop(1)
                .with_hostname("router.lan")
                .with_latencies(vec![Some(1.2), None]),
            HopRecord::new("10.0.0.1").with_hop(2).with_latencies(vec![Some(8.0)]),
        ]);

        let output = render_views("1.1.1.1", &views, "12:00:00", 80);

        assert!(output.contains("HOPLINE  1.1.1.1"));
        assert!(output.contains("revision 7"));
        assert!(output.contains("Latency per hop"));
        assert!(output.contains("router.lan"));
        assert!(output.contains("1.2 ms"));
        assert!(output.contains("50%"));
        assert!(output.contains(&"#".repeat(BAR_WIDTH)));
    }

    #[test]
    fn empty_views_wait_for_hops() {
        let output = render_views("example.net", &views(vec![]), "12:00:00", 60);
        assert!(output.contains("Waiting for hops..."));
        assert!(!output.contains("\x1b"));
    }

    #[test]
    fn timeouts_render_without_bar() {
        let views = views(vec![HopRecord::new("").with_hop(4).with_latencies(vec![None])]);
        let output = render_views("t", &views, "now", 80);
        assert!(output.contains("Hop 4"));
        assert!(output.contains("100%"));
    }

    #[test]
    fn long_labels_are_truncated() {
        assert_eq!(truncate("abcdef", 4), "abc~");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
