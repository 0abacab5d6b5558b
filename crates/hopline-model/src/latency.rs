//! Latency samples arrive as a bare number, `null`, a `{ "val": n }` wrapper,
//! or occasionally a numeric string. Everything is folded into `Option<f64>`
//! at ingestion so readers never unwrap wire shapes themselves.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Normalize one raw sample. `None` means the probe produced no value.
pub fn normalize_sample(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        Value::Object(fields) => fields
            .get("val")
            .filter(|inner| !inner.is_object())
            .and_then(normalize_sample),
        _ => None,
    }
}

pub fn normalize_samples(raw: &Value) -> Vec<Option<f64>> {
    match raw {
        Value::Array(items) => items.iter().map(normalize_sample).collect(),
        _ => Vec::new(),
    }
}

pub fn deserialize_sample<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(normalize_sample(&raw))
}

pub fn deserialize_samples<'de, D>(deserializer: D) -> Result<Vec<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(normalize_samples(&raw))
}
