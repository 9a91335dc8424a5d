//! InfluxDB line protocol encoding.
//!
//! Points carry no timestamp; the server stamps them on arrival. Tags with an
//! empty value and non-finite floats are dropped because the protocol has no
//! way to express them. A point left without any field is dropped entirely.

use crate::model::{FieldValue, MetricPoint};
use tracing::debug;

pub fn encode_batch(points: &[MetricPoint]) -> String {
    points
        .iter()
        .filter_map(encode_point)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn encode_point(point: &MetricPoint) -> Option<String> {
    let fields: Vec<String> = point
        .fields
        .iter()
        .filter_map(|(key, value)| {
            let encoded = encode_field_value(value)?;
            Some(format!("{}={}", escape_key(key), encoded))
        })
        .collect();
    if fields.is_empty() {
        debug!(measurement = %point.measurement, "dropping point without encodable fields");
        return None;
    }

    let mut line = escape_measurement(&point.measurement);
    for (key, value) in &point.tags {
        if value.is_empty() {
            continue;
        }
        line.push(',');
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&escape_key(value));
    }
    line.push(' ');
    line.push_str(&fields.join(","));
    Some(line)
}

fn encode_field_value(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Float(v) if v.is_finite() => Some(format!("{v}")),
        FieldValue::Float(_) => None,
        FieldValue::Boolean(v) => Some(v.to_string()),
        FieldValue::String(v) => Some(format!("\"{}\"", escape_string_field(v))),
    }
}

fn escape_measurement(s: &str) -> String {
    escape_chars(s, &[',', ' '])
}

/// Tag keys, tag values and field keys.
fn escape_key(s: &str) -> String {
    escape_chars(s, &[',', '=', ' '])
}

fn escape_string_field(s: &str) -> String {
    escape_chars(s, &['\\', '"'])
}

fn escape_chars(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
