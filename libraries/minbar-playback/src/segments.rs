//! Segment input
//!
//! Host pages hand over captions and transcripts either as a ready list or as
//! a JSON string embedded in the markup. Bad input never fails: it yields no
//! segments, and the captions simply stay empty.

use minbar_core::Segment;
use serde_json::Value;
use tracing::{debug, warn};

/// Where segments come from
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentSource {
    /// Already-typed segments
    List(Vec<Segment>),
    /// JSON array of `{start, end, text}` objects
    Serialized(String),
}

impl From<Vec<Segment>> for SegmentSource {
    fn from(segments: Vec<Segment>) -> Self {
        Self::List(segments)
    }
}

impl From<&str> for SegmentSource {
    fn from(raw: &str) -> Self {
        Self::Serialized(raw.to_string())
    }
}

/// Turn a segment source into a list, dropping anything unusable
///
/// Entries with missing or non-numeric times are skipped; times given as
/// numeric strings are accepted. Order is preserved.
pub fn parse_segments(source: SegmentSource) -> Vec<Segment> {
    match source {
        SegmentSource::List(segments) => segments
            .into_iter()
            .filter(|s| s.start.is_finite() && s.end.is_finite())
            .collect(),
        SegmentSource::Serialized(raw) => parse_serialized(&raw),
    }
}

fn parse_serialized(raw: &str) -> Vec<Segment> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    let entries = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(entries)) => entries,
        Ok(other) => {
            warn!(kind = json_kind(&other), "Segment data is not a list, showing no captions");
            return Vec::new();
        }
        Err(e) => {
            warn!(error = %e, "Unreadable segment data, showing no captions");
            return Vec::new();
        }
    };

    let total = entries.len();
    let segments: Vec<Segment> = entries.iter().filter_map(parse_entry).collect();
    if segments.len() < total {
        debug!(skipped = total - segments.len(), "Skipped malformed segments");
    }
    segments
}

fn parse_entry(entry: &Value) -> Option<Segment> {
    let start = seconds(entry.get("start")?)?;
    let end = seconds(entry.get("end")?)?;
    let text = match entry.get("text") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    Some(Segment::new(start, end, text))
}

fn seconds(value: &Value) -> Option<f64> {
    let seconds = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    seconds.is_finite().then_some(seconds)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
