//! Embedded JSON extraction from log lines
//!
//! SDK log lines look like `... CONVERSION-{"uid":"..."}`. Anything that is
//! not a well-formed object simply yields `None`.

use serde_json::{Map, Value};

use super::schema::ParsedLogRecord;

/// Parse the span from the first `{` to the last `}` as a JSON object
pub fn extract_json(line: &str) -> Option<Map<String, Value>> {
    let start = line.find('{')?;
    let end = line.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<Value>(&line[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Records from the newest `line_count` lines, oldest first
pub fn parsed_records<S: AsRef<str>>(
    lines: &[S],
    line_count: usize,
    record_type: &str,
) -> Vec<ParsedLogRecord> {
    let skip = lines.len().saturating_sub(line_count);
    lines[skip..]
        .iter()
        .map(AsRef::as_ref)
        .filter_map(|line| {
            extract_json(line).map(|json| ParsedLogRecord::new(line, record_type, json))
        })
        .collect()
}
