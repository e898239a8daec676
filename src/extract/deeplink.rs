//! Deep link resolution across two SDK log shapes
//!
//! The unified deep link callback logs one line with a JSON payload whose
//! `deepLink` field is itself a JSON document. Deferred deep links show up as
//! flat `label: value` conversion attributes. Both are folded into one
//! `DeepLinkResult`; once a UDL line is seen it owns the source and fields.

use serde_json::{Map, Value};

use super::json::extract_json;
use super::schema::{DeepLinkResult, DeepLinkSource};

pub const PARSE_ERROR: &str = "Failed to parse deep link payload";

const UDL_SIGNAL: &str = "onDeepLinking";
const DDL_SIGNALS: [&str; 2] = ["onconversiondatasuccess", "conversion attribute"];

/// Accumulator threaded through the fold
#[derive(Debug, Default)]
pub struct DeepLinkFold {
    result: DeepLinkResult,
    udl_applied: bool,
}

impl DeepLinkFold {
    pub fn finish(mut self) -> DeepLinkResult {
        if self.result.found && self.result.source.is_none() {
            self.result.source = Some(DeepLinkSource::Ddl);
        }
        self.result
    }
}

/// One recognizable deep link line shape
pub trait DeepLinkShape {
    /// Whether `line` belongs to this shape
    fn matches(&self, line: &str) -> bool;

    /// Merge a matching line into the fold
    fn apply(&self, line: &str, fold: &mut DeepLinkFold);
}

/// Unified deep link: `... onDeepLinking ... {"status":"FOUND","deepLink":"{...}"}`
pub struct UdlShape;

impl DeepLinkShape for UdlShape {
    fn matches(&self, line: &str) -> bool {
        line.contains(UDL_SIGNAL)
    }

    fn apply(&self, line: &str, fold: &mut DeepLinkFold) {
        fold.result.found = true;
        fold.result.source = Some(DeepLinkSource::Udl);
        if fold.udl_applied {
            return;
        }

        let Some(outer) = extract_json(line) else {
            fold.result.error = Some(PARSE_ERROR.to_string());
            return;
        };
        let Some(inner) = nested_deep_link(&outer) else {
            fold.result.error = Some(PARSE_ERROR.to_string());
            return;
        };

        let result = &mut fold.result;
        result.status = string_field(&outer, "status").or(result.status.take());
        result.is_deferred = inner
            .get("is_deferred")
            .and_then(Value::as_bool)
            .or(result.is_deferred);
        result.deep_link_value =
            string_field(&inner, "deep_link_value").or(result.deep_link_value.take());
        result.referrer_id = string_field(&inner, "deep_link_sub1").or(result.referrer_id.take());
        fold.udl_applied = true;
    }
}

/// Deferred deep link: `conversion attribute` lines with `label: value` text
pub struct DdlShape;

impl DeepLinkShape for DdlShape {
    fn matches(&self, line: &str) -> bool {
        let lower = line.to_lowercase();
        DDL_SIGNALS.iter().any(|signal| lower.contains(signal))
    }

    fn apply(&self, line: &str, fold: &mut DeepLinkFold) {
        let result = &mut fold.result;
        result.found = true;
        if result.source.is_none() {
            result.source = Some(DeepLinkSource::Ddl);
        }
        if fold.udl_applied {
            return;
        }

        if result.deep_link_value.is_none() {
            result.deep_link_value = labelled_value(line, "deep_link_value");
        }
        if result.deep_link_value.is_none() {
            result.deep_link_value = labelled_value(line, "fruit_name");
        }
        if result.referrer_id.is_none() {
            result.referrer_id = labelled_value(line, "deep_link_sub1");
        }
    }
}

/// Fold `lines` in order through both shapes
pub fn analyze<S: AsRef<str>>(lines: &[S]) -> DeepLinkResult {
    let shapes: [&dyn DeepLinkShape; 2] = [&UdlShape, &DdlShape];
    let mut fold = DeepLinkFold::default();

    for line in lines.iter().map(AsRef::as_ref) {
        for shape in shapes {
            if shape.matches(line) {
                shape.apply(line, &mut fold);
            }
        }
    }

    fold.finish()
}

/// The `deepLink` field, given either as an embedded JSON string or an object
fn nested_deep_link(outer: &Map<String, Value>) -> Option<Map<String, Value>> {
    match outer.get("deepLink")? {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        Value::Object(map) => Some(map.clone()),
        _ => None,
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Text after the first `:` or `=` following `label`, trimmed
fn labelled_value(line: &str, label: &str) -> Option<String> {
    let rest = &line[line.find(label)? + label.len()..];
    let sep = rest.find([':', '='])?;
    let value = rest[sep + 1..].trim();
    (!value.is_empty()).then(|| value.to_string())
}
