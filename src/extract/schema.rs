//! Query result types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Number of leading characters of a `logcat -v time` line holding its timestamp
pub const TIMESTAMP_WIDTH: usize = 18;

/// One log line carrying an embedded JSON object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedLogRecord {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub json: Map<String, Value>,
}

impl ParsedLogRecord {
    pub fn new(line: &str, record_type: &str, json: Map<String, Value>) -> Self {
        Self {
            timestamp: line.chars().take(TIMESTAMP_WIDTH).collect(),
            record_type: record_type.to_string(),
            json,
        }
    }
}

/// Which log shape established a deep link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeepLinkSource {
    /// Unified deep link callback with a nested JSON payload
    #[serde(rename = "UDL")]
    Udl,
    /// Deferred deep link read from conversion attributes
    #[serde(rename = "DDL")]
    Ddl,
}

impl DeepLinkSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeepLinkSource::Udl => "UDL",
            DeepLinkSource::Ddl => "DDL",
        }
    }
}

/// Merged deep link findings over a run of log lines
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepLinkResult {
    pub found: bool,
    #[serde(serialize_with = "serialize_source")]
    pub source: Option<DeepLinkSource>,
    pub is_deferred: Option<bool>,
    pub status: Option<String>,
    pub deep_link_value: Option<String>,
    pub referrer_id: Option<String>,
    pub error: Option<String>,
}

fn serialize_source<S: serde::Serializer>(
    source: &Option<DeepLinkSource>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(source.map(|s| s.as_str()).unwrap_or("none"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timestamp_is_first_18_chars() {
        let record = ParsedLogRecord::new(
            "01-15 10:21:33.456 D/AppsFlyer( 12): CONVERSION-{}",
            "conversion",
            Map::new(),
        );
        assert_eq!(record.timestamp, "01-15 10:21:33.456");
    }

    #[test]
    fn test_timestamp_on_short_line() {
        let record = ParsedLogRecord::new("{\"a\":1}", "x", Map::new());
        assert_eq!(record.timestamp, "{\"a\":1}");
    }

    #[test]
    fn test_record_serializes_type_field() {
        let mut map = Map::new();
        map.insert("uid".into(), json!("123"));
        let record = ParsedLogRecord::new("01-15 10:21:33.456 x", "launch", map);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "launch");
        assert_eq!(value["json"]["uid"], "123");
    }

    #[test]
    fn test_deep_link_result_serialization() {
        let result = DeepLinkResult {
            found: true,
            source: Some(DeepLinkSource::Udl),
            deep_link_value: Some("apples".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["source"], "UDL");
        assert_eq!(value["deepLinkValue"], "apples");
        assert!(value["referrerId"].is_null());

        let empty = serde_json::to_value(DeepLinkResult::default()).unwrap();
        assert_eq!(empty["source"], "none");
        assert_eq!(empty["found"], false);
    }
}
