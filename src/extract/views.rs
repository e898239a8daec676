//! Keyword projections over captured lines
//!
//! The SDK prefixes its structured events with fixed markers
//! (`CONVERSION-{...}`, `INAPP-{...}`, `LAUNCH-{...}`). Each view filters on
//! its marker, keeps the newest matches and extracts the JSON payloads.

use serde_json::{Map, Value};

use super::json::parsed_records;
use super::schema::ParsedLogRecord;

/// Returned when a view matches nothing
pub const NO_ENTRY: &str = "No logs entry found.";

/// Fields kept when a view is reduced to its latest record
pub const SUMMARY_FIELDS: [&str; 7] = [
    "af_timestamp",
    "uid",
    "installDate",
    "firstLaunchDate",
    "advertiserId",
    "advertiserIdEnabled",
    "onelink_id",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventView {
    Conversion,
    InApp,
    Launch,
    DeepLink,
}

impl EventView {
    pub fn token(&self) -> &'static str {
        match self {
            EventView::Conversion => "CONVERSION-",
            EventView::InApp => "INAPP-",
            EventView::Launch => "LAUNCH-",
            EventView::DeepLink => "{\"deepLink\":",
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            EventView::Conversion => "conversion",
            EventView::InApp => "inapp",
            EventView::Launch => "launch",
            EventView::DeepLink => "deeplink",
        }
    }

    /// Views describing one canonical event collapse to their latest record
    pub fn is_single_event(&self) -> bool {
        !matches!(self, EventView::InApp)
    }
}

/// Newest `cap` lines containing `token`, oldest first
pub fn matching_lines<'a, S: AsRef<str>>(lines: &'a [S], token: &str, cap: usize) -> Vec<&'a str> {
    let mut matches: Vec<&str> = lines
        .iter()
        .rev()
        .map(AsRef::as_ref)
        .filter(|line| line.contains(token))
        .take(cap)
        .collect();
    matches.reverse();
    matches
}

/// All records of a view within the match cap
pub fn view_records<S: AsRef<str>>(lines: &[S], view: EventView, cap: usize) -> Vec<ParsedLogRecord> {
    let matches = matching_lines(lines, view.token(), cap);
    parsed_records(&matches, matches.len(), view.tag())
}

/// Project the latest record onto `SUMMARY_FIELDS`, skipping absent ones
pub fn latest_summary(records: &[ParsedLogRecord]) -> Option<Map<String, Value>> {
    let latest = records.last()?;
    Some(
        SUMMARY_FIELDS
            .iter()
            .filter_map(|field| {
                latest
                    .json
                    .get(*field)
                    .map(|value| (field.to_string(), value.clone()))
            })
            .collect(),
    )
}

/// Text payload for a view: pretty JSON, or `NO_ENTRY`
pub fn render_view<S: AsRef<str>>(lines: &[S], view: EventView, cap: usize) -> String {
    let records = view_records(lines, view, cap);
    if records.is_empty() {
        return NO_ENTRY.to_string();
    }

    let rendered = if view.is_single_event() {
        latest_summary(&records).map(|summary| serde_json::to_string_pretty(&summary))
    } else {
        Some(serde_json::to_string_pretty(&records))
    };

    match rendered {
        Some(Ok(text)) => text,
        _ => NO_ENTRY.to_string(),
    }
}

/// Raw excerpt of lines containing `keyword`
pub fn keyword_excerpt<S: AsRef<str>>(lines: &[S], keyword: &str, cap: usize) -> String {
    let matches = matching_lines(lines, keyword, cap);
    if matches.is_empty() {
        return no_keyword_entries(keyword);
    }
    matches.join("\n")
}

/// Raw excerpt of lines containing any of `tokens`
pub fn error_excerpt<S: AsRef<str>, T: AsRef<str>>(lines: &[S], tokens: &[T], cap: usize) -> String {
    let mut matches: Vec<&str> = lines
        .iter()
        .rev()
        .map(AsRef::as_ref)
        .filter(|line| tokens.iter().any(|token| line.contains(token.as_ref())))
        .take(cap)
        .collect();
    matches.reverse();

    if matches.is_empty() {
        let joined: Vec<&str> = tokens.iter().map(AsRef::as_ref).collect();
        return no_keyword_entries(&joined.join(", "));
    }
    matches.join("\n")
}

pub fn no_keyword_entries(keyword: &str) -> String {
    format!("No log entries found for keyword: {}", keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<String> {
        vec![
            r#"01-15 10:00:00.001 D/AppsFlyer( 9): LAUNCH-{"uid":"u-1","af_timestamp":"100","extra":"x"}"#,
            r#"01-15 10:00:00.002 D/AppsFlyer( 9): INAPP-{"eventName":"af_purchase","eventValue":{"af_revenue":"9.99"}}"#,
            r#"01-15 10:00:00.003 D/AppsFlyer( 9): CONVERSION-{"uid":"u-1","installDate":"2024-01-15","advertiserIdEnabled":true}"#,
            r#"01-15 10:00:00.004 E/AppsFlyer( 9): ERROR sending request: timeout"#,
            r#"01-15 10:00:00.005 D/AppsFlyer( 9): INAPP-{"eventName":"af_login"}"#,
            r#"01-15 10:00:00.006 D/AppsFlyer( 9): LAUNCH-{"uid":"u-1","af_timestamp":"200","onelink_id":"abc"}"#,
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    #[test]
    fn test_matching_lines_caps_to_newest() {
        let lines: Vec<String> = (0..1000).map(|i| format!("INAPP-{{\"n\":{}}}", i)).collect();
        let matches = matching_lines(&lines, "INAPP-", 700);
        assert_eq!(matches.len(), 700);
        assert_eq!(matches[0], "INAPP-{\"n\":300}");
        assert_eq!(matches[699], "INAPP-{\"n\":999}");
    }

    #[test]
    fn test_in_app_view_keeps_all_records() {
        let records = view_records(&sample(), EventView::InApp, 700);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].json["eventName"], "af_purchase");
        assert_eq!(records[1].json["eventName"], "af_login");
    }

    #[test]
    fn test_launch_view_reduces_to_latest_allow_listed() {
        let text = render_view(&sample(), EventView::Launch, 700);
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["af_timestamp"], "200");
        assert_eq!(value["onelink_id"], "abc");
        assert!(value.get("extra").is_none());
        assert!(value.get("installDate").is_none());
    }

    #[test]
    fn test_conversion_summary_omits_absent_fields() {
        let records = view_records(&sample(), EventView::Conversion, 700);
        let summary = latest_summary(&records).unwrap();
        let keys: Vec<&str> = summary.keys().map(String::as_str).collect();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&"uid"));
        assert!(keys.contains(&"installDate"));
        assert!(keys.contains(&"advertiserIdEnabled"));
    }

    #[test]
    fn test_deep_link_sentinel() {
        let lines = vec![r#"01-15 10:00:00.001 D/AF( 9): {"deepLink":"{}","uid":"u-9"}"#];
        let text = render_view(&lines, EventView::DeepLink, 700);
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["uid"], "u-9");
    }

    #[test]
    fn test_empty_view_message() {
        let lines = vec!["nothing relevant".to_string()];
        assert_eq!(render_view(&lines, EventView::Conversion, 700), NO_ENTRY);
        assert_eq!(render_view(&lines, EventView::InApp, 700), NO_ENTRY);
    }

    #[test]
    fn test_unparseable_matches_are_no_entry() {
        let lines = vec!["CONVERSION-{oops".to_string()];
        assert_eq!(render_view(&lines, EventView::Conversion, 700), NO_ENTRY);
    }

    #[test]
    fn test_keyword_excerpt() {
        let lines = sample();
        let text = keyword_excerpt(&lines, "af_login", 700);
        assert!(text.contains("INAPP-{\"eventName\":\"af_login\"}"));
        assert_eq!(
            keyword_excerpt(&lines, "missing", 700),
            "No log entries found for keyword: missing"
        );
    }

    #[test]
    fn test_error_excerpt() {
        let lines = sample();
        let text = error_excerpt(&lines, &["ERROR", "Exception"], 700);
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("timeout"));

        let clean = vec!["all good".to_string()];
        assert_eq!(
            error_excerpt(&clean, &["ERROR", "Exception"], 700),
            "No log entries found for keyword: ERROR, Exception"
        );
    }
}
