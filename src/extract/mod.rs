//! Structured data derived from captured SDK log lines
//!
//! Everything here is pure and works on a snapshot slice. Malformed lines are
//! skipped, never reported as errors.

pub mod deeplink;
pub mod json;
pub mod schema;
pub mod views;

pub use deeplink::{analyze as analyze_deep_links, DdlShape, DeepLinkShape, UdlShape};
pub use json::{extract_json, parsed_records};
pub use schema::{DeepLinkResult, DeepLinkSource, ParsedLogRecord};
pub use views::{render_view, EventView, NO_ENTRY};
