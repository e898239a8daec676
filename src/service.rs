//! Query facade for the tool layer
//!
//! Owns the device resolver and the capture session, and turns every query
//! into a UTF-8 text payload. Capture and device failures become text too, so
//! a caller can always hand the result straight back to the user.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::app::Config;
use crate::capture::{
    capture_bounded, correlate, filter_by_pid, AdbLogcat, CaptureFilter, CaptureSession,
    CaptureStatus, LogSource, StartOutcome, StopOutcome,
};
use crate::device::DeviceResolver;
use crate::error::{LogscopeError, Result};
use crate::extract::views::{self, EventView, NO_ENTRY};
use crate::extract::{analyze_deep_links, ParsedLogRecord};

/// Payload for the external attribution verification call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationRequest {
    pub app_id: String,
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advertiser_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_date: Option<String>,
}

impl VerificationRequest {
    /// Build from the latest conversion record; `app_id` and `uid` are required
    pub fn from_records(app_id: Option<&str>, records: &[ParsedLogRecord]) -> Result<Self> {
        let app_id = app_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(LogscopeError::MissingField("app_id"))?;
        let latest = records.last().ok_or(LogscopeError::MissingField("uid"))?;
        let field = |key: &str| match latest.json.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Ok(Self {
            app_id: app_id.to_string(),
            uid: field("uid").ok_or(LogscopeError::MissingField("uid"))?,
            advertiser_id: field("advertiserId"),
            install_date: field("installDate"),
        })
    }
}

pub struct LogService {
    config: Config,
    devices: DeviceResolver,
    session: CaptureSession,
}

impl LogService {
    pub fn new(config: Config) -> Self {
        let source = Arc::new(AdbLogcat::new(config.adb.program.clone()));
        Self::with_source(config, source)
    }

    pub fn with_source(config: Config, source: Arc<dyn LogSource>) -> Self {
        let session = CaptureSession::new(source, config.capture.buffer_capacity);
        Self {
            devices: DeviceResolver::new(config.adb.clone()),
            session,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    /// Resolve the device, make sure the continuous capture runs, and wait
    /// (bounded) for the first lines to arrive.
    ///
    /// Without an explicit filter the session only captures the SDK tag.
    pub async fn ensure_capture(
        &self,
        device: Option<&str>,
        filter: Option<CaptureFilter>,
    ) -> Result<CaptureStatus> {
        let device = self.devices.resolve_target(device).await?;
        let filter = filter.unwrap_or_else(|| self.sdk_filter());
        if self.session.start(&device, filter).await? == StartOutcome::AlreadyRunning {
            debug!("Reusing running capture on {}", device);
        }

        let wait = Duration::from_millis(self.config.capture.wait_for_data_ms);
        if !self.session.wait_for_lines(wait).await {
            info!("No log lines from {} within {:?}", device, wait);
        }
        Ok(self.session.status().await)
    }

    pub async fn stop(&self) -> StopOutcome {
        self.session.stop().await
    }

    pub async fn list_devices(&self) -> String {
        match self.devices.list_devices().await {
            Ok(devices) if devices.is_empty() => LogscopeError::NoDevice.to_string(),
            Ok(devices) => devices.join("\n"),
            Err(e) => e.to_string(),
        }
    }

    pub async fn conversion(&self) -> String {
        self.view(EventView::Conversion).await
    }

    pub async fn in_app_events(&self) -> String {
        self.view(EventView::InApp).await
    }

    pub async fn launch(&self) -> String {
        self.view(EventView::Launch).await
    }

    pub async fn deep_link_records(&self) -> String {
        self.view(EventView::DeepLink).await
    }

    pub async fn deep_link_analysis(&self) -> String {
        let snapshot = self.session.snapshot().await;
        let result = analyze_deep_links(&snapshot);
        serde_json::to_string_pretty(&result).unwrap_or_else(|e| e.to_string())
    }

    pub async fn sdk_errors(&self) -> String {
        let snapshot = self.session.snapshot().await;
        views::error_excerpt(
            &snapshot,
            &self.config.views.error_tokens,
            self.config.views.match_cap,
        )
    }

    pub async fn search(&self, keyword: &str) -> String {
        let snapshot = self.session.snapshot().await;
        views::keyword_excerpt(&snapshot, keyword, self.config.views.match_cap)
    }

    /// Newest `count` raw lines from the window
    pub async fn recent(&self, count: usize) -> String {
        let lines = self.session.tail(count).await;
        if lines.is_empty() {
            return NO_ENTRY.to_string();
        }
        lines.join("\n")
    }

    /// One bounded capture narrowed to the process that logged `tag` last.
    ///
    /// Without a correlated pid the whole capture is returned, which can
    /// include lines from unrelated processes.
    pub async fn app_logs(&self, device: Option<&str>, tag: &str, count: usize) -> String {
        let lines = match self.bounded_lines(device).await {
            Ok(lines) => lines,
            Err(e) => return e.to_string(),
        };

        let relevant = match correlate(&lines, tag) {
            Some(pid) => {
                debug!("Correlated tag {} to pid {}", tag, pid);
                filter_by_pid(&lines, pid)
            }
            None => {
                debug!("No pid found for tag {}, using unfiltered capture", tag);
                lines
            }
        };

        let skip = relevant.len().saturating_sub(count);
        if relevant.len() == skip {
            return NO_ENTRY.to_string();
        }
        relevant[skip..].join("\n")
    }

    /// Parameters for attribution verification, or which field is missing
    pub async fn install_identifiers(&self, app_id: Option<&str>) -> String {
        let snapshot = self.session.snapshot().await;
        let records =
            views::view_records(&snapshot, EventView::Conversion, self.config.views.match_cap);
        match VerificationRequest::from_records(app_id, &records) {
            Ok(request) => serde_json::to_string_pretty(&request).unwrap_or_else(|e| e.to_string()),
            Err(e) => e.to_string(),
        }
    }

    /// One bounded capture with the given filter, independent of the session
    pub async fn capture_once(
        &self,
        device: Option<&str>,
        filter: &CaptureFilter,
    ) -> Result<Vec<String>> {
        let device = self.devices.resolve_target(device).await?;
        capture_bounded(&self.config, &device, filter).await
    }

    fn sdk_filter(&self) -> CaptureFilter {
        CaptureFilter::Tag(self.config.capture.sdk_tag.clone())
    }

    async fn bounded_lines(&self, device: Option<&str>) -> Result<Vec<String>> {
        self.capture_once(device, &CaptureFilter::None).await
    }

    async fn view(&self, view: EventView) -> String {
        let snapshot = self.session.snapshot().await;
        views::render_view(&snapshot, view, self.config.views.match_cap)
    }
}
