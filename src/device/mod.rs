//! Connected device discovery via `adb devices`

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::app::AdbConfig;
use crate::error::{LogscopeError, Result};

/// Lists attached devices and picks the capture target
pub struct DeviceResolver {
    config: AdbConfig,
}

impl DeviceResolver {
    pub fn new(config: AdbConfig) -> Self {
        Self { config }
    }

    /// Ids of devices in `device` state, in adb's order
    pub async fn list_devices(&self) -> Result<Vec<String>> {
        let output = timeout(
            Duration::from_secs(self.config.devices_timeout_secs),
            Command::new(&self.config.program)
                .arg("devices")
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| LogscopeError::Capture("adb devices timed out".to_string()))?
        .map_err(|e| LogscopeError::Capture(format!("failed to run adb devices: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("adb devices failed: {}", stderr);
            return Err(LogscopeError::Capture(stderr));
        }

        let devices = parse_device_list(&String::from_utf8_lossy(&output.stdout));
        debug!("Found {} connected device(s)", devices.len());
        Ok(devices)
    }

    /// Explicit id wins unchecked; otherwise exactly one device must be attached
    pub async fn resolve_target(&self, explicit: Option<&str>) -> Result<String> {
        if let Some(id) = explicit {
            return Ok(id.to_string());
        }
        select_single(self.list_devices().await?)
    }
}

/// Parse `adb devices` output: one header line, then `<id>\t<status>` rows
pub fn parse_device_list(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let id = fields.next()?;
            let status = fields.next()?;
            (status == "device").then(|| id.to_string())
        })
        .collect()
}

fn select_single(mut devices: Vec<String>) -> Result<String> {
    match devices.len() {
        0 => Err(LogscopeError::NoDevice),
        1 => Ok(devices.remove(0)),
        _ => Err(LogscopeError::AmbiguousDevice { devices }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_only_ready_devices() {
        let output = "List of devices attached\nemulator-5554\tdevice\nemulator-5556\toffline\n\n";
        assert_eq!(parse_device_list(output), vec!["emulator-5554"]);
    }

    #[test]
    fn test_parse_skips_unauthorized_and_daemon_noise() {
        let output = "List of devices attached\n\
                      R58M12345\tunauthorized\n\
                      192.168.1.20:5555\tdevice\n\
                      emulator-5554\tdevice product:sdk model:sdk device:generic\n";
        assert_eq!(
            parse_device_list(output),
            vec!["192.168.1.20:5555", "emulator-5554"]
        );
    }

    #[test]
    fn test_parse_header_only() {
        assert!(parse_device_list("List of devices attached\n").is_empty());
    }

    #[test]
    fn test_select_single() {
        assert!(matches!(select_single(vec![]), Err(LogscopeError::NoDevice)));
        assert_eq!(select_single(vec!["a".into()]).unwrap(), "a");
        match select_single(vec!["a".into(), "b".into()]) {
            Err(LogscopeError::AmbiguousDevice { devices }) => assert_eq!(devices, vec!["a", "b"]),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_explicit_target_is_not_validated() {
        let resolver = DeviceResolver::new(AdbConfig {
            program: "/nonexistent/adb".into(),
            devices_timeout_secs: 1,
        });
        let target = resolver.resolve_target(Some("emulator-9999")).await.unwrap();
        assert_eq!(target, "emulator-9999");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_devices_from_fake_adb() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("adb");
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf 'List of devices attached\\nemulator-5554\\tdevice\\nemulator-5556\\toffline\\n'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolver = DeviceResolver::new(AdbConfig {
            program: script,
            devices_timeout_secs: 5,
        });
        assert_eq!(resolver.list_devices().await.unwrap(), vec!["emulator-5554"]);
        assert_eq!(resolver.resolve_target(None).await.unwrap(), "emulator-5554");
    }
}
