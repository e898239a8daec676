//! `adb logcat` invocation

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Which lines logcat itself should let through
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CaptureFilter {
    /// Everything in the log buffer
    #[default]
    None,
    /// Only one tag, everything else silenced (`<tag>:V *:S`)
    Tag(String),
    /// Free-text regex over the message (`-e <expr>`)
    Grep(String),
}

impl CaptureFilter {
    fn args(&self) -> Vec<String> {
        match self {
            CaptureFilter::None => Vec::new(),
            CaptureFilter::Tag(tag) => vec![format!("{}:V", tag), "*:S".to_string()],
            CaptureFilter::Grep(expr) => vec!["-e".to_string(), expr.clone()],
        }
    }
}

impl std::fmt::Display for CaptureFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureFilter::None => write!(f, "none"),
            CaptureFilter::Tag(tag) => write!(f, "tag:{}", tag),
            CaptureFilter::Grep(expr) => write!(f, "grep:{}", expr),
        }
    }
}

/// Arguments passed to adb for a logcat capture
pub fn logcat_args(device: &str, filter: &CaptureFilter, dump: bool) -> Vec<String> {
    let mut args = vec![
        "-s".to_string(),
        device.to_string(),
        "logcat".to_string(),
        "-v".to_string(),
        "time".to_string(),
    ];
    if dump {
        args.push("-d".to_string());
    }
    args.extend(filter.args());
    args
}

/// Build the logcat command with all three pipes configured
pub fn logcat_command(program: &Path, device: &str, filter: &CaptureFilter, dump: bool) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(logcat_args(device, filter, dump))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Something that can start a long-running log reader for a device.
///
/// The returned child must have stdout and stderr piped.
pub trait LogSource: Send + Sync + 'static {
    fn spawn(&self, device: &str, filter: &CaptureFilter) -> std::io::Result<Child>;
}

/// Streaming `adb logcat` (no `-d`)
#[derive(Debug, Clone)]
pub struct AdbLogcat {
    program: PathBuf,
}

impl AdbLogcat {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl LogSource for AdbLogcat {
    fn spawn(&self, device: &str, filter: &CaptureFilter) -> std::io::Result<Child> {
        logcat_command(&self.program, device, filter, false).spawn()
    }
}
