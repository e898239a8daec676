//! One-shot capture with a hard deadline
//!
//! Used for on-demand queries: collect whatever logcat prints until it exits
//! or the deadline passes, whichever comes first.

use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::command::{logcat_command, CaptureFilter};
use super::lines::LineSplitter;
use crate::app::Config;
use crate::error::{LogscopeError, Result};

/// Capture logcat output from `device` for at most the configured deadline
pub async fn capture_bounded(
    config: &Config,
    device: &str,
    filter: &CaptureFilter,
) -> Result<Vec<String>> {
    let cmd = logcat_command(
        &config.adb.program,
        device,
        filter,
        config.capture.dump_on_bounded,
    );
    let deadline = Duration::from_millis(config.capture.bounded_timeout_ms);

    debug!("Bounded capture on {} (filter: {}, deadline: {:?})", device, filter, deadline);
    let lines = run_bounded(cmd, deadline).await?;
    debug!("Bounded capture on {} returned {} lines", device, lines.len());
    Ok(lines)
}

/// Run `cmd` and collect its stdout lines until exit or `deadline`.
///
/// On deadline the child is killed and the complete lines read so far are
/// returned; a half-written trailing line is discarded. Any stderr output, or
/// a non-zero exit, fails the call.
pub async fn run_bounded(mut cmd: Command, deadline: Duration) -> Result<Vec<String>> {
    let mut child = cmd
        .spawn()
        .map_err(|e| reader_error("spawn", e))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| LogscopeError::Capture("log reader stdout not piped".to_string()))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| LogscopeError::Capture("log reader stderr not piped".to_string()))?;

    let mut splitter = LineSplitter::new();
    let mut lines = Vec::new();
    let mut out_buf = vec![0u8; 8192];
    let mut err_buf = vec![0u8; 4096];
    let mut stdout_open = true;
    let mut stderr_open = true;

    let timer = tokio::time::sleep(deadline);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            _ = &mut timer => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill log reader after deadline: {}", e);
                }
                debug!("Capture deadline reached with {} lines", lines.len());
                return Ok(lines);
            }
            read = stdout.read(&mut out_buf), if stdout_open => match read {
                Ok(0) => {
                    stdout_open = false;
                    lines.extend(splitter.finish());
                }
                Ok(n) => lines.extend(splitter.push(&out_buf[..n])),
                Err(e) => {
                    warn!("Log reader stdout error: {}", e);
                    stdout_open = false;
                }
            },
            read = stderr.read(&mut err_buf), if stderr_open => match read {
                Ok(0) => stderr_open = false,
                Ok(n) => {
                    let text = String::from_utf8_lossy(&err_buf[..n]).trim().to_string();
                    let _ = child.kill().await;
                    warn!("Log reader wrote to stderr: {}", text);
                    return Err(LogscopeError::Capture(text));
                }
                Err(e) => {
                    warn!("Log reader stderr error: {}", e);
                    stderr_open = false;
                }
            },
            status = child.wait(), if !stdout_open && !stderr_open => {
                let status = status.map_err(|e| reader_error("wait for", e))?;
                if status.success() {
                    return Ok(lines);
                }
                return Err(LogscopeError::Capture(format!("log reader exited with {}", status)));
            }
        }
    }
}

/// Spawn and wait failures of the log reader
fn reader_error(action: &str, e: std::io::Error) -> LogscopeError {
    LogscopeError::Capture(format!("failed to {} log reader: {}", action, e))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;
    use std::time::Instant;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    #[tokio::test]
    async fn test_returns_all_lines_on_exit() {
        let started = Instant::now();
        let lines = run_bounded(
            sh("echo one; sleep 0.5; echo two; printf 'tail'"),
            Duration::from_millis(2000),
        )
        .await
        .unwrap();

        assert_eq!(lines, vec!["one", "two", "tail"]);
        assert!(started.elapsed() < Duration::from_millis(1800));
    }

    #[tokio::test]
    async fn test_deadline_kills_and_returns_partial_capture() {
        let started = Instant::now();
        let lines = run_bounded(
            sh("echo early; sleep 30; echo late"),
            Duration::from_millis(400),
        )
        .await
        .unwrap();

        assert_eq!(lines, vec!["early"]);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(400));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_stderr_aborts_capture() {
        let err = run_bounded(
            sh("echo ok; echo 'error: device offline' >&2; sleep 5"),
            Duration::from_millis(2000),
        )
        .await
        .unwrap_err();

        match err {
            LogscopeError::Capture(text) => assert_eq!(text, "error: device offline"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_capture_error() {
        let err = run_bounded(sh("echo partial; exit 4"), Duration::from_millis(2000))
            .await
            .unwrap_err();
        assert!(matches!(err, LogscopeError::Capture(_)));
    }

    #[test]
    fn test_wait_failure_maps_to_capture_error() {
        let err = reader_error("wait for", std::io::Error::other("no child process"));
        match err {
            LogscopeError::Capture(text) => {
                assert_eq!(text, "failed to wait for log reader: no child process")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_capture_error() {
        let mut cmd = Command::new("/nonexistent/adb-binary");
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let err = run_bounded(cmd, Duration::from_millis(200)).await.unwrap_err();
        assert!(err.to_string().contains("failed to spawn"));
    }
}
