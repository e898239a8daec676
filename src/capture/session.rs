//! Continuous, supervised capture into a bounded window
//!
//! A `CaptureSession` owns at most one log reader at a time. A supervisor task
//! pumps the reader's output into the shared `RingBuffer` and restarts the
//! reader once if it dies unexpectedly.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::sync::{oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::buffer::RingBuffer;
use super::command::{CaptureFilter, LogSource};
use super::lines::LineSplitter;
use crate::error::{LogscopeError, Result};

/// Supervisor lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Stopped,
    Running,
    Restarting,
}

impl SupervisorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorState::Stopped => "stopped",
            SupervisorState::Running => "running",
            SupervisorState::Restarting => "restarting",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

/// Diagnostic view of a session
#[derive(Debug, Clone, Serialize)]
pub struct CaptureStatus {
    pub session_id: Uuid,
    pub state: SupervisorState,
    pub device: Option<String>,
    pub filter: CaptureFilter,
    pub started_at: Option<DateTime<Utc>>,
    pub spawn_count: u64,
    pub buffered_lines: usize,
}

#[derive(Default)]
struct SessionHandle {
    task: Option<JoinHandle<()>>,
    stop_tx: Option<oneshot::Sender<()>>,
    device: Option<String>,
    filter: CaptureFilter,
    started_at: Option<DateTime<Utc>>,
}

impl SessionHandle {
    fn is_live(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

/// Long-lived capture for one device
pub struct CaptureSession {
    id: Uuid,
    source: Arc<dyn LogSource>,
    window: Arc<RwLock<RingBuffer>>,
    len_tx: Arc<watch::Sender<usize>>,
    state_tx: Arc<watch::Sender<SupervisorState>>,
    spawns: Arc<AtomicU64>,
    handle: Mutex<SessionHandle>,
}

impl CaptureSession {
    pub fn new(source: Arc<dyn LogSource>, capacity: usize) -> Self {
        let (len_tx, _) = watch::channel(0usize);
        let (state_tx, _) = watch::channel(SupervisorState::Stopped);
        Self {
            id: Uuid::new_v4(),
            source,
            window: Arc::new(RwLock::new(RingBuffer::new(capacity))),
            len_tx: Arc::new(len_tx),
            state_tx: Arc::new(state_tx),
            spawns: Arc::new(AtomicU64::new(0)),
            handle: Mutex::new(SessionHandle::default()),
        }
    }

    /// Start capturing unless a reader is already live.
    ///
    /// The first reader is spawned before returning so a missing adb binary
    /// surfaces here rather than inside the supervisor.
    pub async fn start(&self, device: &str, filter: CaptureFilter) -> Result<StartOutcome> {
        let mut handle = self.handle.lock().await;
        if handle.is_live() {
            debug!(session = %self.id, "Capture already running");
            return Ok(StartOutcome::AlreadyRunning);
        }

        let child = self
            .source
            .spawn(device, &filter)
            .map_err(|e| LogscopeError::Capture(format!("failed to spawn log reader: {}", e)))?;
        self.spawns.fetch_add(1, Ordering::SeqCst);
        self.state_tx.send_replace(SupervisorState::Running);

        let (stop_tx, stop_rx) = oneshot::channel();
        let supervisor = Supervisor {
            session: self.id,
            source: Arc::clone(&self.source),
            device: device.to_string(),
            filter: filter.clone(),
            window: Arc::clone(&self.window),
            len_tx: Arc::clone(&self.len_tx),
            state_tx: Arc::clone(&self.state_tx),
            spawns: Arc::clone(&self.spawns),
        };

        handle.task = Some(tokio::spawn(supervisor.run(child, stop_rx)));
        handle.stop_tx = Some(stop_tx);
        handle.device = Some(device.to_string());
        handle.filter = filter;
        handle.started_at = Some(Utc::now());

        info!(session = %self.id, device, filter = %handle.filter, "Capture started");
        Ok(StartOutcome::Started)
    }

    /// Stop the reader and disable any pending restart. Idempotent.
    pub async fn stop(&self) -> StopOutcome {
        let mut handle = self.handle.lock().await;
        let live = handle.is_live();
        let stop_tx = handle.stop_tx.take();
        let task = handle.task.take();

        if !live {
            self.state_tx.send_replace(SupervisorState::Stopped);
            return StopOutcome::NotRunning;
        }

        if let Some(stop_tx) = stop_tx {
            let _ = stop_tx.send(());
        }
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(session = %self.id, "Supervisor task ended abnormally: {}", e);
            }
        }
        self.state_tx.send_replace(SupervisorState::Stopped);
        info!(session = %self.id, "Capture stopped");
        StopOutcome::Stopped
    }

    pub async fn is_running(&self) -> bool {
        self.handle.lock().await.is_live()
    }

    /// Wait until the window holds at least one line, or `deadline` passes
    pub async fn wait_for_lines(&self, deadline: Duration) -> bool {
        if !self.window.read().await.is_empty() {
            return true;
        }
        let mut rx = self.len_tx.subscribe();
        let ready = matches!(
            tokio::time::timeout(deadline, rx.wait_for(|len| *len > 0)).await,
            Ok(Ok(_))
        );
        ready
    }

    /// Immutable copy of the window, oldest first
    pub async fn snapshot(&self) -> Vec<String> {
        self.window.read().await.snapshot()
    }

    pub async fn tail(&self, count: usize) -> Vec<String> {
        self.window.read().await.tail(count)
    }

    /// Lines appended since `cursor`, plus the cursor to pass next time
    pub async fn lines_since(&self, cursor: u64) -> (Vec<String>, u64) {
        let window = self.window.read().await;
        (window.since(cursor), window.total_pushed())
    }

    pub fn state(&self) -> SupervisorState {
        *self.state_tx.borrow()
    }

    pub fn spawn_count(&self) -> u64 {
        self.spawns.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> CaptureStatus {
        let handle = self.handle.lock().await;
        CaptureStatus {
            session_id: self.id,
            state: self.state(),
            device: handle.device.clone(),
            filter: handle.filter.clone(),
            started_at: handle.started_at,
            spawn_count: self.spawn_count(),
            buffered_lines: self.window.read().await.len(),
        }
    }
}

enum ReaderExit {
    StopRequested,
    Exited {
        status: Option<ExitStatus>,
        produced: bool,
    },
}

struct Supervisor {
    session: Uuid,
    source: Arc<dyn LogSource>,
    device: String,
    filter: CaptureFilter,
    window: Arc<RwLock<RingBuffer>>,
    len_tx: Arc<watch::Sender<usize>>,
    state_tx: Arc<watch::Sender<SupervisorState>>,
    spawns: Arc<AtomicU64>,
}

impl Supervisor {
    async fn run(self, first: Child, mut stop_rx: oneshot::Receiver<()>) {
        let mut child = first;
        // One restart per unexpected exit; re-armed once a restarted reader
        // has delivered at least one line.
        let mut retry_armed = true;

        loop {
            match self.pump(child, &mut stop_rx).await {
                ReaderExit::StopRequested => break,
                ReaderExit::Exited { status, produced } => {
                    if status.is_some_and(|s| s.success()) {
                        info!(session = %self.session, "Log reader exited cleanly");
                        break;
                    }
                    if produced {
                        retry_armed = true;
                    }
                    if !retry_armed {
                        warn!(
                            session = %self.session,
                            "Log reader failed again after restart ({:?}), giving up",
                            status
                        );
                        break;
                    }
                    if !matches!(stop_rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
                        break;
                    }

                    retry_armed = false;
                    self.state_tx.send_replace(SupervisorState::Restarting);
                    warn!(
                        session = %self.session,
                        device = %self.device,
                        "Log reader exited unexpectedly ({:?}), restarting",
                        status
                    );

                    child = match self.source.spawn(&self.device, &self.filter) {
                        Ok(child) => child,
                        Err(e) => {
                            warn!(session = %self.session, "Failed to restart log reader: {}", e);
                            break;
                        }
                    };
                    self.spawns.fetch_add(1, Ordering::SeqCst);
                    self.state_tx.send_replace(SupervisorState::Running);
                }
            }
        }

        self.state_tx.send_replace(SupervisorState::Stopped);
    }

    /// Drain stdout and stderr concurrently until the reader exits or stop is requested
    async fn pump(&self, mut child: Child, stop_rx: &mut oneshot::Receiver<()>) -> ReaderExit {
        let (mut stdout, mut stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => (out, err),
            _ => {
                warn!(session = %self.session, "Log reader started without piped output");
                let _ = child.kill().await;
                return ReaderExit::Exited {
                    status: None,
                    produced: false,
                };
            }
        };

        let mut splitter = LineSplitter::new();
        let mut out_buf = vec![0u8; 8192];
        let mut err_buf = vec![0u8; 4096];
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut produced = false;

        loop {
            tokio::select! {
                biased;
                _ = &mut *stop_rx => {
                    if let Err(e) = child.kill().await {
                        warn!(session = %self.session, "Failed to kill log reader: {}", e);
                    }
                    return ReaderExit::StopRequested;
                }
                read = stdout.read(&mut out_buf), if stdout_open => {
                    let lines = match read {
                        Ok(0) => {
                            stdout_open = false;
                            splitter.finish().into_iter().collect()
                        }
                        Ok(n) => splitter.push(&out_buf[..n]),
                        Err(e) => {
                            warn!(session = %self.session, "Log reader stdout error: {}", e);
                            stdout_open = false;
                            Vec::new()
                        }
                    };
                    if !lines.is_empty() {
                        produced = true;
                        self.append(lines).await;
                    }
                }
                read = stderr.read(&mut err_buf), if stderr_open => match read {
                    Ok(0) => stderr_open = false,
                    Ok(n) => {
                        let text = String::from_utf8_lossy(&err_buf[..n]);
                        warn!(session = %self.session, "Log reader stderr: {}", text.trim());
                    }
                    Err(e) => {
                        warn!(session = %self.session, "Log reader stderr error: {}", e);
                        stderr_open = false;
                    }
                },
                status = child.wait(), if !stdout_open && !stderr_open => {
                    return ReaderExit::Exited {
                        status: status.ok(),
                        produced,
                    };
                }
            }
        }
    }

    async fn append(&self, lines: Vec<String>) {
        let len = {
            let mut window = self.window.write().await;
            window.extend(lines);
            window.len()
        };
        self.len_tx.send_replace(len);
    }
}
