//! Device log capture
//!
//! Two modes share the same framing and buffering pieces:
//! - bounded: one `adb logcat` run with a hard deadline, for on-demand queries
//! - session: a supervised long-running reader feeding a bounded window

pub mod bounded;
pub mod buffer;
pub mod command;
pub mod lines;
pub mod pid;
pub mod session;

pub use bounded::capture_bounded;
pub use buffer::RingBuffer;
pub use command::{AdbLogcat, CaptureFilter, LogSource};
pub use lines::LineSplitter;
pub use pid::{correlate, extract_pid, filter_by_pid};
pub use session::{CaptureSession, CaptureStatus, StartOutcome, StopOutcome, SupervisorState};
