//! Process id correlation for interleaved logcat output
//!
//! `logcat -v time` lines carry the emitting pid in parentheses after the tag,
//! e.g. `01-15 10:00:00.123 D/AppsFlyer_6.12.2( 4242): ...`.

use regex::Regex;
use std::sync::OnceLock;

fn pid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\(\s*(\d+)\s*\)").expect("static pid regex"))
}

/// Pid from the first parenthesized numeric group that fits a pid, if any
pub fn extract_pid(line: &str) -> Option<u32> {
    pid_pattern()
        .captures_iter(line)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| m.as_str().parse().ok())
}

/// Pid of the newest line containing `target_tag`.
///
/// Returns `None` when no tagged line carries a pid; callers then fall back to
/// the unfiltered lines, which may include other processes.
pub fn correlate<S: AsRef<str>>(lines: &[S], target_tag: &str) -> Option<u32> {
    lines
        .iter()
        .rev()
        .map(AsRef::as_ref)
        .filter(|line| line.contains(target_tag))
        .find_map(extract_pid)
}

/// Lines emitted by `pid`, in order. Lines without a pid are dropped.
pub fn filter_by_pid<S: AsRef<str>>(lines: &[S], pid: u32) -> Vec<String> {
    lines
        .iter()
        .map(AsRef::as_ref)
        .filter(|line| extract_pid(line) == Some(pid))
        .map(str::to_string)
        .collect()
}
