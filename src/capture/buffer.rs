//! Bounded in-memory window of raw log lines

use std::collections::VecDeque;

/// Fixed-capacity FIFO of log lines. Once full, every push evicts the oldest line.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    lines: VecDeque<String>,
    capacity: usize,
    pushed: u64,
}

impl RingBuffer {
    /// Create an empty buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            pushed: 0,
        }
    }

    pub fn push(&mut self, line: String) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
        self.pushed += 1;
    }

    pub fn extend<I: IntoIterator<Item = String>>(&mut self, lines: I) {
        for line in lines {
            self.push(line);
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lines ever pushed, including evicted ones
    pub fn total_pushed(&self) -> u64 {
        self.pushed
    }

    /// Lines pushed after `cursor` (a previous `total_pushed`) that are still held
    pub fn since(&self, cursor: u64) -> Vec<String> {
        let fresh = self.pushed.saturating_sub(cursor).min(self.lines.len() as u64);
        self.tail(fresh as usize)
    }

    /// Copy the current contents, oldest first
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    /// Copy the newest `count` lines, oldest first
    pub fn tail(&self, count: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(count);
        self.lines.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {}", i)).collect()
    }

    #[test]
    fn test_retains_last_n_in_order() {
        for capacity in [1, 3, 7, 100] {
            let mut buffer = RingBuffer::new(capacity);
            let input = numbered(capacity * 3 + 2);
            buffer.extend(input.clone());

            assert_eq!(buffer.len(), capacity);
            assert_eq!(buffer.snapshot(), input[input.len() - capacity..].to_vec());
        }
    }

    #[test]
    fn test_under_capacity_keeps_everything() {
        let mut buffer = RingBuffer::new(10);
        buffer.extend(numbered(4));
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.snapshot()[0], "line 0");
    }

    #[test]
    fn test_tail() {
        let mut buffer = RingBuffer::new(5);
        buffer.extend(numbered(8));
        assert_eq!(buffer.tail(2), vec!["line 6", "line 7"]);
        assert_eq!(buffer.tail(50).len(), 5);
    }

    #[test]
    fn test_since_cursor_survives_eviction() {
        let mut buffer = RingBuffer::new(3);
        buffer.extend(numbered(2));
        let cursor = buffer.total_pushed();
        assert!(buffer.since(cursor).is_empty());

        buffer.push("line 2".to_string());
        assert_eq!(buffer.since(cursor), vec!["line 2"]);

        buffer.extend(numbered(10));
        assert_eq!(buffer.total_pushed(), 13);
        assert_eq!(buffer.since(cursor).len(), 3);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut buffer = RingBuffer::new(0);
        buffer.push("a".to_string());
        buffer.push("b".to_string());
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.snapshot(), vec!["b"]);
    }
}
