//! Full-line framing for subprocess output
//!
//! Chunks read from a pipe can end mid-line or mid-codepoint. Bytes are held
//! until a newline arrives, so callers only ever see whole lines.

#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            if let Some(line) = decode(&self.pending[start..end]) {
                lines.push(line);
            }
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Flush the trailing fragment at end of stream
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        decode(&rest)
    }
}

fn decode(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    if raw.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(raw).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_line_is_held() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"01-15 10:00:00.000 D/Tag").is_empty());

        let lines = splitter.push(b"( 42): hello\nnext");
        assert_eq!(lines, vec!["01-15 10:00:00.000 D/Tag( 42): hello"]);
        assert_eq!(splitter.finish(), Some("next".to_string()));
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let text = "caf\u{e9} \u{1F600}\n";
        let bytes = text.as_bytes();
        let mut splitter = LineSplitter::new();
        let mut lines = Vec::new();
        for byte in bytes {
            lines.extend(splitter.push(std::slice::from_ref(byte)));
        }
        assert_eq!(lines, vec!["caf\u{e9} \u{1F600}"]);
    }

    #[test]
    fn test_crlf_and_empty_lines() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"a\r\n\r\n\nb\n");
        assert_eq!(lines, vec!["a", "b"]);
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_whitespace_fragment_is_kept() {
        let mut splitter = LineSplitter::new();
        splitter.push(b"  ");
        assert_eq!(splitter.finish(), Some("  ".to_string()));
    }
}
