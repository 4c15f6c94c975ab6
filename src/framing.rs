use crate::config::MAX_LINE_BYTES;

/// Accumulates raw bytes and hands back complete CR/LF terminated lines.
///
/// Splitting happens on bytes, before decoding, so a multi-byte character
/// cut across two reads still decodes once the line is complete. Invalid
/// sequences become U+FFFD instead of failing. An unterminated tail longer
/// than [`MAX_LINE_BYTES`] is dropped.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);

        let tail_start = self
            .pending
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1);
        let tail_len = self.pending.len() - tail_start;
        if tail_len > MAX_LINE_BYTES {
            tracing::debug!(dropped = tail_len, "Discarding overlong partial line");
            self.pending.truncate(tail_start);
        }
    }

    /// Next complete line with its terminator and surrounding whitespace removed.
    pub fn pop_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }

    /// Everything buffered, complete or not, decoded leniently.
    pub fn take_all(&mut self) -> String {
        let bytes = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_crlf_lines() {
        let mut buf = LineBuffer::new();
        buf.push(b"PING#1\r\nPONG#");
        assert_eq!(buf.pop_line().as_deref(), Some("PING#1"));
        assert_eq!(buf.pop_line(), None);

        buf.push(b"2\r\n");
        assert_eq!(buf.pop_line().as_deref(), Some("PONG#2"));
        assert!(buf.is_empty());
    }

    #[test]
    fn unterminated_stream_is_bounded() {
        let mut buf = LineBuffer::new();
        buf.push(b"PONG#1\r\n");
        buf.push(&[b'x'; MAX_LINE_BYTES + 1]);
        assert_eq!(buf.pop_line().as_deref(), Some("PONG#1"));
        assert!(buf.is_empty());

        buf.push(&[b'y'; 10]);
        buf.push(b"\r\nPING#2\r\n");
        assert_eq!(buf.pop_line().as_deref(), Some("yyyyyyyyyy"));
        assert_eq!(buf.pop_line().as_deref(), Some("PING#2"));
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let mut buf = LineBuffer::new();
        buf.push(b"PONG#\xff3\r\n");
        assert_eq!(buf.pop_line().as_deref(), Some("PONG#\u{fffd}3"));
    }

    #[test]
    fn multibyte_character_split_across_reads() {
        let mut buf = LineBuffer::new();
        let text = "Olá\r\n".as_bytes();
        buf.push(&text[..3]);
        assert_eq!(buf.pop_line(), None);
        buf.push(&text[3..]);
        assert_eq!(buf.pop_line().as_deref(), Some("Olá"));
    }

    #[test]
    fn take_all_drains_partial_data() {
        let mut buf = LineBuffer::new();
        buf.push(b"Entry AT\r\nOK");
        assert_eq!(buf.take_all(), "Entry AT\r\nOK");
        assert!(buf.is_empty());
    }
}
