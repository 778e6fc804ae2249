/// Splits a chunked byte stream into newline-terminated lines.
///
/// Bytes after the last line feed are held back until a later chunk
/// completes them. Framing on bytes keeps multi-byte UTF-8 characters that
/// straddle a chunk boundary intact.
#[derive(Debug, Default)]
pub struct LineFramer {
    remainder: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completed, in order.
    ///
    /// Lines are returned without their terminator. Blank lines are kept;
    /// filtering them is the caller's job.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.remainder.extend_from_slice(chunk);

        let Some(last_newline) = self.remainder.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let tail = self.remainder.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.remainder, tail);

        complete[..complete.len() - 1]
            .split(|&b| b == b'\n')
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    pub fn push_str(&mut self, chunk: &str) -> Vec<String> {
        self.push(chunk.as_bytes())
    }

    /// Bytes received after the last line feed.
    pub fn pending(&self) -> usize {
        self.remainder.len()
    }

    /// Take the unterminated tail at end of stream, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.remainder.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.remainder);
        Some(String::from_utf8_lossy(&tail).into_owned())
    }
}
