// Line reassembly for chunked byte streams
//
// The transport delivers notifications of arbitrary size: one chunk may hold
// half a line, several lines, or a line tail plus the next line's head.
// The reassembler keeps the unterminated suffix and hands out complete lines.

const LINE_TERMINATOR: u8 = b'\n';

/// Accumulates raw chunks and emits every line whose terminator has arrived.
///
/// After each [`push`](Self::push) the internal buffer holds exactly the bytes
/// that follow the last terminator seen so far. The buffer is not capped:
/// a peer that never sends a terminator grows it without bound.
#[derive(Debug, Default)]
pub struct LineReassembler {
    buffer: Vec<u8>,
}

impl LineReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the completed lines, in order.
    ///
    /// Lines are trimmed. Empty lines are still returned so that the number
    /// of emitted lines always equals the number of terminators consumed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        // The existing buffer holds no terminator, only the new bytes need scanning.
        let mut scan_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut line_start = 0;

        while let Some(offset) = self.buffer[scan_from..]
            .iter()
            .position(|&b| b == LINE_TERMINATOR)
        {
            let end = scan_from + offset;
            let text = String::from_utf8_lossy(&self.buffer[line_start..end]);
            lines.push(text.trim().to_string());

            line_start = end + 1;
            scan_from = line_start;
        }

        if line_start > 0 {
            self.buffer.drain(..line_start);
        }

        lines
    }

    /// Bytes received after the last terminator.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop any partial line.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
