pub const LINE_SEPARATOR: &[u8] = b"\r\n";

/// Splits the incoming byte stream into complete IRC lines.
///
/// Whatever trails the last `\r\n` of a read is held back and prepended to
/// the next one, so a line is only handed out once its terminator arrived.
/// The carry-over is kept as bytes: a read can end inside a multi-byte
/// character.
#[derive(Debug, Default)]
pub struct LineBuffer {
    prepend: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        LineBuffer::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.prepend.extend_from_slice(chunk);

        let mut lines = vec![];
        let mut start = 0;
        while let Some(offset) = find_separator(&self.prepend[start..]) {
            let end = start + offset;
            lines.push(String::from_utf8_lossy(&self.prepend[start..end]).into_owned());
            start = end + LINE_SEPARATOR.len();
        }

        self.prepend.drain(..start);

        lines
    }

    /// Bytes received after the last complete line.
    pub fn pending(&self) -> &[u8] {
        &self.prepend
    }
}

fn find_separator(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(LINE_SEPARATOR.len())
        .position(|window| window == LINE_SEPARATOR)
}
