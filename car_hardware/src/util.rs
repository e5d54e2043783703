/// Longest line kept; further bytes up to the terminator are dropped.
pub const MAX_LINE_LEN: usize = 4096;

/// Accumulates raw serial bytes into complete lines.
///
/// `\n`, `\r\n` and a bare `\r` all end a line. NUL bytes are dropped (some
/// UART adapters emit them on line idle).
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: Vec<u8>,
    /// Last byte was `\r`; a directly following `\n` belongs to it.
    after_cr: bool,
    overflowed: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes; returns every line completed by this chunk, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &b in bytes {
            let after_cr = std::mem::take(&mut self.after_cr);
            match b {
                0 => self.after_cr = after_cr,
                b'\n' if after_cr => {}
                b'\n' | b'\r' => {
                    self.after_cr = b == b'\r';
                    lines.push(self.take_line());
                }
                _ if self.buf.len() >= MAX_LINE_LEN => self.overflowed = true,
                _ => self.buf.push(b),
            }
        }
        lines
    }

    fn take_line(&mut self) -> String {
        if std::mem::take(&mut self.overflowed) {
            tracing::warn!(max = MAX_LINE_LEN, "overlong line truncated");
        }
        let raw = std::mem::take(&mut self.buf);
        String::from_utf8_lossy(&raw).into_owned()
    }

    /// Bytes received since the last terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Flush whatever is buffered as a final unterminated line.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&raw).into_owned())
    }
}

/// Strip one trailing `\n`/`\r\n` and any NUL bytes from a line read by `BufRead`.
pub fn clean_line(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    if line.contains('\0') {
        line.retain(|c| c != '\0');
    }
    line
}
