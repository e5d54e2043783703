//! Line transport over any `BufRead`/`Write` pair (stdin/stdout, a tty opened as a file).

use std::io::{BufRead, BufReader, Write};

use car_traits::Transport;

use crate::util::clean_line;

pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> LineTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

/// Protocol over the process' own stdin/stdout.
pub fn stdio() -> LineTransport<BufReader<std::io::Stdin>, std::io::Stdout> {
    LineTransport::new(BufReader::new(std::io::stdin()), std::io::stdout())
}

/// Protocol over a character device such as `/dev/ttyUSB0`, opened for read and write.
/// Line settings (baud rate) are expected to be configured by the OS.
pub fn open_device(
    path: &std::path::Path,
) -> crate::error::Result<LineTransport<BufReader<std::fs::File>, std::fs::File>> {
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)?;
    let writer = file.try_clone()?;
    tracing::info!(device = %path.display(), "opened serial device");
    Ok(LineTransport::new(BufReader::new(file), writer))
}

impl<R: BufRead, W: Write> Transport for LineTransport<R, W> {
    fn read_line(&mut self) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        let mut buf = Vec::new();
        let n = self.reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&buf).into_owned();
        Ok(Some(clean_line(line)))
    }

    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
