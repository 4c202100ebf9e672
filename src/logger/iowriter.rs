//! `io::Write` adapter over the logger.
//!
//! Incoming bytes are cut into lines at newline boundaries; each non-empty
//! line that survives the drop filters becomes one entry at the io-writer
//! level. The reported byte count always covers the full input, dropped
//! lines included. After the logger closes, writes fail with
//! `LoggerClosed`.

use std::io;

use crate::logger::Logger;

/// Owned writer handle over a logger.
pub struct IoWriter {
    logger: Logger,
}

impl IoWriter {
    pub(crate) fn new(logger: Logger) -> Self {
        IoWriter { logger }
    }

    /// The logger this writer feeds.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

impl io::Write for IoWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.logger.write_bytes(buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for Logger {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
