//! Standard-stream sink pair.
//!
//! Instantiated in pairs: info/debug records go to stdout, warn and above to
//! stderr. Writes are synchronous; colorization happens here and only when
//! the stream is a terminal and color was not disabled.

use std::io::{self, IsTerminal, Write};

use crate::config::{Options, SinkFormat};
use crate::entry::Entry;
use crate::level::Level;
use crate::sink::{render, Hook, SinkFlags};
use crate::utils::error::{Error, Result};

/// Which stream the sink writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTarget {
    /// Standard output: `Info` and `Debug`.
    Out,
    /// Standard error: `Warn`, `Error`, `Fatal`, `Panic`.
    Err,
}

/// One half of the standard-stream pair.
pub struct StdStreamSink {
    target: StreamTarget,
    levels: Vec<Level>,
    color: bool,
    flags: SinkFlags,
}

impl StdStreamSink {
    /// Build the stdout half.
    pub fn out(opts: &Options) -> Self {
        StdStreamSink {
            target: StreamTarget::Out,
            levels: vec![Level::Info, Level::Debug],
            color: !opts.disable_color && io::stdout().is_terminal(),
            flags: SinkFlags {
                keep_trace: true,
                ..SinkFlags::default()
            },
        }
    }

    /// Build the stderr half.
    pub fn err(opts: &Options) -> Self {
        StdStreamSink {
            target: StreamTarget::Err,
            levels: vec![Level::Warn, Level::Error, Level::Fatal, Level::Panic],
            color: !opts.disable_color && io::stderr().is_terminal(),
            flags: SinkFlags {
                keep_trace: true,
                ..SinkFlags::default()
            },
        }
    }

    /// The stream this sink writes to.
    pub fn target(&self) -> StreamTarget {
        self.target
    }
}

impl Hook for StdStreamSink {
    fn levels(&self) -> &[Level] {
        &self.levels
    }

    fn fire(&self, entry: &Entry) -> Result<()> {
        let color = self.color.then_some(entry.level);
        match render(entry, &self.flags, SinkFormat::Text, color)? {
            Some(payload) => self.write(&payload),
            None => Ok(()),
        }
    }

    fn write(&self, payload: &[u8]) -> Result<()> {
        let result = match self.target {
            StreamTarget::Out => io::stdout().lock().write_all(payload),
            StreamTarget::Err => io::stderr().lock().write_all(payload),
        };
        result.map_err(|e| Error::FormatFailed(format!("standard stream write: {}", e)))
    }

    fn close(&self) -> Result<()> {
        match self.target {
            StreamTarget::Out => io::stdout().lock().flush(),
            StreamTarget::Err => io::stderr().lock().flush(),
        }
        .map_err(|e| Error::FormatFailed(format!("standard stream flush: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_level_split() {
        let opts = Options::default();
        let out = StdStreamSink::out(&opts);
        let err = StdStreamSink::err(&opts);

        assert!(out.accepts(Level::Info));
        assert!(out.accepts(Level::Debug));
        assert!(!out.accepts(Level::Warn));

        assert!(err.accepts(Level::Warn));
        assert!(err.accepts(Level::Error));
        assert!(err.accepts(Level::Fatal));
        assert!(err.accepts(Level::Panic));
        assert!(!err.accepts(Level::Info));
    }

    #[test]
    fn test_color_disabled_by_option() {
        let opts = Options {
            disable_color: true,
            ..Options::default()
        };
        let out = StdStreamSink::out(&opts);
        assert!(!out.color);
    }
}
