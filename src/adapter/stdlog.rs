//! Stdlib-shaped text adapter.
//!
//! Presents a minimal println/printf/write surface bound to one level, and
//! doubles as a `log::Log` implementation so it can be installed as the
//! process-wide logger for `log` crate macros.

use std::io;

use chrono::Local;
use parking_lot::Mutex;

use crate::hooks::Provider;
use crate::level::Level;
use crate::logger::Logger;

/// Prefix emitted lines with the local date.
pub const FLAG_DATE: u32 = 1 << 0;
/// Prefix emitted lines with the local time.
pub const FLAG_TIME: u32 = 1 << 1;

/// Stdlib-shaped adapter bound to a fixed level.
pub struct StdLog {
    provider: Provider,
    level: Level,
    flags: u32,
    partial: Mutex<Vec<u8>>,
}

impl StdLog {
    /// Build an adapter resolving its logger through a provider.
    pub fn new(provider: Provider, level: Level, flags: u32) -> Self {
        StdLog {
            provider,
            level,
            flags,
            partial: Mutex::new(Vec::new()),
        }
    }

    /// Build an adapter over a specific logger.
    pub fn for_logger(logger: &Logger, level: Level, flags: u32) -> Self {
        let shared = logger.clone();
        StdLog::new(
            std::sync::Arc::new(move || Some(shared.clone())),
            level,
            flags,
        )
    }

    /// The level this adapter emits at.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Emit one line at the bound level.
    pub fn println(&self, message: &str) {
        self.emit(self.level, message);
    }

    /// Emit one pre-formatted line at the bound level.
    ///
    /// Callers interpolate with `format!`; the name mirrors the foreign
    /// surface.
    pub fn printf(&self, message: &str) {
        self.emit(self.level, message);
    }

    fn emit(&self, level: Level, message: &str) {
        let Some(logger) = (self.provider)() else {
            return;
        };
        let message = self.decorate(message);
        logger.log_details(level, &message, None, Vec::new(), None);
    }

    fn decorate(&self, message: &str) -> String {
        let mut prefix = String::new();
        if self.flags & FLAG_DATE != 0 {
            prefix.push_str(&Local::now().format("%Y/%m/%d ").to_string());
        }
        if self.flags & FLAG_TIME != 0 {
            prefix.push_str(&Local::now().format("%H:%M:%S ").to_string());
        }
        if prefix.is_empty() {
            message.to_string()
        } else {
            format!("{}{}", prefix, message)
        }
    }
}

impl io::Write for StdLog {
    /// Consume byte slices, emitting one entry per newline-terminated line
    /// at the bound level. Partial lines buffer across calls.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let lines: Vec<String> = {
            let mut partial = self.partial.lock();
            partial.extend_from_slice(buf);
            let mut out = Vec::new();
            while let Some(pos) = partial.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = partial.drain(..=pos).collect();
                line.pop();
                if !line.is_empty() {
                    out.push(String::from_utf8_lossy(&line).into_owned());
                }
            }
            out
        };
        for line in lines {
            self.emit(self.level, &line);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let line: Vec<u8> = std::mem::take(&mut *self.partial.lock());
        if !line.is_empty() {
            self.emit(self.level, &String::from_utf8_lossy(&line));
        }
        Ok(())
    }
}

impl log::Log for StdLog {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        match (self.provider)() {
            Some(logger) => Level::from_log(metadata.level()).enabled_for(logger.get_level()),
            None => false,
        }
    }

    fn log(&self, record: &log::Record) {
        let level = Level::from_log(record.level());
        let Some(logger) = (self.provider)() else {
            return;
        };
        if !level.enabled_for(logger.get_level()) {
            return;
        }
        let message = self.decorate(&record.args().to_string());
        logger.log_details(level, &message, None, Vec::new(), None);
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use std::io::Write;
    use std::sync::Arc;

    fn quiet_logger() -> Logger {
        let logger = Logger::new();
        logger
            .set_options(&Options {
                disable_standard: true,
                ..Options::default()
            })
            .expect("options");
        logger
    }

    #[test]
    fn test_nil_provider_is_noop() {
        let adapter = StdLog::new(Arc::new(|| None), Level::Info, 0);
        adapter.println("goes nowhere");
        adapter.printf("also nowhere");
    }

    #[test]
    fn test_write_splits_lines_across_calls() {
        let logger = quiet_logger();
        let mut adapter = StdLog::for_logger(&logger, Level::Info, 0);
        adapter.write(b"first ").expect("write");
        adapter.write(b"line\nsecond line\n").expect("write");
        adapter.flush().expect("flush");
    }

    #[test]
    fn test_decorate_flags() {
        let logger = quiet_logger();
        let adapter = StdLog::for_logger(&logger, Level::Info, FLAG_DATE | FLAG_TIME);
        let decorated = adapter.decorate("payload");
        assert!(decorated.ends_with("payload"));
        assert!(decorated.len() > "payload".len());

        let bare = StdLog::for_logger(&logger, Level::Info, 0);
        assert_eq!(bare.decorate("payload"), "payload");
    }

    #[test]
    fn test_log_facade_enabled_follows_threshold() {
        let logger = quiet_logger();
        logger.set_level(Level::Warn);
        let adapter = StdLog::for_logger(&logger, Level::Info, 0);

        let warn = log::Metadata::builder().level(log::Level::Warn).build();
        let debug = log::Metadata::builder().level(log::Level::Debug).build();
        assert!(log::Log::enabled(&adapter, &warn));
        assert!(!log::Log::enabled(&adapter, &debug));
    }
}
