//! # Logger Façade
//!
//! The public entry point. A logger owns its sink set and publishes every
//! piece of mutable state (level, options, default fields, sinks, io-writer
//! filters) as an atomic snapshot, so the hot log path never takes a lock.
//!
//! Handles are cheap to share: `Clone` yields another handle onto the same
//! logger. `try_clone` is the deep operation, producing an independent
//! logger with fresh sinks built from the same options.

pub mod iowriter;

use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;

use crate::adapter::stdlog::StdLog;
use crate::config::Options;
use crate::entry::{Entry, EmitterHandle, SinkSet};
use crate::fields::Fields;
use crate::format;
use crate::hooks;
use crate::level::Level;
use crate::sink::file::FileSink;
use crate::sink::stdstream::StdStreamSink;
use crate::sink::syslog::SyslogSink;
use crate::sink::Hook;
use crate::utils::error::{Error, Result};
use crate::utils::trace;

pub use iowriter::IoWriter;

/// Shared emission counters.
///
/// Counters are monotonic across the logger's lifetime; cloning shares the
/// same counters.
#[derive(Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    entries: AtomicU64,
    sink_errors: AtomicU64,
    dropped: AtomicU64,
}

impl Metrics {
    /// Entries fanned out to at least one sink.
    pub fn entries(&self) -> u64 {
        self.inner.entries.load(Ordering::Relaxed)
    }

    /// Errors returned by sink fire calls.
    pub fn sink_errors(&self) -> u64 {
        self.inner.sink_errors.load(Ordering::Relaxed)
    }

    /// Io-writer lines discarded by the drop filters.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn incr_entries(&self) {
        self.inner.entries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_sink_errors(&self) {
        self.inner.sink_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr_dropped(&self) {
        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

struct Inner {
    level: AtomicU8,
    iow_level: AtomicU8,
    opts: ArcSwap<Options>,
    fields: ArcSwap<Fields>,
    sinks: EmitterHandle,
    trace_re: ArcSwapOption<Regex>,
    iow_filters: ArcSwap<Vec<String>>,
    iow_buf: Mutex<Vec<u8>>,
    closed: AtomicBool,
    metrics: Metrics,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Last handle gone: graceful close, drain then release.
        if let Some(old) = self.sinks.swap(None) {
            for sink in old.iter() {
                let _ = sink.close();
            }
        }
    }
}

/// Thread-safe logging façade.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

impl Default for Logger {
    fn default() -> Self {
        Logger::new()
    }
}

impl Logger {
    /// Create a logger with no sinks installed.
    ///
    /// The threshold starts at `Info`; call `set_options` to install sinks.
    pub fn new() -> Self {
        Logger {
            inner: Arc::new(Inner {
                level: AtomicU8::new(Level::Info.ordinal()),
                iow_level: AtomicU8::new(Level::Info.ordinal()),
                opts: ArcSwap::from_pointee(Options::default()),
                fields: ArcSwap::from_pointee(Fields::new()),
                sinks: Arc::new(ArcSwapOption::empty()),
                trace_re: ArcSwapOption::empty(),
                iow_filters: ArcSwap::from_pointee(Vec::new()),
                iow_buf: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                metrics: Metrics::default(),
            }),
        }
    }

    /// Build an independent logger inheriting level, io-writer level, a deep
    /// copy of the default fields, and the current options re-applied as
    /// fresh sink instances.
    pub fn try_clone(&self) -> Result<Logger> {
        let clone = Logger::new();
        clone
            .inner
            .level
            .store(self.inner.level.load(Ordering::Acquire), Ordering::Release);
        clone.inner.iow_level.store(
            self.inner.iow_level.load(Ordering::Acquire),
            Ordering::Release,
        );
        clone
            .inner
            .fields
            .store(Arc::new((**self.inner.fields.load()).clone()));
        clone
            .inner
            .iow_filters
            .store(self.inner.iow_filters.load_full());
        let opts = self.get_options();
        clone.set_options(&opts)?;
        Ok(clone)
    }

    /// Replace the threshold. The level-change hook fires when the value
    /// actually changed.
    pub fn set_level(&self, level: Level) {
        let old = self.inner.level.swap(level.ordinal(), Ordering::AcqRel);
        if old != level.ordinal() {
            hooks::fire_level_change(self);
        }
    }

    /// The current threshold.
    pub fn get_level(&self) -> Level {
        Level::from_ordinal(self.inner.level.load(Ordering::Acquire))
    }

    /// Level applied to lines received through the io-writer adapter.
    pub fn set_iowriter_level(&self, level: Level) {
        self.inner.iow_level.store(level.ordinal(), Ordering::Release);
    }

    /// The io-writer adapter level.
    pub fn get_iowriter_level(&self) -> Level {
        Level::from_ordinal(self.inner.iow_level.load(Ordering::Acquire))
    }

    /// Replace the io-writer drop filters (substring match, case-sensitive).
    pub fn set_iowriter_filter(&self, patterns: &[&str]) {
        let list: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        self.inner.iow_filters.store(Arc::new(list));
    }

    /// Append io-writer drop filters (read-copy-replace).
    pub fn add_iowriter_filter(&self, patterns: &[&str]) {
        self.inner.iow_filters.rcu(|current| {
            let mut list = (**current).clone();
            list.extend(patterns.iter().map(|p| p.to_string()));
            list
        });
    }

    /// Validate options, build the new sink set, and swap it in atomically.
    ///
    /// The standard pair is installed unless disabled, then one file sink
    /// per file fragment and one syslog sink per syslog fragment. Any sink
    /// construction failure unwinds the partial set and leaves the previous
    /// configuration in place. The old sink set drains and closes in the
    /// background. The init hook fires after a successful swap.
    pub fn set_options(&self, opts: &Options) -> Result<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(Error::LoggerClosed);
        }
        let normalized = opts.validate()?;

        let mut std_sinks: Vec<Arc<StdStreamSink>> = Vec::new();
        if !normalized.disable_standard {
            std_sinks.push(Arc::new(StdStreamSink::out(&normalized)));
            std_sinks.push(Arc::new(StdStreamSink::err(&normalized)));
        }
        let mut file_sinks: Vec<Arc<FileSink>> = Vec::new();
        for fragment in &normalized.files {
            // Unwind on failure: sinks built so far are still in `Created`
            // and release their resources on drop.
            file_sinks.push(Arc::new(FileSink::open(fragment)?));
        }
        let mut syslog_sinks: Vec<Arc<SyslogSink>> = Vec::new();
        for fragment in &normalized.syslogs {
            syslog_sinks.push(Arc::new(SyslogSink::open(fragment)?));
        }

        for sink in &file_sinks {
            sink.start();
        }
        for sink in &syslog_sinks {
            sink.start();
        }

        let mut set: SinkSet = Vec::new();
        set.extend(std_sinks.into_iter().map(|s| s as Arc<dyn Hook>));
        set.extend(file_sinks.into_iter().map(|s| s as Arc<dyn Hook>));
        set.extend(syslog_sinks.into_iter().map(|s| s as Arc<dyn Hook>));

        let trace_re = if normalized.trace_filter.is_empty() {
            None
        } else {
            // Compilability was checked by validate.
            Regex::new(&normalized.trace_filter).ok()
        };
        self.inner.trace_re.store(trace_re.map(Arc::new));
        self.inner.opts.store(Arc::new(normalized));

        let old = self.inner.sinks.swap(Some(Arc::new(set)));
        if let Some(old) = old {
            std::thread::spawn(move || {
                for sink in old.iter() {
                    let _ = sink.close();
                }
            });
        }
        hooks::fire_init(self);
        Ok(())
    }

    /// The current options snapshot.
    pub fn get_options(&self) -> Options {
        (**self.inner.opts.load()).clone()
    }

    /// Replace the default fields merged into every new entry.
    pub fn set_fields(&self, fields: Fields) {
        self.inner.fields.store(Arc::new(fields));
    }

    /// A deep copy of the default fields.
    pub fn get_fields(&self) -> Fields {
        (**self.inner.fields.load()).clone()
    }

    /// Shared emission counters.
    pub fn metrics(&self) -> Metrics {
        self.inner.metrics.clone()
    }

    /// Log at `Debug`.
    #[track_caller]
    pub fn debug(&self, message: &str, data: Option<Value>) {
        self.log_details(Level::Debug, message, data, Vec::new(), None);
    }

    /// Log at `Info`.
    #[track_caller]
    pub fn info(&self, message: &str, data: Option<Value>) {
        self.log_details(Level::Info, message, data, Vec::new(), None);
    }

    /// Log at `Warn`.
    #[track_caller]
    pub fn warning(&self, message: &str, data: Option<Value>) {
        self.log_details(Level::Warn, message, data, Vec::new(), None);
    }

    /// Log at `Error`.
    #[track_caller]
    pub fn error(&self, message: &str, data: Option<Value>) {
        self.log_details(Level::Error, message, data, Vec::new(), None);
    }

    /// Log at `Fatal`, then terminate the process with exit code 1.
    #[track_caller]
    pub fn fatal(&self, message: &str, data: Option<Value>) {
        self.log_details(Level::Fatal, message, data, Vec::new(), None);
    }

    /// Log at `Panic`, then panic with the message.
    #[track_caller]
    pub fn panic(&self, message: &str, data: Option<Value>) {
        self.log_details(Level::Panic, message, data, Vec::new(), None);
    }

    /// Log one fully-specified record.
    ///
    /// Like every log method this is total: downstream failures go to the
    /// process-wide error hook, never to the caller.
    #[track_caller]
    pub fn log_details(
        &self,
        level: Level,
        message: &str,
        data: Option<Value>,
        errors: Vec<Option<String>>,
        fields: Option<&Fields>,
    ) {
        self.new_entry(level, message, data, errors, fields, Location::caller(), false)
            .log();
    }

    /// Build an entry at the given level for further chaining; close it
    /// with `log` or `check`.
    #[track_caller]
    pub fn entry(&self, level: Level, message: &str) -> Entry {
        self.new_entry(level, message, None, Vec::new(), None, Location::caller(), false)
    }

    /// Log `message` with the given errors at `ko_level`, or re-classify to
    /// `ok_level` when every error is nil (`Nil` suppresses entirely).
    ///
    /// # Returns
    ///
    /// Whether any non-nil error existed.
    #[track_caller]
    pub fn check_error(
        &self,
        ko_level: Level,
        ok_level: Level,
        message: &str,
        errors: Vec<Option<String>>,
    ) -> bool {
        self.new_entry(ko_level, message, None, errors, None, Location::caller(), false)
            .check(ok_level)
    }

    /// Compose a message-only access-log entry at `Info`.
    ///
    /// Its fan-out reaches only sinks configured with access-log mode.
    #[allow(clippy::too_many_arguments)]
    pub fn access(
        &self,
        remote_addr: &str,
        remote_user: &str,
        time: DateTime<Utc>,
        latency: Duration,
        method: &str,
        request: &str,
        proto: &str,
        status: u16,
        size: u64,
    ) -> Entry {
        let message = format::access_line(
            remote_addr,
            remote_user,
            time,
            latency,
            method,
            request,
            proto,
            status,
            size,
        );
        let entry = Entry::new(Level::Info, message).set_message_only(true);
        if !Level::Info.enabled_for(self.get_level()) {
            return entry.gated();
        }
        entry
            .with_emitter(self.inner.sinks.clone())
            .with_metrics(self.inner.metrics.clone())
    }

    /// Drain and close all owned sinks, flushing the io-writer's trailing
    /// partial line first. Idempotent; subsequent io-writer writes fail
    /// with `LoggerClosed`.
    pub fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let partial: Vec<u8> = std::mem::take(&mut *self.inner.iow_buf.lock());
        if !partial.is_empty() {
            self.emit_iow_line(&partial);
        }
        if let Some(old) = self.inner.sinks.swap(None) {
            for sink in old.iter() {
                let _ = sink.close();
            }
        }
        Ok(())
    }

    /// Whether `close` has run.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// An owned `io::Write` handle over this logger.
    pub fn writer(&self) -> IoWriter {
        IoWriter::new(self.clone())
    }

    /// A stdlib-shaped adapter bound to the given level.
    pub fn std_logger(&self, level: Level, flags: u32) -> StdLog {
        let shared = self.clone();
        StdLog::new(Arc::new(move || Some(shared.clone())), level, flags)
    }

    /// Install the stdlib adapter as the process-wide `log` crate logger.
    ///
    /// The installation is a process-global one-shot; a second call keeps
    /// the first registration.
    pub fn set_std_logger(&self, level: Level, flags: u32) {
        let adapter = self.std_logger(level, flags);
        if log::set_boxed_logger(Box::new(adapter)).is_ok() {
            log::set_max_level(
                level
                    .to_log()
                    .map(|l| l.to_level_filter())
                    .unwrap_or(log::LevelFilter::Off),
            );
        }
    }

    /// Cut incoming bytes into lines, apply the drop filters, and emit each
    /// surviving line at the io-writer level.
    ///
    /// Always accounts the full input length.
    pub(crate) fn write_bytes(&self, buf: &[u8]) -> Result<usize> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(Error::LoggerClosed);
        }
        let lines: Vec<Vec<u8>> = {
            let mut pending = self.inner.iow_buf.lock();
            pending.extend_from_slice(buf);
            let mut out = Vec::new();
            while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = pending.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                out.push(line);
            }
            out
        };
        for line in lines {
            self.emit_iow_line(&line);
        }
        Ok(buf.len())
    }

    fn emit_iow_line(&self, line: &[u8]) {
        if line.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(line);
        let filters = self.inner.iow_filters.load();
        if filters.iter().any(|pattern| text.contains(pattern.as_str())) {
            self.inner.metrics.incr_dropped();
            return;
        }
        let level = self.get_iowriter_level();
        self.new_entry(level, &text, None, Vec::new(), None, Location::caller(), false)
            .log();
    }

    /// Gate, then assemble a new entry with merged default fields and the
    /// context capture selected by the active options.
    pub(crate) fn new_entry(
        &self,
        level: Level,
        message: &str,
        data: Option<Value>,
        errors: Vec<Option<String>>,
        fields: Option<&Fields>,
        location: &Location<'_>,
        force_trace: bool,
    ) -> Entry {
        if !level.enabled_for(self.get_level()) {
            return Entry::new(level, message).gated();
        }

        let opts = self.inner.opts.load();
        let merged = {
            let defaults = (**self.inner.fields.load()).clone();
            match fields {
                Some(extra) => defaults.merge(extra),
                None => defaults,
            }
        };

        let mut entry = Entry::new(level, message)
            .with_emitter(self.inner.sinks.clone())
            .with_metrics(self.inner.metrics.clone())
            .field_set(merged)
            .err_set(errors);
        if let Some(data) = data {
            entry.data = Some(data);
        }
        if !opts.disable_timestamp {
            entry.time = Some(Utc::now());
        }
        if !opts.disable_stack {
            entry.stack = trace::task_id();
        }
        if opts.enable_trace || force_trace {
            let trace_re = self.inner.trace_re.load();
            entry.file = trace::normalize_file(location.file(), trace_re.as_deref());
            entry.line = location.line();
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_options() -> Options {
        Options {
            disable_standard: true,
            ..Options::default()
        }
    }

    #[test]
    fn test_default_level_is_info() {
        let logger = Logger::new();
        assert_eq!(logger.get_level(), Level::Info);
    }

    #[test]
    fn test_gating_by_threshold() {
        let logger = Logger::new();
        logger.set_options(&quiet_options()).expect("options");

        let entry = logger.entry(Level::Debug, "too verbose");
        assert!(entry.is_gated());

        let entry = logger.entry(Level::Error, "severe");
        assert!(!entry.is_gated());

        logger.set_level(Level::Nil);
        let entry = logger.entry(Level::Error, "suppressed");
        assert!(entry.is_gated());
    }

    #[test]
    fn test_gated_entry_keeps_message() {
        let logger = Logger::new();
        let entry = logger.entry(Level::Debug, "kept");
        assert_eq!(entry.message, "kept");
    }

    #[test]
    fn test_get_options_round_trips() {
        let logger = Logger::new();
        let opts = Options {
            disable_standard: true,
            disable_color: true,
            trace_filter: "^/build/".to_string(),
            ..Options::default()
        };
        logger.set_options(&opts).expect("options");
        let stored = logger.get_options();
        assert!(stored.disable_standard);
        assert!(stored.disable_color);
        assert_eq!(stored.trace_filter, "^/build/");
    }

    #[test]
    fn test_set_options_failure_keeps_previous() {
        let logger = Logger::new();
        logger.set_options(&quiet_options()).expect("options");

        let bad = Options {
            disable_standard: true,
            files: vec![crate::config::FileOpt::default()],
            ..Options::default()
        };
        assert!(logger.set_options(&bad).is_err());
        assert!(logger.get_options().files.is_empty());
    }

    #[test]
    fn test_default_fields_merge_into_entries() {
        let logger = Logger::new();
        logger.set_options(&quiet_options()).expect("options");
        logger.set_fields(Fields::new().add("service", "api"));

        let entry = logger.entry(Level::Info, "with defaults");
        assert_eq!(
            entry.fields.load("service"),
            Some(Value::from("api"))
        );
    }

    #[test]
    fn test_entry_fields_shadow_defaults() {
        let logger = Logger::new();
        logger.set_options(&quiet_options()).expect("options");
        logger.set_fields(Fields::new().add("env", "prod"));

        let extra = Fields::new().add("env", "test");
        let entry =
            logger.new_entry(Level::Info, "m", None, Vec::new(), Some(&extra), Location::caller(), false);
        assert_eq!(entry.fields.load("env"), Some(Value::from("test")));
    }

    #[test]
    fn test_timestamp_and_stack_flags() {
        let logger = Logger::new();
        logger
            .set_options(&Options {
                disable_standard: true,
                disable_timestamp: true,
                disable_stack: true,
                ..Options::default()
            })
            .expect("options");
        let entry = logger.entry(Level::Info, "bare");
        assert!(entry.time.is_none());
        assert_eq!(entry.stack, 0);

        logger.set_options(&quiet_options()).expect("options");
        let entry = logger.entry(Level::Info, "full");
        assert!(entry.time.is_some());
        assert_ne!(entry.stack, 0);
    }

    #[test]
    fn test_trace_capture() {
        let logger = Logger::new();
        logger
            .set_options(&Options {
                disable_standard: true,
                enable_trace: true,
                ..Options::default()
            })
            .expect("options");
        let entry = logger.entry(Level::Info, "traced");
        assert!(entry.file.ends_with("mod.rs"));
        assert_ne!(entry.line, 0);
    }

    #[test]
    fn test_try_clone_is_independent() {
        let logger = Logger::new();
        logger.set_options(&quiet_options()).expect("options");
        logger.set_level(Level::Debug);
        logger.set_fields(Fields::new().add("origin", "source"));

        let clone = logger.try_clone().expect("clone");
        assert_eq!(clone.get_level(), Level::Debug);
        assert_eq!(
            clone.get_fields().load("origin"),
            Some(Value::from("source"))
        );

        clone.set_level(Level::Error);
        clone.set_fields(Fields::new().add("origin", "copy"));
        assert_eq!(logger.get_level(), Level::Debug);
        assert_eq!(
            logger.get_fields().load("origin"),
            Some(Value::from("source"))
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let logger = Logger::new();
        logger.set_options(&quiet_options()).expect("options");
        logger.close().expect("first close");
        logger.close().expect("second close");
        assert!(logger.is_closed());
        assert!(matches!(
            logger.set_options(&quiet_options()),
            Err(Error::LoggerClosed)
        ));
    }

    #[test]
    fn test_level_change_hook_fires_on_change_only() {
        use std::sync::atomic::AtomicUsize;

        let logger = Logger::new();
        // The hook is process-global and tests run in parallel: count only
        // events for this logger instance.
        let target = Arc::as_ptr(&logger.inner) as usize;
        let changes = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&changes);
        hooks::on_level_change(move |l| {
            if Arc::as_ptr(&l.inner) as usize == target {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });
        logger.set_level(Level::Warn);
        logger.set_level(Level::Warn);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_access_entry_is_message_only() {
        let logger = Logger::new();
        logger.set_options(&quiet_options()).expect("options");
        let entry = logger.access(
            "10.0.0.1",
            "-",
            Utc::now(),
            Duration::from_millis(5),
            "GET",
            "/",
            "HTTP/1.1",
            200,
            128,
        );
        assert!(entry.is_message_only());
        assert!(entry.message.contains("GET / HTTP/1.1"));
    }
}
