//! # Log Entries
//!
//! One logged event. An entry is created by the logger façade, mutated
//! freely through chainable builder operations, and closed by a single
//! `log` or `check` call that fans it out to every sink accepting its
//! level. Entries must not be reused after closing.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use smallvec::SmallVec;

use crate::fields::Fields;
use crate::hooks;
use crate::level::Level;
use crate::logger::Metrics;
use crate::sink::Hook;

/// Request-scoped handle that collects the errors of entries attached to it.
pub trait ErrorContext: Send + Sync {
    /// Record one non-nil entry error.
    fn push_error(&self, err: &str);
}

/// The sink set an entry fans out to.
pub type SinkSet = Vec<Arc<dyn Hook>>;

/// Shared handle onto the logger's current sink set; loaded at `log` time so
/// that sink-set swaps stay linearizable.
pub type EmitterHandle = Arc<ArcSwapOption<SinkSet>>;

/// One logged event.
///
/// Reserved field keys (`time`, `level`, `stack`, `caller`, `file`, `line`,
/// `message`, `error`, `data`) may be set by callers through `fields`; the
/// formatter then interprets them with their reserved meaning, and field
/// values win over the entry's own attributes on conflict.
pub struct Entry {
    /// Wall-clock capture; `None` when timestamps are disabled.
    pub time: Option<DateTime<Utc>>,
    /// Severity of the event.
    pub level: Level,
    /// Task identifier; 0 when stack capture is disabled.
    pub stack: u64,
    /// Fully-qualified caller name; empty when unavailable.
    pub caller: String,
    /// Caller source file; empty when trace capture is disabled.
    pub file: String,
    /// Caller source line; 0 when unknown.
    pub line: u32,
    /// The log message.
    pub message: String,
    /// Ordered failure values; `None` slots model nil errors and are
    /// skipped by the formatter.
    pub errors: SmallVec<[Option<String>; 4]>,
    /// Opaque payload attached verbatim.
    pub data: Option<Value>,
    /// Independent structured-field snapshot.
    pub fields: Fields,

    message_only: bool,
    gated: bool,
    emitter: Option<EmitterHandle>,
    context: Option<Arc<dyn ErrorContext>>,
    metrics: Option<Metrics>,
}

impl Entry {
    /// Create a detached entry. Without an emitter, `log` is a no-op.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Entry {
            time: None,
            level,
            stack: 0,
            caller: String::new(),
            file: String::new(),
            line: 0,
            message: message.into(),
            errors: SmallVec::new(),
            data: None,
            fields: Fields::new(),
            message_only: false,
            gated: false,
            emitter: None,
            context: None,
            metrics: None,
        }
    }

    /// Attach the logger's sink-set handle.
    pub(crate) fn with_emitter(mut self, emitter: EmitterHandle) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Attach the logger's metrics counters.
    pub(crate) fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Mark the entry as gated: it keeps its message but `log` becomes a
    /// no-op.
    pub(crate) fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    /// Whether the entry was suppressed by the logger threshold.
    pub fn is_gated(&self) -> bool {
        self.gated
    }

    /// Replace the level.
    pub fn set_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Toggle message-only emission (the access-log path).
    pub fn set_message_only(mut self, message_only: bool) -> Self {
        self.message_only = message_only;
        self
    }

    /// Whether this entry takes the message-only path.
    pub fn is_message_only(&self) -> bool {
        self.message_only
    }

    /// Replace the captured context attributes in one call.
    pub fn set_entry_context(
        mut self,
        time: Option<DateTime<Utc>>,
        stack: u64,
        caller: impl Into<String>,
        file: impl Into<String>,
        line: u32,
        message: impl Into<String>,
    ) -> Self {
        self.time = time;
        self.stack = stack;
        self.caller = caller.into();
        self.file = file.into();
        self.line = line;
        self.message = message.into();
        self
    }

    /// Attach a request context; non-nil errors are mirrored onto it when
    /// the entry is logged.
    pub fn set_context(mut self, ctx: Arc<dyn ErrorContext>) -> Self {
        self.context = Some(ctx);
        self
    }

    /// Attach an opaque data payload.
    pub fn data_set(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Add one field.
    pub fn field_add(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.set(key, value);
        self
    }

    /// Merge a field set over the entry's fields (right wins).
    pub fn field_merge(mut self, other: &Fields) -> Self {
        self.fields = self.fields.merge(other);
        self
    }

    /// Replace the field set.
    pub fn field_set(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    /// Remove the given field keys.
    pub fn field_clean(mut self, keys: &[&str]) -> Self {
        self.fields = self.fields.delete(keys);
        self
    }

    /// Append one failure value; `None` records an explicit nil error.
    pub fn err_add<E: fmt::Display>(mut self, err: Option<E>) -> Self {
        self.errors.push(err.map(|e| e.to_string()));
        self
    }

    /// Replace the failure list.
    pub fn err_set<E: fmt::Display>(mut self, errs: impl IntoIterator<Item = Option<E>>) -> Self {
        self.errors = errs.into_iter().map(|e| e.map(|e| e.to_string())).collect();
        self
    }

    /// Drop all failure values.
    pub fn err_clean(mut self) -> Self {
        self.errors.clear();
        self
    }

    /// Whether any non-nil error is attached.
    pub fn has_error(&self) -> bool {
        self.errors.iter().any(|e| e.is_some())
    }

    /// Re-classify and close the entry.
    ///
    /// With at least one non-nil error the entry keeps its level; otherwise
    /// the level is replaced by `success_level` (`Nil` suppresses the
    /// emission entirely). `log` runs either way.
    ///
    /// # Returns
    ///
    /// Whether any non-nil error existed.
    pub fn check(mut self, success_level: Level) -> bool {
        let failed = self.has_error();
        if !failed {
            self.level = success_level;
        }
        self.log();
        failed
    }

    /// Close the entry: fan out to every sink accepting its level, mirror
    /// errors onto the attached context, then run the terminal action for
    /// `Fatal` (exit 1) or `Panic` (panic with the message).
    ///
    /// Sink errors are reported to the process-wide error hook and never
    /// stop the fan-out.
    pub fn log(self) {
        if self.gated || !self.emit() {
            return;
        }
        match self.level {
            Level::Fatal | Level::Panic => {
                // The terminal action must not race the async workers:
                // drain what the fan-out just enqueued, then act.
                if let Some(emitter) = self.emitter.as_ref() {
                    if let Some(sinks) = emitter.load_full() {
                        for sink in sinks.iter() {
                            let _ = sink.close();
                        }
                    }
                }
                if self.level == Level::Fatal {
                    std::process::exit(1);
                }
                panic!("{}", self.message)
            }
            _ => {}
        }
    }

    /// Runs the fan-out; returns whether the entry was live (a sink set
    /// existed and the level was not `Nil`), which also gates the terminal
    /// actions.
    fn emit(&self) -> bool {
        let Some(emitter) = self.emitter.as_ref() else {
            return false;
        };
        let Some(sinks) = emitter.load_full() else {
            return false;
        };
        if sinks.is_empty() || self.level == Level::Nil {
            return false;
        }

        // Message-only entries fan out on the Info row of each sink's
        // accepted-level set.
        let fan_level = if self.message_only { Level::Info } else { self.level };
        for sink in sinks.iter() {
            if !sink.accepts(fan_level) {
                continue;
            }
            if let Err(err) = sink.fire(self) {
                hooks::report_error(&err);
                if let Some(metrics) = &self.metrics {
                    metrics.incr_sink_errors();
                }
            }
        }
        if let Some(metrics) = &self.metrics {
            metrics.incr_entries();
        }

        if let Some(ctx) = &self.context {
            for err in self.errors.iter().flatten() {
                ctx.push_error(err);
            }
        }
        true
    }

    /// Compose the outgoing field list for one sink: level, time, stack,
    /// caller-or-file, line, message, error, data, then the entry fields
    /// (sorted), which win over reserved keys on conflict.
    ///
    /// Returns an empty list when nothing but the level tag remains, in
    /// which case the sink drops the record.
    pub(crate) fn compose(
        &self,
        strip_stack: bool,
        strip_timestamp: bool,
        keep_trace: bool,
    ) -> Vec<(String, Value)> {
        let mut tag: Vec<(String, Value)> = Vec::with_capacity(8);
        tag.push(("level".to_string(), Value::from(self.level.as_str())));

        if !strip_timestamp {
            if let Some(time) = self.time {
                tag.push((
                    "time".to_string(),
                    Value::from(time.to_rfc3339_opts(SecondsFormat::Nanos, true)),
                ));
            }
        }
        if !strip_stack && self.stack != 0 {
            tag.push(("stack".to_string(), Value::from(self.stack)));
        }
        if keep_trace {
            if !self.caller.is_empty() {
                tag.push(("caller".to_string(), Value::from(self.caller.as_str())));
            } else if !self.file.is_empty() {
                tag.push(("file".to_string(), Value::from(self.file.as_str())));
            }
            if self.line != 0 {
                tag.push(("line".to_string(), Value::from(self.line)));
            }
        }
        if !self.message.is_empty() {
            tag.push(("message".to_string(), Value::from(self.message.as_str())));
        }
        let joined: Vec<&str> = self.errors.iter().flatten().map(String::as_str).collect();
        if !joined.is_empty() {
            tag.push(("error".to_string(), Value::from(joined.join(", "))));
        }
        if let Some(data) = &self.data {
            tag.push(("data".to_string(), data.clone()));
        }

        let flat = self.fields.to_flat_map();
        let mut keys: Vec<&String> = flat.keys().collect();
        keys.sort();
        for key in keys {
            let value = flat[key].clone();
            match tag.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = value,
                None => tag.push((key.clone(), value)),
            }
        }

        if tag.len() == 1 {
            // Only the level tag survived: nothing worth writing.
            return Vec::new();
        }
        tag
    }
}
