//! Leveled structured adapter.
//!
//! Presents an hclog-shaped API: leveled emission with alternating
//! key/value argument lists, named sub-loggers, implied arguments, and
//! stdlib-shaped escape hatches. The adapter name and implied arguments
//! travel as reserved fields on every record.

use std::panic::Location;
use std::sync::Arc;

use serde_json::Value;

use crate::adapter::stdlog::StdLog;
use crate::fields::Fields;
use crate::hooks::{self, Provider};
use crate::level::Level;
use crate::logger::{IoWriter, Logger};

/// Key holding an odd trailing argument that had no value.
pub const BAD_KEY: &str = "!BADKEY";
/// Reserved field carrying the adapter name.
pub const NAME_KEY: &str = "hclog.name";
/// Reserved field carrying the implied argument list.
pub const ARGS_KEY: &str = "hclog.args";

/// Levels of the foreign API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterLevel {
    /// No explicit level: suppressed.
    NoLevel,
    /// Explicitly off: suppressed.
    Off,
    /// Most verbose; maps to `Debug` with caller capture forced on.
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl AdapterLevel {
    /// The fixed mapping onto core levels; `None` means suppressed.
    pub fn to_level(self) -> Option<Level> {
        match self {
            AdapterLevel::NoLevel | AdapterLevel::Off => None,
            AdapterLevel::Trace | AdapterLevel::Debug => Some(Level::Debug),
            AdapterLevel::Info => Some(Level::Info),
            AdapterLevel::Warn => Some(Level::Warn),
            AdapterLevel::Error => Some(Level::Error),
        }
    }

    fn from_level(level: Level) -> AdapterLevel {
        match level {
            Level::Debug => AdapterLevel::Debug,
            Level::Info => AdapterLevel::Info,
            Level::Warn => AdapterLevel::Warn,
            Level::Error => AdapterLevel::Error,
            Level::Fatal | Level::Panic => AdapterLevel::Error,
            Level::Nil => AdapterLevel::Off,
        }
    }
}

/// Leveled structured adapter over the logger façade.
#[derive(Clone)]
pub struct Structured {
    provider: Provider,
    name: String,
    implied: Vec<Value>,
}

impl Structured {
    /// Build an adapter resolving its logger through a provider.
    pub fn new(provider: Provider) -> Self {
        Structured {
            provider,
            name: String::new(),
            implied: Vec::new(),
        }
    }

    /// Build an adapter over a specific logger.
    pub fn for_logger(logger: &Logger) -> Self {
        let shared = logger.clone();
        Structured::new(Arc::new(move || Some(shared.clone())))
    }

    /// The adapter installed as the process default, if one was registered
    /// through `hooks::set_default`.
    pub fn default_adapter() -> Option<Structured> {
        hooks::default_provider().map(Structured::new)
    }

    /// Emit at `Trace` (caller capture forced on).
    #[track_caller]
    pub fn trace(&self, message: &str, args: &[Value]) {
        self.log(AdapterLevel::Trace, message, args);
    }

    /// Emit at `Debug`.
    #[track_caller]
    pub fn debug(&self, message: &str, args: &[Value]) {
        self.log(AdapterLevel::Debug, message, args);
    }

    /// Emit at `Info`.
    #[track_caller]
    pub fn info(&self, message: &str, args: &[Value]) {
        self.log(AdapterLevel::Info, message, args);
    }

    /// Emit at `Warn`.
    #[track_caller]
    pub fn warn(&self, message: &str, args: &[Value]) {
        self.log(AdapterLevel::Warn, message, args);
    }

    /// Emit at `Error`.
    #[track_caller]
    pub fn error(&self, message: &str, args: &[Value]) {
        self.log(AdapterLevel::Error, message, args);
    }

    /// Emit at an explicit foreign level.
    ///
    /// Arguments alternate key and value; an odd trailing argument is
    /// stored under `!BADKEY`.
    #[track_caller]
    pub fn log(&self, level: AdapterLevel, message: &str, args: &[Value]) {
        let Some(core_level) = level.to_level() else {
            return;
        };
        let Some(logger) = (self.provider)() else {
            return;
        };
        let fields = self.base_fields();
        let mut pairs = args.chunks_exact(2);
        for pair in pairs.by_ref() {
            let key = match &pair[0] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            fields.set(key, pair[1].clone());
        }
        if let [odd] = pairs.remainder() {
            fields.set(BAD_KEY, odd.clone());
        }
        let force_trace = level == AdapterLevel::Trace;
        logger
            .new_entry(
                core_level,
                message,
                None,
                Vec::new(),
                Some(&fields),
                Location::caller(),
                force_trace,
            )
            .log();
    }

    /// Whether `Trace` emission is live: the threshold admits `Debug` and
    /// caller capture is configured on the logger or any of its sinks.
    pub fn is_trace(&self) -> bool {
        let Some(logger) = (self.provider)() else {
            return false;
        };
        if !Level::Debug.enabled_for(logger.get_level()) {
            return false;
        }
        let opts = logger.get_options();
        opts.enable_trace
            || opts.files.iter().any(|f| f.keep_trace)
            || opts.syslogs.iter().any(|s| s.keep_trace)
    }

    /// Whether `Debug` emission is live.
    pub fn is_debug(&self) -> bool {
        self.is_enabled(Level::Debug)
    }

    /// Whether `Info` emission is live.
    pub fn is_info(&self) -> bool {
        self.is_enabled(Level::Info)
    }

    /// Whether `Warn` emission is live.
    pub fn is_warn(&self) -> bool {
        self.is_enabled(Level::Warn)
    }

    /// Whether `Error` emission is live.
    pub fn is_error(&self) -> bool {
        self.is_enabled(Level::Error)
    }

    fn is_enabled(&self, level: Level) -> bool {
        match (self.provider)() {
            Some(logger) => level.enabled_for(logger.get_level()),
            None => false,
        }
    }

    /// Set the underlying logger threshold from a foreign level.
    pub fn set_level(&self, level: AdapterLevel) {
        if let Some(logger) = (self.provider)() {
            logger.set_level(level.to_level().unwrap_or(Level::Nil));
        }
    }

    /// The underlying threshold as a foreign level.
    pub fn get_level(&self) -> AdapterLevel {
        match (self.provider)() {
            Some(logger) => AdapterLevel::from_level(logger.get_level()),
            None => AdapterLevel::Off,
        }
    }

    /// A sub-adapter whose name extends this adapter's with a dot.
    pub fn named(&self, name: &str) -> Structured {
        let mut sub = self.clone();
        sub.name = if self.name.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.name, name)
        };
        sub
    }

    /// A sub-adapter whose name is exactly `name`.
    pub fn reset_named(&self, name: &str) -> Structured {
        let mut sub = self.clone();
        sub.name = name.to_string();
        sub
    }

    /// A sub-adapter with extra implied arguments appended.
    pub fn with(&self, args: &[Value]) -> Structured {
        let mut sub = self.clone();
        sub.implied.extend(args.iter().cloned());
        sub
    }

    /// The captured implied arguments.
    pub fn implied_args(&self) -> &[Value] {
        &self.implied
    }

    /// The adapter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A stdlib-shaped logger over the same core, bound to `level`
    /// (`Info` when unspecified).
    pub fn standard_logger(&self, level: Option<Level>) -> Option<StdLog> {
        (self.provider)().map(|logger| {
            StdLog::for_logger(&logger, level.unwrap_or(Level::Info), 0)
        })
    }

    /// An `io::Write` handle over the same core.
    pub fn standard_writer(&self) -> Option<IoWriter> {
        (self.provider)().map(|logger| logger.writer())
    }

    fn base_fields(&self) -> Fields {
        let fields = Fields::new();
        if !self.name.is_empty() {
            fields.set(NAME_KEY, self.name.as_str());
        }
        if !self.implied.is_empty() {
            fields.set(ARGS_KEY, Value::Array(self.implied.clone()));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;

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
        let adapter = Structured::new(Arc::new(|| None));
        adapter.info("nowhere", &[]);
        assert!(!adapter.is_info());
        assert_eq!(adapter.get_level(), AdapterLevel::Off);
    }

    #[test]
    fn test_named_appends_and_reset_replaces() {
        let logger = quiet_logger();
        let adapter = Structured::for_logger(&logger);
        let db = adapter.named("db");
        assert_eq!(db.name(), "db");
        let pool = db.named("pool");
        assert_eq!(pool.name(), "db.pool");
        let fresh = pool.reset_named("cache");
        assert_eq!(fresh.name(), "cache");
    }

    #[test]
    fn test_with_accumulates_implied_args() {
        let logger = quiet_logger();
        let adapter = Structured::for_logger(&logger)
            .with(&[Value::from("reqid"), Value::from("abc")]);
        assert_eq!(adapter.implied_args().len(), 2);
        let more = adapter.with(&[Value::from("shard"), Value::from(3)]);
        assert_eq!(more.implied_args().len(), 4);
    }

    #[test]
    fn test_base_fields_reserved_keys() {
        let logger = quiet_logger();
        let adapter = Structured::for_logger(&logger)
            .named("db")
            .with(&[Value::from("reqid"), Value::from("abc")]);
        let fields = adapter.base_fields();
        assert_eq!(fields.load(NAME_KEY), Some(Value::from("db")));
        assert_eq!(
            fields.load(ARGS_KEY),
            Some(Value::from(vec!["reqid", "abc"]))
        );
    }

    #[test]
    fn test_level_predicates_follow_threshold() {
        let logger = quiet_logger();
        let adapter = Structured::for_logger(&logger);
        logger.set_level(Level::Info);
        assert!(adapter.is_error());
        assert!(adapter.is_info());
        assert!(!adapter.is_debug());
        assert!(!adapter.is_trace());

        logger.set_level(Level::Debug);
        assert!(adapter.is_debug());
        // Trace additionally requires caller capture somewhere.
        assert!(!adapter.is_trace());
    }

    #[test]
    fn test_is_trace_requires_trace_configuration() {
        let logger = Logger::new();
        logger
            .set_options(&Options {
                disable_standard: true,
                enable_trace: true,
                ..Options::default()
            })
            .expect("options");
        logger.set_level(Level::Debug);
        let adapter = Structured::for_logger(&logger);
        assert!(adapter.is_trace());
    }

    #[test]
    fn test_set_level_maps_off_to_nil() {
        let logger = quiet_logger();
        let adapter = Structured::for_logger(&logger);
        adapter.set_level(AdapterLevel::Off);
        assert_eq!(logger.get_level(), Level::Nil);
        adapter.set_level(AdapterLevel::Warn);
        assert_eq!(logger.get_level(), Level::Warn);
    }
}
