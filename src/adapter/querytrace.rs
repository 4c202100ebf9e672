//! Database query tracing adapter.
//!
//! Consumes the `(begin, fetch, err)` callback of a query tracer and
//! classifies each query as failed, slow or routine before handing it to
//! the logger façade with `elapsed_ms`, `rows` and `query` fields attached.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::fields::Fields;
use crate::hooks::Provider;
use crate::level::Level;
use crate::logger::Logger;

/// The not-found sentinel recognized when `ignore_not_found` is set.
pub const NOT_FOUND: &str = "record not found";

/// Verbosity of the query tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum TraceLevel {
    /// Nothing is traced.
    Silent = 1,
    /// Only failed queries.
    Error = 2,
    /// Failed and slow queries.
    Warn = 3,
    /// Every query.
    Info = 4,
}

impl TraceLevel {
    fn from_u8(raw: u8) -> TraceLevel {
        match raw {
            2 => TraceLevel::Error,
            3 => TraceLevel::Warn,
            4 => TraceLevel::Info,
            _ => TraceLevel::Silent,
        }
    }
}

/// Query tracing adapter over the logger façade.
pub struct QueryTrace {
    provider: Provider,
    level: AtomicU8,
    ignore_not_found: bool,
    slow_threshold: Duration,
}

impl QueryTrace {
    /// Build an adapter resolving its logger through a provider.
    ///
    /// A zero `slow_threshold` disables slow-query classification.
    pub fn new(provider: Provider, ignore_not_found: bool, slow_threshold: Duration) -> Self {
        QueryTrace {
            provider,
            level: AtomicU8::new(TraceLevel::Info as u8),
            ignore_not_found,
            slow_threshold,
        }
    }

    /// Build an adapter over a specific logger.
    pub fn for_logger(logger: &Logger, ignore_not_found: bool, slow_threshold: Duration) -> Self {
        let shared = logger.clone();
        QueryTrace::new(
            Arc::new(move || Some(shared.clone())),
            ignore_not_found,
            slow_threshold,
        )
    }

    /// Change the tracer verbosity.
    pub fn log_mode(&self, level: TraceLevel) {
        self.level.store(level as u8, Ordering::Release);
    }

    /// The current tracer verbosity.
    pub fn current_mode(&self) -> TraceLevel {
        TraceLevel::from_u8(self.level.load(Ordering::Acquire))
    }

    /// Emit a free-form tracer message at `Info`.
    pub fn info(&self, message: &str) {
        if self.current_mode() >= TraceLevel::Info {
            if let Some(logger) = (self.provider)() {
                logger.info(message, None);
            }
        }
    }

    /// Emit a free-form tracer message at `Warn`.
    pub fn warn(&self, message: &str) {
        if self.current_mode() >= TraceLevel::Warn {
            if let Some(logger) = (self.provider)() {
                logger.warning(message, None);
            }
        }
    }

    /// Emit a free-form tracer message at `Error`.
    pub fn error(&self, message: &str) {
        if self.current_mode() >= TraceLevel::Error {
            if let Some(logger) = (self.provider)() {
                logger.error(message, None);
            }
        }
    }

    /// Classify and record one finished query.
    ///
    /// A non-nil error (unless it is the ignored not-found sentinel) logs
    /// at `Error`; otherwise a duration beyond the slow threshold logs at
    /// `Warn` with a synthetic `SLOW Query` error; otherwise `Info`. The
    /// fetcher yields the SQL text and the affected row count, where a
    /// negative count means unknown and is rendered as `-`.
    pub fn trace(
        &self,
        begin: Instant,
        fetch: impl FnOnce() -> (String, i64),
        err: Option<&str>,
    ) {
        let mode = self.current_mode();
        if mode == TraceLevel::Silent {
            return;
        }
        let Some(logger) = (self.provider)() else {
            return;
        };
        let elapsed = begin.elapsed();

        let failed = err.is_some_and(|e| !self.ignore_not_found || e != NOT_FOUND);
        let slow = !self.slow_threshold.is_zero() && elapsed > self.slow_threshold;

        if failed && mode >= TraceLevel::Error {
            let (sql, rows) = fetch();
            logger.log_details(
                Level::Error,
                "",
                None,
                vec![err.map(|e| e.to_string())],
                Some(&query_fields(elapsed, &sql, rows)),
            );
        } else if slow && mode >= TraceLevel::Warn {
            let (sql, rows) = fetch();
            let synthetic = format!("SLOW Query >= {:?}", self.slow_threshold);
            logger.log_details(
                Level::Warn,
                "",
                None,
                vec![Some(synthetic)],
                Some(&query_fields(elapsed, &sql, rows)),
            );
        } else if mode >= TraceLevel::Info {
            let (sql, rows) = fetch();
            logger.log_details(
                Level::Info,
                "",
                None,
                Vec::new(),
                Some(&query_fields(elapsed, &sql, rows)),
            );
        }
    }
}

fn query_fields(elapsed: Duration, sql: &str, rows: i64) -> Fields {
    let elapsed_ms = (elapsed.as_secs_f64() * 1_000_000.0).round() / 1000.0;
    let rows_value = if rows < 0 {
        Value::from("-")
    } else {
        Value::from(rows)
    };
    Fields::new()
        .add("elapsed_ms", elapsed_ms)
        .add("rows", rows_value)
        .add("query", sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_fields_rows_rendering() {
        let fields = query_fields(Duration::from_millis(50), "SELECT 1", 1);
        assert_eq!(fields.load("rows"), Some(Value::from(1)));
        assert_eq!(fields.load("query"), Some(Value::from("SELECT 1")));
        let ms = fields.load("elapsed_ms").and_then(|v| v.as_f64()).expect("ms");
        assert!((ms - 50.0).abs() < 1.0);

        let fields = query_fields(Duration::from_millis(10), "SELECT pg_sleep(1)", -1);
        assert_eq!(fields.load("rows"), Some(Value::from("-")));
    }

    #[test]
    fn test_nil_provider_is_noop() {
        let tracer = QueryTrace::new(Arc::new(|| None), false, Duration::ZERO);
        tracer.trace(Instant::now(), || ("SELECT 1".to_string(), 1), None);
        tracer.info("nothing happens");
    }

    #[test]
    fn test_silent_mode_skips_fetch() {
        let tracer = QueryTrace::new(Arc::new(|| None), false, Duration::ZERO);
        tracer.log_mode(TraceLevel::Silent);
        assert_eq!(tracer.current_mode(), TraceLevel::Silent);
        tracer.trace(
            Instant::now(),
            || unreachable!("fetch must not run when silent"),
            Some("boom"),
        );
    }

    #[test]
    fn test_mode_ordering() {
        assert!(TraceLevel::Info > TraceLevel::Warn);
        assert!(TraceLevel::Warn > TraceLevel::Error);
        assert!(TraceLevel::Error > TraceLevel::Silent);
    }
}
