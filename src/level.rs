//! # Severity Levels
//!
//! This module defines the ordered severity levels accepted by the logger,
//! their text parsing with common aliases, and the fixed mappings onto
//! foreign logging APIs.
//!
//! Emission is gated by ordinal comparison: an entry is emitted when its
//! level ordinal is less than or equal to the logger threshold ordinal. The
//! `Nil` level sits past `Debug` and is special-cased everywhere: as a
//! threshold it suppresses all output, and it never appears on an emitted
//! entry.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Ordered log severity.
///
/// Ordinals run from most severe (`Panic`) to most verbose (`Debug`), with
/// `Nil` last as the suppression value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    /// Log then raise a panic.
    Panic = 0,
    /// Log then terminate the process with exit code 1.
    Fatal = 1,
    /// Failure conditions.
    Error = 2,
    /// Suspicious but non-failing conditions.
    Warn = 3,
    /// Routine operational messages.
    Info = 4,
    /// Diagnostic detail.
    Debug = 5,
    /// Suppression value; valid as a threshold, never emitted.
    Nil = 6,
}

impl Level {
    /// Parse a level from text.
    ///
    /// Parsing trims whitespace and is case-insensitive. Accepted aliases:
    /// `warn`/`warning`, `err`/`error`, `crit`/`critical`/`fatal`,
    /// `nil`/`off`/`silent`. Unknown strings map to `Info`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fanlog::Level;
    /// assert_eq!(Level::parse("WARNING"), Level::Warn);
    /// assert_eq!(Level::parse("critical"), Level::Fatal);
    /// assert_eq!(Level::parse("  off "), Level::Nil);
    /// assert_eq!(Level::parse("verbose"), Level::Info);
    /// ```
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "panic" => Level::Panic,
            "fatal" | "crit" | "critical" => Level::Fatal,
            "error" | "err" => Level::Error,
            "warn" | "warning" => Level::Warn,
            "debug" => Level::Debug,
            "nil" | "off" | "silent" => Level::Nil,
            _ => Level::Info,
        }
    }

    /// The canonical lowercase name of the level.
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Panic => "panic",
            Level::Fatal => "fatal",
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Nil => "nil",
        }
    }

    /// The canonical names of all levels, most severe first.
    pub const fn list() -> [&'static str; 7] {
        ["panic", "fatal", "error", "warn", "info", "debug", "nil"]
    }

    /// The gating ordinal: lower means more severe.
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Reconstructs a level from its gating ordinal.
    ///
    /// Out-of-range values collapse to `Nil`.
    pub const fn from_ordinal(ord: u8) -> Self {
        match ord {
            0 => Level::Panic,
            1 => Level::Fatal,
            2 => Level::Error,
            3 => Level::Warn,
            4 => Level::Info,
            5 => Level::Debug,
            _ => Level::Nil,
        }
    }

    /// Whether an entry at this level passes the given threshold.
    ///
    /// `Nil` suppresses from either side: a `Nil` threshold emits nothing
    /// and a `Nil` entry is never emitted.
    pub fn enabled_for(self, threshold: Level) -> bool {
        self != Level::Nil && threshold != Level::Nil && self.ordinal() <= threshold.ordinal()
    }

    /// All levels an empty accepted-level configuration expands to:
    /// everything from `Debug` up, i.e. every level except `Nil`.
    pub const fn all() -> [Level; 6] {
        [
            Level::Panic,
            Level::Fatal,
            Level::Error,
            Level::Warn,
            Level::Info,
            Level::Debug,
        ]
    }

    /// Fixed mapping onto the stdlib `log` facade.
    ///
    /// `Fatal` and `Panic` collapse to `log::Level::Error`; `Nil` has no
    /// counterpart and returns `None`.
    pub fn to_log(self) -> Option<log::Level> {
        match self {
            Level::Panic | Level::Fatal | Level::Error => Some(log::Level::Error),
            Level::Warn => Some(log::Level::Warn),
            Level::Info => Some(log::Level::Info),
            Level::Debug => Some(log::Level::Debug),
            Level::Nil => None,
        }
    }

    /// Fixed mapping from the stdlib `log` facade.
    ///
    /// `Trace` has no counterpart of its own and maps to `Debug`.
    pub fn from_log(level: log::Level) -> Self {
        match level {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug | log::Level::Trace => Level::Debug,
        }
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::Info
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Level::parse(s))
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct LevelVisitor;

        impl Visitor<'_> for LevelVisitor {
            type Value = Level;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a log level name")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Level, E> {
                Ok(Level::parse(v))
            }
        }

        deserializer.deserialize_str(LevelVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Level::parse("panic"), Level::Panic);
        assert_eq!(Level::parse("FATAL"), Level::Fatal);
        assert_eq!(Level::parse("crit"), Level::Fatal);
        assert_eq!(Level::parse("Critical"), Level::Fatal);
        assert_eq!(Level::parse("err"), Level::Error);
        assert_eq!(Level::parse("warning"), Level::Warn);
        assert_eq!(Level::parse("info"), Level::Info);
        assert_eq!(Level::parse("debug"), Level::Debug);
        assert_eq!(Level::parse("off"), Level::Nil);
        assert_eq!(Level::parse("silent"), Level::Nil);
    }

    #[test]
    fn test_parse_unknown_maps_to_info() {
        assert_eq!(Level::parse("verbose"), Level::Info);
        assert_eq!(Level::parse(""), Level::Info);
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(Level::parse("  error\t"), Level::Error);
    }

    #[test]
    fn test_ordinal_round_trip() {
        for lvl in Level::all() {
            assert_eq!(Level::from_ordinal(lvl.ordinal()), lvl);
        }
        assert_eq!(Level::from_ordinal(Level::Nil.ordinal()), Level::Nil);
        assert_eq!(Level::from_ordinal(200), Level::Nil);
    }

    #[test]
    fn test_enabled_for() {
        // Severe entries pass a verbose threshold, not the other way around.
        assert!(Level::Error.enabled_for(Level::Info));
        assert!(Level::Fatal.enabled_for(Level::Info));
        assert!(Level::Info.enabled_for(Level::Info));
        assert!(!Level::Debug.enabled_for(Level::Info));

        // Nil suppresses from either side.
        assert!(!Level::Info.enabled_for(Level::Nil));
        assert!(!Level::Nil.enabled_for(Level::Debug));
    }

    #[test]
    fn test_display_round_trip() {
        for name in Level::list() {
            assert_eq!(Level::parse(name).as_str(), name);
        }
    }

    #[test]
    fn test_log_mapping() {
        assert_eq!(Level::Panic.to_log(), Some(log::Level::Error));
        assert_eq!(Level::Fatal.to_log(), Some(log::Level::Error));
        assert_eq!(Level::Warn.to_log(), Some(log::Level::Warn));
        assert_eq!(Level::Nil.to_log(), None);
        assert_eq!(Level::from_log(log::Level::Trace), Level::Debug);
    }

    #[test]
    fn test_serde_round_trip() {
        let json = serde_json::to_string(&Level::Warn).expect("serialize");
        assert_eq!(json, "\"warn\"");
        let back: Level = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, Level::Warn);
    }
}
