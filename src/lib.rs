//! # Fanlog - Structured Multi-Sink Logging Library
//!
//! Fanlog is a thread-safe logging façade that fans each accepted record out
//! to any combination of standard-stream, asynchronous file and syslog sinks,
//! each with its own level filter and formatter.
//!
//! ## Architecture
//!
//! The library is organized into focused modules:
//! - `level`: ordered severity levels with parsing and foreign mappings
//! - `fields`: thread-safe structured key/value payloads
//! - `entry`: one logged event and its emission protocol
//! - `format`: text, JSON and access-log serializers
//! - `sink`: the sink contract and the std-stream, file and syslog sinks
//! - `config`: validated runtime options
//! - `logger`: the public façade
//! - `adapter`: foreign logger APIs layered over the façade
//!
//! ## Features
//!
//! - Lock-free snapshot swaps for level, options, fields and sink sets
//! - Asynchronous batched file writes with back-pressure
//! - Syslog delivery over udp/tcp/unix transports with bounded reconnect
//! - Adapters for the stdlib `log` facade, a leveled structured API and a
//!   database query tracer

pub mod adapter;
pub mod config;
pub mod entry;
pub mod fields;
pub mod format;
pub mod hooks;
pub mod level;
pub mod logger;
pub mod sink;
pub mod utils;

#[cfg(test)]
mod tests;

pub use config::{FileOpt, Options, SinkFormat, SyslogOpt};
pub use entry::Entry;
pub use fields::Fields;
pub use level::Level;
pub use logger::{Logger, Metrics};
pub use utils::error::{Error, Result};
